use std::time::Duration;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Normal end of a finite stream.
    #[error("frame source exhausted")]
    Exhausted,
    /// The underlying medium went away (device unplugged, read error).
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
}

/// Produces timestamped frames from a file, device or upload stream.
///
/// Frames come out in strictly increasing sequence order. A source is
/// single-pass: once it reports [`SourceError::Exhausted`] it keeps doing so,
/// and replaying requires constructing a fresh source. Unavailability is
/// reported, never retried, since lost frames break track continuity.
pub trait FrameSource: Send {
    fn metadata(&self) -> &VideoMetadata;

    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame, SourceError>;

    /// Waits at most `timeout` for the next frame. `Ok(None)` means nothing
    /// arrived yet and the caller may poll again.
    ///
    /// Sources that cannot wait with a deadline block in `next_frame`.
    fn poll_frame(&mut self, _timeout: Duration) -> Result<Option<Frame>, SourceError> {
        self.next_frame().map(Some)
    }

    /// Releases the underlying medium. Later reads report `Exhausted`.
    fn close(&mut self);
}

/// Adapts a source to an iterator that stops at exhaustion and yields
/// unavailability as a final `Err`.
pub struct Frames<'a> {
    source: &'a mut dyn FrameSource,
    done: bool,
}

impl<'a> Frames<'a> {
    pub fn new(source: &'a mut dyn FrameSource) -> Self {
        Self {
            source,
            done: false,
        }
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.next_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(SourceError::Exhausted) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSource {
        metadata: VideoMetadata,
        remaining: u64,
        next: u64,
        fail_at_end: bool,
    }

    impl FrameSource for CountingSource {
        fn metadata(&self) -> &VideoMetadata {
            &self.metadata
        }

        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            if self.remaining == 0 {
                return if self.fail_at_end {
                    Err(SourceError::Unavailable("unplugged".into()))
                } else {
                    Err(SourceError::Exhausted)
                };
            }
            self.remaining -= 1;
            let frame = Frame::rgb(vec![0u8; 3], 1, 1, self.next, 0.0);
            self.next += 1;
            Ok(frame)
        }

        fn close(&mut self) {
            self.remaining = 0;
        }
    }

    fn source(count: u64, fail_at_end: bool) -> CountingSource {
        CountingSource {
            metadata: VideoMetadata::unknown(),
            remaining: count,
            next: 0,
            fail_at_end,
        }
    }

    #[test]
    fn test_frames_stops_at_exhaustion() {
        let mut src = source(3, false);
        let seqs: Vec<u64> = Frames::new(&mut src)
            .map(|f| f.unwrap().sequence())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_poll_defaults_to_blocking_read() {
        let mut src = source(1, false);
        let frame = src.poll_frame(Duration::from_millis(1)).unwrap();
        assert_eq!(frame.map(|f| f.sequence()), Some(0));
        assert_eq!(
            src.poll_frame(Duration::from_millis(1)).unwrap_err(),
            SourceError::Exhausted
        );
    }

    #[test]
    fn test_frames_yields_unavailable_once() {
        let mut src = source(1, true);
        let items: Vec<_> = Frames::new(&mut src).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1].as_ref().unwrap_err(),
            &SourceError::Unavailable("unplugged".into())
        );
    }
}
