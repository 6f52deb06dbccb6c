use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::{FrameSource, SourceError};

/// Frame source fed by an ingestion layer (e.g. an upload handler).
///
/// The producer pushes frames into the paired [`Sender`]; dropping every
/// sender ends the stream. Frames whose sequence number does not increase
/// are treated as a broken stream.
pub struct ChannelFrameSource {
    rx: Option<Receiver<Frame>>,
    metadata: VideoMetadata,
    last_sequence: Option<u64>,
}

impl ChannelFrameSource {
    /// Creates a source and the sender that feeds it.
    ///
    /// `capacity` bounds how far the producer can run ahead.
    pub fn bounded(capacity: usize, metadata: VideoMetadata) -> (Sender<Frame>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (tx, Self::from_receiver(rx, metadata))
    }

    pub fn from_receiver(rx: Receiver<Frame>, metadata: VideoMetadata) -> Self {
        Self {
            rx: Some(rx),
            metadata,
            last_sequence: None,
        }
    }

    /// `None` means every sender is gone.
    fn accept(&mut self, received: Option<Frame>) -> Result<Frame, SourceError> {
        let Some(frame) = received else {
            self.rx = None;
            return Err(SourceError::Exhausted);
        };
        if let Some(last) = self.last_sequence {
            if frame.sequence() <= last {
                self.rx = None;
                return Err(SourceError::Unavailable(format!(
                    "sequence went backwards: {} after {last}",
                    frame.sequence()
                )));
            }
        }
        self.last_sequence = Some(frame.sequence());
        Ok(frame)
    }
}

impl FrameSource for ChannelFrameSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let Some(rx) = self.rx.as_ref() else {
            return Err(SourceError::Exhausted);
        };
        let received = rx.recv().ok();
        self.accept(received)
    }

    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, SourceError> {
        let Some(rx) = self.rx.as_ref() else {
            return Err(SourceError::Exhausted);
        };
        match rx.recv_timeout(timeout) {
            Ok(frame) => self.accept(Some(frame)).map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => self.accept(None).map(Some),
        }
    }

    fn close(&mut self) {
        self.rx = None;
    }
}
