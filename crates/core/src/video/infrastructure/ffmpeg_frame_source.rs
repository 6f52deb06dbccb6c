use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::{FrameSource, SourceError};

/// Decodes frames via ffmpeg-next (libavformat + libavcodec + libavdevice).
///
/// Accepts anything libavformat can open: container files, network URLs
/// (RTSP/HTTP) and capture devices such as `/dev/video0`. Each decoded frame
/// is converted to RGB24.
pub struct FfmpegFrameSource {
    state: Option<DecodeState>,
    metadata: VideoMetadata,
    next_sequence: u64,
}

struct DecodeState {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    time_base: f64,
    flushing: bool,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Self::open_with_options(path, &[])
    }

    /// Opens with demuxer options, e.g. `("rtsp_transport", "tcp")` or
    /// `("framerate", "30")` for capture devices.
    pub fn open_with_options(path: &Path, options: &[(&str, &str)]) -> Result<Self, SourceError> {
        ffmpeg_next::init().map_err(unavailable)?;
        ffmpeg_next::device::register_all();

        let mut dict = ffmpeg_next::Dictionary::new();
        for (key, value) in options {
            dict.set(key, value);
        }
        let input = ffmpeg_next::format::input_with_dictionary(&path, dict).map_err(unavailable)?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| SourceError::Unavailable("no video stream found".into()))?;

        let stream_index = stream.index();
        let time_base = f64::from(stream.time_base());
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(unavailable)?;
        let decoder = codec_ctx.decoder().video().map_err(unavailable)?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let frames = stream.frames();

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames: (frames > 0).then_some(frames as usize),
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(unavailable)?;

        Ok(Self {
            state: Some(DecodeState {
                input,
                decoder,
                scaler,
                stream_index,
                time_base,
                flushing: false,
            }),
            metadata,
            next_sequence: 0,
        })
    }

    fn fallback_timestamp(&self) -> f64 {
        if self.metadata.fps > 0.0 {
            self.next_sequence as f64 / self.metadata.fps
        } else {
            0.0
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let fallback = self.fallback_timestamp();
        let sequence = self.next_sequence;
        let Some(state) = self.state.as_mut() else {
            return Err(SourceError::Exhausted);
        };

        let result = state.decode_next(sequence, fallback);
        match &result {
            Ok(_) => self.next_sequence += 1,
            // Release the demuxer as soon as the stream ends.
            Err(_) => self.state = None,
        }
        result
    }

    fn close(&mut self) {
        self.state = None;
    }
}

impl DecodeState {
    fn decode_next(&mut self, sequence: u64, fallback_ts: f64) -> Result<Frame, SourceError> {
        loop {
            if let Some(frame) = self.try_receive(sequence, fallback_ts)? {
                return Ok(frame);
            }
            if self.flushing {
                return Err(SourceError::Exhausted);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                    continue;
                }
                Err(e) => return Err(unavailable(e)),
            }

            if packet.stream() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                // Corrupt packets are recoverable; the decoder resyncs on the next keyframe.
                log::debug!("Skipping undecodable packet: {e}");
            }
        }
    }

    fn try_receive(&mut self, sequence: u64, fallback_ts: f64) -> Result<Option<Frame>, SourceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(unavailable)?;

        let width = decoded.width();
        let height = decoded.height();
        let timestamp = decoded
            .timestamp()
            .or_else(|| decoded.pts())
            .map(|ts| ts as f64 * self.time_base)
            .unwrap_or(fallback_ts);

        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        Ok(Some(Frame::rgb(pixels, width, height, sequence, timestamp)))
    }
}

fn unavailable(e: ffmpeg_next::Error) -> SourceError {
    SourceError::Unavailable(e.to_string())
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(&path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        for i in 0..num_frames {
            let mut yuv = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::YUV420P,
                width,
                height,
            );
            for plane in 0..3 {
                for b in yuv.data_mut(plane).iter_mut() {
                    *b = (i * 10 % 255) as u8;
                }
            }
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            drain(&mut encoder, &mut octx, fps, ost_time_base);
        }
        encoder.send_eof().unwrap();
        drain(&mut encoder, &mut octx, fps, ost_time_base);
        octx.write_trailer().unwrap();
    }

    fn drain(
        encoder: &mut ffmpeg_next::encoder::Video,
        octx: &mut ffmpeg_next::format::context::Output,
        fps: i32,
        ost_time_base: ffmpeg_next::Rational,
    ) {
        let mut packet = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
            packet.write_interleaved(octx).unwrap();
        }
    }

    #[test]
    fn test_reads_all_frames_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clip.mp4");
        create_test_video(&path, 5, 64, 48, 25);

        let mut source = FfmpegFrameSource::open(&path).unwrap();
        assert_eq!(source.metadata().width, 64);
        assert_eq!(source.metadata().height, 48);

        let mut sequences = Vec::new();
        let mut last_ts = -1.0;
        loop {
            match source.next_frame() {
                Ok(frame) => {
                    assert_eq!(frame.data().len(), 64 * 48 * 3);
                    assert!(frame.timestamp() >= last_ts);
                    last_ts = frame.timestamp();
                    sequences.push(frame.sequence());
                }
                Err(SourceError::Exhausted) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert_eq!(source.next_frame().unwrap_err(), SourceError::Exhausted);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let result = FfmpegFrameSource::open(Path::new("/nonexistent/clip.mp4"));
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_close_releases_and_exhausts() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clip.mp4");
        create_test_video(&path, 3, 32, 32, 25);

        let mut source = FfmpegFrameSource::open(&path).unwrap();
        assert!(source.next_frame().is_ok());
        source.close();
        assert_eq!(source.next_frame().unwrap_err(), SourceError::Exhausted);
    }
}
