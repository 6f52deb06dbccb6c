use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::{DEFAULT_SEQUENCE_FPS, IMAGE_EXTENSIONS};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::{FrameSource, SourceError};

/// Plays a directory of still images (or one image) as a video stream.
///
/// Files are ordered by name and decoded lazily with the `image` crate.
/// Timestamps are synthesized from a nominal frame rate.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    metadata: VideoMetadata,
    closed: bool,
}

impl ImageSequenceSource {
    /// Opens a single image file or every image inside a directory.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Self::open_with_fps(path, DEFAULT_SEQUENCE_FPS)
    }

    pub fn open_with_fps(path: &Path, fps: f64) -> Result<Self, SourceError> {
        let paths = if path.is_dir() {
            list_images(path)?
        } else if is_image(path) {
            vec![path.to_path_buf()]
        } else {
            return Err(SourceError::Unavailable(format!(
                "not an image or directory: {}",
                path.display()
            )));
        };

        if paths.is_empty() {
            return Err(SourceError::Unavailable(format!(
                "no images found in {}",
                path.display()
            )));
        }

        let (width, height) = image::image_dimensions(&paths[0])
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", paths[0].display())))?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames: Some(paths.len()),
            codec: "image".to_string(),
            source_path: Some(path.to_path_buf()),
        };

        Ok(Self {
            paths,
            cursor: 0,
            metadata,
            closed: false,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if self.closed || self.cursor >= self.paths.len() {
            return Err(SourceError::Exhausted);
        }
        let path = &self.paths[self.cursor];
        let rgb = image::open(path)
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?
            .to_rgb8();

        let (width, height) = rgb.dimensions();
        let sequence = self.cursor as u64;
        let timestamp = if self.metadata.fps > 0.0 {
            sequence as f64 / self.metadata.fps
        } else {
            0.0
        };
        self.cursor += 1;
        Ok(Frame::rgb(rgb.into_raw(), width, height, sequence, timestamp))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| SourceError::Unavailable(format!("{}: {e}", dir.display())))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, value: u8) {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([value, 0, 255 - value]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_directory_plays_in_name_order() {
        let tmp = TempDir::new().unwrap();
        write_png(&tmp.path().join("b.png"), 4, 2, 20);
        write_png(&tmp.path().join("a.png"), 4, 2, 10);
        write_png(&tmp.path().join("c.png"), 4, 2, 30);
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::open_with_fps(tmp.path(), 10.0).unwrap();
        assert_eq!(source.metadata().total_frames, Some(3));

        let first = source.next_frame().unwrap();
        assert_eq!(first.data()[0], 10);
        assert_eq!(first.sequence(), 0);
        let second = source.next_frame().unwrap();
        assert_eq!(second.data()[0], 20);
        assert_relative_eq!(second.timestamp(), 0.1);
        let third = source.next_frame().unwrap();
        assert_eq!(third.data()[0], 30);

        assert_eq!(source.next_frame().unwrap_err(), SourceError::Exhausted);
        assert_eq!(source.next_frame().unwrap_err(), SourceError::Exhausted);
    }

    #[test]
    fn test_single_image_is_one_frame() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("face.png");
        write_png(&path, 8, 6, 100);

        let mut source = ImageSequenceSource::open(&path).unwrap();
        assert_eq!(source.metadata().width, 8);
        assert_eq!(source.metadata().height, 6);
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.data().len(), 8 * 6 * 3);
        assert_eq!(source.next_frame().unwrap_err(), SourceError::Exhausted);
    }

    #[test]
    fn test_empty_directory_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let result = ImageSequenceSource::open(tmp.path());
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_corrupt_image_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        write_png(&tmp.path().join("a.png"), 4, 4, 0);
        fs::write(tmp.path().join("b.png"), b"definitely not a png").unwrap();

        let mut source = ImageSequenceSource::open(tmp.path()).unwrap();
        assert!(source.next_frame().is_ok());
        assert!(matches!(
            source.next_frame(),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_close_exhausts() {
        let tmp = TempDir::new().unwrap();
        write_png(&tmp.path().join("a.png"), 2, 2, 0);
        let mut source = ImageSequenceSource::open(tmp.path()).unwrap();
        source.close();
        assert_eq!(source.next_frame().unwrap_err(), SourceError::Exhausted);
    }

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(is_image(Path::new("photo.JPG")));
        assert!(is_image(Path::new("scan.webp")));
        assert!(!is_image(Path::new("clip.mp4")));
        assert!(!is_image(Path::new("noext")));
    }
}
