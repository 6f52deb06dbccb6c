use ndarray::ArrayView3;

/// Declared layout of a frame's pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A single timestamped video/image frame: contiguous bytes in row-major order.
///
/// Frames are immutable once produced. The pipeline moves them between
/// stages instead of sharing them, so there is no mutable accessor.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u64,
    timestamp: f64,
}

impl Frame {
    /// Builds a frame as delivered. A buffer that disagrees with the
    /// geometry is kept as-is; detectors reject it via [`is_consistent`](Self::is_consistent).
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
        timestamp: f64,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            sequence,
            timestamp,
        }
    }

    /// Convenience constructor for tightly-packed RGB24 data.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64, timestamp: f64) -> Self {
        Self::new(data, width, height, PixelFormat::Rgb24, sequence, timestamp)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Presentation time in seconds from the start of the stream.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Whether the buffer length agrees with the declared geometry.
    pub fn is_consistent(&self) -> bool {
        self.data.len()
            == (self.width as usize) * (self.height as usize) * (self.channels() as usize)
    }

    /// `[H, W, C]` view of the pixel buffer.
    ///
    /// # Panics
    /// If the frame is not [`is_consistent`](Self::is_consistent).
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels() as usize,
        )
    }
}
