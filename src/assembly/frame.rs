//! Frame geometry and raw frame type.

/// Fixed geometry of every frame in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDimensions {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Bytes per pixel (3 for RGB24).
    pub bytes_per_pixel: usize,
}

impl FrameDimensions {
    /// RGB24 frame of `width x height` pixels.
    pub fn rgb24(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bytes_per_pixel: 3,
        }
    }

    /// Bytes in one row.
    #[inline]
    pub fn row_byte_size(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    /// Bytes in one frame: `width * height * bytes_per_pixel`.
    #[inline]
    pub fn frame_byte_size(&self) -> usize {
        self.row_byte_size() * self.height as usize
    }
}

/// One complete frame's raw bytes, row-major.
///
/// Always exactly one frame long; the assembler never hands out a
/// partial frame.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
    sequence: u64,
}

impl RawFrame {
    /// Creates a new frame with the given parameters.
    pub fn new(bytes: Vec<u8>, sequence: u64) -> Self {
        Self { bytes, sequence }
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Zero-based position of this frame in the stream.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of bytes in the frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the frame holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the frame, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("sequence", &self.sequence)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
