//! Average-and-threshold reduction of raw frames.
//!
//! Each pixel's `window` byte samples are averaged with integer floor
//! division; the average is compared against the threshold to give a
//! single 0/1 value.

use super::config::{ReductionConfig, RowMode};
use super::matrix::PixelMatrix;
use crate::assembly::{FrameDimensions, RawFrame};
use thiserror::Error;

/// Errors raised while reducing a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReductionError {
    /// The input is not exactly one frame long.
    #[error("frame is {actual} bytes, expected {expected}")]
    FrameSize {
        /// Bytes in one frame of the configured geometry.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },
}

/// Turns one raw frame into one [`PixelMatrix`].
///
/// Stateless: the same bytes always give the same matrix.
#[derive(Debug, Clone)]
pub struct PixelReducer {
    dimensions: FrameDimensions,
    config: ReductionConfig,
}

impl PixelReducer {
    /// Creates a reducer for `width x height` frames.
    ///
    /// The stream's bytes per pixel is the configured averaging window.
    pub fn new(width: u32, height: u32, config: ReductionConfig) -> Self {
        if config.row_mode == RowMode::Legacy {
            tracing::warn!(
                "Legacy row mode: the last pixel of every row is dropped"
            );
        }
        Self {
            dimensions: FrameDimensions {
                width,
                height,
                bytes_per_pixel: config.window.max(1),
            },
            config,
        }
    }

    /// Geometry of the frames this reducer expects.
    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    /// Returns the reduction parameters.
    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Width of the produced rows.
    pub fn output_width(&self) -> usize {
        self.config.row_mode.row_len(self.dimensions.width as usize)
    }

    /// Reduces one frame of exactly `frame_byte_size` bytes.
    ///
    /// Any other length is rejected; the result always has `height` rows.
    pub fn reduce(&self, frame: &[u8]) -> Result<PixelMatrix, ReductionError> {
        let expected = self.dimensions.frame_byte_size();
        if frame.len() != expected {
            return Err(ReductionError::FrameSize {
                expected,
                actual: frame.len(),
            });
        }

        let window = self.dimensions.bytes_per_pixel;
        let row_bytes = self.dimensions.row_byte_size();
        let out_width = self.output_width();
        let height = self.dimensions.height as usize;
        let threshold = u32::from(self.config.threshold);

        if row_bytes == 0 {
            return Ok(PixelMatrix::from_cells_unchecked(Vec::new(), 0, height));
        }

        let mut cells = Vec::with_capacity(out_width * height);
        for row in frame.chunks_exact(row_bytes).take(height) {
            cells.extend(row[..out_width * window].chunks_exact(window).map(|sample| {
                let sum: u32 = sample.iter().map(|&b| u32::from(b)).sum();
                let average = sum / window as u32;
                u8::from(average >= threshold)
            }));
        }

        Ok(PixelMatrix::from_cells_unchecked(cells, out_width, height))
    }

    /// Reduces an assembled frame.
    pub fn reduce_frame(&self, frame: &RawFrame) -> Result<PixelMatrix, ReductionError> {
        self.reduce(frame.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(pixels: &[(u8, u8, u8)]) -> Vec<u8> {
        pixels.iter().flat_map(|&(r, g, b)| [r, g, b]).collect()
    }

    #[test]
    fn test_two_pixel_frame() {
        let reducer = PixelReducer::new(2, 1, ReductionConfig::default());
        let matrix = reducer.reduce(&[10, 10, 10, 200, 200, 200]).unwrap();

        assert_eq!(matrix.to_rows(), vec![vec![0, 1]]);
    }

    #[test]
    fn test_threshold_boundary() {
        let reducer = PixelReducer::new(2, 1, ReductionConfig::default());

        // (125,125,125) averages to exactly 125; (124,124,126) floors to 124.
        let matrix = reducer
            .reduce(&rgb(&[(125, 125, 125), (124, 124, 126)]))
            .unwrap();
        assert_eq!(matrix.to_rows(), vec![vec![1, 0]]);
    }

    #[test]
    fn test_average_uses_floor() {
        let reducer = PixelReducer::new(1, 1, ReductionConfig::default());

        // 374 / 3 = 124.67 floors to 124.
        assert_eq!(reducer.reduce(&[125, 125, 124]).unwrap().get(0, 0), Some(0));
        // 375 / 3 = 125.
        assert_eq!(reducer.reduce(&[125, 125, 125]).unwrap().get(0, 0), Some(1));
        // No overflow at full intensity.
        assert_eq!(reducer.reduce(&[255, 255, 255]).unwrap().get(0, 0), Some(1));
    }

    #[test]
    fn test_rows_keep_order() {
        let reducer = PixelReducer::new(3, 2, ReductionConfig::default());
        let frame = rgb(&[
            (0, 0, 0),
            (255, 255, 255),
            (0, 0, 0),
            (255, 255, 255),
            (255, 255, 255),
            (0, 0, 0),
        ]);

        let matrix = reducer.reduce(&frame).unwrap();
        assert_eq!(matrix.to_rows(), vec![vec![0, 1, 0], vec![1, 1, 0]]);
    }

    #[test]
    fn test_legacy_rows_drop_last_pixel() {
        let config = ReductionConfig {
            row_mode: RowMode::Legacy,
            ..Default::default()
        };
        let reducer = PixelReducer::new(3, 2, config);
        let frame = rgb(&[
            (255, 255, 255),
            (0, 0, 0),
            (255, 255, 255),
            (0, 0, 0),
            (255, 255, 255),
            (255, 255, 255),
        ]);

        let matrix = reducer.reduce(&frame).unwrap();
        assert_eq!(reducer.output_width(), 2);
        assert_eq!(matrix.to_rows(), vec![vec![1, 0], vec![0, 1]]);
    }

    #[test]
    fn test_custom_threshold_and_window() {
        let config = ReductionConfig {
            threshold: 50,
            window: 1,
            ..Default::default()
        };
        let reducer = PixelReducer::new(4, 1, config);
        assert_eq!(reducer.dimensions().frame_byte_size(), 4);

        let matrix = reducer.reduce(&[0, 49, 50, 200]).unwrap();
        assert_eq!(matrix.to_rows(), vec![vec![0, 0, 1, 1]]);
    }

    #[test]
    fn test_reduce_is_pure() {
        let reducer = PixelReducer::new(4, 4, ReductionConfig::default());
        let frame: Vec<u8> = (0..48).map(|i| (i * 37 % 256) as u8).collect();

        assert_eq!(reducer.reduce(&frame), reducer.reduce(&frame));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let reducer = PixelReducer::new(2, 2, ReductionConfig::default());

        assert_eq!(
            reducer.reduce(&[0; 6]),
            Err(ReductionError::FrameSize {
                expected: 12,
                actual: 6
            })
        );
        assert!(reducer.reduce(&[0; 13]).is_err());
        assert!(reducer.reduce_frame(&RawFrame::new(vec![0; 3], 0)).is_err());
        assert_eq!(reducer.reduce(&[0; 12]).unwrap().to_rows().len(), 2);
    }
}
