//! Ordered history of reduced frames.

use crate::reduction::PixelMatrix;
use serde::Serialize;

/// Append-only sequence of matrices in stream order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrameSequence {
    frames: Vec<PixelMatrix>,
}

impl FrameSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fully computed matrix.
    pub fn push(&mut self, frame: PixelMatrix) {
        self.frames.push(frame);
    }

    /// Number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if no frame has been produced.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame at `index`, in stream order.
    pub fn get(&self, index: usize) -> Option<&PixelMatrix> {
        self.frames.get(index)
    }

    /// Most recent frame.
    pub fn last(&self) -> Option<&PixelMatrix> {
        self.frames.last()
    }

    /// Iterates frames in stream order.
    pub fn iter(&self) -> std::slice::Iter<'_, PixelMatrix> {
        self.frames.iter()
    }

    /// Borrows the frames as a slice.
    pub fn as_slice(&self) -> &[PixelMatrix] {
        &self.frames
    }

    /// Consumes the sequence, returning the frames.
    pub fn into_vec(self) -> Vec<PixelMatrix> {
        self.frames
    }

    /// Drops every frame, returning how many there were.
    pub(crate) fn discard(&mut self) -> usize {
        let n = self.frames.len();
        self.frames.clear();
        n
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a PixelMatrix;
    type IntoIter = std::slice::Iter<'a, PixelMatrix>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_order_and_serialization() {
        let mut frames = FrameSequence::new();
        frames.push(PixelMatrix::from_rows(&[vec![0, 1]]).unwrap());
        frames.push(PixelMatrix::from_rows(&[vec![1, 1]]).unwrap());

        assert_eq!(frames.len(), 2);
        assert_eq!(frames.last().unwrap().to_rows(), vec![vec![1, 1]]);
        assert_eq!(serde_json::to_string(&frames).unwrap(), "[[[0,1]],[[1,1]]]");
    }

    #[test]
    fn test_discard() {
        let mut frames = FrameSequence::new();
        frames.push(PixelMatrix::from_rows(&[vec![0]]).unwrap());

        assert_eq!(frames.discard(), 1);
        assert!(frames.is_empty());
    }
}
