//! Binary pixel matrix.

use serde::ser::{Serialize, Serializer};

/// One frame reduced to 0/1 values, `height` rows of `width` cells.
///
/// Stored flat; serialises as a nested array of rows.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelMatrix {
    cells: Vec<u8>,
    width: usize,
    height: usize,
}

impl PixelMatrix {
    /// Builds a matrix from row-major cells.
    ///
    /// Returns `None` if `cells.len() != width * height` or a cell is not 0 or 1.
    pub fn from_cells(cells: Vec<u8>, width: usize, height: usize) -> Option<Self> {
        if cells.len() != width * height || cells.iter().any(|&c| c > 1) {
            return None;
        }
        Some(Self {
            cells,
            width,
            height,
        })
    }

    /// Builds a matrix from nested rows of equal length.
    pub fn from_rows(rows: &[Vec<u8>]) -> Option<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        Self::from_cells(rows.concat(), width, rows.len())
    }

    pub(crate) fn from_cells_unchecked(cells: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        Self {
            cells,
            width,
            height,
        }
    }

    /// Cells per row.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the row at `index`.
    pub fn row(&self, index: usize) -> Option<&[u8]> {
        if index >= self.height {
            return None;
        }
        let start = index * self.width;
        Some(&self.cells[start..start + self.width])
    }

    /// Iterates over rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.height).map(move |r| &self.cells[r * self.width..(r + 1) * self.width])
    }

    /// Value at (`row`, `col`).
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.row(row)?.get(col).copied()
    }

    /// Copies the matrix out as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.rows().map(<[u8]>::to_vec).collect()
    }

    /// Number of cells set to 1.
    pub fn white_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == 1).count()
    }

    /// Fraction of cells set to 1, 0.0 for an empty matrix.
    pub fn white_ratio(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.white_count() as f64 / self.cells.len() as f64
    }
}

impl Serialize for PixelMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows())
    }
}

impl std::fmt::Debug for PixelMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelMatrix")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("white_ratio", &format!("{:.4}", self.white_ratio()))
            .finish()
    }
}
