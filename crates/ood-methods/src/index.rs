use std::cmp::Ordering;

use crate::error::{OodError, Result};

/// Exhaustive nearest-neighbor index over fixed-width vectors.
///
/// Distances are squared Euclidean. Vectors are stored contiguously,
/// row-major, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f64>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        FlatL2Index {
            dim,
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one vector of exactly `dim` values.
    pub fn add_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.dim {
            return Err(OodError::DimensionMismatch {
                expected: self.dim,
                got: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// The `k` stored vectors closest to `query`, nearest first, as
    /// `(squared distance, position)` pairs.
    pub fn search(&self, query: &[f64], k: usize) -> Result<Vec<(f64, usize)>> {
        if query.len() != self.dim {
            return Err(OodError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }
        let mut hits: Vec<(f64, usize)> = self
            .data
            .chunks_exact(self.dim)
            .map(|row| row.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum())
            .enumerate()
            .map(|(i, d)| (d, i))
            .collect();

        hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}
