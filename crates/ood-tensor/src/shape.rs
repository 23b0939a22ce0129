use crate::error::{Result, TensorError};
use std::fmt;

/// A tensor shape, wrapping a vector of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the size of dimension `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns `axis` unchanged if it names a dimension of this shape.
    pub fn check_axis(&self, axis: usize) -> Result<usize> {
        if axis < self.ndim() {
            Ok(axis)
        } else {
            Err(TensorError::InvalidAxis {
                axis,
                ndim: self.ndim(),
            })
        }
    }

    /// Row-major contiguous strides: [d0, d1, d2] -> [d1*d2, d2, 1].
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.dims.len()];
        for i in (0..self.dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Splits the shape around `axis` into (outer, len, inner) element counts,
    /// so element (o, i, n) lives at `o * len * inner + i * inner + n`.
    pub fn split_at_axis(&self, axis: usize) -> Result<(usize, usize, usize)> {
        let axis = self.check_axis(axis)?;
        let outer = self.dims[..axis].iter().product();
        let inner = self.dims[axis + 1..].iter().product();
        Ok((outer, self.dims[axis], inner))
    }

    /// The shape with `axis` removed.
    pub fn remove_axis(&self, axis: usize) -> Result<Shape> {
        let axis = self.check_axis(axis)?;
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Shape::new(dims))
    }

    /// The shape with a new dimension of size 1 inserted at `axis`.
    pub fn insert_axis(&self, axis: usize) -> Result<Shape> {
        if axis > self.ndim() {
            return Err(TensorError::InvalidAxis {
                axis,
                ndim: self.ndim(),
            });
        }
        let mut dims = self.dims.clone();
        dims.insert(axis, 1);
        Ok(Shape::new(dims))
    }

    /// Compute the broadcast shape of `a` and `b` using numpy-style broadcasting rules.
    ///
    /// Shapes are aligned on the right; each pair of sizes must be equal or
    /// contain a 1, and the larger size wins.
    pub fn broadcast_shape(a: &Shape, b: &Shape) -> Result<Shape> {
        let ndim = a.ndim().max(b.ndim());
        let padded = |s: &Shape, i: usize| {
            let offset = ndim - s.ndim();
            if i < offset {
                1
            } else {
                s.dims[i - offset]
            }
        };

        let mut result = Vec::with_capacity(ndim);
        for i in 0..ndim {
            let (da, db) = (padded(a, i), padded(b, i));
            let d = match (da, db) {
                _ if da == db => da,
                (1, _) => db,
                (_, 1) => da,
                _ => {
                    return Err(TensorError::BroadcastError {
                        a: a.dims.clone(),
                        b: b.dims.clone(),
                    })
                }
            };
            result.push(d);
        }
        Ok(Shape::new(result))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}
