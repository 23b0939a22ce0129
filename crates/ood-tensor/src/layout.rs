//! Layout operations: permutation, concatenation, stacking, diagonal.

use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::tensor::{gather, Tensor};

impl Tensor {
    /// Reorder axes so that output axis `i` is input axis `axes[i]`.
    pub fn permute(&self, axes: &[usize]) -> Result<Tensor> {
        let ndim = self.shape().ndim();
        let mut seen = vec![false; ndim];
        if axes.len() != ndim {
            return Err(TensorError::Other(format!(
                "permute: {} axes given for a tensor of rank {}",
                axes.len(),
                ndim
            )));
        }
        for &a in axes {
            if a >= ndim || seen[a] {
                return Err(TensorError::InvalidAxis { axis: a, ndim });
            }
            seen[a] = true;
        }

        let src_strides = self.shape().strides();
        let dims: Vec<usize> = axes.iter().map(|&a| self.shape().dim(a)).collect();
        let strides: Vec<usize> = axes.iter().map(|&a| src_strides[a]).collect();
        let shape = Shape::new(dims);
        let data = gather(&shape, &strides, self.data());
        Ok(Tensor::new(data, shape))
    }

    /// Reverse the order of all axes (a matrix transpose for rank 2).
    pub fn transpose(&self) -> Result<Tensor> {
        let axes: Vec<usize> = (0..self.shape().ndim()).rev().collect();
        self.permute(&axes)
    }

    /// Concatenate tensors along an existing axis.
    ///
    /// All inputs must agree on every dimension except `axis`.
    pub fn concat(tensors: &[Tensor], axis: usize) -> Result<Tensor> {
        let first = tensors.first().ok_or(TensorError::Empty { op: "concat" })?;
        let axis = first.shape().check_axis(axis)?;

        let mut dims = first.dims().to_vec();
        dims[axis] = 0;
        for t in tensors {
            let compatible = t.shape().ndim() == first.shape().ndim()
                && t
                    .dims()
                    .iter()
                    .zip(first.dims())
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                return Err(TensorError::ShapeMismatch {
                    expected: first.dims().to_vec(),
                    got: t.dims().to_vec(),
                });
            }
            dims[axis] += t.shape().dim(axis);
        }

        let shape = Shape::new(dims);
        let outer: usize = first.dims()[..axis].iter().product();
        let mut data = Vec::with_capacity(shape.numel());
        for o in 0..outer {
            for t in tensors {
                let (_, len, inner) = t.shape().split_at_axis(axis)?;
                let block = len * inner;
                data.extend_from_slice(&t.data()[o * block..(o + 1) * block]);
            }
        }
        Ok(Tensor::new(data, shape))
    }

    /// Stack equally-shaped tensors along a new axis.
    pub fn stack(tensors: &[Tensor], axis: usize) -> Result<Tensor> {
        let first = tensors.first().ok_or(TensorError::Empty { op: "stack" })?;
        let expanded = first.shape().insert_axis(axis)?;
        let mut parts = Vec::with_capacity(tensors.len());
        for t in tensors {
            if t.shape() != first.shape() {
                return Err(TensorError::ShapeMismatch {
                    expected: first.dims().to_vec(),
                    got: t.dims().to_vec(),
                });
            }
            parts.push(t.reshape(expanded.clone())?);
        }
        Tensor::concat(&parts, axis)
    }

    /// Main diagonal of a 2D tensor.
    pub fn diag(&self) -> Result<Tensor> {
        if self.shape().ndim() != 2 {
            return Err(TensorError::RankMismatch {
                expected: 2,
                got: self.shape().ndim(),
            });
        }
        let (rows, cols) = (self.shape().dim(0), self.shape().dim(1));
        let n = rows.min(cols);
        let data = (0..n).map(|i| self.data()[i * cols + i]).collect();
        Ok(Tensor::new(data, Shape::new(vec![n])))
    }

    /// Collapse every axis but the leading one: [b, ...] -> [b, rest].
    pub fn flatten_batch(&self) -> Result<Tensor> {
        let batch = match self.dims().first() {
            Some(&b) => b,
            None => return Err(TensorError::RankMismatch { expected: 1, got: 0 }),
        };
        let rest = self.dims()[1..].iter().product();
        self.reshape(Shape::new(vec![batch, rest]))
    }
}
