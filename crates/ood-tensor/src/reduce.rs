//! Reductions along a single axis.
//!
//! Every reduction walks the tensor as (outer, len, inner) blocks around the
//! reduced axis and hands each lane of `len` elements to a closure.

use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::tensor::Tensor;

impl Tensor {
    /// Collapse `axis` by applying `f` to each lane along it.
    ///
    /// The result has the reduced axis removed, or kept with size 1 when
    /// `keepdim` is set.
    pub fn reduce_axis(
        &self,
        axis: usize,
        keepdim: bool,
        f: impl Fn(&[f32]) -> f32,
    ) -> Result<Tensor> {
        let lanes = self.lanes(axis, |lane| f(lane))?;
        let shape = if keepdim {
            let mut dims = self.dims().to_vec();
            dims[axis] = 1;
            Shape::new(dims)
        } else {
            self.shape().remove_axis(axis)?
        };
        Ok(Tensor::new(lanes, shape))
    }

    /// Maximum along `axis`.
    pub fn max_axis(&self, axis: usize) -> Result<Tensor> {
        self.non_empty_axis(axis, "max")?;
        self.reduce_axis(axis, false, |lane| {
            lane.iter().copied().fold(f32::NEG_INFINITY, f32::max)
        })
    }

    /// Index of the maximum along `axis`, one entry per lane in row-major
    /// order of the remaining axes. Ties resolve to the first occurrence.
    pub fn argmax_axis(&self, axis: usize) -> Result<Vec<usize>> {
        self.non_empty_axis(axis, "argmax")?;
        self.lanes(axis, |lane| {
            let mut best = 0;
            for (i, &v) in lane.iter().enumerate() {
                // Strict comparison keeps the first maximum.
                if v > lane[best] {
                    best = i;
                }
            }
            best
        })
    }

    pub fn sum_axis(&self, axis: usize, keepdim: bool) -> Result<Tensor> {
        self.reduce_axis(axis, keepdim, |lane| lane.iter().sum())
    }

    pub fn mean_axis(&self, axis: usize, keepdim: bool) -> Result<Tensor> {
        self.non_empty_axis(axis, "mean")?;
        let n = self.shape().dim(axis) as f32;
        Ok(self.sum_axis(axis, keepdim)?.map(|v| v / n))
    }

    /// Euclidean norm along `axis`.
    pub fn norm_axis(&self, axis: usize) -> Result<Tensor> {
        self.reduce_axis(axis, false, |lane| {
            lane.iter().map(|v| v * v).sum::<f32>().sqrt()
        })
    }

    /// Euclidean norm of all elements.
    pub fn norm_all(&self) -> f32 {
        self.data().iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    fn lanes<R>(&self, axis: usize, f: impl Fn(&[f32]) -> R) -> Result<Vec<R>> {
        let (outer, len, inner) = self.shape().split_at_axis(axis)?;
        let data = self.data();
        let mut out = Vec::with_capacity(outer * inner);
        let mut lane = Vec::with_capacity(len);
        for o in 0..outer {
            let base = o * len * inner;
            for n in 0..inner {
                lane.clear();
                lane.extend((0..len).map(|i| data[base + i * inner + n]));
                out.push(f(&lane));
            }
        }
        Ok(out)
    }

    fn non_empty_axis(&self, axis: usize, op: &'static str) -> Result<()> {
        let axis = self.shape().check_axis(axis)?;
        if self.shape().dim(axis) == 0 {
            return Err(TensorError::Empty { op });
        }
        Ok(())
    }
}
