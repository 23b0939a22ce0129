use ndarray::{concatenate, stack, Array2, ArrayD, Axis, Ix2, IxDyn};

use crate::dense::{AnyTensor, DenseArray};
use crate::error::{OperatorError, Result};
use crate::framework::Framework;
use crate::linalg;
use crate::native::sign;
use crate::operator::TensorOperator;

/// Operator for the ndarray runtime, over dynamic-rank `f32` arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdArrayOperator;

impl NdArrayOperator {
    pub fn new() -> Self {
        NdArrayOperator
    }
}

fn check_axis(t: &ArrayD<f32>, axis: usize) -> Result<Axis> {
    if axis < t.ndim() {
        Ok(Axis(axis))
    } else {
        Err(OperatorError::InvalidAxis {
            axis,
            ndim: t.ndim(),
        })
    }
}

fn check_nonempty_axis(t: &ArrayD<f32>, axis: usize, op: &'static str) -> Result<Axis> {
    let axis = check_axis(t, axis)?;
    if t.len_of(axis) == 0 {
        return Err(OperatorError::Empty { op });
    }
    Ok(axis)
}

fn as_matrix(t: &ArrayD<f32>) -> Result<Array2<f32>> {
    if t.ndim() != 2 {
        return Err(OperatorError::RankMismatch {
            expected: 2,
            got: t.ndim(),
        });
    }
    Ok(t.view().into_dimensionality::<Ix2>()?.to_owned())
}

impl TensorOperator for NdArrayOperator {
    type Tensor = ArrayD<f32>;

    const FRAMEWORK: Framework = Framework::NdArray;

    fn shape(&self, t: &ArrayD<f32>) -> Vec<usize> {
        t.shape().to_vec()
    }

    fn softmax(&self, t: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        if t.ndim() == 0 {
            return Err(OperatorError::RankMismatch { expected: 1, got: 0 });
        }
        let last = Axis(t.ndim() - 1);
        let mut out = t.to_owned();
        for mut lane in out.lanes_mut(last) {
            let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            lane.mapv_inplace(|v| (v - max).exp());
            let sum = lane.sum();
            lane.mapv_inplace(|v| v / sum);
        }
        Ok(out)
    }

    fn argmax(&self, t: &ArrayD<f32>, axis: usize) -> Result<Vec<usize>> {
        let axis = check_nonempty_axis(t, axis, "argmax")?;
        let idx = t.map_axis(axis, |lane| {
            let mut best = 0;
            for (i, &v) in lane.iter().enumerate() {
                if v > lane[best] {
                    best = i;
                }
            }
            best
        });
        Ok(idx.iter().copied().collect())
    }

    fn max(&self, t: &ArrayD<f32>, axis: usize) -> Result<ArrayD<f32>> {
        let axis = check_nonempty_axis(t, axis, "max")?;
        Ok(t.fold_axis(axis, f32::NEG_INFINITY, |m, &v| m.max(v)))
    }

    fn one_hot(&self, labels: &[usize], num_classes: usize) -> Result<ArrayD<f32>> {
        let mut out = ArrayD::zeros(IxDyn(&[labels.len(), num_classes]));
        for (row, &label) in labels.iter().enumerate() {
            if label >= num_classes {
                return Err(OperatorError::LabelOutOfRange { label, num_classes });
            }
            out[[row, label]] = 1.0;
        }
        Ok(out)
    }

    fn sign(&self, t: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        Ok(t.mapv(sign))
    }

    fn norm(&self, t: &ArrayD<f32>, axis: Option<usize>) -> Result<ArrayD<f32>> {
        match axis {
            Some(axis) => {
                let axis = check_axis(t, axis)?;
                Ok(t.map_axis(axis, |lane| lane.iter().map(|v| v * v).sum::<f32>().sqrt()))
            }
            None => Ok(ndarray::arr0(t.iter().map(|v| v * v).sum::<f32>().sqrt()).into_dyn()),
        }
    }

    fn matmul(&self, a: &ArrayD<f32>, b: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        let (lhs, rhs) = (as_matrix(a)?, as_matrix(b)?);
        if lhs.ncols() != rhs.nrows() {
            return Err(OperatorError::MatmulMismatch {
                a: a.shape().to_vec(),
                b: b.shape().to_vec(),
            });
        }
        Ok(lhs.dot(&rhs).into_dyn())
    }

    fn stack(&self, tensors: &[ArrayD<f32>], axis: usize) -> Result<ArrayD<f32>> {
        let first = tensors.first().ok_or(OperatorError::Empty { op: "stack" })?;
        if axis > first.ndim() {
            return Err(OperatorError::InvalidAxis {
                axis,
                ndim: first.ndim() + 1,
            });
        }
        let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();
        Ok(stack(Axis(axis), &views)?)
    }

    fn cat(&self, tensors: &[ArrayD<f32>], axis: usize) -> Result<ArrayD<f32>> {
        let first = tensors.first().ok_or(OperatorError::Empty { op: "cat" })?;
        check_axis(first, axis)?;
        let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();
        Ok(concatenate(Axis(axis), &views)?)
    }

    fn mean(&self, t: &ArrayD<f32>, axis: Option<usize>, keepdim: bool) -> Result<ArrayD<f32>> {
        match axis {
            Some(axis) => {
                let ax = check_nonempty_axis(t, axis, "mean")?;
                let m = t.mean_axis(ax).ok_or(OperatorError::Empty { op: "mean" })?;
                Ok(if keepdim { m.insert_axis(ax) } else { m })
            }
            None => {
                let m = t.mean().ok_or(OperatorError::Empty { op: "mean" })?;
                let dims = if keepdim { vec![1; t.ndim()] } else { vec![] };
                Ok(ArrayD::from_elem(IxDyn(&dims), m))
            }
        }
    }

    fn flatten(&self, t: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        let batch = *t
            .shape()
            .first()
            .ok_or(OperatorError::RankMismatch { expected: 1, got: 0 })?;
        let rest: usize = t.shape()[1..].iter().product();
        self.reshape(t, &[batch, rest])
    }

    fn transpose(&self, t: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        Ok(t.t().as_standard_layout().into_owned())
    }

    fn diag(&self, t: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        Ok(as_matrix(t)?.diag().to_owned().into_dyn())
    }

    fn reshape(&self, t: &ArrayD<f32>, shape: &[usize]) -> Result<ArrayD<f32>> {
        let data: Vec<f32> = t.iter().copied().collect();
        Ok(ArrayD::from_shape_vec(IxDyn(shape), data)?)
    }

    fn pinv(&self, t: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        let m = as_matrix(t)?;
        let (rows, cols) = m.dim();
        let data: Vec<f64> = m.iter().map(|&v| f64::from(v)).collect();
        let inv = linalg::pinv(rows, cols, &data)?;
        let inv = inv.into_iter().map(|v| v as f32).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&[cols, rows]), inv)?)
    }

    fn to_dense(&self, t: &ArrayD<f32>) -> Result<DenseArray> {
        Ok(t.mapv(f64::from))
    }

    fn from_dense(&self, a: &DenseArray) -> Result<ArrayD<f32>> {
        Ok(a.mapv(|v| v as f32))
    }

    fn sanitize(&self, t: AnyTensor) -> Result<ArrayD<f32>> {
        match t {
            AnyTensor::NdArray(a) => Ok(a),
            foreign => self.from_dense(&foreign.to_dense()?),
        }
    }
}
