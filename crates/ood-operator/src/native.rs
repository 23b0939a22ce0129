use std::sync::Arc;

use ood_tensor::{ComputeBackend, CpuBackend, Shape, Tensor};

use crate::dense::{dense_to_native, native_to_dense, AnyTensor, DenseArray};
use crate::error::{OperatorError, Result};
use crate::framework::Framework;
use crate::linalg;
use crate::operator::TensorOperator;

/// Operator for the native runtime.
///
/// Heavy kernels (matmul, softmax) are dispatched to the configured
/// `ComputeBackend`; the rest are `Tensor` bookkeeping.
#[derive(Debug, Clone)]
pub struct NativeOperator {
    backend: Arc<dyn ComputeBackend>,
}

impl NativeOperator {
    pub fn new() -> Self {
        Self::with_backend(Arc::new(CpuBackend::new()))
    }

    pub fn with_backend(backend: Arc<dyn ComputeBackend>) -> Self {
        NativeOperator { backend }
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }
}

impl Default for NativeOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorOperator for NativeOperator {
    type Tensor = Tensor;

    const FRAMEWORK: Framework = Framework::Native;

    fn shape(&self, t: &Tensor) -> Vec<usize> {
        t.dims().to_vec()
    }

    fn softmax(&self, t: &Tensor) -> Result<Tensor> {
        Ok(t.softmax(self.backend())?)
    }

    fn argmax(&self, t: &Tensor, axis: usize) -> Result<Vec<usize>> {
        Ok(t.argmax_axis(axis)?)
    }

    fn max(&self, t: &Tensor, axis: usize) -> Result<Tensor> {
        Ok(t.max_axis(axis)?)
    }

    fn one_hot(&self, labels: &[usize], num_classes: usize) -> Result<Tensor> {
        let mut data = vec![0.0f32; labels.len() * num_classes];
        for (row, &label) in labels.iter().enumerate() {
            if label >= num_classes {
                return Err(OperatorError::LabelOutOfRange { label, num_classes });
            }
            data[row * num_classes + label] = 1.0;
        }
        Ok(Tensor::from_vec(data, vec![labels.len(), num_classes])?)
    }

    fn sign(&self, t: &Tensor) -> Result<Tensor> {
        Ok(t.map(sign))
    }

    fn norm(&self, t: &Tensor, axis: Option<usize>) -> Result<Tensor> {
        match axis {
            Some(axis) => Ok(t.norm_axis(axis)?),
            None => Ok(Tensor::from_vec(vec![t.norm_all()], Shape::new(vec![]))?),
        }
    }

    fn matmul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        Ok(a.matmul(b, self.backend())?)
    }

    fn stack(&self, tensors: &[Tensor], axis: usize) -> Result<Tensor> {
        Ok(Tensor::stack(tensors, axis)?)
    }

    fn cat(&self, tensors: &[Tensor], axis: usize) -> Result<Tensor> {
        Ok(Tensor::concat(tensors, axis)?)
    }

    fn mean(&self, t: &Tensor, axis: Option<usize>, keepdim: bool) -> Result<Tensor> {
        if let Some(axis) = axis {
            return Ok(t.mean_axis(axis, keepdim)?);
        }
        let n = t.shape().numel();
        if n == 0 {
            return Err(OperatorError::Empty { op: "mean" });
        }
        let mean = t.data().iter().sum::<f32>() / n as f32;
        let dims = if keepdim {
            vec![1; t.shape().ndim()]
        } else {
            vec![]
        };
        Ok(Tensor::from_vec(vec![mean], dims)?)
    }

    fn flatten(&self, t: &Tensor) -> Result<Tensor> {
        Ok(t.flatten_batch()?)
    }

    fn transpose(&self, t: &Tensor) -> Result<Tensor> {
        Ok(t.transpose()?)
    }

    fn diag(&self, t: &Tensor) -> Result<Tensor> {
        Ok(t.diag()?)
    }

    fn reshape(&self, t: &Tensor, shape: &[usize]) -> Result<Tensor> {
        Ok(t.reshape(Shape::from(shape))?)
    }

    fn pinv(&self, t: &Tensor) -> Result<Tensor> {
        if t.shape().ndim() != 2 {
            return Err(OperatorError::RankMismatch {
                expected: 2,
                got: t.shape().ndim(),
            });
        }
        let (rows, cols) = (t.shape().dim(0), t.shape().dim(1));
        let data: Vec<f64> = t.data().iter().map(|&v| f64::from(v)).collect();
        let inv = linalg::pinv(rows, cols, &data)?;
        let inv = inv.into_iter().map(|v| v as f32).collect();
        Ok(Tensor::from_vec(inv, vec![cols, rows])?)
    }

    fn to_dense(&self, t: &Tensor) -> Result<DenseArray> {
        native_to_dense(t)
    }

    fn from_dense(&self, a: &DenseArray) -> Result<Tensor> {
        dense_to_native(a)
    }

    fn sanitize(&self, t: AnyTensor) -> Result<Tensor> {
        match t {
            AnyTensor::Native(t) => Ok(t),
            foreign => self.from_dense(&foreign.to_dense()?),
        }
    }
}

pub(crate) fn sign(v: f32) -> f32 {
    if v == 0.0 || v.is_nan() {
        v
    } else {
        v.signum()
    }
}
