//! The canonical exchange form and the runtime-tagged tensor value.

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use ood_tensor::{Shape, Tensor};

use crate::error::{OperatorError, Result};
use crate::framework::{Framework, Lineage};

/// Row-major `f64` array: the only format values cross runtimes in.
pub type DenseArray = ArrayD<f64>;

/// A tensor from any supported runtime, or a plain dense array.
#[derive(Debug, Clone)]
pub enum AnyTensor {
    Native(Tensor),
    NdArray(ArrayD<f32>),
    Dense(DenseArray),
}

impl AnyTensor {
    /// The runtime this value belongs to; `None` for a plain dense array.
    pub fn framework(&self) -> Option<Framework> {
        match self {
            AnyTensor::Native(_) => Some(Framework::Native),
            AnyTensor::NdArray(_) => Some(Framework::NdArray),
            AnyTensor::Dense(_) => None,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            AnyTensor::Native(t) => t.dims().to_vec(),
            AnyTensor::NdArray(a) => a.shape().to_vec(),
            AnyTensor::Dense(a) => a.shape().to_vec(),
        }
    }

    /// Size of the leading (batch) dimension, if the value has one.
    pub fn batch_len(&self) -> Option<usize> {
        self.shape().first().copied()
    }

    pub fn to_dense(&self) -> Result<DenseArray> {
        match self {
            AnyTensor::Native(t) => native_to_dense(t),
            AnyTensor::NdArray(a) => Ok(a.mapv(f64::from)),
            AnyTensor::Dense(a) => Ok(a.clone()),
        }
    }

    /// Rows `start..end` of the leading dimension, in the same runtime.
    pub fn slice_batch(&self, start: usize, end: usize) -> Result<AnyTensor> {
        let len = self.batch_len().ok_or(OperatorError::RankMismatch {
            expected: 1,
            got: 0,
        })?;
        if start > end || end > len {
            return Err(OperatorError::Shape(ndarray::ShapeError::from_kind(
                ndarray::ErrorKind::OutOfBounds,
            )));
        }
        let rows = Slice::from(start..end);
        Ok(match self {
            AnyTensor::Native(t) => {
                let row_len: usize = t.dims()[1..].iter().product();
                let mut dims = t.dims().to_vec();
                dims[0] = end - start;
                let data = t.data()[start * row_len..end * row_len].to_vec();
                AnyTensor::Native(Tensor::from_vec(data, Shape::new(dims))?)
            }
            AnyTensor::NdArray(a) => AnyTensor::NdArray(a.slice_axis(Axis(0), rows).to_owned()),
            AnyTensor::Dense(a) => AnyTensor::Dense(a.slice_axis(Axis(0), rows).to_owned()),
        })
    }
}

impl Lineage for AnyTensor {
    fn lineage(&self) -> Vec<&'static str> {
        match self {
            AnyTensor::Native(t) => t.lineage(),
            AnyTensor::NdArray(a) => a.lineage(),
            AnyTensor::Dense(_) => vec![std::any::type_name::<Self>()],
        }
    }
}

impl From<Tensor> for AnyTensor {
    fn from(t: Tensor) -> Self {
        AnyTensor::Native(t)
    }
}

impl From<ArrayD<f32>> for AnyTensor {
    fn from(a: ArrayD<f32>) -> Self {
        AnyTensor::NdArray(a)
    }
}

impl From<DenseArray> for AnyTensor {
    fn from(a: DenseArray) -> Self {
        AnyTensor::Dense(a)
    }
}

pub fn native_to_dense(t: &Tensor) -> Result<DenseArray> {
    let data = t.data().iter().map(|&v| f64::from(v)).collect();
    Ok(ArrayD::from_shape_vec(IxDyn(t.dims()), data)?)
}

pub fn dense_to_native(a: &DenseArray) -> Result<Tensor> {
    // iter() walks in logical row-major order whatever the memory layout.
    let data = a.iter().map(|&v| v as f32).collect();
    Ok(Tensor::from_vec(data, a.shape())?)
}
