use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// A dense tensor of the native runtime.
///
/// Holds contiguous, row-major f32 data with an associated shape.
/// Kernels that benefit from a backend (matmul, softmax, ...) take a
/// `&dyn ComputeBackend`; pure bookkeeping ops are implemented directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Shape,
}

impl Tensor {
    /// Create a new tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor { data, shape }
    }

    /// Fallible counterpart of [`Tensor::new`].
    pub fn from_vec(data: Vec<f32>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.dims().to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape })
    }

    /// Create a zero-filled tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            data: vec![0.0; n],
            shape,
        }
    }

    /// Create a tensor filled with ones with the given shape.
    pub fn ones(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            data: vec![1.0; n],
            shape,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Reshape the tensor, returning a new tensor with the same data but
    /// a different shape.
    ///
    /// The total number of elements must remain the same.
    pub fn reshape(&self, new_shape: Shape) -> Result<Tensor> {
        if self.shape.numel() != new_shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: new_shape.dims().to_vec(),
            });
        }
        Ok(Tensor {
            data: self.data.clone(),
            shape: new_shape,
        })
    }

    /// Apply `f` to every element.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            data: self.data.iter().map(|&v| f(v)).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Matrix multiplication of two 2D tensors using the given backend.
    ///
    /// self is [m, k], other is [k, n], result is [m, n].
    pub fn matmul(&self, other: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        for t in [self, other] {
            if t.shape.ndim() != 2 {
                return Err(TensorError::RankMismatch {
                    expected: 2,
                    got: t.shape.ndim(),
                });
            }
        }

        let m = self.shape.dim(0);
        let k = self.shape.dim(1);
        let k2 = other.shape.dim(0);
        let n = other.shape.dim(1);

        if k != k2 {
            return Err(TensorError::MatmulMismatch { m, k, k2, n });
        }

        let result_data = backend.matmul(&self.data, &other.data, m, k, n)?;
        Ok(Tensor::new(result_data, Shape::new(vec![m, n])))
    }

    /// Broadcasting element-wise addition.
    pub fn add(&self, other: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        let shape = Shape::broadcast_shape(&self.shape, &other.shape)?;
        let a = self.broadcast_to(&shape)?;
        let b = other.broadcast_to(&shape)?;
        let data = backend.add(&a.data, &b.data)?;
        Ok(Tensor::new(data, shape))
    }

    /// Softmax over the last axis.
    pub fn softmax(&self, backend: &dyn ComputeBackend) -> Result<Tensor> {
        let row_len = match self.shape.dims().last() {
            Some(&d) => d,
            None => return Err(TensorError::RankMismatch { expected: 1, got: 0 }),
        };
        let data = backend.softmax(&self.data, row_len)?;
        Ok(Tensor::new(data, self.shape.clone()))
    }

    pub fn relu(&self, backend: &dyn ComputeBackend) -> Result<Tensor> {
        let data = backend.relu(&self.data)?;
        Ok(Tensor::new(data, self.shape.clone()))
    }

    /// Expand the tensor to `shape` following numpy broadcasting rules.
    pub fn broadcast_to(&self, shape: &Shape) -> Result<Tensor> {
        if &self.shape == shape {
            return Ok(self.clone());
        }
        let target = Shape::broadcast_shape(&self.shape, shape)?;
        if &target != shape {
            return Err(TensorError::BroadcastError {
                a: self.shape.dims().to_vec(),
                b: shape.dims().to_vec(),
            });
        }

        // Source strides aligned on the right, zero where the dim is broadcast.
        let offset = shape.ndim() - self.shape.ndim();
        let src_strides = self.shape.strides();
        let strides: Vec<usize> = (0..shape.ndim())
            .map(|i| {
                if i < offset || self.shape.dim(i - offset) == 1 {
                    0
                } else {
                    src_strides[i - offset]
                }
            })
            .collect();

        let data = gather(shape, &strides, &self.data);
        Ok(Tensor::new(data, shape.clone()))
    }
}

/// Walk `shape` in row-major order, reading `src` at the given strides.
pub(crate) fn gather(shape: &Shape, strides: &[usize], src: &[f32]) -> Vec<f32> {
    let n = shape.numel();
    let mut out = Vec::with_capacity(n);
    let mut index = vec![0usize; shape.ndim()];
    for _ in 0..n {
        let offset: usize = index.iter().zip(strides).map(|(i, s)| i * s).sum();
        out.push(src[offset]);
        for d in (0..index.len()).rev() {
            index[d] += 1;
            if index[d] < shape.dim(d) {
                break;
            }
            index[d] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;

    #[test]
    fn test_new_tensor() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_vec_mismatch() {
        assert!(Tensor::from_vec(vec![1.0, 2.0], vec![3]).is_err());
        assert!(Tensor::from_vec(vec![1.0, 2.0, 3.0], vec![3]).is_ok());
    }

    #[test]
    #[should_panic]
    fn test_new_shape_mismatch_panics() {
        let _t = Tensor::new(vec![1.0, 2.0], Shape::new(vec![3]));
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let r = t.reshape(Shape::new(vec![3, 2])).unwrap();
        assert_eq!(r.dims(), &[3, 2]);
        assert_eq!(r.data(), t.data());
        assert!(t.reshape(Shape::new(vec![4])).is_err());
    }

    #[test]
    fn test_matmul() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        let b = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], Shape::new(vec![2, 2]));
        let c = a.matmul(&b, &backend).unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_errors() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![1, 3]));
        let b = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        assert!(matches!(
            a.matmul(&b, &backend),
            Err(TensorError::MatmulMismatch { .. })
        ));
        let v = Tensor::new(vec![1.0, 2.0], Shape::new(vec![2]));
        assert!(matches!(
            v.matmul(&b, &backend),
            Err(TensorError::RankMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_add_broadcasts_bias() {
        let backend = CpuBackend::new();
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        let bias = Tensor::new(vec![10.0, 20.0], Shape::new(vec![2]));
        let y = x.add(&bias, &backend).unwrap();
        assert_eq!(y.data(), &[11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn test_broadcast_to_column() {
        let col = Tensor::new(vec![1.0, 2.0], Shape::new(vec![2, 1]));
        let b = col.broadcast_to(&Shape::new(vec![2, 3])).unwrap();
        assert_eq!(b.data(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert!(col.broadcast_to(&Shape::new(vec![3, 3])).is_err());
    }

    #[test]
    fn test_softmax_last_axis() {
        let backend = CpuBackend::new();
        let t = Tensor::new(vec![0.0, 0.0, 1.0, 1.0], Shape::new(vec![2, 2]));
        let s = t.softmax(&backend).unwrap();
        assert_eq!(s.data(), &[0.5, 0.5, 0.5, 0.5]);
    }
}
