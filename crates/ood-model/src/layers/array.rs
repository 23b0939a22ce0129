use ndarray::{ArrayD, ArrayView1, ArrayView2, Ix2};
use ood_operator::{NdArrayOperator, OperatorError};

use super::{Dense, Layer, Relu};
use crate::error::Result;

impl Layer<NdArrayOperator> for Dense {
    fn forward(&self, _op: &NdArrayOperator, input: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        if input.ndim() != 2 {
            return Err(OperatorError::RankMismatch {
                expected: 2,
                got: input.ndim(),
            }
            .into());
        }
        let x = input.view().into_dimensionality::<Ix2>().map_err(OperatorError::from)?;
        if x.ncols() != self.in_features {
            return Err(OperatorError::MatmulMismatch {
                a: input.shape().to_vec(),
                b: vec![self.in_features, self.out_features],
            }
            .into());
        }
        let w = ArrayView2::from_shape((self.in_features, self.out_features), &self.weights)
            .map_err(OperatorError::from)?;
        let b = ArrayView1::from(&self.bias[..]);
        Ok((x.dot(&w) + &b).into_dyn())
    }
}

impl Layer<NdArrayOperator> for Relu {
    fn forward(&self, _op: &NdArrayOperator, input: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        Ok(input.mapv(|v| v.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Flatten, Sequential};
    use crate::model::Model;
    use ndarray::array;

    #[test]
    fn test_dense_forward() {
        let dense =
            Dense::new(2, 3, vec![1.0, 0.0, -1.0, 0.0, 1.0, 1.0], vec![0.5, 0.0, 0.0]).unwrap();
        let y = dense.forward(&NdArrayOperator, &array![[1.0f32, 2.0]].into_dyn()).unwrap();
        assert_eq!(y, array![[1.5f32, 2.0, 1.0]].into_dyn());
        assert!(dense.forward(&NdArrayOperator, &array![[1.0f32]].into_dyn()).is_err());
    }

    #[test]
    fn test_flatten_then_dense() {
        let model = Sequential::<NdArrayOperator>::new()
            .with_layer("flatten", Flatten)
            .with_layer("dense", Dense::new(4, 1, vec![1.0; 4], vec![0.0]).unwrap())
            .with_layer("relu", Relu);
        let x = array![[[1.0f32, 2.0], [3.0, 4.0]], [[-1.0, -1.0], [-1.0, -1.0]]].into_dyn();
        assert_eq!(model.forward(&x).unwrap(), array![[10.0f32], [0.0]].into_dyn());
    }

    #[test]
    fn test_runtimes_agree_on_mlp() {
        use ood_operator::{NativeOperator, TensorOperator};

        let nd = Sequential::<NdArrayOperator>::mlp(&[3, 5, 2], 11).unwrap();
        let native = Sequential::<NativeOperator>::mlp(&[3, 5, 2], 11).unwrap();
        let x = array![[0.2f32, -1.0, 0.7], [1.5, 0.1, -0.3]].into_dyn();
        let xn = NativeOperator::new().sanitize(x.clone().into()).unwrap();

        let a = nd.forward(&x).unwrap();
        let b = native.forward(&xn).unwrap();
        for (u, v) in a.iter().zip(b.data()) {
            approx::assert_abs_diff_eq!(*u, *v, epsilon = 1e-5);
        }
    }
}
