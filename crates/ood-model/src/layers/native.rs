use ood_operator::{NativeOperator, OperatorError};
use ood_tensor::{Shape, Tensor};

use super::{Dense, Layer, Relu};
use crate::error::Result;

impl Layer<NativeOperator> for Dense {
    fn forward(&self, op: &NativeOperator, input: &Tensor) -> Result<Tensor> {
        if input.shape().ndim() != 2 {
            return Err(OperatorError::RankMismatch {
                expected: 2,
                got: input.shape().ndim(),
            }
            .into());
        }
        let w = Tensor::from_vec(
            self.weights.clone(),
            Shape::new(vec![self.in_features, self.out_features]),
        )?;
        let b = Tensor::from_vec(self.bias.clone(), Shape::new(vec![self.out_features]))?;
        let y = input.matmul(&w, op.backend())?;
        Ok(y.add(&b, op.backend())?)
    }
}

impl Layer<NativeOperator> for Relu {
    fn forward(&self, op: &NativeOperator, input: &Tensor) -> Result<Tensor> {
        Ok(input.relu(op.backend())?)
    }
}
