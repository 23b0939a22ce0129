use ood_operator::{Reduction, TensorOperator};

use crate::error::{ModelError, Result};
use crate::model::Model;

/// Gradient of the summed cross-entropy of `model`'s logits with respect to
/// `inputs`.
///
/// This is the input-space signal that perturbation-based detectors build
/// on. The model and `inputs` are only read.
pub fn loss_gradient<O, M>(
    op: &O,
    model: &M,
    inputs: &O::Tensor,
    labels: &[usize],
) -> Result<O::Tensor>
where
    O: TensorOperator,
    M: Model<Operator = O> + ?Sized,
{
    op.gradient(
        |x: &O::Tensor| -> Result<O::Tensor> {
            let logits = model.forward(x)?;
            op.cross_entropy(&logits, labels, Reduction::Sum)
                .map_err(ModelError::from)
        },
        inputs,
    )
}
