use std::fmt::Debug;

use ndarray::{arr0, Axis};

use crate::dense::{AnyTensor, DenseArray};
use crate::error::{OperatorError, Result};
use crate::framework::{Framework, Lineage};
use crate::gradient::{central_difference, GRADIENT_STEP};

/// How per-sample losses are folded into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
}

/// The numeric operations OOD scoring needs, implemented once per runtime.
///
/// An operator is chosen when a detector is fit and used for every tensor of
/// that instance. Tensors from another runtime must go through
/// [`TensorOperator::sanitize`] first.
pub trait TensorOperator: Debug + Clone + Default + Send + Sync + 'static {
    type Tensor: Clone + Debug + Send + Sync + Lineage + 'static;

    const FRAMEWORK: Framework;

    fn shape(&self, t: &Self::Tensor) -> Vec<usize>;

    /// Softmax over the last axis.
    fn softmax(&self, t: &Self::Tensor) -> Result<Self::Tensor>;

    /// Index of the maximum along `axis`, first occurrence on ties.
    fn argmax(&self, t: &Self::Tensor, axis: usize) -> Result<Vec<usize>>;

    fn max(&self, t: &Self::Tensor, axis: usize) -> Result<Self::Tensor>;

    /// `[labels.len(), num_classes]` indicator matrix.
    fn one_hot(&self, labels: &[usize], num_classes: usize) -> Result<Self::Tensor>;

    /// Element-wise sign; zero stays zero.
    fn sign(&self, t: &Self::Tensor) -> Result<Self::Tensor>;

    /// L2 norm along `axis`, or of every element when `axis` is `None`.
    fn norm(&self, t: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor>;

    fn matmul(&self, a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor>;

    /// Join equally-shaped tensors along a new axis.
    fn stack(&self, tensors: &[Self::Tensor], axis: usize) -> Result<Self::Tensor>;

    /// Join tensors along an existing axis.
    fn cat(&self, tensors: &[Self::Tensor], axis: usize) -> Result<Self::Tensor>;

    fn mean(&self, t: &Self::Tensor, axis: Option<usize>, keepdim: bool) -> Result<Self::Tensor>;

    /// Collapse everything but the leading batch axis.
    fn flatten(&self, t: &Self::Tensor) -> Result<Self::Tensor>;

    /// Reverse the order of all axes.
    fn transpose(&self, t: &Self::Tensor) -> Result<Self::Tensor>;

    /// Main diagonal of a 2D tensor.
    fn diag(&self, t: &Self::Tensor) -> Result<Self::Tensor>;

    fn reshape(&self, t: &Self::Tensor, shape: &[usize]) -> Result<Self::Tensor>;

    /// Moore-Penrose pseudo-inverse of a 2D tensor.
    fn pinv(&self, t: &Self::Tensor) -> Result<Self::Tensor>;

    /// Export to the canonical dense form.
    fn to_dense(&self, t: &Self::Tensor) -> Result<DenseArray>;

    /// Import from the canonical dense form.
    fn from_dense(&self, a: &DenseArray) -> Result<Self::Tensor>;

    /// Accept a value from any runtime: same-runtime tensors pass through,
    /// anything else is converted via the dense form.
    fn sanitize(&self, t: AnyTensor) -> Result<Self::Tensor>;

    /// Gradient of `sum(func(inputs))` with respect to `inputs`.
    ///
    /// A scalar objective is its own sum; a per-sample objective is summed
    /// first. The result has the shape of `inputs`.
    ///
    /// This is a numerical estimate, not autodiff: each element is a central
    /// finite difference with step [`GRADIENT_STEP`](crate::gradient::GRADIENT_STEP),
    /// and `func` runs at the runtime's own f32 precision. Expect an error of
    /// roughly `1e-3` relative on smooth objectives. Within one step of a
    /// kink (ReLU at zero, `abs`) the estimate blends the two one-sided
    /// slopes.
    fn gradient<F, E>(&self, func: F, inputs: &Self::Tensor) -> std::result::Result<Self::Tensor, E>
    where
        F: Fn(&Self::Tensor) -> std::result::Result<Self::Tensor, E>,
        E: From<OperatorError>,
    {
        let point = self.to_dense(inputs)?;
        let grads = central_difference(
            |p: &DenseArray| -> std::result::Result<f64, E> {
                let t = self.from_dense(p)?;
                let out = func(&t)?;
                Ok(self.to_dense(&out)?.sum())
            },
            &point,
            GRADIENT_STEP,
        )?;
        Ok(self.from_dense(&grads)?)
    }

    /// Cross-entropy of `[batch, classes]` logits against integer labels,
    /// returned as a 0-d tensor.
    fn cross_entropy(
        &self,
        logits: &Self::Tensor,
        labels: &[usize],
        reduction: Reduction,
    ) -> Result<Self::Tensor> {
        let logits = self.to_dense(logits)?;
        if logits.ndim() != 2 {
            return Err(OperatorError::RankMismatch {
                expected: 2,
                got: logits.ndim(),
            });
        }
        let (batch, classes) = (logits.shape()[0], logits.shape()[1]);
        if labels.len() != batch {
            return Err(OperatorError::LabelCount {
                expected: batch,
                got: labels.len(),
            });
        }
        if batch == 0 {
            return Err(OperatorError::Empty { op: "cross_entropy" });
        }

        let mut total = 0.0;
        for (row, &label) in logits.axis_iter(Axis(0)).zip(labels) {
            if label >= classes {
                return Err(OperatorError::LabelOutOfRange {
                    label,
                    num_classes: classes,
                });
            }
            let m = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let lse = m + row.iter().map(|&l| (l - m).exp()).sum::<f64>().ln();
            total += lse - row[label];
        }
        let loss = match reduction {
            Reduction::Mean => total / batch as f64,
            Reduction::Sum => total,
        };
        self.from_dense(&arr0(loss).into_dyn())
    }
}
