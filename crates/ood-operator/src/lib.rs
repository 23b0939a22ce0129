//! `ood-operator` - one numeric contract over several tensor runtimes.
//!
//! Scoring code is written once against [`TensorOperator`]. Each supported
//! runtime provides an implementation:
//! - [`NativeOperator`] over `ood_tensor::Tensor`
//! - [`NdArrayOperator`] over `ndarray::ArrayD<f32>`
//!
//! Values cross runtimes only through the canonical [`DenseArray`]
//! (row-major `f64`), and [`Framework::detect`] tells the runtimes apart.

pub mod array;
pub mod dense;
pub mod error;
pub mod framework;
pub mod gradient;
mod linalg;
pub mod native;
pub mod operator;

pub use array::NdArrayOperator;
pub use dense::{AnyTensor, DenseArray};
pub use error::{OperatorError, Result};
pub use framework::{is_from, Framework, Lineage};
pub use native::NativeOperator;
pub use operator::{Reduction, TensorOperator};
