use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends.
///
/// Kernels work on contiguous row-major f32 slices and return owned vectors.
/// Shape bookkeeping stays in `Tensor`; a backend only sees flat data plus
/// the sizes it needs.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - Returns: row-major data of shape [m, n]
    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>>;

    /// Element-wise addition: result[i] = a[i] + b[i].
    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Softmax over consecutive rows of `row_len` elements.
    ///
    /// For each row: result[i] = exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))
    fn softmax(&self, x: &[f32], row_len: usize) -> Result<Vec<f32>>;

    /// ReLU activation: result[i] = max(x[i], 0).
    fn relu(&self, x: &[f32]) -> Result<Vec<f32>>;
}
