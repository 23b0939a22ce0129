//! `ood-tensor` - the native tensor runtime used by ood-detect.
//!
//! This crate provides:
//! - A `Tensor` type holding contiguous row-major f32 data
//! - A `ComputeBackend` trait for pluggable compute kernels
//! - A reference `CpuBackend` implementation
//! - Shape utilities, broadcasting, axis reductions and layout ops

pub mod backend;
pub mod cpu;
pub mod error;
pub mod layout;
pub mod reduce;
pub mod shape;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use tensor::Tensor;
