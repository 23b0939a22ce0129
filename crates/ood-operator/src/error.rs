use ood_tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("ndarray shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },
    #[error("expected a tensor of rank {expected}, got rank {got}")]
    RankMismatch { expected: usize, got: usize },
    #[error("matmul dimension mismatch: {a:?} @ {b:?}")]
    MatmulMismatch { a: Vec<usize>, b: Vec<usize> },
    #[error("label {label} out of range for {num_classes} classes")]
    LabelOutOfRange { label: usize, num_classes: usize },
    #[error("expected {expected} labels, got {got}")]
    LabelCount { expected: usize, got: usize },
    #[error("{op}: empty input")]
    Empty { op: &'static str },
    #[error("pseudo-inverse failed: {0}")]
    Linalg(String),
}

pub type Result<T> = std::result::Result<T, OperatorError>;
