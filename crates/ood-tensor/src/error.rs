use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },
    #[error("expected a tensor of rank {expected}, got rank {got}")]
    RankMismatch { expected: usize, got: usize },
    #[error("cannot broadcast shapes {a:?} and {b:?}")]
    BroadcastError { a: Vec<usize>, b: Vec<usize> },
    #[error("matmul dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    MatmulMismatch {
        m: usize,
        k: usize,
        k2: usize,
        n: usize,
    },
    #[error("{op}: no input tensors")]
    Empty { op: &'static str },
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
