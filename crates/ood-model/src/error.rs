use ood_operator::OperatorError;
use ood_tensor::TensorError;
use thiserror::Error;

use crate::model::LayerId;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("operator error: {0}")]
    Operator(#[from] OperatorError),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("layer not found: {0}")]
    LayerNotFound(LayerId),
    #[error("output layer {output} comes before input layer {input}")]
    LayerOrder { input: usize, output: usize },
    #[error("at least one output layer is required")]
    NoOutputLayers,
    #[error("unsupported framework: {0}")]
    UnsupportedFramework(String),
    #[error("dataset is not batched: declare a batch size before iterating")]
    UnbatchedDataset,
    #[error("batch {batch} has no labels but labels are required")]
    MissingLabels { batch: usize },
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
