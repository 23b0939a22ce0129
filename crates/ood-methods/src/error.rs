use ood_model::ModelError;
use ood_operator::OperatorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OodError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("operator error: {0}")]
    Operator(#[from] OperatorError),
    #[error("detector is not fitted: call fit before score")]
    NotFitted,
    #[error("{method} needs a calibration dataset")]
    CalibrationRequired { method: &'static str },
    #[error("no calibration data for class {0}")]
    UnknownClass(usize),
    #[error("class {label} has {available} calibration samples, {requested} neighbors requested")]
    NotEnoughNeighbors {
        label: usize,
        requested: usize,
        available: usize,
    },
    #[error("{method} reads logits from one layer, {count} configured")]
    LogitLayers { method: &'static str, count: usize },
    #[error("feature dimension mismatch: index holds {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl OodError {
    /// Whether the call was rejected because a precondition did not hold
    /// (unfit detector, bad layer id, unbatched data, unseen class, ...).
    pub fn is_precondition(&self) -> bool {
        match self {
            OodError::NotFitted
            | OodError::CalibrationRequired { .. }
            | OodError::UnknownClass(_)
            | OodError::NotEnoughNeighbors { .. }
            | OodError::LogitLayers { .. }
            | OodError::DimensionMismatch { .. } => true,
            OodError::Model(e) => matches!(
                e,
                ModelError::LayerNotFound(_)
                    | ModelError::LayerOrder { .. }
                    | ModelError::NoOutputLayers
                    | ModelError::UnbatchedDataset
                    | ModelError::MissingLabels { .. }
                    | ModelError::Operator(
                        OperatorError::LabelOutOfRange { .. } | OperatorError::LabelCount { .. }
                    )
            ),
            OodError::Operator(e) => matches!(
                e,
                OperatorError::LabelOutOfRange { .. } | OperatorError::LabelCount { .. }
            ),
            OodError::NotImplemented(_) => false,
        }
    }

    /// Whether the operation or runtime is not supported at all.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            OodError::NotImplemented(_) | OodError::Model(ModelError::UnsupportedFramework(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, OodError>;
