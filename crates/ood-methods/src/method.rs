use std::fmt::Debug;

use ood_model::{Dataset, FeatureExtractor, Features, LayerId};
use ood_operator::{DenseArray, TensorOperator};

use crate::error::{OodError, Result};

/// Which layers a method reads from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureConfig {
    pub input_layer: LayerId,
    pub output_layers: Vec<LayerId>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            input_layer: LayerId::Index(0),
            output_layers: vec![LayerId::Index(-1)],
        }
    }
}

impl FeatureConfig {
    pub fn with_input_layer(mut self, id: impl Into<LayerId>) -> Self {
        self.input_layer = id.into();
        self
    }

    pub fn with_output_layers<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<LayerId>,
    {
        self.output_layers = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// A scoring algorithm.
///
/// Methods are written once against [`TensorOperator`]; the engine picks the
/// runtime. `State` is whatever calibration produces and is read-only
/// afterwards.
pub trait OodMethod: Debug + Send + Sync {
    type State: Debug + Default + Send + Sync;

    fn name(&self) -> &'static str;

    fn feature_config(&self) -> &FeatureConfig;

    /// Whether calibration batches must carry labels.
    fn uses_labels(&self) -> bool {
        false
    }

    /// Build calibration state from in-distribution data. Methods that need
    /// none keep this default.
    fn fit_to_dataset<O: TensorOperator>(
        &self,
        _op: &O,
        _extractor: &FeatureExtractor<O>,
        _dataset: Option<Dataset>,
    ) -> Result<Self::State> {
        Ok(Self::State::default())
    }

    /// One score per row of `inputs`.
    fn score_tensor<O: TensorOperator>(
        &self,
        op: &O,
        extractor: &FeatureExtractor<O>,
        state: &Self::State,
        inputs: &O::Tensor,
    ) -> Result<Vec<f64>>;

    /// Choose a decision threshold from ID scores.
    fn calibrate_threshold(&self, _dataset: Dataset, _scores: &[f64]) -> Result<f64> {
        Err(OodError::NotImplemented(format!(
            "{}: threshold calibration",
            self.name()
        )))
    }
}

/// Flatten every extracted activation to `[batch, -1]`, join them along the
/// feature axis and export the result as a dense matrix.
pub(crate) fn project<O: TensorOperator>(
    op: &O,
    features: Features<O::Tensor>,
) -> Result<DenseArray> {
    let flat = features
        .into_vec()
        .iter()
        .map(|t| op.flatten(t))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let joined = match flat.len() {
        1 => op.to_dense(&flat[0])?,
        _ => op.to_dense(&op.cat(&flat, 1)?)?,
    };
    Ok(joined)
}

/// Fails unless `extractor` reads exactly one layer.
pub(crate) fn single_output<O: TensorOperator>(
    method: &'static str,
    extractor: &FeatureExtractor<O>,
) -> Result<()> {
    match extractor.output_layers().len() {
        1 => Ok(()),
        count => Err(OodError::LogitLayers { method, count }),
    }
}

/// The single configured activation flattened to `[batch, classes]`.
pub(crate) fn logits<O: TensorOperator>(
    method: &'static str,
    op: &O,
    extractor: &FeatureExtractor<O>,
    inputs: &O::Tensor,
) -> Result<O::Tensor> {
    single_output(method, extractor)?;
    match extractor.extract(inputs)? {
        Features::Single(t) => Ok(op.flatten(&t)?),
        Features::Multi(ts) => Err(OodError::LogitLayers {
            method,
            count: ts.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let c = FeatureConfig::default();
        assert_eq!(c.input_layer, LayerId::Index(0));
        assert_eq!(c.output_layers, vec![LayerId::Index(-1)]);
    }

    #[test]
    fn test_builders() {
        let c = FeatureConfig::default()
            .with_input_layer("flatten")
            .with_output_layers([-2, -1]);
        assert_eq!(c.input_layer, LayerId::from("flatten"));
        assert_eq!(c.output_layers, vec![LayerId::Index(-2), LayerId::Index(-1)]);
    }
}
