use ndarray::{Axis, Ix1, Ix2};
use ood_model::{Dataset, FeatureExtractor};
use ood_operator::{OperatorError, TensorOperator};

use crate::error::Result;
use crate::method::{logits, single_output, FeatureConfig, OodMethod};

/// Energy score: `-log sum_c exp(l_c)` over the logits.
///
/// Needs no calibration. The log-sum-exp is shifted by the row maximum.
#[derive(Debug, Clone, Default)]
pub struct Energy {
    features: FeatureConfig,
}

impl Energy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read logits from somewhere other than the last layer. Exactly one
    /// output layer must be configured; `fit` rejects anything else.
    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }
}

impl OodMethod for Energy {
    type State = ();

    fn name(&self) -> &'static str {
        "energy"
    }

    fn feature_config(&self) -> &FeatureConfig {
        &self.features
    }

    fn fit_to_dataset<O: TensorOperator>(
        &self,
        _op: &O,
        extractor: &FeatureExtractor<O>,
        _dataset: Option<Dataset>,
    ) -> Result<()> {
        single_output(self.name(), extractor)
    }

    fn score_tensor<O: TensorOperator>(
        &self,
        op: &O,
        extractor: &FeatureExtractor<O>,
        _state: &(),
        inputs: &O::Tensor,
    ) -> Result<Vec<f64>> {
        let logits = logits(self.name(), op, extractor, inputs)?;
        let max = op
            .to_dense(&op.max(&logits, 1)?)?
            .into_dimensionality::<Ix1>()
            .map_err(OperatorError::from)?;
        let logits = op
            .to_dense(&logits)?
            .into_dimensionality::<Ix2>()
            .map_err(OperatorError::from)?;

        Ok(logits
            .axis_iter(Axis(0))
            .zip(max.iter())
            .map(|(row, &m)| -(m + row.iter().map(|&l| (l - m).exp()).sum::<f64>().ln()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ood_model::{Dense, LayerId, Model, Sequential};
    use ood_operator::NdArrayOperator;
    use std::sync::Arc;

    fn identity() -> Arc<dyn Model<Operator = NdArrayOperator>> {
        Arc::new(Sequential::<NdArrayOperator>::new().with_layer(
            "logits",
            Dense::new(3, 3, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0], vec![0.0; 3])
                .unwrap(),
        ))
    }

    fn score(x: ndarray::ArrayD<f32>) -> Vec<f64> {
        let energy = Energy::new();
        let cfg = energy.feature_config();
        let fe = FeatureExtractor::new(identity(), cfg.input_layer.clone(), &cfg.output_layers)
            .unwrap();
        energy.score_tensor(&NdArrayOperator, &fe, &(), &x).unwrap()
    }

    #[test]
    fn test_energy_of_known_logits() {
        let s = score(array![[2.0f32, 1.0, 0.1]].into_dyn());
        assert_eq!(s.len(), 1);
        // -ln(e^2 + e^1 + e^0.1)
        assert_abs_diff_eq!(s[0], -2.4170, epsilon = 1e-3);
    }

    #[test]
    fn test_energy_is_stable_for_large_logits() {
        let s = score(array![[1000.0f32, 1000.0, 1000.0], [-1000.0, -1000.0, -1000.0]].into_dyn());
        assert_abs_diff_eq!(s[0], -(1000.0 + 3.0f64.ln()), epsilon = 1e-6);
        assert_abs_diff_eq!(s[1], 1000.0 - 3.0f64.ln(), epsilon = 1e-6);
    }

    #[test]
    fn test_several_logit_layers_rejected() {
        let model: Arc<dyn Model<Operator = NdArrayOperator>> = Arc::new(
            Sequential::<NdArrayOperator>::new()
                .with_layer("logits", Dense::new(3, 3, vec![1.0; 9], vec![0.0; 3]).unwrap())
                .with_layer("relu", ood_model::Relu),
        );
        let energy =
            Energy::new().with_features(FeatureConfig::default().with_output_layers([0, 1]));
        let cfg = energy.feature_config();
        let fe = FeatureExtractor::new(model, cfg.input_layer.clone(), &cfg.output_layers).unwrap();

        let err = energy.fit_to_dataset(&NdArrayOperator, &fe, None).unwrap_err();
        assert!(matches!(err, crate::OodError::LogitLayers { method: "energy", count: 2 }));
        assert!(err.is_precondition());
        let x = array![[2.0f32, 1.0, 0.1]].into_dyn();
        assert!(energy.score_tensor(&NdArrayOperator, &fe, &(), &x).is_err());
    }

    #[test]
    fn test_default_reads_last_layer() {
        assert_eq!(Energy::new().feature_config().output_layers, vec![LayerId::Index(-1)]);
    }
}
