use ood_model::{Dataset, FeatureExtractor};
use ood_operator::TensorOperator;

use crate::error::Result;
use crate::method::{logits, single_output, FeatureConfig, OodMethod};

/// Max logit score: `-max_c l_c`. Needs no calibration.
#[derive(Debug, Clone, Default)]
pub struct Mls {
    features: FeatureConfig,
}

impl Mls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read logits from another layer. Exactly one output layer must be
    /// configured; `fit` rejects anything else.
    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }
}

impl OodMethod for Mls {
    type State = ();

    fn name(&self) -> &'static str {
        "mls"
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
        let max = op.to_dense(&op.max(&logits, 1)?)?;
        Ok(max.iter().map(|&m| -m).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ood_model::{Flatten, Model, Sequential};
    use ood_operator::NativeOperator;
    use ood_tensor::{Shape, Tensor};
    use std::sync::Arc;

    #[test]
    fn test_mls_of_known_logits() {
        let model: Arc<dyn Model<Operator = NativeOperator>> =
            Arc::new(Sequential::<NativeOperator>::new().with_layer("flatten", Flatten));
        let mls = Mls::new();
        let cfg = mls.feature_config();
        let fe = FeatureExtractor::new(model, cfg.input_layer.clone(), &cfg.output_layers).unwrap();
        let op = NativeOperator::new();

        let x = Tensor::new(vec![2.0, 1.0, 0.1, -3.0, -1.0, -2.0], Shape::new(vec![2, 3]));
        let s = mls.score_tensor(&op, &fe, &(), &x).unwrap();
        assert_eq!(s, vec![-2.0, 1.0]);

        // Trailing axes are flattened before the max.
        let x = op.sanitize(array![[[2.0f32], [5.0]]].into_dyn().into()).unwrap();
        assert_eq!(mls.score_tensor(&op, &fe, &(), &x).unwrap(), vec![-5.0]);
    }

    #[test]
    fn test_single_logit_layer_required() {
        let model: Arc<dyn Model<Operator = NativeOperator>> = Arc::new(
            Sequential::<NativeOperator>::new()
                .with_layer("flatten", Flatten)
                .with_layer("relu", ood_model::Relu),
        );
        let mls = Mls::new().with_features(FeatureConfig::default().with_output_layers([-2, -1]));
        let cfg = mls.feature_config();
        let fe = FeatureExtractor::new(model, cfg.input_layer.clone(), &cfg.output_layers).unwrap();
        let op = NativeOperator::new();
        assert!(matches!(
            mls.fit_to_dataset(&op, &fe, None),
            Err(crate::OodError::LogitLayers { method: "mls", count: 2 })
        ));
        let x = Tensor::new(vec![2.0, 1.0], Shape::new(vec![1, 2]));
        assert!(mls.score_tensor(&op, &fe, &(), &x).is_err());
    }
}
