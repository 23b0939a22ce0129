use std::sync::Arc;

use ood_model::{Dataset, FeatureExtractor, Model, ModelHandle};
use ood_operator::{Framework, NativeOperator, NdArrayOperator, TensorOperator};
use tracing::{debug, info, warn};

use crate::error::{OodError, Result};
use crate::method::OodMethod;

/// Everything `fit` produces for one runtime.
#[derive(Debug)]
pub struct Calibrated<O: TensorOperator, S> {
    pub op: O,
    pub extractor: FeatureExtractor<O>,
    pub state: S,
}

/// Fit state, tagged with the runtime chosen at fit time.
#[derive(Debug)]
pub enum Fitted<S> {
    Native(Calibrated<NativeOperator, S>),
    NdArray(Calibrated<NdArrayOperator, S>),
}

impl<S> Fitted<S> {
    pub fn framework(&self) -> Framework {
        match self {
            Fitted::Native(_) => Framework::Native,
            Fitted::NdArray(_) => Framework::NdArray,
        }
    }
}

/// An OOD detector: one scoring method plus, once fitted, the extractor and
/// calibration state it runs with.
///
/// A fresh detector is unfit; `score` and `isood` fail until `fit` succeeds.
/// Fitting again replaces the previous fit state entirely.
#[derive(Debug)]
pub struct OodModel<M: OodMethod> {
    method: M,
    fitted: Option<Fitted<M::State>>,
}

impl<M: OodMethod> OodModel<M> {
    pub fn new(method: M) -> Self {
        OodModel {
            method,
            fitted: None,
        }
    }

    pub fn method(&self) -> &M {
        &self.method
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Runtime selected by the last successful `fit`.
    pub fn framework(&self) -> Option<Framework> {
        self.fitted.as_ref().map(Fitted::framework)
    }

    pub fn fitted(&self) -> Option<&Fitted<M::State>> {
        self.fitted.as_ref()
    }

    /// Build the feature extractor for `model` and calibrate on `dataset`.
    ///
    /// The detector is unfit while this runs; on error it stays unfit.
    pub fn fit(&mut self, model: ModelHandle, dataset: Option<Dataset>) -> Result<()> {
        self.fitted = None;
        let fitted = match model {
            ModelHandle::Native(m) => {
                Fitted::Native(self.calibrate(NativeOperator::default(), m, dataset)?)
            }
            ModelHandle::NdArray(m) => {
                Fitted::NdArray(self.calibrate(NdArrayOperator::default(), m, dataset)?)
            }
        };
        info!(method = self.method.name(), framework = %fitted.framework(), "fitted detector");
        self.fitted = Some(fitted);
        Ok(())
    }

    fn calibrate<O: TensorOperator>(
        &self,
        op: O,
        model: Arc<dyn Model<Operator = O>>,
        dataset: Option<Dataset>,
    ) -> Result<Calibrated<O, M::State>> {
        let config = self.method.feature_config();
        let extractor =
            FeatureExtractor::new(model, config.input_layer.clone(), &config.output_layers)?;
        let state = self.method.fit_to_dataset(&op, &extractor, dataset)?;
        Ok(Calibrated { op, extractor, state })
    }

    /// One score per sample, in input order. A bare tensor is scored in one
    /// pass; a batched dataset batch by batch.
    pub fn score(&self, dataset: impl Into<Dataset>) -> Result<Vec<f64>> {
        match self.fitted.as_ref().ok_or(OodError::NotFitted)? {
            Fitted::Native(c) => self.score_with(c, dataset.into()),
            Fitted::NdArray(c) => self.score_with(c, dataset.into()),
        }
    }

    fn score_with<O: TensorOperator>(
        &self,
        c: &Calibrated<O, M::State>,
        dataset: Dataset,
    ) -> Result<Vec<f64>> {
        let mut scores = Vec::new();
        for (i, batch) in dataset.into_batches(false)?.enumerate() {
            let batch = batch?;
            if batch.inputs.batch_len() == Some(0) {
                warn!(batch = i, "skipping empty batch");
                continue;
            }
            let inputs = c.op.sanitize(batch.inputs)?;
            let batch_scores = self.method.score_tensor(&c.op, &c.extractor, &c.state, &inputs)?;
            debug!(batch = i, samples = batch_scores.len(), "scored batch");
            scores.extend(batch_scores);
        }
        Ok(scores)
    }

    /// 0 for samples scoring below `threshold` (in-distribution), 1 otherwise.
    pub fn isood(&self, dataset: impl Into<Dataset>, threshold: f64) -> Result<Vec<u8>> {
        Ok(self
            .score(dataset)?
            .into_iter()
            .map(|s| if s < threshold { 0 } else { 1 })
            .collect())
    }

    /// Delegates to the method; none of the bundled methods implement it.
    pub fn calibrate_threshold(&self, dataset: impl Into<Dataset>, scores: &[f64]) -> Result<f64> {
        self.method.calibrate_threshold(dataset.into(), scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::Energy;
    use crate::mls::Mls;
    use ndarray::array;
    use ood_model::{BatchedDataset, Flatten, Sequential};

    fn handle() -> ModelHandle {
        let model = Sequential::<NdArrayOperator>::new().with_layer("flatten", Flatten);
        ModelHandle::new(Arc::new(model)).unwrap()
    }

    #[test]
    fn test_unfit_detector_refuses_to_score() {
        let detector = OodModel::new(Mls::new());
        assert!(!detector.is_fitted());
        assert_eq!(detector.framework(), None);
        let err = detector.score(array![[1.0f32]].into_dyn()).unwrap_err();
        assert!(matches!(err, OodError::NotFitted));
        assert!(err.is_precondition());
        assert!(detector.isood(array![[1.0f32]].into_dyn(), 0.0).is_err());
    }

    #[test]
    fn test_fit_selects_runtime() {
        let mut detector = OodModel::new(Mls::new());
        detector.fit(handle(), None).unwrap();
        assert!(detector.is_fitted());
        assert_eq!(detector.framework(), Some(Framework::NdArray));
    }

    #[test]
    fn test_failed_refit_leaves_detector_unfit() {
        let mut detector = OodModel::new(Mls::new().with_features(
            crate::method::FeatureConfig::default().with_output_layers(["missing"]),
        ));
        assert!(detector.fit(handle(), None).is_err());
        assert!(!detector.is_fitted());
    }

    #[test]
    fn test_batched_scores_match_single_pass() {
        let mut detector = OodModel::new(Energy::new());
        detector.fit(handle(), None).unwrap();
        let x = array![[0.0f32, 1.0], [2.0, -1.0], [0.5, 0.5]].into_dyn();
        let single = detector.score(x.clone()).unwrap();
        let batched = detector.score(BatchedDataset::from_tensors(x, None, 2).unwrap()).unwrap();
        assert_eq!(single.len(), 3);
        assert_eq!(single, batched);
    }

    #[test]
    fn test_unbatched_dataset_rejected_before_iteration() {
        let mut detector = OodModel::new(Mls::new());
        detector.fit(handle(), None).unwrap();
        let lazy = BatchedDataset::unbatched(std::iter::from_fn(|| -> Option<ood_model::Batch> {
            panic!("iterated an unbatched dataset")
        }));
        let err = detector.score(lazy).unwrap_err();
        assert!(matches!(err, OodError::Model(ood_model::ModelError::UnbatchedDataset)));
    }

    #[test]
    fn test_isood_comparator() {
        let mut detector = OodModel::new(Mls::new());
        detector.fit(handle(), None).unwrap();
        // Scores are [-2, -1, 0].
        let x = array![[2.0f32], [1.0], [0.0]].into_dyn();
        assert_eq!(detector.isood(x.clone(), -1.0).unwrap(), vec![0, 1, 1]);
        assert_eq!(detector.isood(x, -0.5).unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn test_calibrate_threshold_not_implemented() {
        let detector = OodModel::new(Energy::new());
        let err = detector.calibrate_threshold(array![[1.0f32]].into_dyn(), &[0.0]).unwrap_err();
        assert!(matches!(err, OodError::NotImplemented(_)));
        assert!(!err.is_precondition());
    }
}
