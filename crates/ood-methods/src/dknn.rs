//! Deep nearest neighbors (Sun et al., 2022).
//!
//! Calibration keeps one [`FlatL2Index`] of normalized features per class.
//! A sample is scored against the index of the class the model predicts for
//! it: the score is the distance to its `nearest`-th neighbor there.

use std::collections::BTreeMap;

use ndarray::{Axis, Ix2};
use ood_model::{Dataset, FeatureExtractor, LayerId};
use ood_operator::{DenseArray, OperatorError, TensorOperator};
use tracing::{debug, info, warn};

use crate::error::{OodError, Result};
use crate::index::FlatL2Index;
use crate::method::{project, FeatureConfig, OodMethod};

/// Added to feature norms so a zero vector normalizes to zero.
const NORM_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct Dknn {
    nearest: usize,
    features: FeatureConfig,
}

impl Dknn {
    /// Score by the distance to the `nearest`-th neighbor, reading features
    /// from the second-to-last layer.
    pub fn new(nearest: usize) -> Self {
        Dknn {
            nearest,
            features: FeatureConfig::default().with_output_layers([LayerId::Index(-2)]),
        }
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn nearest(&self) -> usize {
        self.nearest
    }
}

impl Default for Dknn {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Per-class indexes built during calibration.
#[derive(Debug, Clone, Default)]
pub struct DknnState {
    dim: Option<usize>,
    indexes: BTreeMap<usize, FlatL2Index>,
}

impl DknnState {
    /// Labels seen during calibration, ascending.
    pub fn classes(&self) -> impl Iterator<Item = usize> + '_ {
        self.indexes.keys().copied()
    }

    pub fn index(&self, label: usize) -> Option<&FlatL2Index> {
        self.indexes.get(&label)
    }

    /// Feature width shared by every class index, once calibrated.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    /// Add one labeled, normalized feature row. Every row must have the
    /// width of the first one added.
    fn insert(&mut self, label: usize, row: &[f64]) -> Result<()> {
        let dim = *self.dim.get_or_insert(row.len());
        if row.len() != dim {
            return Err(OodError::DimensionMismatch {
                expected: dim,
                got: row.len(),
            });
        }
        self.indexes
            .entry(label)
            .or_insert_with(|| FlatL2Index::new(dim))
            .add_row(row)
    }
}

fn as_matrix(a: DenseArray) -> Result<ndarray::Array2<f64>> {
    Ok(a.into_dimensionality::<Ix2>().map_err(OperatorError::from)?)
}

/// Scale each row to unit L2 norm.
fn l2_normalize(features: &mut ndarray::Array2<f64>) {
    for mut row in features.axis_iter_mut(Axis(0)) {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        row.mapv_inplace(|v| v / (norm + NORM_EPSILON));
    }
}

impl OodMethod for Dknn {
    type State = DknnState;

    fn name(&self) -> &'static str {
        "dknn"
    }

    fn feature_config(&self) -> &FeatureConfig {
        &self.features
    }

    fn uses_labels(&self) -> bool {
        true
    }

    fn fit_to_dataset<O: TensorOperator>(
        &self,
        op: &O,
        extractor: &FeatureExtractor<O>,
        dataset: Option<Dataset>,
    ) -> Result<DknnState> {
        let dataset = dataset.ok_or(OodError::CalibrationRequired { method: self.name() })?;
        let mut state = DknnState::default();

        for (i, batch) in dataset.into_batches(true)?.enumerate() {
            let batch = batch?;
            let labels = batch.labels.unwrap_or_default();
            let inputs = op.sanitize(batch.inputs)?;
            let mut features = as_matrix(project(op, extractor.extract(&inputs)?)?)?;
            if labels.len() != features.nrows() {
                return Err(OperatorError::LabelCount {
                    expected: features.nrows(),
                    got: labels.len(),
                }
                .into());
            }
            if features.nrows() == 0 {
                warn!(batch = i, "empty calibration batch");
                continue;
            }
            l2_normalize(&mut features);

            if let Some(dim) = state.dim.filter(|&d| d != features.ncols()) {
                return Err(OodError::DimensionMismatch {
                    expected: dim,
                    got: features.ncols(),
                });
            }
            for (row, &label) in features.axis_iter(Axis(0)).zip(&labels) {
                state.insert(label, &row.to_vec())?;
            }
            debug!(batch = i, samples = labels.len(), "indexed calibration batch");
        }

        info!(
            classes = state.indexes.len(),
            samples = state.indexes.values().map(FlatL2Index::len).sum::<usize>(),
            "built dknn index"
        );
        Ok(state)
    }

    fn score_tensor<O: TensorOperator>(
        &self,
        op: &O,
        extractor: &FeatureExtractor<O>,
        state: &DknnState,
        inputs: &O::Tensor,
    ) -> Result<Vec<f64>> {
        let mut features = as_matrix(project(op, extractor.extract(inputs)?)?)?;
        l2_normalize(&mut features);

        // The class comes from the model's own output, not the feature layer.
        let logits = extractor.model().forward(inputs)?;
        let predicted = op.argmax(&op.softmax(&op.flatten(&logits)?)?, 1)?;
        if predicted.len() != features.nrows() {
            return Err(OperatorError::LabelCount {
                expected: features.nrows(),
                got: predicted.len(),
            }
            .into());
        }

        features
            .axis_iter(Axis(0))
            .zip(predicted)
            .map(|(row, label)| {
                let index = state.index(label).ok_or(OodError::UnknownClass(label))?;
                if index.len() < self.nearest || self.nearest == 0 {
                    return Err(OodError::NotEnoughNeighbors {
                        label,
                        requested: self.nearest,
                        available: index.len(),
                    });
                }
                let query = row.to_vec();
                let hits = index.search(&query, self.nearest)?;
                hits.last()
                    .map(|&(distance, _)| distance)
                    .ok_or(OodError::UnknownClass(label))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, ArrayD};
    use ood_model::{Dense, Model, Relu, Sequential};
    use ood_operator::NdArrayOperator;
    use std::sync::Arc;

    // Features are the inputs themselves (relu of identity); logits pick the
    // larger coordinate, so [a, b] is predicted as class 0 iff a >= b.
    fn model() -> Arc<dyn Model<Operator = NdArrayOperator>> {
        Arc::new(
            Sequential::<NdArrayOperator>::new()
                .with_layer("dense", identity_dense())
                .with_layer("relu", Relu)
                .with_layer("logits", identity_dense()),
        )
    }

    fn identity_dense() -> Dense {
        Dense::new(2, 2, vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 0.0]).unwrap()
    }

    fn fit(
        dknn: &Dknn,
        x: ArrayD<f32>,
        labels: Vec<usize>,
    ) -> (FeatureExtractor<NdArrayOperator>, Result<DknnState>) {
        let cfg = dknn.feature_config();
        let fe =
            FeatureExtractor::new(model(), cfg.input_layer.clone(), &cfg.output_layers).unwrap();
        let state = dknn.fit_to_dataset(&NdArrayOperator, &fe, Some((x, labels).into()));
        (fe, state)
    }

    #[test]
    fn test_default_reads_penultimate_layer() {
        let d = Dknn::default();
        assert_eq!(d.nearest(), 1);
        assert_eq!(d.feature_config().output_layers, vec![LayerId::Index(-2)]);
        assert!(d.uses_labels());
    }

    #[test]
    fn test_builds_one_index_per_class() {
        let dknn = Dknn::new(1);
        let x = array![[1.0f32, 0.0], [2.0, 0.0], [0.0, 3.0]].into_dyn();
        let (_, state) = fit(&dknn, x, vec![0, 0, 1]);
        let state = state.unwrap();
        assert_eq!(state.classes().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(state.index(0).unwrap().len(), 2);
        assert_eq!(state.index(1).unwrap().len(), 1);
    }

    #[test]
    fn test_score_is_kth_neighbor_distance() {
        let dknn = Dknn::new(2);
        let x = array![[1.0f32, 0.0], [1.0, 1.0], [0.0, 1.0], [1.0, 2.0]].into_dyn();
        let (fe, state) = fit(&dknn, x, vec![0, 0, 1, 1]);
        let state = state.unwrap();

        // [3, 0] normalizes to [1, 0]; class 0 holds [1, 0] and [1, 1]/sqrt(2).
        let q = array![[3.0f32, 0.0]].into_dyn();
        let s = dknn.score_tensor(&NdArrayOperator, &fe, &state, &q).unwrap();
        let h = 1.0 / 2.0f64.sqrt();
        assert_abs_diff_eq!(s[0], (1.0 - h).powi(2) + h * h, epsilon = 1e-5);
    }

    #[test]
    fn test_in_class_neighbor_scores_near_zero() {
        let dknn = Dknn::default();
        let x = array![[1.0f32, 0.0], [0.0, 1.0]].into_dyn();
        let (fe, state) = fit(&dknn, x, vec![0, 1]);
        let q = array![[5.0f32, 0.0], [0.0, 0.5]].into_dyn();
        let s = dknn.score_tensor(&NdArrayOperator, &fe, &state.unwrap(), &q).unwrap();
        assert_eq!(s.len(), 2);
        assert!(s.iter().all(|&v| v < 1e-6));
    }

    #[test]
    fn test_unseen_predicted_class_fails() {
        let dknn = Dknn::default();
        let x = array![[1.0f32, 0.0]].into_dyn();
        let (fe, state) = fit(&dknn, x, vec![0]);
        let q = array![[0.0f32, 1.0]].into_dyn();
        let err = dknn.score_tensor(&NdArrayOperator, &fe, &state.unwrap(), &q).unwrap_err();
        assert!(matches!(err, OodError::UnknownClass(1)));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_too_few_neighbors_fails() {
        let dknn = Dknn::new(3);
        let x = array![[1.0f32, 0.0], [2.0, 0.0]].into_dyn();
        let (fe, state) = fit(&dknn, x, vec![0, 0]);
        let q = array![[1.0f32, 0.0]].into_dyn();
        assert!(matches!(
            dknn.score_tensor(&NdArrayOperator, &fe, &state.unwrap(), &q),
            Err(OodError::NotEnoughNeighbors { label: 0, requested: 3, available: 2 })
        ));
    }

    #[test]
    fn test_calibration_requires_data_and_labels() {
        let dknn = Dknn::default();
        let cfg = dknn.feature_config();
        let fe =
            FeatureExtractor::new(model(), cfg.input_layer.clone(), &cfg.output_layers).unwrap();
        assert!(matches!(
            dknn.fit_to_dataset(&NdArrayOperator, &fe, None),
            Err(OodError::CalibrationRequired { method: "dknn" })
        ));
        let unlabeled = array![[1.0f32, 0.0]].into_dyn();
        assert!(matches!(
            dknn.fit_to_dataset(&NdArrayOperator, &fe, Some(unlabeled.into())),
            Err(OodError::Model(ood_model::ModelError::MissingLabels { batch: 0 }))
        ));
        let (_, state) = fit(&dknn, array![[1.0f32, 0.0]].into_dyn(), vec![0, 1]);
        assert!(matches!(
            state,
            Err(OodError::Operator(OperatorError::LabelCount { expected: 1, got: 2 }))
        ));
    }

    #[test]
    fn test_mixed_width_calibration_batches_fail() {
        use ood_model::{Batch, BatchedDataset, Flatten};

        // Features are the flattened inputs, so their width follows the batch.
        let model: Arc<dyn Model<Operator = NdArrayOperator>> = Arc::new(
            Sequential::<NdArrayOperator>::new()
                .with_layer("flatten", Flatten)
                .with_layer("relu", Relu)
                .with_layer("logits", Relu),
        );
        let dknn = Dknn::default();
        let cfg = dknn.feature_config();
        let fe = FeatureExtractor::new(model, cfg.input_layer.clone(), &cfg.output_layers).unwrap();
        let batches = vec![
            Batch::labeled(array![[1.0f32, 0.0], [0.9, 0.1]].into_dyn(), vec![0, 0]),
            Batch::labeled(array![[1.0f32, 0.0, 0.0, 0.0]].into_dyn(), vec![0]),
        ];
        let dataset = BatchedDataset::new(2, batches);
        assert!(matches!(
            dknn.fit_to_dataset(&NdArrayOperator, &fe, Some(dataset.into())),
            Err(OodError::DimensionMismatch { expected: 2, got: 4 })
        ));
    }

    #[test]
    fn test_state_records_feature_width() {
        let dknn = Dknn::default();
        let x = array![[1.0f32, 0.0], [0.0, 3.0]].into_dyn();
        let (_, state) = fit(&dknn, x, vec![0, 1]);
        let state = state.unwrap();
        assert_eq!(state.dim(), Some(2));
        assert!(state.classes().all(|c| state.index(c).unwrap().dim() == 2));
        assert_eq!(DknnState::default().dim(), None);
    }

    #[test]
    fn test_zero_vector_normalizes_to_zero() {
        let mut m = array![[0.0, 0.0], [3.0, 4.0]];
        l2_normalize(&mut m);
        assert_eq!(m.row(0).to_vec(), vec![0.0, 0.0]);
        assert_abs_diff_eq!(m[[1, 0]], 0.6, epsilon = 1e-9);
        assert_abs_diff_eq!(m[[1, 1]], 0.8, epsilon = 1e-9);
    }
}
