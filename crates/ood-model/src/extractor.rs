use std::sync::Arc;

use ood_operator::TensorOperator;
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::error::{ModelError, Result};
use crate::model::{LayerId, Model};

/// Activations read out of a model: one tensor per requested layer.
#[derive(Debug, Clone)]
pub enum Features<T> {
    Single(T),
    Multi(Vec<T>),
}

impl<T> Features<T> {
    /// The first (or only) activation.
    pub fn first(&self) -> Option<&T> {
        match self {
            Features::Single(t) => Some(t),
            Features::Multi(ts) => ts.first(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Features::Single(t) => vec![t],
            Features::Multi(ts) => ts,
        }
    }
}

/// Reads intermediate activations out of a shared model.
///
/// Layer ids are resolved once at construction; the layer selection never
/// changes afterwards.
#[derive(Debug, Clone)]
pub struct FeatureExtractor<O: TensorOperator> {
    model: Arc<dyn Model<Operator = O>>,
    input_layer: usize,
    output_layers: Vec<usize>,
}

impl<O: TensorOperator> FeatureExtractor<O> {
    pub fn new(
        model: Arc<dyn Model<Operator = O>>,
        input_layer: LayerId,
        output_layers: &[LayerId],
    ) -> Result<Self> {
        let names = model.layer_names();
        let input = input_layer.resolve(&names)?;
        if output_layers.is_empty() {
            return Err(ModelError::NoOutputLayers);
        }
        let outputs = output_layers
            .iter()
            .map(|id| id.resolve(&names))
            .collect::<Result<Vec<_>>>()?;
        if let Some(&output) = outputs.iter().find(|&&o| o < input) {
            return Err(ModelError::LayerOrder { input, output });
        }
        debug!(
            input = %names[input],
            outputs = ?outputs.iter().map(|&o| names[o].as_str()).collect::<Vec<_>>(),
            "built feature extractor"
        );
        Ok(FeatureExtractor {
            model,
            input_layer: input,
            output_layers: outputs,
        })
    }

    pub fn model(&self) -> &Arc<dyn Model<Operator = O>> {
        &self.model
    }

    pub fn input_layer(&self) -> usize {
        self.input_layer
    }

    pub fn output_layers(&self) -> &[usize] {
        &self.output_layers
    }

    /// Run `inputs` from the input layer and collect the configured outputs.
    pub fn extract(&self, inputs: &O::Tensor) -> Result<Features<O::Tensor>> {
        let last = self.output_layers.iter().copied().max().unwrap_or(self.input_layer);
        let mut x = inputs.clone();
        let mut seen = Vec::with_capacity(last + 1 - self.input_layer);
        for index in self.input_layer..=last {
            x = self.model.forward_layer(index, &x)?;
            seen.push(x.clone());
        }
        let mut outputs: Vec<O::Tensor> = self
            .output_layers
            .iter()
            .map(|&o| seen[o - self.input_layer].clone())
            .collect();
        Ok(if outputs.len() == 1 {
            Features::Single(outputs.remove(0))
        } else {
            Features::Multi(outputs)
        })
    }

    /// Stream features batch by batch; nothing beyond the current batch is
    /// held in memory.
    pub fn predict<'a>(
        &'a self,
        op: &'a O,
        dataset: Dataset,
    ) -> Result<impl Iterator<Item = Result<Features<O::Tensor>>> + 'a> {
        let batches = dataset.into_batches(false)?;
        Ok(batches.enumerate().map(move |(i, batch)| {
            let batch = batch?;
            if batch.inputs.batch_len() == Some(0) {
                warn!(batch = i, "empty batch");
            }
            let inputs = op.sanitize(batch.inputs)?;
            debug!(batch = i, "extracting features");
            self.extract(&inputs)
        }))
    }
}
