//! Small sequential networks for both runtimes.
//!
//! These are forward-only building blocks: weights come from a seeded
//! Glorot-uniform draw or are supplied explicitly.

mod array;
mod native;

use std::fmt::Debug;

use ood_operator::TensorOperator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ModelError, Result};
use crate::model::Model;

/// One step of a [`Sequential`] model.
pub trait Layer<O: TensorOperator>: Debug + Send + Sync {
    fn forward(&self, op: &O, input: &O::Tensor) -> Result<O::Tensor>;
}

/// Fully connected layer: `y = x @ W + b` with `x: [batch, in]`.
#[derive(Debug, Clone)]
pub struct Dense {
    /// Row-major `[in_features, out_features]`.
    weights: Vec<f32>,
    bias: Vec<f32>,
    in_features: usize,
    out_features: usize,
}

impl Dense {
    pub fn new(
        in_features: usize,
        out_features: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self> {
        if weights.len() != in_features * out_features {
            return Err(ModelError::Other(format!(
                "dense weights: expected {} values for [{}, {}], got {}",
                in_features * out_features,
                in_features,
                out_features,
                weights.len()
            )));
        }
        if bias.len() != out_features {
            return Err(ModelError::Other(format!(
                "dense bias: expected {} values, got {}",
                out_features,
                bias.len()
            )));
        }
        Ok(Dense {
            weights,
            bias,
            in_features,
            out_features,
        })
    }

    /// Glorot-uniform weights and zero bias.
    pub fn glorot(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (in_features + out_features).max(1) as f32).sqrt();
        let weights = (0..in_features * out_features)
            .map(|_| rng.gen_range(-limit..=limit))
            .collect();
        Dense {
            weights,
            bias: vec![0.0; out_features],
            in_features,
            out_features,
        }
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

/// Collapses every axis after the batch axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flatten;

impl<O: TensorOperator> Layer<O> for Flatten {
    fn forward(&self, op: &O, input: &O::Tensor) -> Result<O::Tensor> {
        Ok(op.flatten(input)?)
    }
}

/// Named layers run one after another.
#[derive(Debug)]
pub struct Sequential<O: TensorOperator> {
    op: O,
    layers: Vec<(String, Box<dyn Layer<O>>)>,
}

impl<O: TensorOperator> Sequential<O> {
    pub fn new() -> Self {
        Self::with_operator(O::default())
    }

    pub fn with_operator(op: O) -> Self {
        Sequential {
            op,
            layers: Vec::new(),
        }
    }

    /// Append a layer. Returns self for builder-style usage.
    pub fn with_layer(mut self, name: impl Into<String>, layer: impl Layer<O> + 'static) -> Self {
        self.layers.push((name.into(), Box::new(layer)));
        self
    }

    pub fn operator(&self) -> &O {
        &self.op
    }

    /// A multilayer perceptron classifier.
    ///
    /// `sizes` is `[in, hidden.., classes]`. Layers are `flatten`, then
    /// `dense_i` / `relu_i` pairs for each hidden width, then `logits`, so
    /// layer `-2` is the last hidden activation.
    pub fn mlp(sizes: &[usize], seed: u64) -> Result<Self>
    where
        Dense: Layer<O>,
        Relu: Layer<O>,
    {
        if sizes.len() < 2 {
            return Err(ModelError::Other(format!(
                "mlp needs at least input and output sizes, got {:?}",
                sizes
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut model = Sequential::new().with_layer("flatten", Flatten);
        let last = sizes.len() - 2;
        for (i, pair) in sizes.windows(2).enumerate() {
            let dense = Dense::glorot(pair[0], pair[1], &mut rng);
            if i == last {
                model = model.with_layer("logits", dense);
            } else {
                model = model
                    .with_layer(format!("dense_{}", i), dense)
                    .with_layer(format!("relu_{}", i), Relu);
            }
        }
        Ok(model)
    }
}

impl<O: TensorOperator> Default for Sequential<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: TensorOperator> Model for Sequential<O> {
    type Operator = O;

    fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|(name, _)| name.clone()).collect()
    }

    fn num_layers(&self) -> usize {
        self.layers.len()
    }

    fn forward_layer(&self, index: usize, input: &O::Tensor) -> Result<O::Tensor> {
        let (_, layer) = self
            .layers
            .get(index)
            .ok_or(ModelError::LayerNotFound(crate::model::LayerId::Index(index as isize)))?;
        layer.forward(&self.op, input)
    }
}
