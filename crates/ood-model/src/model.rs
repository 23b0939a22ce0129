use std::fmt;
use std::sync::Arc;

use ood_operator::{Framework, Lineage, NativeOperator, NdArrayOperator, TensorOperator};
use tracing::debug;

use crate::error::{ModelError, Result};

/// A trained, layered network over a single tensor runtime.
///
/// Models are shared read-only: nothing in this workspace mutates one, it is
/// only run forward and asked for its layer names.
pub trait Model: fmt::Debug + Send + Sync {
    type Operator: TensorOperator;

    /// Layer names in execution order.
    fn layer_names(&self) -> Vec<String>;

    /// Run layer `index` alone.
    fn forward_layer(
        &self,
        index: usize,
        input: &<Self::Operator as TensorOperator>::Tensor,
    ) -> Result<<Self::Operator as TensorOperator>::Tensor>;

    fn num_layers(&self) -> usize {
        self.layer_names().len()
    }

    /// Full forward pass: the model's logits.
    fn forward(
        &self,
        input: &<Self::Operator as TensorOperator>::Tensor,
    ) -> Result<<Self::Operator as TensorOperator>::Tensor> {
        self.forward_range(input, 0, self.num_layers())
    }

    /// Feed `input` to layer `from` and return the output of layer `to - 1`.
    fn forward_range(
        &self,
        input: &<Self::Operator as TensorOperator>::Tensor,
        from: usize,
        to: usize,
    ) -> Result<<Self::Operator as TensorOperator>::Tensor> {
        let mut x = input.clone();
        for index in from..to {
            x = self.forward_layer(index, &x)?;
        }
        Ok(x)
    }

    /// Type names this model is built from, used for framework detection.
    fn lineage(&self) -> Vec<&'static str> {
        vec![
            std::any::type_name::<Self>(),
            std::any::type_name::<<Self::Operator as TensorOperator>::Tensor>(),
        ]
    }
}

/// Identifies a layer by name or by position. Negative positions count from
/// the end, so `-1` is the last layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LayerId {
    Name(String),
    Index(isize),
}

impl LayerId {
    /// Position of this layer in `names`.
    pub fn resolve(&self, names: &[String]) -> Result<usize> {
        let found = match self {
            LayerId::Name(name) => names.iter().position(|n| n == name),
            LayerId::Index(i) if *i < 0 => names.len().checked_sub(i.unsigned_abs()),
            LayerId::Index(i) => Some(*i as usize).filter(|&i| i < names.len()),
        };
        found.ok_or_else(|| ModelError::LayerNotFound(self.clone()))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerId::Name(name) => write!(f, "'{}'", name),
            LayerId::Index(i) => write!(f, "index {}", i),
        }
    }
}

impl From<&str> for LayerId {
    fn from(name: &str) -> Self {
        LayerId::Name(name.to_string())
    }
}

impl From<String> for LayerId {
    fn from(name: String) -> Self {
        LayerId::Name(name)
    }
}

impl From<isize> for LayerId {
    fn from(i: isize) -> Self {
        LayerId::Index(i)
    }
}

impl From<i32> for LayerId {
    fn from(i: i32) -> Self {
        LayerId::Index(i as isize)
    }
}

/// A shared model tagged with the runtime it runs on.
#[derive(Debug, Clone)]
pub enum ModelHandle {
    Native(Arc<dyn Model<Operator = NativeOperator>>),
    NdArray(Arc<dyn Model<Operator = NdArrayOperator>>),
}

impl ModelHandle {
    /// Wrap `model` after checking that its lineage names the runtime its
    /// operator belongs to.
    pub fn new<M>(model: Arc<M>) -> Result<Self>
    where
        M: Model + 'static,
        M::Operator: Runtime,
    {
        let lineage = ModelLineage(Model::lineage(model.as_ref()));
        let expected = <M::Operator as TensorOperator>::FRAMEWORK;
        match Framework::detect(&lineage) {
            Some(found) if found == expected => {
                debug!(framework = %found, model = ?lineage.0.first(), "detected model framework");
                Ok(<M::Operator as Runtime>::wrap(model))
            }
            Some(found) => Err(ModelError::UnsupportedFramework(format!(
                "model declares {} but is built on {}",
                expected, found
            ))),
            None => Err(ModelError::UnsupportedFramework(
                lineage.0.first().copied().unwrap_or("<unknown>").to_string(),
            )),
        }
    }

    pub fn framework(&self) -> Framework {
        match self {
            ModelHandle::Native(_) => Framework::Native,
            ModelHandle::NdArray(_) => Framework::NdArray,
        }
    }

    pub fn layer_names(&self) -> Vec<String> {
        match self {
            ModelHandle::Native(m) => m.layer_names(),
            ModelHandle::NdArray(m) => m.layer_names(),
        }
    }
}

struct ModelLineage(Vec<&'static str>);

impl Lineage for ModelLineage {
    fn lineage(&self) -> Vec<&'static str> {
        self.0.clone()
    }
}

/// Operators that can carry a model inside a [`ModelHandle`].
pub trait Runtime: TensorOperator {
    fn wrap(model: Arc<dyn Model<Operator = Self>>) -> ModelHandle;
}

impl Runtime for NativeOperator {
    fn wrap(model: Arc<dyn Model<Operator = Self>>) -> ModelHandle {
        ModelHandle::Native(model)
    }
}

impl Runtime for NdArrayOperator {
    fn wrap(model: Arc<dyn Model<Operator = Self>>) -> ModelHandle {
        ModelHandle::NdArray(model)
    }
}
