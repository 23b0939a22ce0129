//! `ood-model` - the model side of OOD scoring.
//!
//! A [`Model`] is any layered network over one tensor runtime. A
//! [`FeatureExtractor`] reads activations out of it, and the
//! [`Dataset`] adapter turns whatever the caller has (a tensor, a labeled
//! tensor, an iterator of batches) into a uniform stream of [`Batch`]es.

pub mod dataset;
pub mod error;
pub mod extractor;
pub mod gradients;
pub mod layers;
pub mod model;

pub use dataset::{Batch, BatchedDataset, Batches, Dataset};
pub use error::{ModelError, Result};
pub use extractor::{FeatureExtractor, Features};
pub use gradients::loss_gradient;
pub use layers::{Dense, Flatten, Layer, Relu, Sequential};
pub use model::{LayerId, Model, ModelHandle, Runtime};
