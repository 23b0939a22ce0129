//! `ood-methods` - out-of-distribution scores for trained classifiers.
//!
//! An [`OodModel`] wraps one [`OodMethod`]. `fit` picks the tensor runtime
//! from the model, builds the feature extractor and runs the method's
//! calibration; `score` and `isood` then work on any [`ood_model::Dataset`].
//!
//! Lower scores mean more in-distribution for every method here.

pub mod dknn;
pub mod energy;
pub mod engine;
pub mod error;
pub mod index;
pub mod method;
pub mod mls;

pub use dknn::{Dknn, DknnState};
pub use energy::Energy;
pub use engine::{Calibrated, Fitted, OodModel};
pub use error::{OodError, Result};
pub use index::FlatL2Index;
pub use method::{FeatureConfig, OodMethod};
pub use mls::Mls;
