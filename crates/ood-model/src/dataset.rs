//! Dataset/batch adapter.
//!
//! Callers hand over a bare tensor, a `(tensor, labels)` pair, or an
//! iterator that is already split into batches. All three become the same
//! stream of [`Batch`]es. Batches are never resized or reordered.

use std::fmt;

use ndarray::ArrayD;
use ood_operator::{AnyTensor, DenseArray};
use ood_tensor::Tensor;

use crate::error::{ModelError, Result};

/// One forward pass worth of samples, with optional integer labels.
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: AnyTensor,
    pub labels: Option<Vec<usize>>,
}

impl Batch {
    pub fn new(inputs: impl Into<AnyTensor>) -> Self {
        Batch {
            inputs: inputs.into(),
            labels: None,
        }
    }

    pub fn labeled(inputs: impl Into<AnyTensor>, labels: Vec<usize>) -> Self {
        Batch {
            inputs: inputs.into(),
            labels: Some(labels),
        }
    }
}

/// The stream every dataset shape is normalized into.
pub type Batches = Box<dyn Iterator<Item = Result<Batch>>>;

/// An iterable that is already split into batches.
///
/// Whether it declares a fixed batch size is checked once, before any batch
/// is consumed.
pub struct BatchedDataset {
    batch_size: Option<usize>,
    batches: Box<dyn Iterator<Item = Batch>>,
}

impl BatchedDataset {
    /// Batches of (at most) `batch_size` samples.
    pub fn new<I>(batch_size: usize, batches: I) -> Self
    where
        I: IntoIterator<Item = Batch>,
        I::IntoIter: 'static,
    {
        BatchedDataset {
            batch_size: Some(batch_size),
            batches: Box::new(batches.into_iter()),
        }
    }

    /// An iterable with no declared batch size; scoring refuses it.
    pub fn unbatched<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = Batch>,
        I::IntoIter: 'static,
    {
        BatchedDataset {
            batch_size: None,
            batches: Box::new(batches.into_iter()),
        }
    }

    /// Split resident data into consecutive batches; the last may be shorter.
    pub fn from_tensors(
        inputs: impl Into<AnyTensor>,
        labels: Option<Vec<usize>>,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(ModelError::Other("batch size must be positive".to_string()));
        }
        let inputs = inputs.into();
        let n = inputs.batch_len().ok_or_else(|| {
            ModelError::Other("cannot batch a tensor without a leading dimension".to_string())
        })?;
        if let Some(labels) = &labels {
            if labels.len() != n {
                return Err(ModelError::Other(format!(
                    "{} labels for {} samples",
                    labels.len(),
                    n
                )));
            }
        }

        let mut batches = Vec::with_capacity(n.div_ceil(batch_size));
        for start in (0..n).step_by(batch_size) {
            let end = (start + batch_size).min(n);
            batches.push(Batch {
                inputs: inputs.slice_batch(start, end)?,
                labels: labels.as_ref().map(|l| l[start..end].to_vec()),
            });
        }
        Ok(BatchedDataset::new(batch_size, batches))
    }

    pub fn is_batched(&self) -> bool {
        self.batch_size.is_some()
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }
}

impl fmt::Debug for BatchedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchedDataset")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

/// Everything that can be scored or used for calibration.
#[derive(Debug)]
pub enum Dataset {
    /// Samples without labels, scored in one pass.
    Tensor(AnyTensor),
    /// Samples with one label each, scored in one pass.
    Labeled(AnyTensor, Vec<usize>),
    Batched(BatchedDataset),
}

impl Dataset {
    /// Normalize into a batch stream.
    ///
    /// An undeclared batched iterable fails here, before iteration. With
    /// `uses_labels`, a batch without labels fails when it is reached.
    pub fn into_batches(self, uses_labels: bool) -> Result<Batches> {
        let batches: Box<dyn Iterator<Item = Batch>> = match self {
            Dataset::Tensor(t) => Box::new(std::iter::once(Batch::new(t))),
            Dataset::Labeled(t, labels) => Box::new(std::iter::once(Batch::labeled(t, labels))),
            Dataset::Batched(ds) => {
                if !ds.is_batched() {
                    return Err(ModelError::UnbatchedDataset);
                }
                ds.batches
            }
        };
        Ok(Box::new(batches.enumerate().map(move |(i, batch)| {
            if uses_labels && batch.labels.is_none() {
                return Err(ModelError::MissingLabels { batch: i });
            }
            Ok(batch)
        })))
    }
}

impl From<AnyTensor> for Dataset {
    fn from(t: AnyTensor) -> Self {
        Dataset::Tensor(t)
    }
}

impl From<Tensor> for Dataset {
    fn from(t: Tensor) -> Self {
        Dataset::Tensor(t.into())
    }
}

impl From<ArrayD<f32>> for Dataset {
    fn from(a: ArrayD<f32>) -> Self {
        Dataset::Tensor(a.into())
    }
}

impl From<DenseArray> for Dataset {
    fn from(a: DenseArray) -> Self {
        Dataset::Tensor(a.into())
    }
}

impl<T: Into<AnyTensor>> From<(T, Vec<usize>)> for Dataset {
    fn from((t, labels): (T, Vec<usize>)) -> Self {
        Dataset::Labeled(t.into(), labels)
    }
}

impl From<BatchedDataset> for Dataset {
    fn from(ds: BatchedDataset) -> Self {
        Dataset::Batched(ds)
    }
}
