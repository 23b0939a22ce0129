//! Numerical gradients on the canonical dense form.
//!
//! Neither runtime records a computation graph, so gradients are estimated
//! with central finite differences. The objective receives a fresh perturbed
//! copy on every evaluation; the caller's tensor is never touched.

use crate::dense::DenseArray;

/// Step used by [`crate::TensorOperator::gradient`]. Large enough that f32
/// rounding of the perturbed inputs stays well below the estimate.
pub const GRADIENT_STEP: f64 = 1e-2;

/// Central finite-difference gradient of a scalar objective.
///
/// Returns `[df/dx_0, df/dx_1, ...]` with the same shape as `point`. Each
/// entry is `(f(x + eps) - f(x - eps)) / 2eps`: exact for quadratics, an
/// approximation otherwise, and an average of the one-sided slopes when a
/// kink lies within `eps` of the point.
pub fn central_difference<F, E>(mut f: F, point: &DenseArray, eps: f64) -> Result<DenseArray, E>
where
    F: FnMut(&DenseArray) -> Result<f64, E>,
{
    // A standard-layout copy makes logical index i a flat slice offset.
    let values: Vec<f64> = point.iter().copied().collect();
    let mut perturbed = point.as_standard_layout().into_owned();
    let mut grads = DenseArray::zeros(point.raw_dim());

    for (i, grad) in grads.iter_mut().enumerate() {
        set_flat(&mut perturbed, i, values[i] + eps);
        let f_plus = f(&perturbed)?;

        set_flat(&mut perturbed, i, values[i] - eps);
        let f_minus = f(&perturbed)?;

        set_flat(&mut perturbed, i, values[i]);
        *grad = (f_plus - f_minus) / (2.0 * eps);
    }

    Ok(grads)
}

fn set_flat(a: &mut DenseArray, i: usize, value: f64) {
    if let Some(slot) = a.as_slice_mut().and_then(|s| s.get_mut(i)) {
        *slot = value;
    }
}
