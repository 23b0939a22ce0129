use nalgebra::DMatrix;

use crate::error::{OperatorError, Result};

/// Singular values below this are treated as zero.
const PINV_EPS: f64 = 1e-10;

/// Moore-Penrose pseudo-inverse of a row-major `rows x cols` matrix.
///
/// Returns the row-major `cols x rows` result.
pub(crate) fn pinv(rows: usize, cols: usize, data: &[f64]) -> Result<Vec<f64>> {
    if rows == 0 || cols == 0 {
        return Err(OperatorError::Empty { op: "pinv" });
    }
    let m = DMatrix::from_row_slice(rows, cols, data);
    let inv = m
        .pseudo_inverse(PINV_EPS)
        .map_err(|e| OperatorError::Linalg(e.to_string()))?;
    // nalgebra stores column-major; the transpose's storage is our row-major.
    Ok(inv.transpose().as_slice().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pinv_invertible() {
        // inverse of [[4, 7], [2, 6]] = [[0.6, -0.7], [-0.2, 0.4]]
        let inv = pinv(2, 2, &[4.0, 7.0, 2.0, 6.0]).unwrap();
        for (got, want) in inv.iter().zip([0.6, -0.7, -0.2, 0.4]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pinv_rectangular() {
        // pinv of the column [1, 2] is the row [1/5, 2/5].
        let inv = pinv(2, 1, &[1.0, 2.0]).unwrap();
        assert_eq!(inv.len(), 2);
        assert_abs_diff_eq!(inv[0], 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(inv[1], 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_pinv_empty() {
        assert!(pinv(0, 2, &[]).is_err());
    }
}
