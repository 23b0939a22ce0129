use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Straightforward loops, written for correctness rather than peak
/// throughput. This is the default backend of the native runtime.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        if a.len() != m * k {
            return Err(TensorError::Other(format!(
                "matmul: a.len()={} but expected m*k={}",
                a.len(),
                m * k
            )));
        }
        if b.len() != k * n {
            return Err(TensorError::Other(format!(
                "matmul: b.len()={} but expected k*n={}",
                b.len(),
                k * n
            )));
        }

        // i-p-j loop order keeps the inner loop on contiguous rows of b.
        let mut c = vec![0.0f32; m * n];
        for i in 0..m {
            let row = &mut c[i * n..(i + 1) * n];
            for p in 0..k {
                let a_ip = a[i * k + p];
                if a_ip == 0.0 {
                    continue;
                }
                let b_row = &b[p * n..(p + 1) * n];
                for (out, &b_pj) in row.iter_mut().zip(b_row) {
                    *out += a_ip * b_pj;
                }
            }
        }
        Ok(c)
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len()],
                got: vec![b.len()],
            });
        }
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x + y).collect())
    }

    fn softmax(&self, x: &[f32], row_len: usize) -> Result<Vec<f32>> {
        if row_len == 0 {
            return Err(TensorError::Other(
                "softmax: row_len must be > 0".to_string(),
            ));
        }
        if x.len() % row_len != 0 {
            return Err(TensorError::Other(format!(
                "softmax: x.len()={} is not a multiple of row_len={}",
                x.len(),
                row_len
            )));
        }

        let mut result = vec![0.0f32; x.len()];
        for (row, out) in x.chunks(row_len).zip(result.chunks_mut(row_len)) {
            // Subtract the row max for numerical stability.
            let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

            let mut sum = 0.0f32;
            for (o, &v) in out.iter_mut().zip(row) {
                *o = (v - max_val).exp();
                sum += *o;
            }
            for o in out.iter_mut() {
                *o /= sum;
            }
        }

        Ok(result)
    }

    fn relu(&self, x: &[f32]) -> Result<Vec<f32>> {
        Ok(x.iter().map(|&v| v.max(0.0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn backend() -> CpuBackend {
        CpuBackend::new()
    }

    #[test]
    fn test_matmul_identity() {
        let b = backend();
        let a = vec![1.0, 0.0, 0.0, 1.0];
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let c = b.matmul(&a, &x, 2, 2, 2).unwrap();
        assert_eq!(c, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matmul_rectangular() {
        let b = backend();
        // [1,2,3] @ [[1,0],[0,1],[1,1]] = [4,5]
        let c = b
            .matmul(&[1.0, 2.0, 3.0], &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 1, 3, 2)
            .unwrap();
        assert_eq!(c, vec![4.0, 5.0]);
    }

    #[test]
    fn test_matmul_bad_lengths() {
        let b = backend();
        assert!(b.matmul(&[1.0, 2.0], &[1.0], 1, 2, 1).is_err());
    }

    #[test]
    fn test_add() {
        let b = backend();
        assert_eq!(b.add(&[1.0, 2.0], &[3.0, 4.0]).unwrap(), vec![4.0, 6.0]);
        assert!(b.add(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_softmax_rows() {
        let b = backend();
        let r = b.softmax(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0], 3).unwrap();
        let first: f32 = r[..3].iter().sum();
        assert_relative_eq!(first, 1.0, epsilon = 1e-6);
        assert!(r[0] < r[1] && r[1] < r[2]);
        for &p in &r[3..] {
            assert_relative_eq!(p, 1.0 / 3.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_softmax_large_logits_stay_finite() {
        let b = backend();
        let r = b.softmax(&[1000.0, 1000.0], 2).unwrap();
        assert_relative_eq!(r[0], 0.5, epsilon = 1e-6);
        assert!(b.softmax(&[1.0, 2.0, 3.0], 2).is_err());
    }

    #[test]
    fn test_relu() {
        let b = backend();
        assert_eq!(b.relu(&[-1.0, 0.0, 2.5]).unwrap(), vec![0.0, 0.0, 2.5]);
    }
}
