//! Element-wise addition kernels.
//!
//! `AddKernel` is the seam between request handling and whatever device does
//! the arithmetic. Kernels are synchronous and may block; callers run them on
//! a blocking worker.

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::error::{MatAddError, Result};

/// Below this many elements the host kernel stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 1 << 16;

pub trait AddKernel: Send + Sync {
    /// Where the arithmetic actually runs (e.g. `"GPU"`, `"CPU"`). Logged per
    /// request; the HTTP response always advertises the GPU service.
    fn device(&self) -> &'static str;

    /// Return `a + b` element-wise. Inputs must have equal length.
    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;
}

/// Output of one kernel dispatch.
#[derive(Debug, Clone)]
pub struct ComputeResult {
    pub sum: Vec<f32>,
    pub shape: Vec<usize>,
    /// Time spent inside the kernel only.
    pub elapsed: Duration,
}

/// Dispatch `a + b` on `kernel`, timing just the kernel call.
pub fn run_add(
    kernel: &dyn AddKernel,
    a: &[f32],
    b: &[f32],
    shape: &[usize],
) -> Result<ComputeResult> {
    let t0 = Instant::now();
    let sum = kernel.add(a, b)?;
    let elapsed = t0.elapsed();

    Ok(ComputeResult {
        sum,
        shape: shape.to_vec(),
        elapsed,
    })
}

/// Host kernel: data-parallel over the rayon pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostKernel;

impl AddKernel for HostKernel {
    fn device(&self) -> &'static str {
        "CPU"
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(MatAddError::ComputeError(format!(
                "operand length mismatch: {} vs {}",
                a.len(),
                b.len()
            )));
        }

        let mut out: Vec<f32> = Vec::new();
        out.try_reserve_exact(a.len()).map_err(|_| {
            MatAddError::ComputeError(format!("out of memory allocating {} elements", a.len()))
        })?;

        if a.len() < PARALLEL_THRESHOLD {
            out.extend(a.iter().zip(b).map(|(x, y)| x + y));
        } else {
            a.par_iter()
                .zip(b.par_iter())
                .map(|(x, y)| x + y)
                .collect_into_vec(&mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn adds_small_inputs() {
        let out = HostKernel.add(&[1.0, 2.0, 3.0, 4.0], &[10.0, 20.0, 30.0, 40.0]).unwrap();
        assert_eq!(out, vec![11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn adds_large_inputs_in_parallel() {
        let n = PARALLEL_THRESHOLD * 2 + 3;
        let a: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let b = vec![1.0f32; n];
        let out = HostKernel.add(&a, &b).unwrap();
        assert_eq!(out.len(), n);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[n - 1], n as f32);
    }

    #[test]
    fn length_mismatch_is_compute_error() {
        let err = HostKernel.add(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert_eq!(err.client_code().as_str(), "COMPUTE_ERROR");
    }

    #[test]
    fn run_add_keeps_shape() {
        let r = run_add(&HostKernel, &[1.0, 2.0], &[3.0, 4.0], &[1, 2]).unwrap();
        assert_eq!(r.shape, vec![1, 2]);
        assert_eq!(r.sum, vec![4.0, 6.0]);
    }
}
