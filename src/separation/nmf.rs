//! Non-negative matrix factorization
//!
//! Approximates a magnitude spectrogram `V` (bins × frames) as `W · H` with
//! `W` (bins × rank) holding spectral templates and `H` (rank × frames) their
//! activations over time.
//!
//! # Algorithm
//!
//! Euclidean multiplicative updates:
//!
//! ```text
//! H ← H ∘ (Wᵀ V) / (Wᵀ W H)
//! W ← W ∘ (V Hᵀ) / (W H Hᵀ)
//! ```
//!
//! Initialization is deterministic: column `k` of `W` is a Gaussian bump
//! centred on a log-spaced frequency, `H` starts flat at the frame energy. The
//! cost `‖V − WH‖²` is checked every [`CHECK_INTERVAL`] iterations and the
//! factorization counts as converged once the decrease between two checks,
//! relative to the initial cost, drops below the tolerance.
//!
//! # Reference
//!
//! Lee, D. D., & Seung, H. S. (2001). Algorithms for Non-negative Matrix
//! Factorization. *Advances in Neural Information Processing Systems*, 13.

use ndarray::{Array1, Array2, Axis};

use super::SeparationError;

const EPSILON: f32 = 1e-9;

/// Iterations between cost evaluations
pub const CHECK_INTERVAL: usize = 10;

/// Factorization parameters
#[derive(Debug, Clone, Copy)]
pub struct NmfParams {
    /// Number of components
    pub rank: usize,
    /// Iteration budget
    pub max_iterations: usize,
    /// Decrease between checks, relative to the initial cost, that counts as converged
    pub tolerance: f32,
}

/// Factorization result
#[derive(Debug, Clone)]
pub struct NmfResult {
    /// Spectral templates (bins × rank), columns L1-normalized
    pub basis: Array2<f32>,
    /// Activations (rank × frames)
    pub activations: Array2<f32>,
    /// Iterations performed
    pub iterations: usize,
    /// Final cost `‖V − WH‖²`
    pub cost: f32,
}

/// Factorize a non-negative matrix
///
/// # Errors
///
/// - `SeparationError::NumericalFailure` for an empty input, rank 0 or a
///   non-finite cost
/// - `SeparationError::NotConverged` if the budget runs out first
pub fn factorize(v: &Array2<f32>, params: &NmfParams) -> Result<NmfResult, SeparationError> {
    let (n_bins, n_frames) = v.dim();
    if n_bins == 0 || n_frames == 0 || params.rank == 0 {
        return Err(SeparationError::NumericalFailure(format!(
            "Cannot factorize {}x{} matrix at rank {}",
            n_bins, n_frames, params.rank
        )));
    }

    log::debug!(
        "NMF: {}x{} at rank {}, up to {} iterations",
        n_bins,
        n_frames,
        params.rank,
        params.max_iterations
    );

    let mut w = initial_basis(n_bins, params.rank);
    let mut h = initial_activations(v, params.rank);

    let initial_cost = cost(v, &w, &h);
    let mut prev_cost = initial_cost;
    if !prev_cost.is_finite() {
        return Err(SeparationError::NumericalFailure(
            "Initial cost is not finite".to_string(),
        ));
    }

    let mut iterations = 0;
    let mut converged = prev_cost <= EPSILON;
    while !converged && iterations < params.max_iterations {
        // H update
        let wt = w.t();
        let numerator = wt.dot(v);
        let denominator = wt.dot(&w).dot(&h);
        h.zip_mut_with(&(numerator / (denominator + EPSILON)), |x, &r| *x *= r);

        // W update
        let ht = h.t();
        let numerator = v.dot(&ht);
        let denominator = w.dot(&h).dot(&ht);
        w.zip_mut_with(&(numerator / (denominator + EPSILON)), |x, &r| *x *= r);

        iterations += 1;

        if iterations % CHECK_INTERVAL == 0 || iterations == params.max_iterations {
            let current = cost(v, &w, &h);
            if !current.is_finite() {
                return Err(SeparationError::NumericalFailure(format!(
                    "Cost became non-finite after {} iterations",
                    iterations
                )));
            }
            let decrease = (prev_cost - current) / initial_cost.max(EPSILON);
            log::debug!(
                "NMF iteration {}: cost {:.6}, relative decrease {:.2e}",
                iterations,
                current,
                decrease
            );
            converged = current <= EPSILON || decrease < params.tolerance;
            prev_cost = current;
        }
    }

    if !converged {
        return Err(SeparationError::NotConverged { iterations });
    }

    normalize_basis(&mut w, &mut h);

    Ok(NmfResult {
        basis: w,
        activations: h,
        iterations,
        cost: prev_cost,
    })
}

/// Gaussian bumps at log-spaced bins, columns L1-normalized, small floor everywhere
fn initial_basis(n_bins: usize, rank: usize) -> Array2<f32> {
    let log_max = (n_bins.max(2) as f32).ln();
    let width = (log_max / rank as f32).max(0.1);

    let mut w = Array2::from_shape_fn((n_bins, rank), |(f, k)| {
        let centre = log_max * (k as f32 + 0.5) / rank as f32;
        let d = ((f + 1) as f32).ln() - centre;
        (-0.5 * (d / width) * (d / width)).exp() + 0.01
    });
    for mut column in w.columns_mut() {
        let sum = column.sum();
        if sum > EPSILON {
            column /= sum;
        }
    }
    w
}

/// Flat activations carrying each frame's energy
fn initial_activations(v: &Array2<f32>, rank: usize) -> Array2<f32> {
    let frame_sums: Array1<f32> = v.sum_axis(Axis(0));
    Array2::from_shape_fn((rank, v.ncols()), |(_, t)| frame_sums[t] / rank as f32 + EPSILON)
}

fn cost(v: &Array2<f32>, w: &Array2<f32>, h: &Array2<f32>) -> f32 {
    let residual = v - &w.dot(h);
    residual.iter().map(|&x| x * x).sum()
}

/// Scale `W` columns to unit L1 norm, moving the scale into `H`
fn normalize_basis(w: &mut Array2<f32>, h: &mut Array2<f32>) {
    for (k, mut column) in w.columns_mut().into_iter().enumerate() {
        let sum = column.sum();
        if sum > EPSILON {
            column /= sum;
            h.row_mut(k).mapv_inplace(|x| x * sum);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rank: usize) -> NmfParams {
        NmfParams {
            rank,
            max_iterations: 2000,
            tolerance: 1e-3,
        }
    }

    #[test]
    fn test_factorizes_rank_two_matrix() {
        // Two spectral templates active in alternating frames
        let templates = [[1.0f32, 0.5, 0.0, 0.0], [0.0, 0.0, 0.8, 1.0]];
        let v = Array2::from_shape_fn((4, 20), |(f, t)| templates[t % 2][f] * (1.0 + t as f32 * 0.1));

        let exact = NmfParams {
            tolerance: 1e-7,
            max_iterations: 20000,
            ..params(2)
        };
        let result = factorize(&v, &exact).unwrap();
        let rebuilt = result.basis.dot(&result.activations);
        let err: f32 = (&v - &rebuilt).iter().map(|x| x.abs()).fold(0.0, f32::max);
        assert!(err < 0.1, "Reconstruction error too large: {}", err);
        assert!(result.iterations > 0);
    }

    #[test]
    fn test_factors_stay_non_negative() {
        let v = Array2::from_shape_fn((16, 12), |(f, t)| ((f * 7 + t * 3) % 5) as f32);
        let result = factorize(&v, &params(3)).unwrap();
        assert!(result.basis.iter().all(|&x| x >= 0.0));
        assert!(result.activations.iter().all(|&x| x >= 0.0));
        for column in result.basis.columns() {
            assert!((column.sum() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_deterministic() {
        let v = Array2::from_shape_fn((10, 8), |(f, t)| ((f + 2 * t) % 4) as f32 + 0.1);
        let a = factorize(&v, &params(3)).unwrap();
        let b = factorize(&v, &params(3)).unwrap();
        assert_eq!(a.basis, b.basis);
        assert_eq!(a.activations, b.activations);
    }

    #[test]
    fn test_zero_matrix_converges_immediately() {
        let v = Array2::<f32>::zeros((8, 8));
        let result = factorize(&v, &params(2)).unwrap();
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_budget_exhaustion() {
        let v = Array2::from_shape_fn((16, 12), |(f, t)| ((f * 7 + t * 3) % 5) as f32);
        let err = factorize(
            &v,
            &NmfParams {
                rank: 3,
                max_iterations: 1,
                tolerance: 0.0,
            },
        )
        .unwrap_err();
        assert_eq!(err, SeparationError::NotConverged { iterations: 1 });
    }

    #[test]
    fn test_invalid_rank() {
        let v = Array2::<f32>::ones((4, 4));
        assert!(matches!(
            factorize(&v, &params(0)),
            Err(SeparationError::NumericalFailure(_))
        ));
    }
}
