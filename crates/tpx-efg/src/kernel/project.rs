//! Simplex projection under KL and Euclidean divergences.
//!
//! Both projections accept an optional exploration floor: the result is
//! guaranteed at least `gamma * mu` in every coordinate, where `mu` defaults
//! to the uniform distribution. Callers exponentiate before a KL projection
//! (subtracting the max entry first for stability — see [`Vector::max`]);
//! the kernel assumes non-negative input and does not enforce the shift.

use super::vector::Vector;
use tpx_core::*;

/// Divergence under which to project onto the probability simplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Entrywise normalization mixed with the floor:
    /// `(1 - gamma) * x / sum(x) + gamma * mu`.
    KL,
    /// Euclidean projection via sort-and-threshold, shrunk toward the floor.
    L2,
}

/// Project `x` onto the simplex with floor `gamma * mu`.
///
/// A nonpositive sum under [`Distance::KL`] propagates NaN/Inf into the
/// result by design; floors belong to the caller.
pub fn project(x: &Vector, distance: Distance, gamma: Probability, mu: Option<&Vector>) -> Vector {
    let uniform;
    let mu = match mu {
        Some(mu) => mu,
        None => {
            uniform = Vector::fill(x.width(), 1.0 / x.width() as Probability);
            &uniform
        }
    };
    debug_assert!(mu.width() == x.width(), "floor width mismatch");
    match distance {
        Distance::KL => entropic(x, gamma, mu),
        Distance::L2 => euclidean(x, gamma, mu),
    }
}

/// `(1 - gamma) * x / sum(x) + gamma * mu`.
fn entropic(x: &Vector, gamma: Probability, mu: &Vector) -> Vector {
    let sum = x.sum();
    x.zip(mu, |xi, mi| (1.0 - gamma) * xi / sum + gamma * mi)
}

/// Euclidean projection onto the simplex scaled to mass `1 - gamma`,
/// plus `gamma * mu`. Standard sort-and-threshold: find the largest
/// feasible tau with `sum(max(x_i - tau, 0)) = 1 - gamma`.
fn euclidean(x: &Vector, gamma: Probability, mu: &Vector) -> Vector {
    let n = x.width();
    let mut sorted = x.as_slice().to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite projection input"));

    // Shift so the smallest entry sits at the uniform mass point; the
    // threshold search below is invariant to this but the running sums
    // stay well-conditioned.
    let shift = -sorted[0] + (1.0 - gamma) / n as Utility;
    let mut remaining = 0.0;
    for v in sorted.iter_mut() {
        *v += shift;
        remaining += *v;
    }

    let mut tau = 0.0;
    for (i, &v) in sorted.iter().enumerate() {
        let excess = remaining - (1.0 - gamma);
        if excess < v * (n - i) as Utility {
            tau = excess / (n - i) as Utility;
            break;
        }
        remaining -= v;
    }

    let thresholded = x.zip(mu, |xi, mi| (xi + shift - tau).max(0.0) + gamma * mi);
    // Renormalize to absorb floating-point error.
    let total = thresholded.sum();
    thresholded.map(|v| v / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::Rng;
    use rand::SeedableRng;

    /// Reference Euclidean projection by bisection on the threshold.
    fn bisected(x: &[Utility]) -> Vec<Utility> {
        let mass = |tau: Utility| x.iter().map(|&v| (v - tau).max(0.0)).sum::<Utility>();
        let mut lo = x.iter().cloned().fold(INF, Utility::min) - 1.0;
        let mut hi = x.iter().cloned().fold(-INF, Utility::max);
        for _ in 0..200 {
            let mid = 0.5 * (lo + hi);
            if mass(mid) > 1.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        x.iter().map(|&v| (v - lo).max(0.0)).collect()
    }

    #[test]
    fn kl_without_floor_is_normalization() {
        let x = Vector::from(vec![2.0, 6.0]);
        let p = project(&x, Distance::KL, 0.0, None);
        assert_eq!(p.as_slice(), &[0.25, 0.75]);
    }

    #[test]
    fn kl_result_is_a_distribution() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            let width = rng.random_range(1..=10);
            let x = Vector::from(
                (0..width)
                    .map(|_| rng.random_range(0.0..10.0))
                    .collect::<Vec<_>>(),
            );
            let p = project(&x, Distance::KL, 0.0, None);
            assert!(p.iter().all(|v| v >= 0.0));
            assert!((p.sum() - 1.0).abs() < 1e-9, "sum = {}", p.sum());
        }
    }

    #[test]
    fn kl_floor_mixes_toward_mu() {
        let x = Vector::from(vec![1.0, 0.0, 0.0]);
        let p = project(&x, Distance::KL, 0.3, None);
        assert!((p.get(0) - (0.7 + 0.1)).abs() < 1e-12);
        assert!((p.get(1) - 0.1).abs() < 1e-12);
        assert!((p.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn l2_matches_bisection_reference() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..200 {
            let width = rng.random_range(2..=10);
            let x = (0..width)
                .map(|_| rng.random_range(-5.0..5.0))
                .collect::<Vec<Utility>>();
            let got = project(&Vector::from(x.clone()), Distance::L2, 0.0, None);
            let want = bisected(&x);
            for (g, w) in got.iter().zip(want.iter()) {
                assert!((g - w).abs() < 1e-6, "{:?} vs {:?}", got, want);
            }
        }
    }

    #[test]
    fn l2_fixes_points_already_on_simplex() {
        let x = Vector::from(vec![0.2, 0.5, 0.3]);
        let p = project(&x, Distance::L2, 0.0, None);
        for (a, b) in p.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn l2_floor_keeps_mass_above_gamma_mu() {
        let x = Vector::from(vec![10.0, -10.0]);
        let p = project(&x, Distance::L2, 0.2, None);
        assert!(p.get(1) >= 0.1 - 1e-12);
        assert!((p.sum() - 1.0).abs() < 1e-9);
    }
}
