//! Collision probability over the combined hard-body disk.
//!
//! Two estimators share the B-plane geometry from [`crate::frames`]: an
//! adaptive polar quadrature of the bivariate normal density and a seeded
//! Monte-Carlo sampler of the 3-D combined position distribution. Numeric
//! trouble never raises; the result carries a `degraded` flag instead.

use nalgebra::{Cholesky, Matrix3, Matrix6, Vector3};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64Mcg;
use serde::Serialize;

use crate::constants::{DEFAULT_MC_SAMPLES, PC_QUADRATURE_REL_TOL};
use crate::error::{Result, ScreenError};
use crate::frames::{project_to_bplane, BPlane};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PcMethod {
    Foster,
    MonteCarlo,
}

#[derive(Debug, Clone, Serialize)]
pub struct PcResult {
    pub probability: f64,
    pub method: PcMethod,
    pub hard_body_radius_m: f64,
    pub mahalanobis: Option<f64>,
    pub samples: Option<usize>,
    /// Set when the covariance was ill-conditioned and needed regularization;
    /// the probability is still usable but carries that caveat.
    pub degraded: bool,
}

/// Default seed for reproducible Monte-Carlo runs when the caller supplies none.
const DEFAULT_MC_SEED: u64 = 0x5eed_cab1e;

/// Estimates the probability of collision for two objects at TCA.
///
/// Positions in km, velocities in km/s, 6×6 covariances in km-based units and
/// already expressed in ECI (rotate RTN CDM covariance through
/// [`crate::frames::rtn_covariance_to_eci`] first). The hard-body radius is
/// the combined physical radius in meters.
#[allow(clippy::too_many_arguments)]
pub fn compute_pc(
    position1: &Vector3<f64>,
    velocity1: &Vector3<f64>,
    position2: &Vector3<f64>,
    velocity2: &Vector3<f64>,
    covariance1: &Matrix6<f64>,
    covariance2: &Matrix6<f64>,
    hard_body_radius_m: f64,
    method: PcMethod,
    mc_samples: Option<usize>,
    seed: Option<u64>,
) -> Result<PcResult> {
    if !hard_body_radius_m.is_finite() || hard_body_radius_m < 0.0 {
        return Err(ScreenError::Usage(format!(
            "hard-body radius must be non-negative, got {hard_body_radius_m}"
        )));
    }
    let samples = mc_samples.unwrap_or(DEFAULT_MC_SAMPLES);
    if method == PcMethod::MonteCarlo && samples == 0 {
        return Err(ScreenError::Usage(
            "Monte-Carlo sample count must be positive".to_string(),
        ));
    }

    let combined: Matrix3<f64> = covariance1.fixed_view::<3, 3>(0, 0).into_owned()
        + covariance2.fixed_view::<3, 3>(0, 0).into_owned();
    let plane = project_to_bplane(position1, velocity1, position2, velocity2, &combined);
    if plane.regularized {
        tracing::warn!(
            "Combined covariance is near-singular; collision probability is degraded"
        );
    }
    let radius_km = hard_body_radius_m / 1000.0;

    let (probability, samples_used, degraded) = match method {
        PcMethod::Foster => {
            let (pc, bad) = foster_pc(&plane, radius_km);
            (pc, None, bad)
        }
        PcMethod::MonteCarlo => {
            let rel_pos = position1 - position2;
            let (pc, bad) = monte_carlo_pc(
                &rel_pos,
                &combined,
                &plane,
                radius_km,
                samples,
                seed.unwrap_or(DEFAULT_MC_SEED),
            );
            (pc, Some(samples), bad)
        }
    };

    Ok(PcResult {
        probability,
        method,
        hard_body_radius_m,
        mahalanobis: Some(plane.mahalanobis),
        samples: samples_used,
        degraded: degraded || plane.regularized,
    })
}

/// Integrates the bivariate normal density over the hard-body disk in polar
/// coordinates with adaptive Simpson quadrature.
fn foster_pc(plane: &BPlane, radius_km: f64) -> (f64, bool) {
    if radius_km == 0.0 {
        return (0.0, false);
    }
    let Some(inverse) = plane.covariance.try_inverse() else {
        return (0.0, true);
    };
    let determinant = plane.covariance.determinant();
    if determinant <= 0.0 {
        return (0.0, true);
    }
    let norm = 1.0 / (2.0 * std::f64::consts::PI * determinant.sqrt());
    let (mx, my) = (plane.miss_km.x, plane.miss_km.y);

    let density = |x: f64, y: f64| {
        let dx = x - mx;
        let dy = y - my;
        let q = inverse[(0, 0)] * dx * dx
            + 2.0 * inverse[(0, 1)] * dx * dy
            + inverse[(1, 1)] * dy * dy;
        norm * (-0.5 * q).exp()
    };

    let ring = |rho: f64| {
        rho * adaptive_simpson(
            &|theta: f64| density(rho * theta.cos(), rho * theta.sin()),
            0.0,
            2.0 * std::f64::consts::PI,
            PC_QUADRATURE_REL_TOL * 0.1,
        )
    };

    let pc = adaptive_simpson(&ring, 0.0, radius_km, PC_QUADRATURE_REL_TOL);
    (pc.clamp(0.0, 1.0), false)
}

/// Samples the 3-D combined position normal centered at the relative
/// position, projects each draw onto the encounter plane and counts hits
/// inside the hard-body disk.
fn monte_carlo_pc(
    rel_pos: &Vector3<f64>,
    combined: &Matrix3<f64>,
    plane: &BPlane,
    radius_km: f64,
    samples: usize,
    seed: u64,
) -> (f64, bool) {
    let mut degraded = false;
    let factor = Cholesky::new(*combined).or_else(|| {
        degraded = true;
        let epsilon = (combined.trace() * 1e-9).max(1e-30);
        Cholesky::new(combined + Matrix3::identity() * epsilon)
    });

    let Some(factor) = factor else {
        // distribution collapsed to a point
        let in_plane = Vector3::new(rel_pos.dot(&plane.x_axis), rel_pos.dot(&plane.y_axis), 0.0);
        let hit = in_plane.norm() <= radius_km;
        return (if hit { 1.0 } else { 0.0 }, true);
    };

    let lower = factor.l();
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut hits = 0usize;
    for _ in 0..samples {
        let z = Vector3::new(
            rng.sample::<f64, _>(StandardNormal),
            rng.sample::<f64, _>(StandardNormal),
            rng.sample::<f64, _>(StandardNormal),
        );
        let sample = rel_pos + lower * z;
        let x = sample.dot(&plane.x_axis);
        let y = sample.dot(&plane.y_axis);
        if (x * x + y * y).sqrt() <= radius_km {
            hits += 1;
        }
    }

    (hits as f64 / samples as f64, degraded)
}

fn adaptive_simpson(f: &dyn Fn(f64) -> f64, a: f64, b: f64, rel_tol: f64) -> f64 {
    let fa = f(a);
    let fm = f(0.5 * (a + b));
    let fb = f(b);
    let whole = (b - a) / 6.0 * (fa + 4.0 * fm + fb);
    simpson_step(f, a, b, fa, fm, fb, whole, rel_tol, 24)
}

#[allow(clippy::too_many_arguments)]
fn simpson_step(
    f: &dyn Fn(f64) -> f64,
    a: f64,
    b: f64,
    fa: f64,
    fm: f64,
    fb: f64,
    whole: f64,
    rel_tol: f64,
    depth: u32,
) -> f64 {
    let m = 0.5 * (a + b);
    let lm = 0.5 * (a + m);
    let rm = 0.5 * (m + b);
    let flm = f(lm);
    let frm = f(rm);
    let left = (m - a) / 6.0 * (fa + 4.0 * flm + fm);
    let right = (b - m) / 6.0 * (fm + 4.0 * frm + fb);
    let refined = left + right;
    if depth == 0 || (refined - whole).abs() <= 15.0 * rel_tol * refined.abs() {
        refined + (refined - whole) / 15.0
    } else {
        simpson_step(f, a, m, fa, flm, fm, left, rel_tol, depth - 1)
            + simpson_step(f, m, b, fm, frm, fb, right, rel_tol, depth - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn simpson_integrates_polynomials_exactly() {
        let cubic = |x: f64| x * x * x - 2.0 * x + 1.0;
        let got = adaptive_simpson(&cubic, 0.0, 2.0, 1e-10);
        assert_relative_eq!(got, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn centered_isotropic_disk_matches_closed_form() {
        // For a centered isotropic normal, Pc = 1 - exp(-R²/(2σ²)).
        let sigma2 = 0.0098;
        let plane = BPlane {
            covariance: nalgebra::Matrix2::identity() * sigma2,
            miss_km: Vector2::zeros(),
            mahalanobis: 0.0,
            x_axis: Vector3::x(),
            y_axis: Vector3::y(),
            regularized: false,
        };
        let radius = 0.02;
        let (pc, degraded) = foster_pc(&plane, radius);
        assert!(!degraded);
        let expected = 1.0 - (-radius * radius / (2.0 * sigma2)).exp();
        assert_relative_eq!(pc, expected, max_relative = 1e-5);
    }

    #[test]
    fn zero_radius_gives_zero_probability() {
        let plane = BPlane {
            covariance: nalgebra::Matrix2::identity(),
            miss_km: Vector2::new(1.0, 0.0),
            mahalanobis: 1.0,
            x_axis: Vector3::x(),
            y_axis: Vector3::y(),
            regularized: false,
        };
        assert_eq!(foster_pc(&plane, 0.0).0, 0.0);
    }
}
