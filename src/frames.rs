//! Covariance frames and B-plane projection.
//!
//! RTN-frame CDM covariances are rotated into ECI here before they ever
//! reach the probability engine; the combined position covariance is then
//! projected into the encounter plane perpendicular to the relative velocity
//! at TCA.

use nalgebra::{Matrix2, Matrix2x3, Matrix3, Matrix6, Vector2, Vector3};

use crate::constants::ENCOUNTER_VELOCITY_FLOOR_KM_S;
use crate::error::{Result, ScreenError};

/// Rotation matrix from ECI to the RTN frame of the object with this state.
/// Rows are R̂, T̂, N̂ expressed in ECI.
pub fn rtn_rotation(position: &Vector3<f64>, velocity: &Vector3<f64>) -> Result<Matrix3<f64>> {
    let normal = position.cross(velocity);
    if position.norm() < 1e-9 || normal.norm() < 1e-9 {
        return Err(ScreenError::Numeric(
            "cannot build an RTN frame from a degenerate state".to_string(),
        ));
    }
    let r_hat = position.normalize();
    let n_hat = normal.normalize();
    let t_hat = n_hat.cross(&r_hat);
    Ok(Matrix3::from_rows(&[
        r_hat.transpose(),
        t_hat.transpose(),
        n_hat.transpose(),
    ]))
}

/// Rotates a 6×6 RTN covariance into ECI using the object's ECI state.
/// The 6×6 rotation is block-diagonal diag(M, M) with M = [R̂, T̂, N̂]ᵀ.
pub fn rtn_covariance_to_eci(
    covariance_rtn: &Matrix6<f64>,
    position: &Vector3<f64>,
    velocity: &Vector3<f64>,
) -> Result<Matrix6<f64>> {
    let m = rtn_rotation(position, velocity)?;
    let mut rotation = Matrix6::zeros();
    rotation.fixed_view_mut::<3, 3>(0, 0).copy_from(&m);
    rotation.fixed_view_mut::<3, 3>(3, 3).copy_from(&m);
    Ok(rotation.transpose() * covariance_rtn * rotation)
}

/// Combined covariance and miss vector projected into the encounter plane.
#[derive(Debug, Clone)]
pub struct BPlane {
    /// 2×2 projected position covariance (km²).
    pub covariance: Matrix2<f64>,
    /// Projected miss vector (km).
    pub miss_km: Vector2<f64>,
    /// √(mᵀ Σ⁻¹ m) for the projected miss.
    pub mahalanobis: f64,
    /// In-plane axes expressed in ECI.
    pub x_axis: Vector3<f64>,
    pub y_axis: Vector3<f64>,
    /// Set when the projected covariance needed ε·trace regularization.
    pub regularized: bool,
}

/// Some unit vector perpendicular to `v`.
fn orthogonal_unit(v: &Vector3<f64>) -> Vector3<f64> {
    let pick = if v.x.abs() <= v.y.abs() && v.x.abs() <= v.z.abs() {
        Vector3::x()
    } else if v.y.abs() <= v.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    v.cross(&pick).normalize()
}

/// Projects the combined 3×3 position covariance into the plane
/// perpendicular to the relative velocity at TCA.
///
/// The encounter frame puts x̂ along the relative position projected
/// perpendicular to v_r, ẑ along v_r and ŷ = ẑ × x̂. Degenerate geometry
/// (relative speed under the floor, or a miss vector parallel to v_r) keeps
/// x̂ along the relative position so the projected miss stays meaningful.
pub fn project_to_bplane(
    position1: &Vector3<f64>,
    velocity1: &Vector3<f64>,
    position2: &Vector3<f64>,
    velocity2: &Vector3<f64>,
    combined_covariance: &Matrix3<f64>,
) -> BPlane {
    let rel_r = position1 - position2;
    let rel_v = velocity1 - velocity2;

    let (x_axis, y_axis) = if rel_v.norm() < ENCOUNTER_VELOCITY_FLOOR_KM_S {
        let x = if rel_r.norm() > 0.0 {
            rel_r.normalize()
        } else {
            Vector3::x()
        };
        let z = orthogonal_unit(&x);
        (x, z.cross(&x))
    } else {
        let z = rel_v.normalize();
        let in_plane = rel_r - z * rel_r.dot(&z);
        let x = if in_plane.norm() > 1e-9 {
            in_plane.normalize()
        } else {
            orthogonal_unit(&z)
        };
        (x, z.cross(&x))
    };

    let projection = Matrix2x3::from_rows(&[x_axis.transpose(), y_axis.transpose()]);
    let mut covariance = projection * combined_covariance * projection.transpose();
    let miss_km = Vector2::new(rel_r.dot(&x_axis), rel_r.dot(&y_axis));

    let mut regularized = false;
    let trace = covariance.trace();
    if covariance.determinant() <= trace * trace * 1e-12 {
        let epsilon = (trace * 1e-9).max(1e-30);
        covariance += Matrix2::identity() * epsilon;
        regularized = true;
    }

    let mahalanobis = covariance
        .try_inverse()
        .map(|inv| (miss_km.transpose() * inv * miss_km)[(0, 0)].max(0.0).sqrt())
        .unwrap_or(f64::INFINITY);

    BPlane {
        covariance,
        miss_km,
        mahalanobis,
        x_axis,
        y_axis,
        regularized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rtn_rotation_is_orthonormal() {
        let r = Vector3::new(6778.0, 120.0, -45.0);
        let v = Vector3::new(0.1, 7.2, 2.1);
        let m = rtn_rotation(&r, &v).unwrap();
        let identity = m * m.transpose();
        assert_relative_eq!(identity, Matrix3::identity(), epsilon = 1e-12);
        // R̂ row reproduces the unit position vector
        assert_relative_eq!(m.row(0).transpose(), r.normalize(), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_state_cannot_define_a_frame() {
        let r = Vector3::new(7000.0, 0.0, 0.0);
        // velocity parallel to position leaves the orbit normal undefined
        assert!(rtn_rotation(&r, &(r * 0.001)).is_err());
        assert!(rtn_rotation(&Vector3::zeros(), &Vector3::y()).is_err());
    }

    #[test]
    fn diagonal_rtn_covariance_keeps_trace_through_rotation() {
        let r = Vector3::new(7000.0, 0.0, 0.0);
        let v = Vector3::new(0.0, 7.5, 0.0);
        let mut cov = Matrix6::zeros();
        for i in 0..6 {
            cov[(i, i)] = (i + 1) as f64;
        }
        let rotated = rtn_covariance_to_eci(&cov, &r, &v).unwrap();
        assert_relative_eq!(rotated.trace(), cov.trace(), epsilon = 1e-9);
        assert_relative_eq!(rotated, rotated.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn perpendicular_crossing_projects_full_miss() {
        // radial miss, along-track relative velocity
        let p1 = Vector3::new(7001.0, 0.0, 0.0);
        let p2 = Vector3::new(7000.0, 0.0, 0.0);
        let v1 = Vector3::new(0.0, 7.5, 0.0);
        let v2 = Vector3::new(0.0, -7.5, 0.0);
        let cov = Matrix3::identity() * 0.01;
        let plane = project_to_bplane(&p1, &v1, &p2, &v2, &cov);
        assert_relative_eq!(plane.miss_km.norm(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(plane.mahalanobis, 10.0, epsilon = 1e-6);
        assert!(!plane.regularized);
    }

    #[test]
    fn along_track_miss_projects_out_of_plane() {
        // miss parallel to the relative velocity drops out of the encounter plane
        let p1 = Vector3::new(7000.0, 0.5, 0.0);
        let p2 = Vector3::new(7000.0, 0.0, 0.0);
        let v1 = Vector3::new(0.0, 7.501, 0.0);
        let v2 = Vector3::new(0.0, 7.5, 0.0);
        let cov = Matrix3::identity() * 0.01;
        let plane = project_to_bplane(&p1, &v1, &p2, &v2, &cov);
        assert!(plane.miss_km.norm() < 1e-9);
        assert!(plane.mahalanobis < 1e-6);
    }

    #[test]
    fn singular_covariance_is_regularized() {
        let p1 = Vector3::new(7000.0, 1.0, 0.0);
        let p2 = Vector3::new(7000.0, 0.0, 0.0);
        let v1 = Vector3::new(7.0, 0.0, 0.0);
        let v2 = Vector3::new(-7.0, 0.0, 0.0);
        let plane = project_to_bplane(&p1, &v1, &p2, &v2, &Matrix3::zeros());
        assert!(plane.regularized);
        assert!(plane.mahalanobis.is_finite());
    }
}
