//! SGP4 propagation entry points.
//!
//! Two shapes: one object at many instants ([`propagate_one`]) and many
//! objects at a single instant ([`propagate_batch`]). The batch form backs
//! the coarse sweep, never fails as a call, and reports per-object validity
//! instead.

use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, Vector3};

use crate::elements::ElementSet;
use crate::error::{Result, ScreenError};

/// Position/velocity in the TEME frame at one instant.
#[derive(Debug, Clone, Copy)]
pub struct State {
    /// km
    pub position: Vector3<f64>,
    /// km/s
    pub velocity: Vector3<f64>,
    pub epoch: DateTime<Utc>,
}

impl ElementSet {
    /// Propagates this object to `time` with a single direct SGP4 call.
    pub fn state_at(&self, time: DateTime<Utc>) -> Result<State> {
        let minutes = self
            .elements
            .datetime_to_minutes_since_epoch(&time.naive_utc())
            .map_err(|err| ScreenError::Propagation {
                norad_id: self.norad_id,
                instant: time,
                reason: err.to_string(),
            })?;
        let prediction =
            self.constants
                .propagate(minutes)
                .map_err(|err| ScreenError::Propagation {
                    norad_id: self.norad_id,
                    instant: time,
                    reason: err.to_string(),
                })?;

        Ok(State {
            position: Vector3::new(
                prediction.position[0],
                prediction.position[1],
                prediction.position[2],
            ),
            velocity: Vector3::new(
                prediction.velocity[0],
                prediction.velocity[1],
                prediction.velocity[2],
            ),
            epoch: time,
        })
    }
}

/// Propagates one object to each requested instant. Fails on the first
/// instant the analytic model rejects, naming that instant.
pub fn propagate_one(element: &ElementSet, times: &[DateTime<Utc>]) -> Result<Vec<State>> {
    times.iter().map(|&t| element.state_at(t)).collect()
}

/// Propagates every object to one instant.
///
/// Returns an N×6 matrix (columns x, y, z, vx, vy, vz in km and km/s) and a
/// validity mask. A failed row leaves the matrix row zeroed with
/// `valid[i] = false`; the call itself never fails.
pub fn propagate_batch(
    elements: &[&ElementSet],
    time: DateTime<Utc>,
) -> (DMatrix<f64>, Vec<bool>) {
    let n = elements.len();
    let mut states = DMatrix::zeros(n, 6);
    let mut valid = vec![false; n];

    for (i, element) in elements.iter().enumerate() {
        match element.state_at(time) {
            Ok(state) => {
                states[(i, 0)] = state.position.x;
                states[(i, 1)] = state.position.y;
                states[(i, 2)] = state.position.z;
                states[(i, 3)] = state.velocity.x;
                states[(i, 4)] = state.velocity.y;
                states[(i, 5)] = state.velocity.z;
                valid[i] = true;
            }
            Err(err) => {
                tracing::debug!("Batch propagation dropped object {}: {}", element.norad_id, err);
            }
        }
    }

    (states, valid)
}
