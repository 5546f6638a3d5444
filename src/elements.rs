//! Element sets and catalog parsing.
//!
//! An [`ElementSet`] is an immutable record of one object's mean orbital
//! elements with the SGP4 constants precomputed at construction, so screening
//! loops never pay the initialization cost per step. The precomputed handle
//! is plain read-only data after construction and safe to share across
//! threads.

use chrono::{DateTime, TimeZone, Utc};

use crate::constants::{EARTH_RADIUS_KM, MU_EARTH_KM3_S2};
use crate::error::{Result, ScreenError};

/// Mean orbital elements for one tracked object, plus the propagator handle
/// bound at construction. Never mutated after parse.
pub struct ElementSet {
    pub norad_id: u64,
    pub international_designator: String,
    pub name: String,
    /// Element epoch, always UTC.
    pub epoch: DateTime<Utc>,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub eccentricity: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    /// Mean motion in revolutions per day.
    pub mean_motion_rev_day: f64,
    /// B* drag term (1/Earth radii).
    pub drag_term: f64,
    pub(crate) elements: sgp4::Elements,
    pub(crate) constants: sgp4::Constants,
}

impl std::fmt::Debug for ElementSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementSet")
            .field("norad_id", &self.norad_id)
            .field("name", &self.name)
            .field("epoch", &self.epoch)
            .field("eccentricity", &self.eccentricity)
            .field("mean_motion_rev_day", &self.mean_motion_rev_day)
            .finish_non_exhaustive()
    }
}

impl ElementSet {
    /// Builds an element set from one TLE line pair. The optional name line
    /// (three-line form) is carried through verbatim.
    pub fn from_tle(name: Option<String>, line1: &str, line2: &str) -> Result<Self> {
        let elements = sgp4::Elements::from_tle(name, line1.as_bytes(), line2.as_bytes())
            .map_err(|err| ScreenError::ElementsParse {
                location: "TLE pair".to_string(),
                reason: err.to_string(),
            })?;
        Self::from_elements(elements)
    }

    /// Builds an element set from already-decoded SGP4 elements (TLE or OMM).
    pub fn from_elements(elements: sgp4::Elements) -> Result<Self> {
        if !(elements.mean_motion > 0.0) {
            return Err(ScreenError::ElementsParse {
                location: format!("object {}", elements.norad_id),
                reason: format!("non-positive mean motion {}", elements.mean_motion),
            });
        }
        if !(0.0..1.0).contains(&elements.eccentricity) {
            return Err(ScreenError::ElementsParse {
                location: format!("object {}", elements.norad_id),
                reason: format!("eccentricity {} outside [0, 1)", elements.eccentricity),
            });
        }

        let constants = sgp4::Constants::from_elements(&elements).map_err(|err| {
            ScreenError::ElementsParse {
                location: format!("object {}", elements.norad_id),
                reason: format!("SGP4 init failed: {err}"),
            }
        })?;

        let name = elements
            .object_name
            .clone()
            .unwrap_or_else(|| format!("NORAD {}", elements.norad_id));

        Ok(Self {
            norad_id: elements.norad_id,
            international_designator: elements
                .international_designator
                .clone()
                .unwrap_or_default(),
            name,
            epoch: Utc.from_utc_datetime(&elements.datetime),
            inclination_deg: elements.inclination.rem_euclid(360.0),
            raan_deg: elements.right_ascension.rem_euclid(360.0),
            eccentricity: elements.eccentricity,
            arg_perigee_deg: elements.argument_of_perigee.rem_euclid(360.0),
            mean_anomaly_deg: elements.mean_anomaly.rem_euclid(360.0),
            mean_motion_rev_day: elements.mean_motion,
            drag_term: elements.drag_term,
            elements,
            constants,
        })
    }

    /// Semi-major axis from the mean motion, a = (μ / n²)^(1/3) with n in rad/s.
    pub fn semi_major_axis_km(&self) -> f64 {
        let n_rad_s = self.mean_motion_rev_day * 2.0 * std::f64::consts::PI / 86_400.0;
        (MU_EARTH_KM3_S2 / (n_rad_s * n_rad_s)).cbrt()
    }

    /// Apogee altitude above the equatorial radius (km).
    pub fn apogee_altitude_km(&self) -> f64 {
        self.semi_major_axis_km() * (1.0 + self.eccentricity) - EARTH_RADIUS_KM
    }

    /// Perigee altitude above the equatorial radius (km).
    pub fn perigee_altitude_km(&self) -> f64 {
        self.semi_major_axis_km() * (1.0 - self.eccentricity) - EARTH_RADIUS_KM
    }

    /// Age of this element set at `reference`, in days. Negative when the
    /// epoch lies in the future.
    pub fn epoch_age_days(&self, reference: DateTime<Utc>) -> f64 {
        (reference - self.epoch).num_milliseconds() as f64 / 86_400_000.0
    }
}

/// Parses a text stream of two- or three-line element sets.
///
/// Lines that do not form a parsable TLE pair are skipped; one WARNING with
/// the skip count is emitted per call.
pub fn parse_tle_catalog(text: &str) -> Vec<ElementSet> {
    let lines: Vec<&str> = text
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();

    let mut catalog = Vec::new();
    let mut skipped = 0usize;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.starts_with("1 ") && line.len() >= 69 && i + 1 < lines.len() {
            let line2 = lines[i + 1];
            if line2.starts_with("2 ") && line2.len() >= 69 {
                let name = if i > 0
                    && !lines[i - 1].starts_with("1 ")
                    && !lines[i - 1].starts_with("2 ")
                {
                    Some(lines[i - 1].to_string())
                } else {
                    None
                };
                match ElementSet::from_tle(name, line, line2) {
                    Ok(element) => catalog.push(element),
                    Err(err) => {
                        tracing::debug!("Skipping TLE pair: {}", err);
                        skipped += 1;
                    }
                }
                i += 2;
                continue;
            }
        }
        i += 1;
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} unparsable TLE pairs in catalog input", skipped);
    }
    tracing::info!("Parsed {} element sets from catalog input", catalog.len());
    catalog
}

/// Parses a Celestrak-style OMM JSON array into element sets. Individual
/// records that fail SGP4 initialization are skipped with a WARNING.
pub fn parse_omm_json(text: &str) -> Result<Vec<ElementSet>> {
    let records: Vec<sgp4::Elements> =
        serde_json::from_str(text).map_err(|err| ScreenError::ElementsParse {
            location: "OMM JSON".to_string(),
            reason: err.to_string(),
        })?;

    let total = records.len();
    let mut catalog = Vec::new();
    for elements in records {
        match ElementSet::from_elements(elements) {
            Ok(element) => catalog.push(element),
            Err(err) => tracing::warn!("Skipping OMM record: {}", err),
        }
    }
    if catalog.len() < total {
        tracing::warn!("Dropped {} of {} OMM records", total - catalog.len(), total);
    }
    Ok(catalog)
}
