//! All-on-all catalog screening.
//!
//! Instead of a per-primary candidate list, each coarse step batch-propagates
//! the whole catalog and asks a k-d tree for every pair inside the threshold.
//! Pairs then flow through the same window merging, refinement and dedup as
//! the primary screener.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::constants::{DEFAULT_CATALOG_HOURS, DEFAULT_STEP_MINUTES, DEFAULT_THRESHOLD_KM};
use crate::elements::ElementSet;
use crate::error::Result;
use crate::kdtree::KdTree;
use crate::propagation::propagate_batch;
use crate::screening::{dedup_and_sort, ensure_positive, push_window, refine_window, ConjunctionEvent};

/// Parameters for [`screen_catalog`]. `max_tle_age_days = None` disables the
/// stale-element filter; `reference_time = None` anchors at the current UTC
/// instant.
#[derive(Debug, Clone)]
pub struct CatalogScreenConfig {
    pub hours: f64,
    pub step_minutes: f64,
    pub threshold_km: f64,
    pub max_tle_age_days: Option<f64>,
    pub reference_time: Option<DateTime<Utc>>,
}

impl Default for CatalogScreenConfig {
    fn default() -> Self {
        Self {
            hours: DEFAULT_CATALOG_HOURS,
            step_minutes: DEFAULT_STEP_MINUTES,
            threshold_km: DEFAULT_THRESHOLD_KM,
            max_tle_age_days: None,
            reference_time: None,
        }
    }
}

/// Screens every catalog object against every other over a forward window.
///
/// Returns refined [`ConjunctionEvent`]s sorted by miss distance ascending,
/// with the lower catalog number of each pair reported as the primary.
pub fn screen_catalog(
    catalog: &[ElementSet],
    config: &CatalogScreenConfig,
) -> Result<Vec<ConjunctionEvent>> {
    ensure_positive("hours", config.hours)?;
    ensure_positive("threshold_km", config.threshold_km)?;
    ensure_positive("step_minutes", config.step_minutes)?;
    if let Some(max_age) = config.max_tle_age_days {
        ensure_positive("max_tle_age_days", max_age)?;
    }

    let t0 = config.reference_time.unwrap_or_else(Utc::now);

    let roster: Vec<&ElementSet> = match config.max_tle_age_days {
        Some(max_age) => {
            let fresh: Vec<&ElementSet> = catalog
                .iter()
                .filter(|element| element.epoch_age_days(t0) <= max_age)
                .collect();
            let stale = catalog.len() - fresh.len();
            if stale > 0 {
                tracing::warn!(
                    "Excluding {} element sets older than {:.1} days from catalog screening",
                    stale,
                    max_age
                );
            }
            fresh
        }
        None => catalog.iter().collect(),
    };

    tracing::info!(
        "Catalog screening {} objects over {:.2} h at {:.1} min cadence, threshold {:.1} km",
        roster.len(),
        config.hours,
        config.step_minutes,
        config.threshold_km
    );
    if roster.len() < 2 {
        return Ok(Vec::new());
    }

    let window = Duration::milliseconds((config.hours * 3_600_000.0).round() as i64);
    let step = Duration::milliseconds((config.step_minutes * 60_000.0).round() as i64);
    let t_end = t0 + window;
    let steps = window.num_milliseconds() / step.num_milliseconds();

    let mut windows: BTreeMap<(usize, usize), Vec<(DateTime<Utc>, DateTime<Utc>)>> =
        BTreeMap::new();

    for k in 0..=steps {
        let tk = t0 + step * (k as i32);
        let (states, valid) = propagate_batch(&roster, tk);
        let points = (0..roster.len())
            .filter(|&i| valid[i])
            .map(|i| {
                (
                    i,
                    nalgebra::Vector3::new(states[(i, 0)], states[(i, 1)], states[(i, 2)]),
                )
            })
            .collect();
        let tree = KdTree::build(points);
        for (i, j) in tree.close_pairs(config.threshold_km) {
            let w_start = if k == 0 { t0 } else { tk - step };
            let w_end = (tk + step).min(t_end);
            push_window(windows.entry((i, j)).or_default(), w_start, w_end);
        }
    }

    let mut events = Vec::new();
    for ((i, j), spans) in &windows {
        // report the lower catalog number as the primary
        let (first, second) = if roster[*i].norad_id <= roster[*j].norad_id {
            (*i, *j)
        } else {
            (*j, *i)
        };
        for &(w_start, w_end) in spans {
            match refine_window(roster[first], roster[second], w_start, w_end) {
                Ok(event) => events.push(event),
                Err(err) => tracing::warn!(
                    "Dropping pair {} / {} after refinement failure: {}",
                    roster[first].norad_id,
                    roster[second].norad_id,
                    err
                ),
            }
        }
    }

    let events = dedup_and_sort(events);
    tracing::info!(
        "Catalog screening finished with {} conjunction events",
        events.len()
    );
    Ok(events)
}
