//! Primary-vs-catalog conjunction screening.
//!
//! The pipeline narrows an N×M candidate space in stages: an apogee/perigee
//! shell filter, a coarse sweep that batch-propagates every surviving object
//! once per time step, and golden-section refinement of each candidate
//! window down to a one-second bracket. Refined events are deduplicated and
//! sorted by miss distance.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::constants::{
    DEDUP_WINDOW_S, DEFAULT_SCREEN_DAYS, DEFAULT_STEP_MINUTES, DEFAULT_THRESHOLD_KM,
    TCA_BRACKET_S,
};
use crate::elements::ElementSet;
use crate::error::{Result, ScreenError};
use crate::propagation::propagate_batch;

/// One refined close approach between a primary and a secondary object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConjunctionEvent {
    pub primary: u64,
    pub secondary: u64,
    pub tca: DateTime<Utc>,
    pub miss_distance_km: f64,
    pub relative_speed_km_s: f64,
}

/// Parameters for [`screen`]. `reference_time = None` anchors the window at
/// the current UTC instant.
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub days: f64,
    pub threshold_km: f64,
    pub step_minutes: f64,
    pub reference_time: Option<DateTime<Utc>>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            days: DEFAULT_SCREEN_DAYS,
            threshold_km: DEFAULT_THRESHOLD_KM,
            step_minutes: DEFAULT_STEP_MINUTES,
            reference_time: None,
        }
    }
}

pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ScreenError::Usage(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

/// Retains catalog objects whose τ-padded altitude shell overlaps the
/// primary's. The primary's own catalog number is always excluded.
pub fn prefilter<'a>(
    primary: &ElementSet,
    catalog: &'a [ElementSet],
    threshold_km: f64,
) -> Vec<&'a ElementSet> {
    let p_perigee = primary.perigee_altitude_km();
    let p_apogee = primary.apogee_altitude_km();
    catalog
        .iter()
        .filter(|candidate| candidate.norad_id != primary.norad_id)
        .filter(|candidate| {
            let lo = candidate.perigee_altitude_km() - threshold_km;
            let hi = candidate.apogee_altitude_km() + threshold_km;
            lo <= p_apogee + threshold_km && hi >= p_perigee - threshold_km
        })
        .collect()
}

/// Appends a candidate window, merging it with the previous one when they
/// touch. Windows arrive in time order, so only the tail needs checking.
pub(crate) fn push_window(
    spans: &mut Vec<(DateTime<Utc>, DateTime<Utc>)>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    if let Some(last) = spans.last_mut() {
        if start <= last.1 {
            if end > last.1 {
                last.1 = end;
            }
            return;
        }
    }
    spans.push((start, end));
}

/// Golden-section search for the minimum-distance instant inside one
/// candidate window. Each probe propagates both objects directly.
pub(crate) fn refine_window(
    primary: &ElementSet,
    secondary: &ElementSet,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<ConjunctionEvent> {
    let width = ((end - start).num_milliseconds() as f64 / 1000.0).max(0.0);
    let at = |offset_s: f64| start + Duration::milliseconds((offset_s * 1000.0).round() as i64);
    let distance_at = |offset_s: f64| -> Result<f64> {
        let a = primary.state_at(at(offset_s))?;
        let b = secondary.state_at(at(offset_s))?;
        Ok((a.position - b.position).norm())
    };

    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut lo = 0.0;
    let mut hi = width;
    let mut c = hi - inv_phi * (hi - lo);
    let mut d = lo + inv_phi * (hi - lo);
    let mut fc = distance_at(c)?;
    let mut fd = distance_at(d)?;
    while hi - lo > TCA_BRACKET_S {
        if fc <= fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - inv_phi * (hi - lo);
            fc = distance_at(c)?;
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + inv_phi * (hi - lo);
            fd = distance_at(d)?;
        }
    }

    let tca = at(0.5 * (lo + hi));
    let state_a = primary.state_at(tca)?;
    let state_b = secondary.state_at(tca)?;
    Ok(ConjunctionEvent {
        primary: primary.norad_id,
        secondary: secondary.norad_id,
        tca,
        miss_distance_km: (state_a.position - state_b.position).norm(),
        relative_speed_km_s: (state_a.velocity - state_b.velocity).norm(),
    })
}

/// Collapses refined events for the same ordered pair whose TCAs fall within
/// the dedup window (the smaller miss wins), then sorts by miss distance
/// ascending. Produces a new list; events are treated as values.
pub(crate) fn dedup_and_sort(mut events: Vec<ConjunctionEvent>) -> Vec<ConjunctionEvent> {
    events.sort_by(|a, b| {
        (a.primary, a.secondary, a.tca).cmp(&(b.primary, b.secondary, b.tca))
    });

    let mut reduced: Vec<ConjunctionEvent> = Vec::with_capacity(events.len());
    for event in events {
        if let Some(last) = reduced.last_mut() {
            if last.primary == event.primary
                && last.secondary == event.secondary
                && event.tca - last.tca <= Duration::seconds(DEDUP_WINDOW_S)
            {
                if event.miss_distance_km < last.miss_distance_km {
                    *last = event;
                }
                continue;
            }
        }
        reduced.push(event);
    }

    reduced.sort_by(|a, b| {
        a.miss_distance_km
            .partial_cmp(&b.miss_distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (a.primary, a.secondary, a.tca).cmp(&(b.primary, b.secondary, b.tca)))
    });
    reduced
}

fn intern<'b>(
    roster: &mut Vec<&'b ElementSet>,
    index_of: &mut HashMap<u64, usize>,
    element: &'b ElementSet,
) -> usize {
    *index_of.entry(element.norad_id).or_insert_with(|| {
        roster.push(element);
        roster.len() - 1
    })
}

/// Screens one or more primaries against a catalog over a forward window.
///
/// Returns refined [`ConjunctionEvent`]s sorted by miss distance ascending.
/// A propagation failure during refinement drops the affected pair with a
/// WARNING; it does not abort the run.
pub fn screen(
    primaries: &[ElementSet],
    catalog: &[ElementSet],
    config: &ScreenConfig,
) -> Result<Vec<ConjunctionEvent>> {
    if primaries.is_empty() {
        return Err(ScreenError::Usage(
            "at least one primary element set is required".to_string(),
        ));
    }
    ensure_positive("days", config.days)?;
    ensure_positive("threshold_km", config.threshold_km)?;
    ensure_positive("step_minutes", config.step_minutes)?;

    let t0 = config.reference_time.unwrap_or_else(Utc::now);
    let window = Duration::milliseconds((config.days * 86_400_000.0).round() as i64);
    let step = Duration::milliseconds((config.step_minutes * 60_000.0).round() as i64);
    let t_end = t0 + window;

    let mut roster: Vec<&ElementSet> = Vec::new();
    let mut index_of: HashMap<u64, usize> = HashMap::new();
    let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
    for primary in primaries {
        let pi = intern(&mut roster, &mut index_of, primary);
        for candidate in prefilter(primary, catalog, config.threshold_km) {
            let ci = intern(&mut roster, &mut index_of, candidate);
            if ci != pi {
                pairs.insert((pi, ci));
            }
        }
    }

    tracing::info!(
        "Screening {} primaries against {} catalog objects over {:.2} days: {} pairs survive the shell filter",
        primaries.len(),
        catalog.len(),
        config.days,
        pairs.len()
    );
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let steps = window.num_milliseconds() / step.num_milliseconds();
    let mut windows: BTreeMap<(usize, usize), Vec<(DateTime<Utc>, DateTime<Utc>)>> =
        BTreeMap::new();

    for k in 0..=steps {
        let tk = t0 + step * (k as i32);
        let (states, valid) = propagate_batch(&roster, tk);
        for &(pi, ci) in &pairs {
            if !valid[pi] || !valid[ci] {
                continue;
            }
            let dx = states[(pi, 0)] - states[(ci, 0)];
            let dy = states[(pi, 1)] - states[(ci, 1)];
            let dz = states[(pi, 2)] - states[(ci, 2)];
            let distance = (dx * dx + dy * dy + dz * dz).sqrt();
            if distance < config.threshold_km {
                let w_start = if k == 0 { t0 } else { tk - step };
                let w_end = (tk + step).min(t_end);
                push_window(windows.entry((pi, ci)).or_default(), w_start, w_end);
            }
        }
    }

    let mut events = Vec::new();
    for ((pi, ci), spans) in &windows {
        for &(w_start, w_end) in spans {
            match refine_window(roster[*pi], roster[*ci], w_start, w_end) {
                Ok(event) => events.push(event),
                Err(err) => tracing::warn!(
                    "Dropping pair {} / {} after refinement failure: {}",
                    roster[*pi].norad_id,
                    roster[*ci].norad_id,
                    err
                ),
            }
        }
    }

    let events = dedup_and_sort(events);
    tracing::info!("Screening finished with {} conjunction events", events.len());
    Ok(events)
}
