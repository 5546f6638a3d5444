//! Physical constants and screening defaults.
//!
//! Every subsystem pulls these from here; nothing else hardcodes them.

/// Earth gravitational parameter GM (km³/s²), WGS-84.
pub const MU_EARTH_KM3_S2: f64 = 398_600.4418;

/// Earth equatorial radius (km), WGS-84.
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Default forward window for primary-vs-catalog screening (days).
pub const DEFAULT_SCREEN_DAYS: f64 = 7.0;

/// Default forward window for all-on-all catalog screening (hours).
pub const DEFAULT_CATALOG_HOURS: f64 = 24.0;

/// Default miss-distance cutoff (km).
pub const DEFAULT_THRESHOLD_KM: f64 = 10.0;

/// Default coarse sweep cadence (minutes).
pub const DEFAULT_STEP_MINUTES: f64 = 10.0;

/// Refinement stops once the search bracket is narrower than this (seconds).
pub const TCA_BRACKET_S: f64 = 1.0;

/// Refined events for the same pair closer than this collapse into one (seconds).
pub const DEDUP_WINDOW_S: i64 = 300;

/// Default Monte-Carlo sample count for collision probability.
pub const DEFAULT_MC_SAMPLES: usize = 100_000;

/// Relative tolerance for the collision-probability quadrature.
pub const PC_QUADRATURE_REL_TOL: f64 = 1e-6;

/// Relative speeds under this floor (km/s) use the degenerate encounter basis.
pub const ENCOUNTER_VELOCITY_FLOOR_KM_S: f64 = 1e-6;
