//! Shared fixtures: synthetic TLEs with valid checksums and known geometry.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sat_screen::ElementSet;

/// Epoch used by every fixture TLE: 2024-01-01T12:00:00Z (day 001.5).
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn checksum(body: &str) -> char {
    let sum: u32 = body
        .chars()
        .map(|c| match c {
            '0'..='9' => c.to_digit(10).unwrap(),
            '-' => 1,
            _ => 0,
        })
        .sum();
    char::from_digit(sum % 10, 10).unwrap()
}

fn with_checksum(body: String) -> String {
    assert_eq!(body.len(), 68, "TLE body must be 68 columns: '{body}'");
    let digit = checksum(&body);
    format!("{body}{digit}")
}

pub fn tle_line1(norad: u64) -> String {
    with_checksum(format!(
        "1 {norad:05}U 98067A   24001.50000000  .00000000  00000-0  00000-0 0  999"
    ))
}

pub fn tle_line2(
    norad: u64,
    inclination: f64,
    raan: f64,
    ecc_field: &str,
    arg_perigee: f64,
    mean_anomaly: f64,
    mean_motion: f64,
) -> String {
    with_checksum(format!(
        "2 {norad:05} {inclination:8.4} {raan:8.4} {ecc_field} {arg_perigee:8.4} {mean_anomaly:8.4} {mean_motion:11.8}{:5}",
        10
    ))
}

pub fn element(
    norad: u64,
    inclination: f64,
    raan: f64,
    ecc_field: &str,
    arg_perigee: f64,
    mean_anomaly: f64,
    mean_motion: f64,
) -> ElementSet {
    ElementSet::from_tle(
        None,
        &tle_line1(norad),
        &tle_line2(norad, inclination, raan, ecc_field, arg_perigee, mean_anomaly, mean_motion),
    )
    .expect("fixture TLE must parse")
}

/// ISS-like near-circular orbit at roughly 420 km, with a configurable
/// catalog number and mean anomaly so tests can fabricate co-orbital twins.
pub fn iss_like(norad: u64, mean_anomaly: f64) -> ElementSet {
    element(norad, 51.64, 208.9163, "0000001", 69.9862, mean_anomaly, 15.5)
}

/// Hubble-like orbit near 540 km.
pub fn hubble_like() -> ElementSet {
    element(20580, 28.47, 41.86, "0002500", 120.0, 15.0, 15.09)
}

/// Geostationary object.
pub fn geo_like() -> ElementSet {
    element(19548, 0.01, 75.0, "0001000", 0.0, 0.0, 1.0027)
}

pub fn init_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
