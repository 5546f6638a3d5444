//! Property-based checks on propagation and element-set parsing.

mod common;

use chrono::Duration;
use proptest::prelude::*;
use sat_screen::{parse_omm_json, parse_tle_catalog, propagate_batch, propagate_one};

proptest! {
    // batch and single propagation must agree wherever both are valid
    #[test]
    fn batch_matches_single_propagation(offset_s in -86_400.0f64..86_400.0) {
        let element = common::iss_like(25544, 280.894);
        let t = common::epoch() + Duration::milliseconds((offset_s * 1000.0) as i64);

        let (states, valid) = propagate_batch(&[&element], t);
        prop_assume!(valid[0]);
        let single = element.state_at(t).unwrap();

        prop_assert!((states[(0, 0)] - single.position.x).abs() < 1e-6);
        prop_assert!((states[(0, 1)] - single.position.y).abs() < 1e-6);
        prop_assert!((states[(0, 2)] - single.position.z).abs() < 1e-6);
        prop_assert!((states[(0, 3)] - single.velocity.x).abs() < 1e-9);
        prop_assert!((states[(0, 4)] - single.velocity.y).abs() < 1e-9);
        prop_assert!((states[(0, 5)] - single.velocity.z).abs() < 1e-9);
    }

    #[test]
    fn propagated_radius_stays_near_the_shell(offset_s in -43_200.0f64..43_200.0) {
        let element = common::iss_like(25544, 280.894);
        let t = common::epoch() + Duration::milliseconds((offset_s * 1000.0) as i64);
        prop_assume!(element.state_at(t).is_ok());
        let state = element.state_at(t).unwrap();
        let altitude = state.position.norm() - 6378.137;
        // mean-element shell padded for short-period variations
        prop_assert!(altitude > 380.0 && altitude < 470.0, "altitude {altitude}");
    }
}

#[test]
fn iss_like_shell_sits_in_low_leo() {
    let element = common::iss_like(25544, 280.894);
    let apogee = element.apogee_altitude_km();
    let perigee = element.perigee_altitude_km();
    assert!(perigee > 400.0 && perigee < 450.0, "perigee {perigee}");
    assert!(apogee > 400.0 && apogee < 450.0, "apogee {apogee}");
    assert!(apogee >= perigee);
}

#[test]
fn propagate_one_reports_every_instant() {
    let element = common::iss_like(25544, 280.894);
    let times: Vec<_> = (0..10)
        .map(|k| common::epoch() + Duration::minutes(10 * k))
        .collect();
    let states = propagate_one(&element, &times).unwrap();
    assert_eq!(states.len(), times.len());
    for (state, time) in states.iter().zip(&times) {
        assert_eq!(state.epoch, *time);
        assert!(state.position.iter().all(|c| c.is_finite()));
    }
}

#[test]
fn catalog_parsing_skips_junk_and_keeps_names() {
    let line1 = common::tle_line1(25544);
    let line2 = common::tle_line2(25544, 51.64, 208.9163, "0000001", 69.9862, 280.894, 15.5);
    let text = format!(
        "stray header\nISS (ZARYA)\n{line1}\n{line2}\nnot a tle at all\n"
    );
    let catalog = parse_tle_catalog(&text);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].norad_id, 25544);
    assert_eq!(catalog[0].name, "ISS (ZARYA)");
    assert_eq!(catalog[0].epoch, common::epoch());
}

#[test]
fn empty_input_parses_to_an_empty_catalog() {
    assert!(parse_tle_catalog("").is_empty());
    assert!(parse_tle_catalog("\n\n  \n").is_empty());
}

#[test]
fn omm_records_parse_with_canonicalized_angles() {
    let json = r#"[{
        "OBJECT_NAME": "ISS (ZARYA)",
        "OBJECT_ID": "1998-067A",
        "EPOCH": "2024-01-01T12:00:00",
        "MEAN_MOTION": 15.5,
        "ECCENTRICITY": 0.0001,
        "INCLINATION": 51.64,
        "RA_OF_ASC_NODE": 208.9163,
        "ARG_OF_PERICENTER": 69.9862,
        "MEAN_ANOMALY": 380.894,
        "EPHEMERIS_TYPE": 0,
        "CLASSIFICATION_TYPE": "U",
        "NORAD_CAT_ID": 25544,
        "ELEMENT_SET_NO": 999,
        "REV_AT_EPOCH": 10000,
        "BSTAR": 0.0,
        "MEAN_MOTION_DOT": 0.0,
        "MEAN_MOTION_DDOT": 0.0
    }]"#;
    let catalog = parse_omm_json(json).unwrap();
    assert_eq!(catalog.len(), 1);
    let element = &catalog[0];
    assert_eq!(element.norad_id, 25544);
    assert_eq!(element.international_designator, "1998-067A");
    assert!((element.mean_anomaly_deg - 20.894).abs() < 1e-9);
    assert!(element.mean_anomaly_deg >= 0.0 && element.mean_anomaly_deg < 360.0);
}
