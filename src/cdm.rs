//! CCSDS 508.0-B-1 Conjunction Data Message reader.
//!
//! Both encodings are supported: key-value notation and XML. The reader is
//! tolerant: unknown fields are preserved in a side dictionary, unit
//! brackets are stripped, and namespaced XML is matched by local element
//! name. Malformed numerics, malformed datetimes and missing required
//! fields still fail with a field-level reason.
//!
//! All CCSDS meter-based quantities (MISS_DISTANCE, RELATIVE_SPEED, the
//! covariance entries) are converted to km-based units on ingest; state
//! vectors already arrive in km and km/s.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use nalgebra::{Matrix6, Vector3};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Serialize, Serializer};

use crate::error::{Result, ScreenError};

fn serialize_vector3<S>(
    vector: &Vector3<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    [vector.x, vector.y, vector.z].serialize(serializer)
}

fn serialize_covariance<S>(
    covariance: &Option<Matrix6<f64>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    covariance
        .map(|m| -> [[f64; 6]; 6] { std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)])) })
        .serialize(serializer)
}

/// One of the two objects described by a CDM.
#[derive(Debug, Clone, Serialize)]
pub struct CdmObject {
    pub designator: String,
    pub name: String,
    /// ECI position (km).
    #[serde(serialize_with = "serialize_vector3")]
    pub position_km: Vector3<f64>,
    /// ECI velocity (km/s).
    #[serde(serialize_with = "serialize_vector3")]
    pub velocity_km_s: Vector3<f64>,
    /// 6×6 covariance in the RTN frame, km-based units, when the message
    /// carries one.
    #[serde(serialize_with = "serialize_covariance")]
    pub covariance_rtn: Option<Matrix6<f64>>,
}

/// A parsed Conjunction Data Message.
#[derive(Debug, Clone, Serialize)]
pub struct Cdm {
    pub message_id: String,
    pub originator: String,
    pub creation_date: DateTime<Utc>,
    pub tca: DateTime<Utc>,
    pub miss_distance_km: f64,
    pub relative_speed_km_s: Option<f64>,
    pub collision_probability: Option<f64>,
    pub object1: CdmObject,
    pub object2: CdmObject,
    /// Fields the reader did not consume, keyed as-is for header fields and
    /// as `OBJECT1.KEY` / `OBJECT2.KEY` for object-scoped fields.
    pub extras: HashMap<String, String>,
}

impl Cdm {
    /// KVN export. Declared for round-trip tooling; not available yet.
    pub fn to_kvn(&self) -> Result<String> {
        Err(ScreenError::NotImplemented("CDM KVN export"))
    }
}

/// Lower-triangular covariance entry order per CCSDS, rows R, T, N, Ṙ, Ṫ, Ṅ.
const COVARIANCE_KEYS: [&str; 21] = [
    "CR_R", "CT_R", "CT_T", "CN_R", "CN_T", "CN_N", "CRDOT_R", "CRDOT_T", "CRDOT_N",
    "CRDOT_RDOT", "CTDOT_R", "CTDOT_T", "CTDOT_N", "CTDOT_RDOT", "CTDOT_TDOT", "CNDOT_R",
    "CNDOT_T", "CNDOT_N", "CNDOT_RDOT", "CNDOT_TDOT", "CNDOT_NDOT",
];

/// Drops a trailing `[unit]` bracket, e.g. `715 [m]` → `715`.
fn strip_units(value: &str) -> &str {
    match value.find('[') {
        Some(pos) => value[..pos].trim(),
        None => value.trim(),
    }
}

fn parse_number(field: &str, value: &str) -> Result<f64> {
    strip_units(value)
        .parse()
        .map_err(|_| ScreenError::CdmParse {
            field: field.to_string(),
            reason: format!("malformed numeric value '{value}'"),
        })
}

/// Parses a CCSDS instant and stamps it UTC. Calendar and day-of-year forms
/// are accepted, with or without fractional seconds or a trailing Z.
fn parse_datetime(field: &str, value: &str) -> Result<DateTime<Utc>> {
    let trimmed = strip_units(value).trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%jT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ScreenError::CdmParse {
        field: field.to_string(),
        reason: format!("malformed datetime '{value}'"),
    })
}

fn take_required(map: &mut HashMap<String, String>, key: &str) -> Result<String> {
    map.remove(key).ok_or_else(|| ScreenError::CdmParse {
        field: key.to_string(),
        reason: "missing required field".to_string(),
    })
}

fn object_scope_index(field: &str, value: &str) -> Result<usize> {
    match value.to_uppercase().as_str() {
        "OBJECT1" => Ok(0),
        "OBJECT2" => Ok(1),
        other => Err(ScreenError::CdmParse {
            field: field.to_string(),
            reason: format!("unknown object tag '{other}'"),
        }),
    }
}

/// Assembles the 21-entry lower-triangular RTN covariance into a symmetric
/// 6×6 matrix, converting m²-based entries to km². All-absent entries mean
/// "no covariance"; a partial set is a parse warning and also yields none.
fn assemble_covariance(
    scope: &str,
    fields: &mut HashMap<String, String>,
) -> Result<Option<Matrix6<f64>>> {
    let present = COVARIANCE_KEYS
        .iter()
        .filter(|key| fields.contains_key(**key))
        .count();
    if present == 0 {
        return Ok(None);
    }
    if present < COVARIANCE_KEYS.len() {
        let first_missing = COVARIANCE_KEYS
            .iter()
            .find(|key| !fields.contains_key(**key))
            .unwrap();
        tracing::warn!(
            "{} covariance is incomplete ({} of 21 entries, first missing {}); treating as absent",
            scope,
            present,
            first_missing
        );
        return Ok(None);
    }

    let mut matrix = Matrix6::zeros();
    let mut next = 0;
    for row in 0..6 {
        for col in 0..=row {
            let key = COVARIANCE_KEYS[next];
            next += 1;
            let raw = fields.remove(key).unwrap();
            let value = parse_number(&format!("{scope}.{key}"), &raw)? / 1.0e6;
            matrix[(row, col)] = value;
            matrix[(col, row)] = value;
        }
    }

    let smallest = matrix.symmetric_eigenvalues().min();
    let scale = matrix.trace().abs().max(1.0);
    if smallest < -1e-12 * scale {
        tracing::warn!(
            "{} covariance is not positive semidefinite (smallest eigenvalue {:.3e})",
            scope,
            smallest
        );
    }

    Ok(Some(matrix))
}

fn build_object(scope: &str, fields: &mut HashMap<String, String>) -> Result<CdmObject> {
    if fields.is_empty() {
        return Err(ScreenError::CdmParse {
            field: scope.to_string(),
            reason: "object section missing".to_string(),
        });
    }

    let mut component = |key: &str| -> Result<f64> {
        let qualified = format!("{scope}.{key}");
        let raw = fields.remove(key).ok_or_else(|| ScreenError::CdmParse {
            field: qualified.clone(),
            reason: "missing required field".to_string(),
        })?;
        parse_number(&qualified, &raw)
    };
    let position_km = Vector3::new(component("X")?, component("Y")?, component("Z")?);
    let velocity_km_s = Vector3::new(
        component("X_DOT")?,
        component("Y_DOT")?,
        component("Z_DOT")?,
    );

    let covariance_rtn = assemble_covariance(scope, fields)?;

    Ok(CdmObject {
        designator: fields.remove("OBJECT_DESIGNATOR").unwrap_or_default(),
        name: fields.remove("OBJECT_NAME").unwrap_or_default(),
        position_km,
        velocity_km_s,
        covariance_rtn,
    })
}

/// Shared semantic pass over the flattened header and per-object field maps.
fn build_cdm(
    mut header: HashMap<String, String>,
    objects: [HashMap<String, String>; 2],
) -> Result<Cdm> {
    let creation_date = parse_datetime("CREATION_DATE", &take_required(&mut header, "CREATION_DATE")?)?;
    let tca = parse_datetime("TCA", &take_required(&mut header, "TCA")?)?;
    let miss_distance_km =
        parse_number("MISS_DISTANCE", &take_required(&mut header, "MISS_DISTANCE")?)? / 1000.0;
    let relative_speed_km_s = header
        .remove("RELATIVE_SPEED")
        .map(|raw| parse_number("RELATIVE_SPEED", &raw))
        .transpose()?
        .map(|speed| speed / 1000.0);
    let collision_probability = header
        .remove("COLLISION_PROBABILITY")
        .map(|raw| parse_number("COLLISION_PROBABILITY", &raw))
        .transpose()?;
    let message_id = header.remove("MESSAGE_ID").unwrap_or_default();
    let originator = header.remove("ORIGINATOR").unwrap_or_default();

    let [mut fields1, mut fields2] = objects;
    let object1 = build_object("OBJECT1", &mut fields1)?;
    let object2 = build_object("OBJECT2", &mut fields2)?;

    let mut extras = header;
    for (scope, leftover) in [("OBJECT1", fields1), ("OBJECT2", fields2)] {
        for (key, value) in leftover {
            extras.insert(format!("{scope}.{key}"), value);
        }
    }

    Ok(Cdm {
        message_id,
        originator,
        creation_date,
        tca,
        miss_distance_km,
        relative_speed_km_s,
        collision_probability,
        object1,
        object2,
        extras,
    })
}

/// Parses a KVN-encoded CDM.
///
/// Two passes: a syntactic pass flattens the message into key/value pairs
/// (comments and junk lines skipped), then a semantic pass assigns each pair
/// to the header or to the object scope opened by the last `OBJECT =` line.
/// Each scope keeps its own field map, so a header key can never collide
/// with an object key.
pub fn parse_cdm_kvn(text: &str) -> Result<Cdm> {
    let mut pairs: Vec<(usize, String, String)> = Vec::new();
    let mut junk = 0usize;
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("COMMENT") {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                pairs.push((index + 1, key.trim().to_uppercase(), value.trim().to_string()));
            }
            None => junk += 1,
        }
    }
    if junk > 0 {
        tracing::warn!("Ignored {} non key-value lines in KVN input", junk);
    }

    let mut header = HashMap::new();
    let mut objects = [HashMap::new(), HashMap::new()];
    let mut scope: Option<usize> = None;
    for (line_no, key, value) in pairs {
        if key == "OBJECT" {
            scope = Some(object_scope_index(&format!("OBJECT (line {line_no})"), &value)?);
            continue;
        }
        match scope {
            Some(index) => objects[index].insert(key, value),
            None => header.insert(key, value),
        };
    }

    build_cdm(header, objects)
}

/// Parses an XML-encoded CDM.
///
/// Elements are matched by local name, so declared namespaces and prefixes
/// are tolerated. The object scope opens at each `<segment>`'s `OBJECT`
/// element and covers the rest of that segment.
pub fn parse_cdm_xml(text: &str) -> Result<Cdm> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut header = HashMap::new();
    let mut objects = [HashMap::new(), HashMap::new()];
    let mut scope: Option<usize> = None;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let local = String::from_utf8_lossy(start.name().local_name().as_ref())
                    .to_uppercase();
                if local == "SEGMENT" {
                    scope = None;
                }
                current = Some(local);
            }
            Ok(Event::Text(node)) => {
                let Some(key) = current.clone() else {
                    continue;
                };
                let value = node
                    .unescape()
                    .map_err(|err| ScreenError::CdmParse {
                        field: key.clone(),
                        reason: format!("bad XML text: {err}"),
                    })?
                    .trim()
                    .to_string();
                if value.is_empty() {
                    continue;
                }
                if key == "OBJECT" {
                    scope = Some(object_scope_index("OBJECT", &value)?);
                    continue;
                }
                match scope {
                    Some(index) => objects[index].insert(key, value),
                    None => header.insert(key, value),
                };
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ScreenError::CdmParse {
                    field: "XML".to_string(),
                    reason: err.to_string(),
                })
            }
            _ => {}
        }
    }

    build_cdm(header, objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_brackets_are_stripped() {
        assert_eq!(strip_units("715 [m]"), "715");
        assert_eq!(strip_units("  4.142e1 [m**2] "), "4.142e1");
        assert_eq!(strip_units("JSPOC"), "JSPOC");
    }

    #[test]
    fn day_of_year_datetimes_parse() {
        let parsed = parse_datetime("TCA", "2010-072T22:37:52.618").unwrap();
        let calendar = parse_datetime("TCA", "2010-03-13T22:37:52.618").unwrap();
        assert_eq!(parsed, calendar);
    }

    #[test]
    fn datetime_without_timezone_is_stamped_utc() {
        let parsed = parse_datetime("TCA", "2010-03-13T22:37:52").unwrap();
        assert_eq!(parsed.timezone(), Utc);
    }

    #[test]
    fn malformed_datetime_names_the_field() {
        let err = parse_datetime("CREATION_DATE", "13/03/2010").unwrap_err();
        assert!(err.to_string().contains("CREATION_DATE"));
    }

    #[test]
    fn unknown_object_tag_is_rejected() {
        assert!(object_scope_index("OBJECT", "OBJECT3").is_err());
    }
}
