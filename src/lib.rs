//! Close-approach screening for Earth satellites.
//!
//! Given SGP4 element sets, the screening pipeline predicts which object
//! pairs pass within a miss-distance threshold over a forward window and
//! refines each encounter to its time of closest approach. When covariances
//! are available (typically from a Conjunction Data Message), the
//! probability engine projects the combined uncertainty into the encounter
//! plane and integrates it over the hard-body disk.

pub mod catalog;
pub mod cdm;
pub mod constants;
pub mod elements;
pub mod error;
pub mod fetch;
pub mod frames;
pub mod kdtree;
pub mod probability;
pub mod propagation;
pub mod screening;

pub use catalog::{screen_catalog, CatalogScreenConfig};
pub use cdm::{parse_cdm_kvn, parse_cdm_xml, Cdm, CdmObject};
pub use elements::{parse_omm_json, parse_tle_catalog, ElementSet};
pub use error::{Result, ScreenError};
pub use fetch::CatalogFetcher;
pub use frames::{project_to_bplane, rtn_covariance_to_eci, rtn_rotation, BPlane};
pub use probability::{compute_pc, PcMethod, PcResult};
pub use propagation::{propagate_batch, propagate_one, State};
pub use screening::{prefilter, screen, ConjunctionEvent, ScreenConfig};
