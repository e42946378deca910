//! Crop phenology for the ensemble producer.
//!
//! - [`PhenologyRecord`]: sowing and harvest dates of one spatial cluster
//! - [`PhenologyStore`]: records of one crop plus a nearest-cluster lookup
//! - [`resolver`]: turns a setup's sowing/harvest policies and a record into
//!   concrete workstep dates

pub mod error;
pub mod record;
pub mod resolver;
pub mod store;

pub use error::{PhenologyError, Result};
pub use record::PhenologyRecord;
pub use resolver::{resolve, Resolution, WorkstepDates};
pub use store::PhenologyStore;
