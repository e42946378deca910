//! Environment jobs for the crop model.
//!
//! A job is assembled in two steps. Once per setup the sim, site and crop
//! templates are composed into a [`JobBody`] carrying everything that does
//! not depend on the cell. Per cell an [`EnvironmentBuilder`] copies that
//! body and fills in soil, terrain, phenology dates and climate files.

pub mod builder;
pub mod climate;
pub mod error;
pub mod job;
pub mod template;

pub use builder::EnvironmentBuilder;
pub use climate::{ClimateGridIndex, ClimateRef, RowColIndex};
pub use error::{EnvironmentError, Result};
pub use job::{EnvironmentJob, JobBody};
pub use template::{CropTemplate, SimTemplate, SiteTemplate};
