//! Crop ensemble job producer.
//!
//! Turns the cells of the input rasters into environment jobs for the crop
//! model and sends them to the workers.

pub mod config;
pub mod dispatch;
pub mod enumerator;
pub mod grid_source;

pub use config::{load_producer_config, validate_producer_config, DispatchMode, ProducerConfig};
pub use dispatch::{DispatchError, JobDispatcher};
pub use enumerator::{GridCell, RunSummary, SetupStats, SpatialEnumerator};
pub use grid_source::{GridSource, Layer, RasterGridSource};
