//! Raster input layers looked up by projected coordinate.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use sim_common::{AsciiGrid, Coordinate, GridHeader, SimResult};
use tracing::info;

use crate::config::GridsConfig;

/// Input layer of the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Soil,
    CropMask,
    Elevation,
    Slope,
    LandUse,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Soil => "soil",
            Layer::CropMask => "crop_mask",
            Layer::Elevation => "elevation",
            Layer::Slope => "slope",
            Layer::LandUse => "land_use",
        };
        f.write_str(name)
    }
}

/// Value lookups on the input layers.
#[async_trait]
pub trait GridSource: Send + Sync {
    /// Header of the soil grid, which defines the cells of a scan.
    fn scan_header(&self) -> &GridHeader;

    /// Value of the cell containing `coord`.
    ///
    /// `None` for the layer's no-data sentinel, for coordinates outside the
    /// layer and for layers that are not configured.
    async fn nearest_value(&self, coord: &Coordinate, layer: Layer) -> Option<f64>;
}

/// [`GridSource`] over ESRI ASCII grids held in memory.
#[derive(Debug)]
pub struct RasterGridSource {
    soil: AsciiGrid,
    layers: HashMap<Layer, AsciiGrid>,
}

impl RasterGridSource {
    /// Read every configured layer.
    pub fn load(config: &GridsConfig) -> SimResult<Self> {
        let mut layers = vec![(Layer::CropMask, read_layer(Layer::CropMask, &config.crop_mask)?)];
        for (layer, path) in [
            (Layer::Elevation, &config.elevation),
            (Layer::Slope, &config.slope),
            (Layer::LandUse, &config.land_use),
        ] {
            if let Some(path) = path {
                layers.push((layer, read_layer(layer, path)?));
            }
        }
        Ok(Self::new(read_layer(Layer::Soil, &config.soil)?, layers))
    }

    pub fn new(soil: AsciiGrid, layers: Vec<(Layer, AsciiGrid)>) -> Self {
        Self {
            soil,
            layers: layers.into_iter().collect(),
        }
    }

    fn grid(&self, layer: Layer) -> Option<&AsciiGrid> {
        match layer {
            Layer::Soil => Some(&self.soil),
            other => self.layers.get(&other),
        }
    }
}

fn read_layer(layer: Layer, path: &Path) -> SimResult<AsciiGrid> {
    let grid = AsciiGrid::read(path)?;
    let header = grid.header();
    info!(
        layer = %layer,
        path = %path.display(),
        ncols = header.ncols,
        nrows = header.nrows,
        "Loaded grid"
    );
    Ok(grid)
}

#[async_trait]
impl GridSource for RasterGridSource {
    fn scan_header(&self) -> &GridHeader {
        self.soil.header()
    }

    async fn nearest_value(&self, coord: &Coordinate, layer: Layer) -> Option<f64> {
        self.grid(layer)?.nearest_value(coord)
    }
}
