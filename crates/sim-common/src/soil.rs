//! Soil profiles as the crop model consumes them.

use serde::{Deserialize, Serialize};

/// Groundwater depth assumed when no layer is flagged, in meters.
pub const DEFAULT_GROUNDWATER_DEPTH: f64 = 20.0;

/// A single soil layer. Field names follow the model's parameter keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    /// Layer thickness in meters
    #[serde(rename = "Thickness")]
    pub thickness: f64,

    #[serde(rename = "KA5TextureClass", skip_serializing_if = "Option::is_none")]
    pub texture_class: Option<String>,

    /// Organic carbon in percent
    #[serde(rename = "SoilOrganicCarbon", skip_serializing_if = "Option::is_none")]
    pub organic_carbon: Option<f64>,

    /// Bulk density in kg m-3
    #[serde(rename = "SoilBulkDensity", skip_serializing_if = "Option::is_none")]
    pub bulk_density: Option<f64>,

    /// Sand content as a fraction
    #[serde(rename = "Sand", skip_serializing_if = "Option::is_none")]
    pub sand: Option<f64>,

    /// Clay content as a fraction
    #[serde(rename = "Clay", skip_serializing_if = "Option::is_none")]
    pub clay: Option<f64>,

    #[serde(rename = "pH", skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,

    /// Stone content as a fraction
    #[serde(rename = "Sceleton", skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<f64>,

    #[serde(default)]
    pub is_in_groundwater: bool,

    #[serde(default)]
    pub is_impenetrable: bool,
}

impl SoilLayer {
    /// A layer with only its thickness set.
    pub fn with_thickness(thickness: f64) -> Self {
        Self {
            thickness,
            texture_class: None,
            organic_carbon: None,
            bulk_density: None,
            sand: None,
            clay: None,
            ph: None,
            skeleton: None,
            is_in_groundwater: false,
            is_impenetrable: false,
        }
    }
}

/// Ordered soil layers, top first. An empty profile means no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoilProfile {
    pub layers: Vec<SoilLayer>,
}

impl SoilProfile {
    pub fn new(layers: Vec<SoilLayer>) -> Self {
        Self { layers }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Depth of the top of the first groundwater layer, or 20 m.
    pub fn groundwater_depth(&self) -> f64 {
        self.depth_to(|layer| layer.is_in_groundwater)
            .unwrap_or(DEFAULT_GROUNDWATER_DEPTH)
    }

    /// Depth of the top of the first impenetrable layer, if any.
    pub fn impenetrable_depth(&self) -> Option<f64> {
        self.depth_to(|layer| layer.is_impenetrable)
    }

    /// Summed thickness of all layers above the first one matching `pred`.
    fn depth_to(&self, pred: impl Fn(&SoilLayer) -> bool) -> Option<f64> {
        let mut depth = 0.0;
        for layer in &self.layers {
            if pred(layer) {
                return Some(depth);
            }
            depth += layer.thickness;
        }
        None
    }
}
