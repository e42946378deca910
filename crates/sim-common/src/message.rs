//! Result messages returned by simulation workers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::correlation::CorrelationKey;

/// Description of one output variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputId {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "no_layer")]
    pub from_layer: i32,
    #[serde(default = "no_layer")]
    pub to_layer: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_agg_op: Option<String>,
}

fn no_layer() -> i32 {
    -1
}

impl OutputId {
    /// Key of this output in a result row.
    pub fn key(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Whether the output yields one value per layer in a range.
    pub fn is_layer_range(&self) -> bool {
        let aggregated = self
            .layer_agg_op
            .as_deref()
            .map_or(false, |op| !op.eq_ignore_ascii_case("none"));
        self.from_layer >= 0 && self.to_layer > self.from_layer && !aggregated
    }

    /// Column headers for this output. Layer ranges expand to `name_<n>`
    /// with `n` counted from 1.
    pub fn column_names(&self) -> Vec<String> {
        if self.is_layer_range() {
            (self.from_layer..=self.to_layer)
                .map(|i| format!("{}_{}", self.key(), i + 1))
                .collect()
        } else {
            vec![self.key().to_string()]
        }
    }

    /// Unit cells, one per column.
    pub fn unit_cells(&self) -> Vec<String> {
        let unit = format!("[{}]", self.unit);
        vec![unit; self.column_names().len()]
    }
}

/// One block of results: a source spec, its outputs and the rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBlock {
    #[serde(default)]
    pub orig_spec: String,
    #[serde(default)]
    pub output_ids: Vec<OutputId>,
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,
}

/// A worker's answer to one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    pub custom_id: CorrelationKey,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub data: Vec<ResultBlock>,
}

impl ResultMessage {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// What the inbound channel delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Result(Box<ResultMessage>),
    /// End of stream
    Done,
}
