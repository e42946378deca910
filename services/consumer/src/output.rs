//! CSV rendering of result blocks.
//!
//! Each block with rows becomes a spec line, a header row, a units row and
//! the data rows. Every block, empty or not, is followed by a blank line.

use serde_json::{Map, Value};
use sim_common::{OutputId, ResultBlock};

const DELIMITER: char = ',';

/// Quote a field when it holds the delimiter, a quote or a line break.
fn escape(field: &str) -> String {
    if field.contains([DELIMITER, '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let row: Vec<String> = fields.iter().map(|f| escape(f.as_ref())).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

/// Text of a single cell.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Cells of one output in a result row. Layer ranges expand to one cell
/// per layer, missing layers stay empty.
fn output_cells(output: &OutputId, row: &Map<String, Value>) -> Vec<String> {
    let value = row.get(output.key());
    if !output.is_layer_range() {
        return vec![cell(value)];
    }

    let width = output.column_names().len();
    let layers = value.and_then(Value::as_array);
    (0..width)
        .map(|i| cell(layers.and_then(|values| values.get(i))))
        .collect()
}

/// Render one block, including its trailing blank line.
pub fn render_block(block: &ResultBlock, out: &mut String) {
    if !block.results.is_empty() {
        push_row(out, &[block.orig_spec.replace('"', "")]);

        let header: Vec<String> = block
            .output_ids
            .iter()
            .flat_map(OutputId::column_names)
            .collect();
        push_row(out, &header);

        let units: Vec<String> = block
            .output_ids
            .iter()
            .flat_map(OutputId::unit_cells)
            .collect();
        push_row(out, &units);

        for row in &block.results {
            let cells: Vec<String> = block
                .output_ids
                .iter()
                .flat_map(|output| output_cells(output, row))
                .collect();
            push_row(out, &cells);
        }
    }
    out.push('\n');
}

/// Render every block of a message.
pub fn render_blocks(blocks: &[ResultBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        render_block(block, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(name: &str, unit: &str, from: i32, to: i32) -> OutputId {
        OutputId {
            name: name.to_string(),
            display_name: String::new(),
            unit: unit.to_string(),
            from_layer: from,
            to_layer: to,
            layer_agg_op: None,
        }
    }

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_block_layout() {
        let block = ResultBlock {
            orig_spec: "\"daily\"".to_string(),
            output_ids: vec![output("Date", "", -1, -1), output("Mois", "m3/m3", 0, 1)],
            results: vec![
                row(json!({"Date": "2001-01-01", "Mois": [0.3, 0.31]})),
                row(json!({"Date": "2001-01-02", "Mois": [0.29]})),
            ],
        };

        let text = render_blocks(&[block]);
        assert_eq!(
            text,
            "daily\n\
             Date,Mois_1,Mois_2\n\
             [],[m3/m3],[m3/m3]\n\
             2001-01-01,0.3,0.31\n\
             2001-01-02,0.29,\n\
             \n"
        );
    }

    #[test]
    fn test_empty_block_is_a_blank_line() {
        let block = ResultBlock {
            orig_spec: "\"yearly\"".to_string(),
            output_ids: vec![output("Precip", "mm", -1, -1)],
            results: vec![],
        };
        assert_eq!(render_blocks(&[block]), "\n");
    }

    #[test]
    fn test_missing_and_null_values_are_empty() {
        let oid = output("Yield", "kg", -1, -1);
        assert_eq!(output_cells(&oid, &row(json!({}))), vec![""]);
        assert_eq!(output_cells(&oid, &row(json!({"Yield": null}))), vec![""]);
        assert_eq!(output_cells(&oid, &row(json!({"Yield": 12}))), vec!["12"]);
    }
}
