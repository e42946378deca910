//! YAML configuration helpers shared by the producer and consumer.
//!
//! Supports environment variable substitution using `${VAR}` and
//! `${VAR:-default}` syntax before the document is parsed.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{SimError, SimResult};

/// Read a YAML file, expand environment variables and deserialize it.
pub fn load_yaml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> SimResult<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        SimError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_yaml(&content)
        .map_err(|e| SimError::InvalidConfig(format!("{}: {}", path.display(), e)))
}

/// Expand environment variables in `content` and deserialize it.
pub fn parse_yaml<T: DeserializeOwned>(content: &str) -> SimResult<T> {
    let expanded = expand_env_vars(content)?;
    Ok(serde_yaml::from_str(&expanded)?)
}

/// Expand environment variables in a string.
pub fn expand_env_vars(content: &str) -> SimResult<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => {
                        return Err(SimError::InvalidConfig(format!(
                            "unclosed variable substitution: ${{{}",
                            var_expr
                        )))
                    }
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> SimResult<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).map_err(|_| {
            SimError::InvalidConfig(format!("environment variable {} not set", expr))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_simple() {
        std::env::set_var("SIM_COMMON_TEST_VAR", "value");
        let result = expand_env_vars("prefix_${SIM_COMMON_TEST_VAR}_suffix").unwrap();
        assert_eq!(result, "prefix_value_suffix");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("dir: ${SIM_COMMON_UNSET_VAR:-./data}").unwrap();
        assert_eq!(result, "dir: ./data");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        let result = expand_env_vars("${SIM_COMMON_REQUIRED_VAR}");
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_expand_env_vars_unclosed() {
        assert!(expand_env_vars("${OPEN").is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        #[derive(serde::Deserialize)]
        struct Small {
            name: String,
            rows: u32,
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.yaml");
        fs::write(&path, "name: ${SIM_COMMON_NAME_VAR:-grid}\nrows: 12\n").unwrap();

        let small: Small = load_yaml(&path).unwrap();
        assert_eq!(small.name, "grid");
        assert_eq!(small.rows, 12);
    }
}
