//! Component list JSON: `[{"name": ..., "type": ..., "coef": [...]}, ...]`.
//!
//! `type` is looked up case-insensitively in the component registry.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use crate::domain::{ComponentKind, VpsdComponent};
use crate::error::{Result, RvError};
use crate::models::validate_component;

#[derive(Debug, Deserialize)]
struct RawComponent {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    coef: Vec<f64>,
}

/// Read and validate an initial component list.
pub fn read_components_json(path: &Path) -> Result<Vec<VpsdComponent>> {
    let file = File::open(path)
        .map_err(|e| RvError::resource(format!("failed to open components '{}': {e}", path.display())))?;
    parse_components_json(BufReader::new(file))
}

pub fn parse_components_json<R: Read>(reader: R) -> Result<Vec<VpsdComponent>> {
    let raw: Vec<RawComponent> = serde_json::from_reader(reader)
        .map_err(|e| RvError::validation(format!("invalid components JSON: {e}")))?;
    if raw.is_empty() {
        return Err(RvError::validation("component list is empty"));
    }

    raw.into_iter()
        .map(|c| {
            let kind = ComponentKind::from_name(&c.kind).ok_or_else(|| {
                let known: Vec<&str> = ComponentKind::ALL.iter().map(|k| k.display_name()).collect();
                RvError::validation(format!(
                    "component '{}': unknown type '{}' (known: {})",
                    c.name,
                    c.kind,
                    known.join(", ")
                ))
            })?;
            let component = VpsdComponent::new(c.name, kind, c.coef);
            validate_component(&component)?;
            Ok(component)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_names_case_insensitively() {
        let json = r#"[
            {"name": "gran", "type": "harvey", "coef": [1.0, 2.0, 2.0]},
            {"name": "white", "type": "Constant", "coef": [0.1]}
        ]"#;
        let comps = parse_components_json(json.as_bytes()).unwrap();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].kind, ComponentKind::Harvey);
        assert_eq!(comps[1].name, "white");
        assert!(comps[1].coef_err.is_none());
    }

    #[test]
    fn unknown_type_is_validation_error() {
        let json = r#"[{"name": "x", "type": "gaussian", "coef": [1.0]}]"#;
        let err = parse_components_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, RvError::Validation(_)));
        assert!(err.to_string().contains("gaussian"));
    }

    #[test]
    fn wrong_coefficient_count_names_component() {
        let json = r#"[{"name": "osc", "type": "lorentz", "coef": [1.0, 2.0]}]"#;
        let err = parse_components_json(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("osc"), "{err}");
    }

    #[test]
    fn empty_list_is_validation_error() {
        assert!(matches!(
            parse_components_json("[]".as_bytes()),
            Err(RvError::Validation(_))
        ));
    }
}
