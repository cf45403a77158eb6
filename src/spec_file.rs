//! Pivot spec files. `.json` files are read and written as JSON; anything
//! else goes through YAML.

use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::pivot::PivotSpec;

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn parse_spec(input: &str, json: bool) -> Result<PivotSpec> {
    if json {
        Ok(serde_json::from_str(input)?)
    } else {
        Ok(serde_yaml::from_str(input)?)
    }
}

pub fn load_spec(path: &Path) -> Result<PivotSpec> {
    let raw = fs::read_to_string(path).with_context(|| format!("Opening spec file {path:?}"))?;
    parse_spec(&raw, is_json(path)).with_context(|| format!("Parsing spec file {path:?}"))
}

pub fn save_spec(path: &Path, spec: &PivotSpec) -> Result<()> {
    let serialized = if is_json(path) {
        serde_json::to_string_pretty(spec)?
    } else {
        serde_yaml::to_string(spec)?
    };
    fs::write(path, serialized).with_context(|| format!("Writing spec file {path:?}"))
}
