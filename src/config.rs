//! YAML loading for [`BoothConfig`]; the shapes themselves live in the
//! `config-model` crate shared with the button daemon.

use std::path::Path;

use anyhow::{Context, Result};
pub use config_model::BoothConfig;

/// Parse a YAML document. An empty document yields the defaults.
pub fn from_yaml_str(yaml: &str) -> Result<BoothConfig> {
    if yaml.trim().is_empty() {
        return Ok(BoothConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<BoothConfig> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    from_yaml_str(&yaml)
}

/// Check cross-field constraints and hand the configuration back.
pub fn validated(config: BoothConfig) -> Result<BoothConfig> {
    config.validate()?;
    Ok(config)
}
