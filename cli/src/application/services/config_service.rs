//! Application service: configuration use-cases.

use crate::application::ports::ConfigStore;
use crate::domain::config::{ToolConfig, set_config_value, validate_config};
use anyhow::Result;

/// Load configuration and reject values `config set` would refuse.
///
/// `set_value` bypasses the check so a broken file can be repaired.
pub fn load_config(store: &impl ConfigStore) -> Result<ToolConfig> {
    let config = store.load()?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate and persist a single `key = value` setting.
///
/// Nothing is written when validation fails.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<ToolConfig> {
    let mut config = store.load()?;
    set_config_value(&mut config, key, value)?;
    store.save(&config)?;
    Ok(config)
}
