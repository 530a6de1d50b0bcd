use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    FlowmendError, Result,
    autofix::{AutofixConfig, Confidence},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// diff engine config
    pub diff: DiffConfig,
    /// autofix defaults
    pub autofix: AutofixDefaults,
    /// store config
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// mode used when a diff request does not set `continueOnError`, defaults to atomic
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutofixDefaults {
    /// lowest confidence tier kept, defaults to medium
    pub confidence_threshold: Confidence,
    /// maximum number of fixes returned, defaults to 50
    pub max_fixes: usize,
    /// minimum node type similarity score, range [0, 100], defaults to 70
    pub similarity_threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// number of workflow snapshots the in-memory store reserves room for, defaults to 1024.
    /// The store grows past it and never evicts.
    pub initial_capacity: usize,
}

impl Default for AutofixDefaults {
    fn default() -> Self {
        let fix = AutofixConfig::default();
        Self {
            confidence_threshold: fix.confidence_threshold,
            max_fixes: fix.max_fixes,
            similarity_threshold: fix.similarity_threshold,
        }
    }
}

impl From<&AutofixDefaults> for AutofixConfig {
    fn from(defaults: &AutofixDefaults) -> Self {
        Self {
            confidence_threshold: defaults.confidence_threshold,
            max_fixes: defaults.max_fixes,
            similarity_threshold: defaults.similarity_threshold,
            ..Default::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { initial_capacity: 1024 }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| FlowmendError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.autofix.similarity_threshold > 100 {
            return Err(FlowmendError::Config(format!("similarity_threshold must be in [0, 100], got {}", self.autofix.similarity_threshold)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        [diff]
        continue_on_error = true

        [autofix]
        confidence_threshold = "high"
        max_fixes = 10

        [store]
        initial_capacity = 64
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert!(config.diff.continue_on_error);
        assert_eq!(config.autofix.confidence_threshold, Confidence::High);
        assert_eq!(config.autofix.max_fixes, 10);
        assert_eq!(config.autofix.similarity_threshold, 70);
        assert_eq!(config.store.initial_capacity, 64);

        let fix = AutofixConfig::from(&config.autofix);
        assert_eq!(fix.max_fixes, 10);
        assert!(!fix.apply_fixes);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::load_from_str("").unwrap();
        assert!(!config.diff.continue_on_error);
        assert_eq!(config.autofix.confidence_threshold, Confidence::Medium);
        assert_eq!(config.autofix.max_fixes, 50);
        assert_eq!(config.store.initial_capacity, 1024);
    }

    #[test]
    fn test_config_invalid() {
        assert!(matches!(Config::load_from_str("[autofix]\nsimilarity_threshold = 150"), Err(FlowmendError::Config(_))));
        assert!(matches!(Config::load_from_str("[store]\ninitial_capacity = \"x\""), Err(FlowmendError::Config(_))));
        assert!(Config::create("/nonexistent/flowmend.toml").is_err());
    }
}
