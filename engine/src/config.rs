//! Engine configuration loaded from JSON

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dispatch::{ExecutionMode, DEFAULT_SHARED_CONTEXTS};
use crate::error::ConfigError;
use crate::source::DamageSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Victims are searched within this distance of a due source
    pub damage_radius: f64,
    /// Damage is credited to the nearest actor within this distance
    pub attribution_radius: f64,
    pub execution_mode: ExecutionMode,
    /// Edge length of one square region of the reference world
    pub region_size: f64,
    /// Start executors for regions the host never registered
    pub spawn_region_contexts: bool,
    /// Upper bound on the executors serving unregistered regions
    pub shared_region_contexts: usize,
    /// Skip a queued application if the victim left the damage radius meanwhile
    pub recheck_proximity: bool,
    pub tick_interval_ms: u64,
    pub log_level: String,
    /// Handed to the registry at startup by the host
    pub sources: Vec<DamageSource>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            damage_radius: 1.0,
            attribution_radius: 16.0,
            execution_mode: ExecutionMode::Global,
            region_size: 256.0,
            spawn_region_contexts: true,
            shared_region_contexts: DEFAULT_SHARED_CONTEXTS,
            recheck_proximity: true,
            tick_interval_ms: 50, // 20 ticks per second
            log_level: "info".to_string(),
            sources: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("damage_radius", self.damage_radius),
            ("attribution_radius", self.attribution_radius),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.region_size.is_finite() || self.region_size <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "region_size must be positive, got {}",
                self.region_size
            )));
        }
        if self.shared_region_contexts == 0 {
            return Err(ConfigError::Invalid("shared_region_contexts must be positive".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}
