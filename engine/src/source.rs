//! Damage source definitions

use serde::{Deserialize, Serialize};

use crate::components::Location;
use crate::error::RegistryError;

/// One configured damage emitter (a hazard block, a pool of lava, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageSource {
    /// Registry key; sources are ordered lexicographically by it
    pub identifier: String,
    pub location: Location,
    pub damage_amount: f64,
    pub ticks_per_damage: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl DamageSource {
    pub fn new(
        identifier: impl Into<String>,
        location: Location,
        damage_amount: f64,
        ticks_per_damage: u64,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            location,
            damage_amount,
            ticks_per_damage,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.identifier.is_empty() {
            return Err(RegistryError::EmptyIdentifier);
        }
        if self.ticks_per_damage == 0 {
            return Err(RegistryError::ZeroPeriod {
                identifier: self.identifier.clone(),
            });
        }
        if !self.damage_amount.is_finite() || self.damage_amount < 0.0 {
            return Err(RegistryError::InvalidDamage {
                identifier: self.identifier.clone(),
                amount: self.damage_amount,
            });
        }
        Ok(())
    }
}
