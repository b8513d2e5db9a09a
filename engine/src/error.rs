//! Error taxonomy
//!
//! Every error here is recoverable: the engine logs it where it is swallowed
//! and skips at most one source or one victim for the current tick.

use thiserror::Error;

use crate::components::{EntityId, RegionId};

/// Invalid damage source definitions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("damage source identifier must not be empty")]
    EmptyIdentifier,

    #[error("source {identifier}: ticks_per_damage must be positive")]
    ZeroPeriod { identifier: String },

    #[error("source {identifier}: damage_amount must be finite and non-negative, got {amount}")]
    InvalidDamage { identifier: String, amount: f64 },
}

/// Failures reported by the world collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error("entity {0} does not exist")]
    NoSuchEntity(EntityId),

    #[error("entity {0} cannot take damage")]
    NotDamageable(EntityId),

    #[error("world query failed: {0}")]
    Query(String),
}

/// A listener refusing to process an event; its changes are rolled back
#[derive(Debug, Clone, PartialEq, Error)]
#[error("listener failed: {0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failures while routing a damage task to its execution context
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("entity {0} is gone, task dropped")]
    EntityGone(EntityId),

    #[error("no execution context owns region {region} (entity {entity}), task dropped")]
    UnresolvedRegion { entity: EntityId, region: RegionId },

    #[error("failed to start execution context {name}: {reason}")]
    ContextStartup { name: String, reason: String },
}

/// Failure while processing one due source during a tick
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("panic while processing source: {0}")]
    Panicked(String),
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Render a caught panic payload for logging
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
