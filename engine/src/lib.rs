//! Hazard Damage Engine
//!
//! Periodically damages living entities near registered damage sources on an
//! external tick clock. Each application passes through a cancellable event
//! hook and runs on the execution context that owns its victim.

pub mod clock;
pub mod components;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod events;
pub mod locator;
pub mod registry;
pub mod source;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

pub use components::*;
pub use config::EngineConfig;
pub use dispatch::{ExecutionContext, ExecutionDispatcher, ExecutionMode, Task};
pub use driver::{TickDriver, TickReport};
pub use events::{DamageEventPipeline, DamageListener, ScheduledDamageEvent};
pub use registry::SourceRegistry;
pub use source::DamageSource;
pub use world::{HecsWorld, WorldQuery};
