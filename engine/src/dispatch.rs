//! Execution dispatch - run each damage task on the context that owns its victim
//!
//! Two topologies, chosen once at startup:
//! - global: one serialized context runs every damage application
//! - region-affine: each world region has its own context, and a task runs on
//!   the context of the region the victim is in when it is dispatched;
//!   unregistered regions share a bounded set of contexts
//!
//! Dispatch only enqueues. Tasks complete asynchronously, in no particular
//! order relative to the tick that produced them.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::components::{EntityId, RegionId};
use crate::config::EngineConfig;
use crate::error::{panic_message, DispatchError};
use crate::world::WorldQuery;

/// A zero-argument unit of work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Global,
    RegionAffine,
}

/// Somewhere tasks can be queued to run later, one at a time
pub trait ExecutionContext: Send + Sync {
    fn name(&self) -> &str;

    fn submit(&self, task: Task) -> Result<(), DispatchError>;
}

/// Single named worker thread backed by a one-thread rayon pool
pub struct PooledContext {
    name: String,
    pool: ThreadPool,
}

impl PooledContext {
    pub fn new(name: impl Into<String>) -> Result<Self, DispatchError> {
        let name = name.into();
        let thread_name = name.clone();
        let handler_name = name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(move |_| thread_name.clone())
            .panic_handler(move |payload| {
                error!(
                    context = %handler_name,
                    panic = %panic_message(payload.as_ref()),
                    "damage task panicked"
                );
            })
            .build()
            .map_err(|e| DispatchError::ContextStartup {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { name, pool })
    }
}

impl ExecutionContext for PooledContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, task: Task) -> Result<(), DispatchError> {
        self.pool.spawn(task);
        Ok(())
    }
}

pub trait ExecutionDispatcher: Send + Sync {
    /// Queue `action` on the context owning `victim`; never waits for it
    fn dispatch(&self, victim: EntityId, action: Task) -> Result<(), DispatchError>;

    fn mode(&self) -> ExecutionMode;
}

// ============================================================================
// Global single-context mode
// ============================================================================

pub struct GlobalDispatcher {
    context: Arc<dyn ExecutionContext>,
}

impl GlobalDispatcher {
    pub fn new(context: Arc<dyn ExecutionContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }
}

impl ExecutionDispatcher for GlobalDispatcher {
    fn dispatch(&self, _victim: EntityId, action: Task) -> Result<(), DispatchError> {
        self.context.submit(action)
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Global
    }
}

// ============================================================================
// Region-affine mode
// ============================================================================

/// Shared contexts started for unregistered regions when none is configured
pub const DEFAULT_SHARED_CONTEXTS: usize = 4;

pub struct RegionDispatcher {
    world: Arc<dyn WorldQuery>,
    regions: RwLock<HashMap<RegionId, Arc<dyn ExecutionContext>>>,
    shared: Mutex<HashMap<usize, Arc<dyn ExecutionContext>>>,
    shared_limit: usize,
    spawn_missing: bool,
}

impl RegionDispatcher {
    /// With `spawn_missing`, a region the host never registered is served by
    /// one of a fixed set of shared contexts; otherwise only registered
    /// regions resolve.
    pub fn new(world: Arc<dyn WorldQuery>, spawn_missing: bool) -> Self {
        Self {
            world,
            regions: RwLock::new(HashMap::new()),
            shared: Mutex::new(HashMap::new()),
            shared_limit: DEFAULT_SHARED_CONTEXTS,
            spawn_missing,
        }
    }

    /// Cap the number of shared contexts (at least one)
    pub fn with_shared_contexts(mut self, limit: usize) -> Self {
        self.shared_limit = limit.max(1);
        self
    }

    pub fn register_region(&self, region: RegionId, context: Arc<dyn ExecutionContext>) {
        self.regions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(region, context);
    }

    pub fn remove_region(&self, region: &RegionId) -> bool {
        self.regions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(region)
            .is_some()
    }

    /// Regions registered by the host
    pub fn region_count(&self) -> usize {
        self.regions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Shared contexts started so far, never more than the configured limit
    pub fn shared_context_count(&self) -> usize {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Shared slot serving `region`; stable for the life of the process
    fn slot_for(&self, region: &RegionId) -> usize {
        let mut hasher = DefaultHasher::new();
        region.hash(&mut hasher);
        (hasher.finish() % self.shared_limit as u64) as usize
    }

    fn context_for(&self, region: &RegionId) -> Result<Option<Arc<dyn ExecutionContext>>, DispatchError> {
        if let Some(ctx) = self
            .regions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(region)
        {
            return Ok(Some(Arc::clone(ctx)));
        }
        if !self.spawn_missing {
            return Ok(None);
        }

        let slot = self.slot_for(region);
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ctx) = shared.get(&slot) {
            return Ok(Some(Arc::clone(ctx)));
        }
        let ctx: Arc<dyn ExecutionContext> = Arc::new(PooledContext::new(format!("region-shared-{slot}"))?);
        debug!(region = %region, slot, "started shared region context");
        shared.insert(slot, Arc::clone(&ctx));
        Ok(Some(ctx))
    }
}

impl ExecutionDispatcher for RegionDispatcher {
    fn dispatch(&self, victim: EntityId, action: Task) -> Result<(), DispatchError> {
        let region = self
            .world
            .region_of(victim)
            .ok_or(DispatchError::EntityGone(victim))?;
        match self.context_for(&region)? {
            Some(ctx) => ctx.submit(action),
            None => Err(DispatchError::UnresolvedRegion { entity: victim, region }),
        }
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::RegionAffine
    }
}

/// Pick the dispatcher for the configured execution mode
pub fn build_dispatcher(
    config: &EngineConfig,
    world: Arc<dyn WorldQuery>,
) -> Result<Arc<dyn ExecutionDispatcher>, DispatchError> {
    let dispatcher: Arc<dyn ExecutionDispatcher> = match config.execution_mode {
        ExecutionMode::Global => {
            Arc::new(GlobalDispatcher::new(Arc::new(PooledContext::new("global-tick")?)))
        }
        ExecutionMode::RegionAffine => Arc::new(
            RegionDispatcher::new(world, config.spawn_region_contexts)
                .with_shared_contexts(config.shared_region_contexts),
        ),
    };
    Ok(dispatcher)
}
