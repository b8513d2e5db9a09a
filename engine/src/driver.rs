//! Tick Driver - main orchestrator, invoked once per external clock tick
//!
//! Each tick scans the registry in identifier order. A source that is not yet
//! due counts down by one; a due source has its victims located, one damage
//! task dispatched per victim, and its countdown reset. The reset happens
//! whatever becomes of the individual applications.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::components::EntityId;
use crate::config::EngineConfig;
use crate::dispatch::{build_dispatcher, ExecutionDispatcher, Task};
use crate::error::{panic_message, DispatchError, TickError, WorldError};
use crate::events::DamageEventPipeline;
use crate::locator::EntityLocator;
use crate::registry::SourceRegistry;
use crate::source::DamageSource;
use crate::world::WorldQuery;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverSettings {
    pub damage_radius: f64,
    pub attribution_radius: f64,
    pub recheck_proximity: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for DriverSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            damage_radius: config.damage_radius,
            attribution_radius: config.attribution_radius,
            recheck_proximity: config.recheck_proximity,
        }
    }
}

/// What one `on_tick` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Sources counted down
    pub advanced: u32,
    /// Sources that fired a damage pass
    pub due: u32,
    pub dispatched: u32,
    /// Tasks dropped because the victim's context could not be resolved
    pub dropped: u32,
    /// Due sources whose pass failed part-way
    pub failed: u32,
}

impl TickReport {
    /// Fold a later tick into running totals
    pub fn accumulate(&mut self, later: &TickReport) {
        self.tick = later.tick;
        self.advanced += later.advanced;
        self.due += later.due;
        self.dispatched += later.dispatched;
        self.dropped += later.dropped;
        self.failed += later.failed;
    }
}

pub struct TickDriver {
    registry: Arc<SourceRegistry>,
    locator: Arc<EntityLocator>,
    pipeline: Arc<DamageEventPipeline>,
    dispatcher: Arc<dyn ExecutionDispatcher>,
    settings: DriverSettings,
    ticks: AtomicU64,
}

impl TickDriver {
    pub fn new(
        registry: Arc<SourceRegistry>,
        locator: Arc<EntityLocator>,
        pipeline: Arc<DamageEventPipeline>,
        dispatcher: Arc<dyn ExecutionDispatcher>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            registry,
            locator,
            pipeline,
            dispatcher,
            settings,
            ticks: AtomicU64::new(0),
        }
    }

    /// Wire an empty registry and pipeline to `world`, dispatching in the
    /// configured execution mode
    pub fn from_config(config: &EngineConfig, world: Arc<dyn WorldQuery>) -> Result<Self, DispatchError> {
        let dispatcher = build_dispatcher(config, Arc::clone(&world))?;
        Ok(Self::new(
            Arc::new(SourceRegistry::new()),
            Arc::new(EntityLocator::new(world)),
            Arc::new(DamageEventPipeline::new()),
            dispatcher,
            DriverSettings::from(config),
        ))
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &Arc<DamageEventPipeline> {
        &self.pipeline
    }

    pub fn locator(&self) -> &Arc<EntityLocator> {
        &self.locator
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Number of ticks processed so far
    pub fn current_tick(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn on_tick(&self) -> TickReport {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let mut report = TickReport {
            tick,
            ..Default::default()
        };

        for entry in self.registry.snapshot() {
            let source = entry.source;
            if !source.enabled {
                continue;
            }
            if entry.remaining_ticks > 0 {
                self.registry.advance(&source.identifier);
                report.advanced += 1;
                continue;
            }

            report.due += 1;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.fire(&source, &mut report)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(source = %source.identifier, error = %e, "damage pass failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    let e = TickError::Panicked(panic_message(payload.as_ref()));
                    warn!(source = %source.identifier, error = %e, "damage pass failed");
                }
            }
            self.registry.reset(&source.identifier);
        }

        trace!(?report, "tick complete");
        report
    }

    fn fire(&self, source: &Arc<DamageSource>, report: &mut TickReport) -> Result<(), TickError> {
        let victims = self
            .locator
            .nearby_victims(&source.location, self.settings.damage_radius)?;
        debug!(source = %source.identifier, victims = victims.len(), "damage source due");

        for victim in victims {
            let task = DamageTask {
                registry: Arc::clone(&self.registry),
                locator: Arc::clone(&self.locator),
                pipeline: Arc::clone(&self.pipeline),
                source: Arc::clone(source),
                victim,
                settings: self.settings,
            };
            let action: Task = Box::new(move || {
                task.run();
            });
            match self.dispatcher.dispatch(victim, action) {
                Ok(()) => report.dispatched += 1,
                Err(e @ DispatchError::ContextStartup { .. }) => return Err(e.into()),
                Err(e) => {
                    report.dropped += 1;
                    warn!(source = %source.identifier, entity = %victim, error = %e, "damage dispatch dropped");
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Damage task
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SourceDisabled,
    VictimGone,
    VictimDead,
    OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    Applied { damage: f64, attacker: Option<EntityId> },
    Cancelled,
    Skipped(SkipReason),
}

/// One (source, victim) application, executed on the victim's context
struct DamageTask {
    registry: Arc<SourceRegistry>,
    locator: Arc<EntityLocator>,
    pipeline: Arc<DamageEventPipeline>,
    source: Arc<DamageSource>,
    victim: EntityId,
    settings: DriverSettings,
}

impl DamageTask {
    fn run(self) -> Option<DamageOutcome> {
        match self.apply() {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(
                    source = %self.source.identifier,
                    entity = %self.victim,
                    error = %e,
                    "failed to apply scheduled damage"
                );
                None
            }
        }
    }

    fn apply(&self) -> Result<DamageOutcome, WorldError> {
        let world = self.locator.world();

        if !self.registry.is_enabled(&self.source.identifier) {
            return Ok(DamageOutcome::Skipped(SkipReason::SourceDisabled));
        }
        let Some(victim) = world.entity(self.victim) else {
            return Ok(DamageOutcome::Skipped(SkipReason::VictimGone));
        };
        if !victim.alive {
            return Ok(DamageOutcome::Skipped(SkipReason::VictimDead));
        }
        if self.settings.recheck_proximity
            && !victim.location.within(&self.source.location, self.settings.damage_radius)
        {
            debug!(source = %self.source.identifier, entity = %self.victim, "victim left damage radius");
            return Ok(DamageOutcome::Skipped(SkipReason::OutOfRange));
        }

        let event = self.pipeline.evaluate(self.victim, Arc::clone(&self.source));
        if event.is_cancelled() {
            debug!(source = %self.source.identifier, entity = %self.victim, "scheduled damage cancelled");
            return Ok(DamageOutcome::Cancelled);
        }

        let attacker = self.locator.nearest_attacker_except(
            &self.source.location,
            self.settings.attribution_radius,
            Some(self.victim),
        )?;
        world.apply_damage(self.victim, event.damage(), attacker)?;
        trace!(
            source = %self.source.identifier,
            entity = %self.victim,
            damage = event.damage(),
            ?attacker,
            "scheduled damage applied"
        );
        Ok(DamageOutcome::Applied {
            damage: event.damage(),
            attacker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{LastDamage, Location, RegionId};
        use crate::dispatch::{ExecutionContext, GlobalDispatcher, PooledContext, RegionDispatcher};
    use crate::error::ListenerError;
    use crate::test_support::wait_until;
    use crate::world::{EntitySnapshot, HecsWorld};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    /// Host main-thread queue drained explicitly by the test
    #[derive(Default)]
    struct ManualContext {
        queue: Mutex<Vec<Task>>,
    }

    impl ManualContext {
        fn run_pending(&self) -> usize {
            let tasks = std::mem::take(&mut *self.queue.lock().unwrap());
            let count = tasks.len();
            for task in tasks {
                task();
            }
            count
        }
    }

    impl ExecutionContext for ManualContext {
        fn name(&self) -> &str {
            "manual"
        }

        fn submit(&self, task: Task) -> Result<(), DispatchError> {
            self.queue.lock().unwrap().push(task);
            Ok(())
        }
    }

    struct Harness {
        world: Arc<HecsWorld>,
        ctx: Arc<ManualContext>,
        driver: TickDriver,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_world(Arc::new(HecsWorld::default()))
        }

        fn with_world(world: Arc<HecsWorld>) -> Self {
            let ctx = Arc::new(ManualContext::default());
            let driver = TickDriver::new(
                Arc::new(SourceRegistry::new()),
                Arc::new(EntityLocator::new(world.clone())),
                Arc::new(DamageEventPipeline::new()),
                Arc::new(GlobalDispatcher::new(ctx.clone())),
                DriverSettings::default(),
            );
            Self { world, ctx, driver }
        }

        /// Tick once and run whatever the tick dispatched
        fn tick(&self) -> TickReport {
            let report = self.driver.on_tick();
            self.ctx.run_pending();
            report
        }

        fn register(&self, source: DamageSource) {
            self.driver.registry().register(source).unwrap();
        }

        fn task(&self, id: &str, victim: EntityId) -> DamageTask {
            DamageTask {
                registry: Arc::clone(self.driver.registry()),
                locator: Arc::clone(self.driver.locator()),
                pipeline: Arc::clone(self.driver.pipeline()),
                source: self.driver.registry().find(id).unwrap(),
                victim,
                settings: *self.driver.settings(),
            }
        }
    }

    fn spot() -> Location {
        Location::new("overworld", 10.0, 64.0, 10.0)
    }

    fn source(id: &str, damage: f64, ticks: u64) -> DamageSource {
        DamageSource::new(id, spot(), damage, ticks)
    }

    #[test]
    fn test_report_accumulates_every_counter() {
        let mut totals = TickReport::default();
        totals.accumulate(&TickReport { tick: 1, advanced: 3, ..Default::default() });
        totals.accumulate(&TickReport {
            tick: 2,
            advanced: 1,
            due: 2,
            dispatched: 5,
            dropped: 1,
            failed: 1,
        });
        assert_eq!(
            totals,
            TickReport { tick: 2, advanced: 4, due: 2, dispatched: 5, dropped: 1, failed: 1 }
        );
    }

    #[test]
    fn test_countdown_then_fire_then_reset() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        h.register(source("magma", 1.0, 5));

        for expected in (0..5).rev() {
            let report = h.tick();
            assert_eq!(report.advanced, 1);
            assert_eq!(report.due, 0);
            assert_eq!(h.driver.registry().ticks_remaining("magma"), expected);
        }
        assert_eq!(h.world.health(victim), Some(20.0));

        let report = h.tick();
        assert_eq!(report.due, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(h.driver.registry().ticks_remaining("magma"), 5);
        assert_eq!(h.world.health(victim), Some(19.0));
        assert_eq!(h.driver.current_tick(), 6);
    }

    #[test]
    fn test_single_victim_scenario_is_environmental() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        let _far_player = h.world.spawn_actor("steve", Location::new("overworld", 200.0, 64.0, 0.0), 20.0);
        h.register(source("S1", 4.0, 3));

        for _ in 0..3 {
            h.tick();
        }
        assert_eq!(h.world.health(victim), Some(20.0));

        h.tick();
        assert_eq!(h.world.health(victim), Some(16.0));
        assert_eq!(
            h.world.last_damage(victim),
            Some(LastDamage { amount: 4.0, attacker: None })
        );
        assert_eq!(h.driver.registry().ticks_remaining("S1"), 3);
    }

    #[test]
    fn test_damage_attributed_to_nearest_actor() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        let _far = h.world.spawn_actor("far", Location::new("overworld", 20.0, 64.0, 10.0), 20.0);
        let near = h.world.spawn_actor("near", Location::new("overworld", 13.0, 64.0, 10.0), 20.0);
        h.register(source("cactus", 1.0, 1));

        h.tick();
        h.tick();
        assert_eq!(h.world.last_damage(victim).unwrap().attacker, Some(near));
    }

    #[test]
    fn test_actor_victim_is_not_its_own_attacker() {
        let h = Harness::new();
        let steve = h.world.spawn_actor("steve", spot(), 20.0);
        h.register(source("cactus", 1.0, 1));

        h.tick();
        h.tick();
        assert_eq!(
            h.world.last_damage(steve),
            Some(LastDamage { amount: 1.0, attacker: None })
        );
    }

    #[test]
    fn test_disabled_source_is_frozen() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        h.register(source("off", 5.0, 2).disabled());

        for _ in 0..10 {
            let report = h.tick();
            assert_eq!(report, TickReport { tick: report.tick, ..Default::default() });
        }
        assert_eq!(h.driver.registry().ticks_remaining("off"), 2);
        assert_eq!(h.world.health(victim), Some(20.0));
    }

    #[test]
    fn test_cancelled_damage_still_resets() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        h.driver.pipeline().subscribe_fn("protect", |e| {
            e.set_cancelled(true);
            Ok(())
        });
        h.register(source("magma", 3.0, 1));

        h.tick();
        let report = h.tick();
        assert_eq!(report.dispatched, 1);
        assert_eq!(h.world.health(victim), Some(20.0));
        assert_eq!(h.driver.registry().ticks_remaining("magma"), 1);
    }

    #[test]
    fn test_listener_damage_override_lands() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        h.driver.pipeline().subscribe_fn("double", |e| {
            e.set_damage(e.damage() * 2.5);
            Ok(())
        });
        h.driver.pipeline().subscribe_fn("noisy", |_| Err(ListenerError::new("ignored")));
        h.register(source("magma", 2.0, 1));

        h.tick();
        h.tick();
        assert_eq!(h.world.health(victim), Some(15.0));
    }

    #[test]
    fn test_unregister_mid_countdown() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        h.register(source("S1", 4.0, 3));
        h.tick();
        h.tick();

        assert!(h.driver.registry().unregister("S1"));
        for _ in 0..10 {
            let report = h.tick();
            assert_eq!(report.advanced + report.due, 0);
        }
        assert_eq!(h.world.health(victim), Some(20.0));
    }

    #[test]
    fn test_reregistration_restarts_countdown() {
        let h = Harness::new();
        h.register(source("magma", 1.0, 4));
        h.tick();
        h.tick();
        assert_eq!(h.driver.registry().ticks_remaining("magma"), 2);

        h.register(source("magma", 1.0, 7));
        assert_eq!(h.driver.registry().ticks_remaining("magma"), 7);
    }

    #[test]
    fn test_due_without_victims_resets() {
        let h = Harness::new();
        h.register(source("lonely", 1.0, 2));
        for _ in 0..3 {
            h.tick();
        }
        assert_eq!(h.driver.registry().ticks_remaining("lonely"), 2);
    }

    #[test]
    fn test_victims_outside_radius_untouched() {
        let h = Harness::new();
        let inside = h.world.spawn_creature(Location::new("overworld", 11.0, 64.0, 10.0), 20.0);
        let outside = h.world.spawn_creature(Location::new("overworld", 12.0, 64.0, 10.0), 20.0);
        let corpse = h.world.spawn_creature(spot(), 20.0);
        h.world.apply_damage(corpse, 20.0, None).unwrap();
        h.register(source("magma", 2.0, 1));

        h.tick();
        let report = h.tick();
        assert_eq!(report.dispatched, 1);
        assert_eq!(h.world.health(inside), Some(18.0));
        assert_eq!(h.world.health(outside), Some(20.0));
    }

    #[test]
    fn test_task_rechecks_state_at_execution() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        h.register(source("magma", 2.0, 1));

        let task = h.task("magma", victim);
        h.world.move_to(victim, Location::new("overworld", 50.0, 64.0, 10.0)).unwrap();
        assert_eq!(task.run(), Some(DamageOutcome::Skipped(SkipReason::OutOfRange)));

        h.world.move_to(victim, spot()).unwrap();
        let task = h.task("magma", victim);
        h.driver.registry().set_enabled("magma", false);
        assert_eq!(task.run(), Some(DamageOutcome::Skipped(SkipReason::SourceDisabled)));
        h.driver.registry().set_enabled("magma", true);

        let task = h.task("magma", victim);
        h.world.despawn(victim);
        assert_eq!(task.run(), Some(DamageOutcome::Skipped(SkipReason::VictimGone)));
    }

    #[test]
    fn test_task_skips_dead_victim() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        h.register(source("magma", 2.0, 1));

        let task = h.task("magma", victim);
        h.world.apply_damage(victim, 20.0, None).unwrap();
        assert_eq!(task.run(), Some(DamageOutcome::Skipped(SkipReason::VictimDead)));
    }

    #[test]
    fn test_disabled_between_dispatch_and_execution() {
        let h = Harness::new();
        let victim = h.world.spawn_creature(spot(), 20.0);
        h.register(source("magma", 2.0, 1));

        h.tick();
        h.driver.on_tick();
        h.driver.registry().set_enabled("magma", false);
        assert_eq!(h.ctx.run_pending(), 1);
        assert_eq!(h.world.health(victim), Some(20.0));
    }

    /// Fails or panics for queries in particular worlds
    struct FlakyWorld {
        inner: HecsWorld,
    }

    impl WorldQuery for FlakyWorld {
        fn entities_near(&self, c: &Location, r: f64) -> Result<Vec<EntitySnapshot>, WorldError> {
            match c.world.as_str() {
                "broken" => Err(WorldError::Query("chunk not loaded".to_string())),
                "cursed" => panic!("spatial index corrupted"),
                _ => self.inner.entities_near(c, r),
            }
        }
        fn entity(&self, id: EntityId) -> Option<EntitySnapshot> {
            self.inner.entity(id)
        }
        fn region_of(&self, id: EntityId) -> Option<RegionId> {
            self.inner.region_of(id)
        }
        fn apply_damage(&self, id: EntityId, a: f64, by: Option<EntityId>) -> Result<(), WorldError> {
            self.inner.apply_damage(id, a, by)
        }
    }

    #[test]
    fn test_failing_source_does_not_block_others() {
        let world = Arc::new(FlakyWorld { inner: HecsWorld::default() });
        let victim = world.inner.spawn_creature(spot(), 20.0);
        let ctx = Arc::new(ManualContext::default());
        let driver = TickDriver::new(
            Arc::new(SourceRegistry::new()),
            Arc::new(EntityLocator::new(world.clone())),
            Arc::new(DamageEventPipeline::new()),
            Arc::new(GlobalDispatcher::new(ctx.clone())),
            DriverSettings::default(),
        );
        let registry = driver.registry();
        registry
            .register(DamageSource::new("a-broken", Location::new("broken", 0.0, 0.0, 0.0), 1.0, 1))
            .unwrap();
        registry
            .register(DamageSource::new("b-cursed", Location::new("cursed", 0.0, 0.0, 0.0), 1.0, 1))
            .unwrap();
        registry.register(source("c-fine", 3.0, 1)).unwrap();

        driver.on_tick();
        let report = driver.on_tick();
        ctx.run_pending();

        assert_eq!(report.due, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.dispatched, 1);
        assert_eq!(world.inner.health(victim), Some(17.0));
        for id in ["a-broken", "b-cursed", "c-fine"] {
            assert_eq!(registry.ticks_remaining(id), 1, "{id} was not reset");
        }
    }

    /// Records which thread each damage application ran on
    struct ThreadRecordingWorld {
        inner: HecsWorld,
        applied_on: Mutex<Vec<String>>,
    }

    impl WorldQuery for ThreadRecordingWorld {
        fn entities_near(&self, c: &Location, r: f64) -> Result<Vec<EntitySnapshot>, WorldError> {
            self.inner.entities_near(c, r)
        }
        fn entity(&self, id: EntityId) -> Option<EntitySnapshot> {
            self.inner.entity(id)
        }
        fn region_of(&self, id: EntityId) -> Option<RegionId> {
            self.inner.region_of(id)
        }
        fn apply_damage(&self, id: EntityId, a: f64, by: Option<EntityId>) -> Result<(), WorldError> {
            let name = thread::current().name().unwrap_or_default().to_string();
            self.applied_on.lock().unwrap().push(name);
            self.inner.apply_damage(id, a, by)
        }
    }

    #[test]
    fn test_region_affine_applies_once_on_owning_region() {
        let world = Arc::new(ThreadRecordingWorld {
            inner: HecsWorld::new(16.0),
            applied_on: Mutex::new(Vec::new()),
        });
        let hazard = Location::new("overworld", 40.0, 64.0, 8.0);
        let victim = world.inner.spawn_creature(hazard.clone(), 20.0);

        let dispatcher = Arc::new(RegionDispatcher::new(world.clone(), false));
        dispatcher.register_region(
            RegionId::new("overworld", 0, 0),
            Arc::new(PooledContext::new("region-spawn").unwrap()),
        );
        dispatcher.register_region(
            RegionId::new("overworld", 2, 0),
            Arc::new(PooledContext::new("region-east").unwrap()),
        );
        let driver = TickDriver::new(
            Arc::new(SourceRegistry::new()),
            Arc::new(EntityLocator::new(world.clone())),
            Arc::new(DamageEventPipeline::new()),
            dispatcher,
            DriverSettings::default(),
        );
        driver
            .registry()
            .register(DamageSource::new("east-magma", hazard, 5.0, 1))
            .unwrap();

        driver.on_tick();
        let report = driver.on_tick();
        assert_eq!(report.dispatched, 1);

        assert!(wait_until(Duration::from_secs(2), || world.inner.health(victim) == Some(15.0)));
        thread::sleep(Duration::from_millis(20));
        let applied_on = world.applied_on.lock().unwrap().clone();
        assert_eq!(applied_on, vec!["region-east".to_string()]);
        assert_ne!(thread::current().name(), Some("region-east"));
    }

    #[test]
    fn test_unresolvable_region_drops_task() {
        let world = Arc::new(HecsWorld::new(16.0));
        let victim = world.spawn_creature(spot(), 20.0);
        let driver = TickDriver::new(
            Arc::new(SourceRegistry::new()),
            Arc::new(EntityLocator::new(world.clone())),
            Arc::new(DamageEventPipeline::new()),
            Arc::new(RegionDispatcher::new(world.clone(), false)),
            DriverSettings::default(),
        );
        driver.registry().register(source("magma", 1.0, 1)).unwrap();

        driver.on_tick();
        let report = driver.on_tick();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(driver.registry().ticks_remaining("magma"), 1);
        assert_eq!(world.health(victim), Some(20.0));
    }

    #[test]
    fn test_from_config_global_mode_end_to_end() {
        let world = Arc::new(HecsWorld::default());
        let victim = world.spawn_creature(spot(), 20.0);
        let config = EngineConfig::default();
        let driver = TickDriver::from_config(&config, world.clone()).unwrap();
        driver.registry().register(source("magma", 2.0, 1)).unwrap();

        driver.on_tick();
        driver.on_tick();
        assert!(wait_until(Duration::from_secs(2), || world.health(victim) == Some(18.0)));
    }
}
