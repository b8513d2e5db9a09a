//! Damage events - the cancellable hook run before every damage application
//!
//! Listeners see the event synchronously, in subscription order. Each may
//! change the damage or cancel it; when listeners disagree the last write
//! wins. A listener that fails (error or panic) is rolled back as if it had
//! not run, and the remaining listeners still see the event.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::components::EntityId;
use crate::error::{panic_message, ListenerError};
use crate::source::DamageSource;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledDamageEvent {
    victim: EntityId,
    source: Arc<DamageSource>,
    damage: f64,
    cancelled: bool,
}

impl ScheduledDamageEvent {
    pub fn new(victim: EntityId, source: Arc<DamageSource>) -> Self {
        let damage = source.damage_amount;
        Self {
            victim,
            source,
            damage,
            cancelled: false,
        }
    }

    pub fn victim(&self) -> EntityId {
        self.victim
    }

    pub fn source(&self) -> &DamageSource {
        &self.source
    }

    pub fn damage(&self) -> f64 {
        self.damage
    }

    /// Non-finite values are ignored, negatives become zero
    pub fn set_damage(&mut self, damage: f64) {
        if damage.is_finite() {
            self.damage = damage.max(0.0);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

pub trait DamageListener: Send + Sync {
    fn on_scheduled_damage(&self, event: &mut ScheduledDamageEvent) -> Result<(), ListenerError>;

    /// Skip this listener once an earlier one has cancelled the event
    fn ignore_cancelled(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

struct FnListener<F> {
    name: String,
    f: F,
}

impl<F> DamageListener for FnListener<F>
where
    F: Fn(&mut ScheduledDamageEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_scheduled_damage(&self, event: &mut ScheduledDamageEvent) -> Result<(), ListenerError> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<dyn DamageListener>)>,
}

#[derive(Default)]
pub struct DamageEventPipeline {
    listeners: RwLock<Listeners>,
}

impl DamageEventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl DamageListener + 'static) -> ListenerId {
        self.subscribe_arc(Arc::new(listener))
    }

    pub fn subscribe_arc(&self, listener: Arc<dyn DamageListener>) -> ListenerId {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, listener));
        id
    }

    pub fn subscribe_fn<F>(&self, name: impl Into<String>, f: F) -> ListenerId
    where
        F: Fn(&mut ScheduledDamageEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.subscribe(FnListener {
            name: name.into(),
            f,
        })
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.entries.len();
        listeners.entries.retain(|(lid, _)| *lid != id);
        listeners.entries.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Build the event for one victim and publish it to every listener
    pub fn evaluate(&self, victim: EntityId, source: Arc<DamageSource>) -> ScheduledDamageEvent {
        let mut event = ScheduledDamageEvent::new(victim, source);
        self.publish(&mut event);
        event
    }

    pub fn publish(&self, event: &mut ScheduledDamageEvent) {
        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<Arc<dyn DamageListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if event.cancelled && listener.ignore_cancelled() {
                continue;
            }
            let before = event.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_scheduled_damage(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        listener = listener.name(),
                        source = %event.source.identifier,
                        entity = %event.victim,
                        error = %e,
                        "damage listener failed, changes discarded"
                    );
                    *event = before;
                }
                Err(payload) => {
                    warn!(
                        listener = listener.name(),
                        source = %event.source.identifier,
                        entity = %event.victim,
                        panic = %panic_message(payload.as_ref()),
                        "damage listener panicked, changes discarded"
                    );
                    *event = before;
                }
            }
        }
    }
}
