//! Entity Locator - victim and attacker discovery around a source
//!
//! Both queries read the world at call time; nothing is cached across ticks.

use std::collections::HashSet;
use std::sync::Arc;

use crate::components::{EntityId, Location};
use crate::error::WorldError;
use crate::world::{EntitySnapshot, WorldQuery};

pub struct EntityLocator {
    world: Arc<dyn WorldQuery>,
}

impl EntityLocator {
    pub fn new(world: Arc<dyn WorldQuery>) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &Arc<dyn WorldQuery> {
        &self.world
    }

    /// Living entities within `radius` (inclusive) of `location`, in the
    /// world's encounter order and without duplicates
    pub fn nearby_victims(
        &self,
        location: &Location,
        radius: f64,
    ) -> Result<Vec<EntityId>, WorldError> {
        let mut seen = HashSet::new();
        let victims = self
            .world
            .entities_near(location, radius)?
            .into_iter()
            .filter(|e| e.alive && e.location.within(location, radius))
            .filter(|e| seen.insert(e.id))
            .map(|e| e.id)
            .collect();
        Ok(victims)
    }

    /// Closest online, living actor within `radius`.
    ///
    /// Exact distance ties go to the actor the world reported first; that
    /// order is only as stable as the world implementation makes it.
    pub fn nearest_attacker(
        &self,
        location: &Location,
        radius: f64,
    ) -> Result<Option<EntityId>, WorldError> {
        self.nearest_attacker_except(location, radius, None)
    }

    /// Same as [`nearest_attacker`](Self::nearest_attacker), never returning `exclude`
    pub fn nearest_attacker_except(
        &self,
        location: &Location,
        radius: f64,
        exclude: Option<EntityId>,
    ) -> Result<Option<EntityId>, WorldError> {
        let candidates = self.world.entities_near(location, radius)?;
        Ok(closest(location, radius, exclude, &candidates))
    }
}

fn closest(
    location: &Location,
    radius: f64,
    exclude: Option<EntityId>,
    candidates: &[EntitySnapshot],
) -> Option<EntityId> {
    let mut best: Option<(f64, EntityId)> = None;
    for c in candidates {
        if !c.is_eligible_attacker() || Some(c.id) == exclude {
            continue;
        }
        let Some(d) = c.location.distance(location) else {
            continue;
        };
        if d > radius {
            continue;
        }
        // strict: first encountered wins a tie
        if best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, c.id));
        }
    }
    best.map(|(_, id)| id)
}
