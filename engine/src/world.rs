//! World - the spatial query collaborator and an in-memory hecs implementation
//!
//! The engine never owns the simulation. It reads entity snapshots through
//! [`WorldQuery`] and asks the world to apply damage. [`HecsWorld`] is the
//! reference implementation used by the demo binary and the tests.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hecs::{Entity, World};

use crate::components::*;
use crate::error::WorldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Creature,
    Actor { online: bool },
}

/// Point-in-time view of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub location: Location,
    pub alive: bool,
    pub kind: EntityKind,
}

impl EntitySnapshot {
    /// Online, living actor that damage can be attributed to
    pub fn is_eligible_attacker(&self) -> bool {
        self.alive && matches!(self.kind, EntityKind::Actor { online: true })
    }
}

/// Spatial queries, liveness and damage application offered by the host world
pub trait WorldQuery: Send + Sync {
    /// Entities that may lie within `radius` of `center`. Implementations may
    /// return a superset; callers apply the exact distance predicate.
    fn entities_near(&self, center: &Location, radius: f64)
        -> Result<Vec<EntitySnapshot>, WorldError>;

    fn entity(&self, id: EntityId) -> Option<EntitySnapshot>;

    /// Region owning the entity's current location
    fn region_of(&self, id: EntityId) -> Option<RegionId>;

    fn apply_damage(
        &self,
        id: EntityId,
        amount: f64,
        attacker: Option<EntityId>,
    ) -> Result<(), WorldError>;
}

// ============================================================================
// Reference world
// ============================================================================

pub struct HecsWorld {
    world: RwLock<World>,
    region_size: f64,
}

fn to_id(entity: Entity) -> EntityId {
    EntityId(entity.to_bits().get())
}

fn to_entity(id: EntityId) -> Result<Entity, WorldError> {
    Entity::from_bits(id.0).ok_or(WorldError::NoSuchEntity(id))
}

fn snapshot(id: EntityId, pos: &Position, hp: &Health, actor: Option<&Actor>) -> EntitySnapshot {
    EntitySnapshot {
        id,
        location: pos.0.clone(),
        alive: hp.is_alive(),
        kind: match actor {
            Some(a) => EntityKind::Actor { online: a.online },
            None => EntityKind::Creature,
        },
    }
}

impl HecsWorld {
    pub fn new(region_size: f64) -> Self {
        Self {
            world: RwLock::new(World::new()),
            region_size,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, World> {
        self.world.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, World> {
        self.world.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spawn_creature(&self, location: Location, max_health: f64) -> EntityId {
        to_id(self.write().spawn((Position(location), Health::new(max_health))))
    }

    pub fn spawn_actor(&self, name: impl Into<String>, location: Location, max_health: f64) -> EntityId {
        let actor = Actor {
            name: name.into(),
            online: true,
        };
        to_id(self.write().spawn((Position(location), Health::new(max_health), actor)))
    }

    pub fn move_to(&self, id: EntityId, location: Location) -> Result<(), WorldError> {
        let entity = to_entity(id)?;
        let mut world = self.write();
        let pos = world
            .query_one_mut::<&mut Position>(entity)
            .map_err(|_| WorldError::NoSuchEntity(id))?;
        pos.0 = location;
        Ok(())
    }

    pub fn set_online(&self, id: EntityId, online: bool) -> Result<(), WorldError> {
        let entity = to_entity(id)?;
        let mut world = self.write();
        let actor = world
            .query_one_mut::<&mut Actor>(entity)
            .map_err(|_| WorldError::Query(format!("entity {id} is not an actor")))?;
        actor.online = online;
        Ok(())
    }

    pub fn despawn(&self, id: EntityId) -> bool {
        match to_entity(id) {
            Ok(entity) => self.write().despawn(entity).is_ok(),
            Err(_) => false,
        }
    }

    pub fn health(&self, id: EntityId) -> Option<f64> {
        let entity = to_entity(id).ok()?;
        let world = self.read();
        let hp = world.get::<&Health>(entity).ok()?;
        Some(hp.current)
    }

    pub fn last_damage(&self, id: EntityId) -> Option<LastDamage> {
        let entity = to_entity(id).ok()?;
        let world = self.read();
        let last = world.get::<&LastDamage>(entity).ok()?;
        Some(*last)
    }

    pub fn entity_count(&self) -> usize {
        self.read().len() as usize
    }

    pub fn region_size(&self) -> f64 {
        self.region_size
    }
}

impl Default for HecsWorld {
    fn default() -> Self {
        Self::new(256.0)
    }
}

impl WorldQuery for HecsWorld {
    fn entities_near(
        &self,
        center: &Location,
        radius: f64,
    ) -> Result<Vec<EntitySnapshot>, WorldError> {
        let world = self.read();
        let found = world
            .query::<(&Position, &Health, Option<&Actor>)>()
            .iter()
            .filter(|(_, (pos, _, _))| pos.0.within(center, radius))
            .map(|(entity, (pos, hp, actor))| snapshot(to_id(entity), pos, hp, actor))
            .collect();
        Ok(found)
    }

    fn entity(&self, id: EntityId) -> Option<EntitySnapshot> {
        let entity = to_entity(id).ok()?;
        let world = self.read();
        let mut query = world
            .query_one::<(&Position, &Health, Option<&Actor>)>(entity)
            .ok()?;
        let (pos, hp, actor) = query.get()?;
        Some(snapshot(id, pos, hp, actor))
    }

    fn region_of(&self, id: EntityId) -> Option<RegionId> {
        let entity = to_entity(id).ok()?;
        let world = self.read();
        let pos = world.get::<&Position>(entity).ok()?;
        Some(RegionId::containing(&pos.0, self.region_size))
    }

    fn apply_damage(
        &self,
        id: EntityId,
        amount: f64,
        attacker: Option<EntityId>,
    ) -> Result<(), WorldError> {
        let entity = to_entity(id)?;
        let mut world = self.write();
        if !world.contains(entity) {
            return Err(WorldError::NoSuchEntity(id));
        }
        {
            let hp = world
                .query_one_mut::<&mut Health>(entity)
                .map_err(|_| WorldError::NotDamageable(id))?;
            hp.take(amount);
        }
        world
            .insert_one(entity, LastDamage { amount, attacker })
            .map_err(|_| WorldError::NoSuchEntity(id))?;
        Ok(())
    }
}
