//! Agent contracts: handles, factions, health and read-only agent views.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::SimulationError;

/// Generational handle naming an agent owned by the world.
///
/// Slots are recycled after an agent is removed, and the generation counter
/// distinguishes a stale handle from the slot's new occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId {
    index: u32,
    generation: u32,
}

impl AgentId {
    /// Creates a handle from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the world's registry.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Side an agent fights for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    /// Player-controlled units spawned by the scheduler.
    Ally,
    /// Hostile units placed by the scenario.
    Enemy,
}

impl Faction {
    /// Faction this one fights against.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Ally => Self::Enemy,
            Self::Enemy => Self::Ally,
        }
    }
}

/// Kinds of agents the simulation knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Allied melee unit that walks toward objectives and engages nearby enemies.
    Soldier,
    /// Enemy that patrols a route, notices, chases and attacks allies.
    Patroller,
    /// Stationary enemy that fires at the closest ally in range.
    Sentry,
}

impl AgentKind {
    /// Faction the kind belongs to.
    #[must_use]
    pub const fn faction(self) -> Faction {
        match self {
            Self::Soldier => Faction::Ally,
            Self::Patroller | Self::Sentry => Faction::Enemy,
        }
    }

    /// Health assigned when an agent of this kind spawns.
    #[must_use]
    pub const fn max_health(self) -> u32 {
        match self {
            Self::Soldier => 30,
            Self::Patroller => 20,
            Self::Sentry => 10,
        }
    }

    /// Whether combat targeting should favour this kind.
    #[must_use]
    pub const fn is_high_value(self) -> bool {
        matches!(self, Self::Patroller)
    }
}

/// Bounded hit point counter attached to every agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Health {
    current: u32,
    max: u32,
}

impl Health {
    /// Creates a full health counter.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Creates a counter with an explicit current value, clamped to `max`.
    #[must_use]
    pub fn with_current(current: u32, max: u32) -> Self {
        Self {
            current: current.min(max),
            max,
        }
    }

    /// Removes `amount` hit points, saturating at zero.
    pub fn apply_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    /// Restores `amount` hit points, never exceeding the maximum.
    pub fn heal(&mut self, amount: u32) {
        self.current = self.current.saturating_add(amount).min(self.max);
    }

    /// Remaining hit points.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Maximum hit points.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Reports whether the agent has run out of hit points.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current == 0
    }
}

/// Immutable representation of a single agent used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSnapshot {
    /// Handle allocated by the world.
    pub id: AgentId,
    /// Kind of agent.
    pub kind: AgentKind,
    /// Continuous world position.
    pub position: Vec2,
    /// Current health.
    pub health: Health,
    /// Whether the agent participates in the simulation.
    pub active: bool,
}

impl AgentSnapshot {
    /// Faction the agent belongs to.
    #[must_use]
    pub const fn faction(&self) -> Faction {
        self.kind.faction()
    }

    /// Whether the agent can currently be targeted.
    #[must_use]
    pub const fn is_targetable(&self) -> bool {
        self.active && !self.health.is_depleted()
    }
}

/// Read-only registry of live agents in deterministic handle order.
#[derive(Clone, Debug, Default)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over all captured snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Snapshot for the handle, if the agent is still registered.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&AgentSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }

    /// Resolves a weak target handle into a live, active agent.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidTarget`] when the agent was removed,
    /// deactivated or has no health left.
    pub fn resolve(&self, id: AgentId) -> Result<&AgentSnapshot, SimulationError> {
        self.get(id)
            .filter(|snapshot| snapshot.is_targetable())
            .ok_or(SimulationError::InvalidTarget(id))
    }

    /// Targetable agents belonging to the faction.
    pub fn of_faction(&self, faction: Faction) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots
            .iter()
            .filter(move |snapshot| snapshot.faction() == faction && snapshot.is_targetable())
    }

    /// Number of targetable agents belonging to the faction.
    #[must_use]
    pub fn count(&self, faction: Faction) -> usize {
        self.of_faction(faction).count()
    }

    /// Total number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether no agents are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(index: u32, kind: AgentKind, active: bool) -> AgentSnapshot {
        AgentSnapshot {
            id: AgentId::new(index, 0),
            kind,
            position: Vec2::ZERO,
            health: Health::new(kind.max_health()),
            active,
        }
    }

    #[test]
    fn health_heal_is_clamped_and_damage_saturates() {
        let mut health = Health::new(20);
        health.apply_damage(15);
        assert_eq!(health.current(), 5);
        health.heal(100);
        assert_eq!(health.current(), 20);
        health.apply_damage(25);
        assert_eq!(health.current(), 0);
        assert!(health.is_depleted());
    }

    #[test]
    fn resolve_rejects_inactive_and_missing_agents() {
        let view = AgentView::from_snapshots(vec![
            snapshot(2, AgentKind::Sentry, false),
            snapshot(1, AgentKind::Soldier, true),
        ]);

        assert!(view.resolve(AgentId::new(1, 0)).is_ok());
        assert_eq!(
            view.resolve(AgentId::new(2, 0)),
            Err(SimulationError::InvalidTarget(AgentId::new(2, 0)))
        );
        assert_eq!(
            view.resolve(AgentId::new(1, 1)),
            Err(SimulationError::InvalidTarget(AgentId::new(1, 1)))
        );
    }

    #[test]
    fn faction_counts_ignore_inactive_agents() {
        let view = AgentView::from_snapshots(vec![
            snapshot(0, AgentKind::Soldier, true),
            snapshot(1, AgentKind::Soldier, false),
            snapshot(2, AgentKind::Patroller, true),
            snapshot(3, AgentKind::Sentry, true),
        ]);

        assert_eq!(view.count(Faction::Ally), 1);
        assert_eq!(view.count(Faction::Enemy), 2);
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn only_patrollers_are_high_value() {
        assert!(AgentKind::Patroller.is_high_value());
        assert!(!AgentKind::Sentry.is_high_value());
        assert!(!AgentKind::Soldier.is_high_value());
    }
}
