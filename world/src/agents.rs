//! Authoritative agent state management utilities.

use glam::Vec2;
use lane_skirmish_core::{AgentId, AgentKind, AgentSnapshot, Health};

/// State of an agent stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct AgentState {
    /// Handle allocated by the world for the agent.
    pub(crate) id: AgentId,
    /// Kind of agent.
    pub(crate) kind: AgentKind,
    /// Continuous world position.
    pub(crate) position: Vec2,
    /// Remaining hit points.
    pub(crate) health: Health,
    /// Whether the agent can be targeted.
    pub(crate) active: bool,
}

impl AgentState {
    pub(crate) fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            kind: self.kind,
            position: self.position,
            health: self.health,
            active: self.active,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Slot {
    generation: u32,
    agent: Option<AgentState>,
}

/// Registry that stores agents in generational slots.
///
/// Removing an agent bumps its slot's generation so stale handles held by
/// systems stop resolving even after the slot is reused.
#[derive(Debug, Default)]
pub(crate) struct AgentRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores a new agent at full health and returns its handle.
    pub(crate) fn insert(&mut self, kind: AgentKind, position: Vec2) -> AgentId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                u32::try_from(self.slots.len() - 1).unwrap_or(u32::MAX)
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = AgentId::new(index, slot.generation);
        slot.agent = Some(AgentState {
            id,
            kind,
            position,
            health: Health::new(kind.max_health()),
            active: true,
        });
        id
    }

    pub(crate) fn get(&self, id: AgentId) -> Option<&AgentState> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.agent.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentState> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.agent.as_mut())
    }

    /// Removes the agent and retires its handle.
    pub(crate) fn remove(&mut self, id: AgentId) -> Option<AgentState> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())?;
        let state = slot.agent.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        Some(state)
    }

    /// Removes every agent, returning them in handle order.
    pub(crate) fn drain(&mut self) -> Vec<AgentState> {
        let mut drained = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(state) = slot.agent.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(u32::try_from(index).unwrap_or(u32::MAX));
                drained.push(state);
            }
        }
        drained
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &AgentState> {
        self.slots.iter().filter_map(|slot| slot.agent.as_ref())
    }
}
