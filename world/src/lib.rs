#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Lane Skirmish.
//!
//! The world owns the cell grid and the registry of live agents. Every
//! mutation flows through [`apply`], which validates the command and reports
//! the outcome as [`Event`] values.

mod agents;
mod grid;

use std::time::Duration;

use lane_skirmish_core::{Command, Event, RemovalCause, SpawnError};

use crate::agents::AgentRegistry;
pub use crate::grid::GridWorld;

/// Represents the authoritative Lane Skirmish world state.
#[derive(Debug)]
pub struct World {
    grid: Option<GridWorld>,
    agents: AgentRegistry,
    elapsed: Duration,
    tick_index: u64,
}

impl World {
    /// Creates an empty world. A grid must be configured before agents can spawn.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grid: None,
            agents: AgentRegistry::new(),
            elapsed: Duration::ZERO,
            tick_index: 0,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureGrid { size } => {
            for state in world.agents.drain() {
                out_events.push(Event::AgentRemoved {
                    agent: state.id,
                    kind: state.kind,
                    cause: RemovalCause::Despawned,
                });
            }
            world.grid = Some(GridWorld::new(size));
            out_events.push(Event::GridConfigured { size });
        }
        Command::UpdateCell {
            cell,
            walkable,
            movement_cost,
            ally_spawnable,
            enemy_spawnable,
        } => {
            let Some(grid) = world.grid.as_mut() else {
                return;
            };
            if let Some(flags) =
                grid.update_cell(cell, walkable, movement_cost, ally_spawnable, enemy_spawnable)
            {
                out_events.push(Event::CellUpdated { cell, flags });
            }
        }
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            world.elapsed = world.elapsed.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::SpawnAgent { kind, cell } => {
            let verdict = match world.grid.as_ref().and_then(|grid| grid.get_cell(cell)) {
                None => Err(SpawnError::OutOfBounds),
                Some(target) if !target.is_walkable() => Err(SpawnError::NotWalkable),
                Some(target) if !target.accepts_spawn(kind.faction()) => {
                    Err(SpawnError::NotSpawnable)
                }
                Some(_) => Ok(()),
            };

            match verdict {
                Ok(()) => {
                    let agent = world.agents.insert(kind, cell.world_point());
                    out_events.push(Event::AgentSpawned { agent, kind, cell });
                }
                Err(reason) => out_events.push(Event::SpawnRejected { kind, cell, reason }),
            }
        }
        Command::MoveAgent { agent, to } => {
            let Some(grid) = world.grid.as_ref() else {
                return;
            };
            if !to.is_finite() {
                return;
            }
            let destination = grid.size().clamp_point(to);
            let Some(state) = world.agents.get_mut(agent) else {
                return;
            };
            let from = state.position;
            if from == destination {
                return;
            }
            state.position = destination;
            out_events.push(Event::AgentMoved {
                agent,
                from,
                to: destination,
            });
        }
        Command::DamageAgent {
            target, amount, ..
        } => {
            if amount == 0 {
                return;
            }
            let Some(state) = world.agents.get_mut(target) else {
                return;
            };
            let previous = state.health.current();
            state.health.apply_damage(amount);
            out_events.push(Event::HealthChanged {
                agent: target,
                previous,
                current: state.health.current(),
                max: state.health.max(),
            });

            if state.health.is_depleted() {
                if let Some(removed) = world.agents.remove(target) {
                    out_events.push(Event::AgentRemoved {
                        agent: target,
                        kind: removed.kind,
                        cause: RemovalCause::Killed,
                    });
                }
            }
        }
        Command::HealAgent { target, amount } => {
            let Some(state) = world.agents.get_mut(target) else {
                return;
            };
            let previous = state.health.current();
            state.health.heal(amount);
            if state.health.current() != previous {
                out_events.push(Event::HealthChanged {
                    agent: target,
                    previous,
                    current: state.health.current(),
                    max: state.health.max(),
                });
            }
        }
        Command::SetAgentActive { agent, active } => {
            let Some(state) = world.agents.get_mut(agent) else {
                return;
            };
            if state.active != active {
                state.active = active;
                out_events.push(Event::AgentActivityChanged { agent, active });
            }
        }
        Command::DespawnAgent { agent } => {
            if let Some(removed) = world.agents.remove(agent) {
                out_events.push(Event::AgentRemoved {
                    agent,
                    kind: removed.kind,
                    cause: RemovalCause::Despawned,
                });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use lane_skirmish_core::{
        AgentId, AgentSnapshot, AgentView, Cell, CellCoord, Faction, GridView,
    };

    use super::{GridWorld, World};

    /// Provides read-only access to the configured grid, if any.
    #[must_use]
    pub fn grid(world: &World) -> Option<&GridWorld> {
        world.grid.as_ref()
    }

    /// Captures a read-only view of the grid for systems.
    #[must_use]
    pub fn grid_view(world: &World) -> Option<GridView<'_>> {
        world.grid.as_ref().map(GridWorld::view)
    }

    /// Copy of the cell at the coordinate, or `None` when out of bounds.
    #[must_use]
    pub fn cell(world: &World, coord: CellCoord) -> Option<Cell> {
        world
            .grid
            .as_ref()
            .and_then(|grid| grid.get_cell(coord))
            .copied()
    }

    /// Walkable cells that accept spawns for the faction.
    #[must_use]
    pub fn spawnable_cells(world: &World, faction: Faction) -> Vec<Cell> {
        world
            .grid
            .as_ref()
            .map(|grid| grid.spawnable_cells(faction))
            .unwrap_or_default()
    }

    /// Captures a read-only view of every registered agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        AgentView::from_snapshots(world.agents.iter().map(|state| state.snapshot()).collect())
    }

    /// Snapshot of a single agent, if the handle still resolves.
    #[must_use]
    pub fn agent(world: &World, id: AgentId) -> Option<AgentSnapshot> {
        world.agents.get(id).map(|state| state.snapshot())
    }

    /// Number of targetable agents belonging to the faction.
    #[must_use]
    pub fn agent_count(world: &World, faction: Faction) -> usize {
        world
            .agents
            .iter()
            .filter(|state| {
                state.kind.faction() == faction && state.active && !state.health.is_depleted()
            })
            .count()
    }

    /// Total simulated time accumulated through ticks.
    #[must_use]
    pub fn elapsed(world: &World) -> Duration {
        world.elapsed
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }
}
