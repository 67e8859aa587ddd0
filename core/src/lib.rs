#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Lane Skirmish simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! views such as [`GridView`] and [`AgentView`], and respond exclusively with
//! new command batches.

mod agent;
mod grid;
pub mod seconds;

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use agent::{AgentId, AgentKind, AgentSnapshot, AgentView, Faction, Health};
pub use grid::{Cell, CellCoord, CellFlags, GridSize, GridView, Path};

/// Moves `from` toward `to` by at most `max_step`, landing exactly on `to`
/// when it is within reach.
#[must_use]
pub fn move_towards(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let offset = to - from;
    let distance = offset.length();
    if distance <= max_step || distance <= f32::EPSILON {
        return to;
    }
    from + offset / distance * max_step
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Creates a fresh grid of open cells, discarding every agent.
    ConfigureGrid {
        /// Dimensions of the new grid.
        size: GridSize,
    },
    /// Reconfigures the flags of a single cell.
    UpdateCell {
        /// Cell to reconfigure.
        cell: CellCoord,
        /// Whether agents may traverse the cell.
        walkable: bool,
        /// Stored traversal cost.
        movement_cost: u32,
        /// New ally spawnability, or `None` to keep the current value.
        ally_spawnable: Option<bool>,
        /// New enemy spawnability, or `None` to keep the current value.
        enemy_spawnable: Option<bool>,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that a new agent be created at the centre of a cell.
    SpawnAgent {
        /// Kind of agent to create.
        kind: AgentKind,
        /// Cell that must be walkable and spawnable for the kind's faction.
        cell: CellCoord,
    },
    /// Moves an agent to a new world position.
    MoveAgent {
        /// Agent to move.
        agent: AgentId,
        /// Destination, clamped to the grid by the world.
        to: Vec2,
    },
    /// Applies damage to an agent's health.
    DamageAgent {
        /// Agent responsible for the damage, if any.
        source: Option<AgentId>,
        /// Agent receiving the damage.
        target: AgentId,
        /// Hit points to remove.
        amount: u32,
    },
    /// Restores health to an agent, clamped to its maximum.
    HealAgent {
        /// Agent receiving the healing.
        target: AgentId,
        /// Hit points to restore.
        amount: u32,
    },
    /// Activates or deactivates an agent. Inactive agents cannot be targeted.
    SetAgentActive {
        /// Agent to update.
        agent: AgentId,
        /// Desired activity flag.
        active: bool,
    },
    /// Removes an agent without killing it.
    DespawnAgent {
        /// Agent to remove.
        agent: AgentId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a new grid was created.
    GridConfigured {
        /// Dimensions of the new grid.
        size: GridSize,
    },
    /// Reports that a cell's flags changed.
    CellUpdated {
        /// Cell that was reconfigured.
        cell: CellCoord,
        /// Flags now applied to the cell.
        flags: CellFlags,
    },
    /// Confirms that an agent was created.
    AgentSpawned {
        /// Handle assigned to the new agent.
        agent: AgentId,
        /// Kind of agent created.
        kind: AgentKind,
        /// Cell the agent was placed in.
        cell: CellCoord,
    },
    /// Reports that a spawn request was rejected.
    SpawnRejected {
        /// Kind of agent requested.
        kind: AgentKind,
        /// Cell provided in the request.
        cell: CellCoord,
        /// Specific reason the spawn failed.
        reason: SpawnError,
    },
    /// Confirms that an agent changed position.
    AgentMoved {
        /// Agent that moved.
        agent: AgentId,
        /// Position before the move.
        from: Vec2,
        /// Position after the move.
        to: Vec2,
    },
    /// Reports a change to an agent's health.
    HealthChanged {
        /// Agent whose health changed.
        agent: AgentId,
        /// Hit points before the change.
        previous: u32,
        /// Hit points after the change.
        current: u32,
        /// Maximum hit points of the agent.
        max: u32,
    },
    /// Reports that an agent was activated or deactivated.
    AgentActivityChanged {
        /// Agent whose activity flag changed.
        agent: AgentId,
        /// New activity flag.
        active: bool,
    },
    /// Announces that an agent left the simulation.
    AgentRemoved {
        /// Handle of the removed agent. It no longer resolves.
        agent: AgentId,
        /// Kind of the removed agent.
        kind: AgentKind,
        /// Why the agent was removed.
        cause: RemovalCause,
    },
}

/// Reasons an agent leaves the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalCause {
    /// Health reached zero.
    Killed,
    /// Removed explicitly or by a grid reconfiguration.
    Despawned,
}

/// Reasons a spawn request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum SpawnError {
    /// The cell lies outside the configured grid, or no grid exists.
    #[error("cell lies outside the grid")]
    OutOfBounds,
    /// The cell cannot be traversed.
    #[error("cell is not walkable")]
    NotWalkable,
    /// The cell does not accept spawns for the requested faction.
    #[error("cell does not accept spawns for this faction")]
    NotSpawnable,
    /// The cell is already claimed by a living ally.
    #[error("cell is already occupied")]
    Occupied,
    /// An earlier spawn still awaits confirmation from the world.
    #[error("another spawn is still in flight")]
    InFlight,
}

/// Failures reported by simulation operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// A required collaborator or parameter is missing.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// No walkable route connects the two cells.
    #[error("no walkable path from {start:?} to {end:?}")]
    PathNotFound {
        /// Requested start cell.
        start: CellCoord,
        /// Requested end cell.
        end: CellCoord,
    },
    /// A weak agent handle no longer resolves to a live, active agent.
    #[error("agent {0:?} is not a valid target")]
    InvalidTarget(AgentId),
    /// The resource pool cannot cover the requested amount.
    #[error("insufficient resources: requested {requested}, available {available}")]
    InsufficientResources {
        /// Amount that was requested.
        requested: u32,
        /// Amount available at the time of the request.
        available: u32,
    },
    /// A spawn request failed validation.
    #[error("spawn at {cell:?} rejected: {reason}")]
    SpawnRejected {
        /// Cell named in the request.
        cell: CellCoord,
        /// Validation failure.
        reason: SpawnError,
    },
}
