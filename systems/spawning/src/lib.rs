#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Resource-gated scheduler that reinforces the ally side.
//!
//! The scheduler owns the [`ResourcePool`] and the [`OccupiedCells`] set.
//! On every attempt it scores free ally-spawnable cells with
//! [`SpawnDesirability`], debits the spawn cost and emits a single
//! [`Command::SpawnAgent`]. World events settle the outcome: a confirmed spawn
//! binds the agent to its cell, a rejected spawn frees the cell and refunds
//! the cost, and a removed agent frees its cell for reuse.

mod occupancy;

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use lane_skirmish_core::{
    AgentId, AgentKind, AgentView, Cell, CellCoord, Command, Event, Faction, GridView,
    SimulationError, SpawnError,
};
use lane_skirmish_system_resources::ResourcePool;
use lane_skirmish_system_targeting::{select_best, SpawnDesirability};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub use crate::occupancy::OccupiedCells;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resources debited for every spawned ally.
    pub spawn_cost: u32,
    /// Base delay between spawns while enemies outnumber allies.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub outnumbered_delay: Duration,
    /// Base delay between spawns otherwise.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub steady_delay: Duration,
    /// Extra delay added per living ally.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub per_ally_delay: Duration,
    /// Cap on the per-ally extra delay.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub max_ally_delay: Duration,
    /// Delay before retrying after the pool could not cover the cost.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub retry_delay: Duration,
    /// Seed for the fallback cell choice.
    pub rng_seed: u64,
}

impl Config {
    /// Creates a configuration with the provided cost and seed and default
    /// timing.
    #[must_use]
    pub fn new(spawn_cost: u32, rng_seed: u64) -> Self {
        Self {
            spawn_cost,
            rng_seed,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spawn_cost: 4,
            outnumbered_delay: Duration::from_millis(500),
            steady_delay: Duration::from_secs(2),
            per_ally_delay: Duration::from_millis(200),
            max_ally_delay: Duration::from_secs(3),
            retry_delay: Duration::from_secs(3),
            rng_seed: 0x5eed_a11e_5bad_c0de,
        }
    }
}

/// Delay until the next spawn attempt given the current head counts.
///
/// Outnumbered allies reinforce faster; every living ally slows the cadence
/// a little, up to the configured cap.
#[must_use]
pub fn spawn_delay(config: &Config, allies: usize, enemies: usize) -> Duration {
    let base = if enemies > allies {
        config.outnumbered_delay
    } else {
        config.steady_delay
    };
    let allies = u32::try_from(allies).unwrap_or(u32::MAX);
    let extra = config
        .per_ally_delay
        .saturating_mul(allies)
        .min(config.max_ally_delay);
    base.saturating_add(extra)
}

/// Pure system that turns resources into ally spawn commands.
#[derive(Debug)]
pub struct SpawnScheduler {
    config: Config,
    pool: ResourcePool,
    occupied: OccupiedCells,
    pending: BTreeSet<CellCoord>,
    bound: BTreeMap<AgentId, CellCoord>,
    clock: Duration,
    next_attempt_at: Duration,
    rng: ChaCha8Rng,
    candidates: Vec<CellCoord>,
}

impl SpawnScheduler {
    /// Creates a scheduler that spends from the provided pool.
    #[must_use]
    pub fn new(config: Config, pool: ResourcePool) -> Self {
        Self {
            config,
            pool,
            occupied: OccupiedCells::new(),
            pending: BTreeSet::new(),
            bound: BTreeMap::new(),
            clock: Duration::ZERO,
            next_attempt_at: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            candidates: Vec::new(),
        }
    }

    /// Consumes world events and immutable views to emit spawn commands.
    pub fn handle(
        &mut self,
        events: &[Event],
        grid: Option<GridView<'_>>,
        agents: &AgentView,
        out: &mut Vec<Command>,
    ) {
        let mut elapsed = Duration::ZERO;
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => elapsed = elapsed.saturating_add(*dt),
                Event::AgentSpawned {
                    agent,
                    kind: AgentKind::Soldier,
                    cell,
                } => self.confirm(*agent, *cell),
                Event::SpawnRejected { cell, reason, .. } => self.reject(*cell, *reason),
                Event::AgentRemoved { agent, .. } => self.release(*agent),
                Event::GridConfigured { .. } => self.reset(),
                _ => {}
            }
        }

        if elapsed.is_zero() {
            return;
        }

        self.clock = self.clock.saturating_add(elapsed);
        let _ = self.pool.advance(elapsed);

        let Some(grid) = grid else {
            return;
        };
        if self.clock >= self.next_attempt_at {
            self.attempt(&grid, agents, out);
        }
    }

    /// Validates and issues a spawn at a caller-chosen cell.
    ///
    /// Resources are debited only after the cell passes validation and no
    /// other spawn awaits confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Configuration`] without a grid,
    /// [`SimulationError::SpawnRejected`] for an invalid or occupied cell or
    /// while another spawn is in flight, and
    /// [`SimulationError::InsufficientResources`] when the pool cannot pay.
    pub fn request_spawn(
        &mut self,
        cell: CellCoord,
        grid: Option<GridView<'_>>,
        out: &mut Vec<Command>,
    ) -> Result<(), SimulationError> {
        let grid = grid.ok_or_else(|| {
            SimulationError::Configuration("spawn requested before grid configuration".into())
        })?;
        let reason = match grid.cell(cell) {
            None => Some(SpawnError::OutOfBounds),
            Some(target) if !target.is_walkable() => Some(SpawnError::NotWalkable),
            Some(target) if !target.accepts_spawn(Faction::Ally) => Some(SpawnError::NotSpawnable),
            Some(_) if self.occupied.contains(cell) => Some(SpawnError::Occupied),
            Some(_) if self.spawn_in_flight() => Some(SpawnError::InFlight),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Err(SimulationError::SpawnRejected { cell, reason });
        }

        let _ = self.pool.try_debit(self.config.spawn_cost)?;
        self.issue(cell, out);
        Ok(())
    }

    /// Resource pool spent by the scheduler.
    #[must_use]
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// Number of cells currently claimed by allies or in-flight spawns.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    /// Reports whether the cell is claimed.
    #[must_use]
    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.occupied.contains(cell)
    }

    /// Reports whether a spawn command awaits confirmation from the world.
    #[must_use]
    pub fn spawn_in_flight(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Simulated time of the next automatic attempt.
    #[must_use]
    pub fn next_attempt_at(&self) -> Duration {
        self.next_attempt_at
    }

    fn attempt(&mut self, grid: &GridView<'_>, agents: &AgentView, out: &mut Vec<Command>) {
        if self.spawn_in_flight() {
            return;
        }

        let allies = agents.count(Faction::Ally);
        let enemies = agents.count(Faction::Enemy);
        let delay = spawn_delay(&self.config, allies, enemies);

        self.candidates.clear();
        self.candidates.extend(
            grid.spawnable_cells(Faction::Ally)
                .map(Cell::position)
                .filter(|cell| !self.occupied.contains(*cell)),
        );
        if self.candidates.is_empty() {
            warn!("no free ally spawn cells");
            self.next_attempt_at = self.clock.saturating_add(delay);
            return;
        }

        let scorer = SpawnDesirability::from_view(agents);
        let chosen = match select_best(self.candidates.iter(), &scorer) {
            Some(cell) => *cell,
            None => match self.candidates.choose(&mut self.rng) {
                Some(cell) => *cell,
                None => return,
            },
        };

        if let Err(error) = self.pool.try_debit(self.config.spawn_cost) {
            debug!(%error, "spawn deferred");
            self.next_attempt_at = self.clock.saturating_add(self.config.retry_delay);
            return;
        }

        info!(
            column = chosen.column(),
            row = chosen.row(),
            allies,
            enemies,
            "spawning ally"
        );
        self.issue(chosen, out);
        self.next_attempt_at = self.clock.saturating_add(delay);
    }

    fn issue(&mut self, cell: CellCoord, out: &mut Vec<Command>) {
        let _ = self.occupied.claim(cell);
        let _ = self.pending.insert(cell);
        out.push(Command::SpawnAgent {
            kind: AgentKind::Soldier,
            cell,
        });
    }

    fn confirm(&mut self, agent: AgentId, cell: CellCoord) {
        if self.pending.remove(&cell) {
            let _ = self.bound.insert(agent, cell);
        }
    }

    fn reject(&mut self, cell: CellCoord, reason: SpawnError) {
        if !self.pending.remove(&cell) {
            return;
        }
        let _ = self.occupied.release(cell);
        let level = self.pool.add(self.config.spawn_cost);
        warn!(?cell, %reason, refunded = level.current, "ally spawn rejected");
    }

    fn release(&mut self, agent: AgentId) {
        if let Some(cell) = self.bound.remove(&agent) {
            let _ = self.occupied.release(cell);
        }
    }

    fn reset(&mut self) {
        self.occupied.clear();
        self.pending.clear();
        self.bound.clear();
    }
}
