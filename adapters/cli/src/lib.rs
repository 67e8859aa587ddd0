#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Fixed-tick simulation loop that wires the world to every system.
//!
//! Each [`Simulation::step`] advances the world clock once and then lets the
//! systems react. Every pass hands the same event batch and the same views to
//! the spawn scheduler, the ally behavior and the enemy behavior, applies the
//! commands they produced and feeds the resulting events into the next pass.
//! Events still unprocessed after the pass limit carry over to the next tick.

use std::time::Duration;

use lane_skirmish_core::{Command, Event, Faction, RemovalCause, SimulationError};
use lane_skirmish_system_ally_behavior::AllyBehavior;
use lane_skirmish_system_bootstrap::Scenario;
use lane_skirmish_system_enemy_behavior::EnemyBehavior;
use lane_skirmish_system_resources::ResourcePool;
use lane_skirmish_system_spawning::SpawnScheduler;
use lane_skirmish_world::{self as world, query, World};
use tracing::{debug, info};

/// Upper bound on reaction passes per tick.
pub const MAX_PASSES_PER_TICK: usize = 8;

/// Running totals reported by [`Simulation::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Ticks simulated so far.
    pub ticks: u64,
    /// Simulated time so far.
    pub elapsed: Duration,
    /// Living, active allies.
    pub allies: usize,
    /// Living, active enemies.
    pub enemies: usize,
    /// Allies killed so far.
    pub allies_lost: u32,
    /// Enemies killed so far.
    pub enemies_lost: u32,
    /// Resources currently available to the spawner.
    pub resources: u32,
}

/// World plus systems advanced in lockstep.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    spawning: SpawnScheduler,
    allies: AllyBehavior,
    enemies: EnemyBehavior,
    pending: Vec<Event>,
    tick: Duration,
    allies_lost: u32,
    enemies_lost: u32,
}

impl Simulation {
    /// Builds the scenario in a fresh world.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Configuration`] for a zero tick length or
    /// an invalid scenario.
    pub fn new(scenario: &Scenario, tick: Duration) -> Result<Self, SimulationError> {
        if tick.is_zero() {
            return Err(SimulationError::Configuration(
                "tick length must be positive".into(),
            ));
        }
        scenario.validate()?;

        let mut world = World::new();
        let mut pending = Vec::new();
        for command in scenario.commands() {
            world::apply(&mut world, command, &mut pending);
        }

        let pool = ResourcePool::new(scenario.resources);
        let mut simulation = Self {
            world,
            spawning: SpawnScheduler::new(scenario.spawning, pool),
            allies: AllyBehavior::new(scenario.allies.clone()),
            enemies: EnemyBehavior::new(scenario.enemies.clone()),
            pending: Vec::new(),
            tick,
            allies_lost: 0,
            enemies_lost: 0,
        };
        simulation.record(&pending);
        simulation.pending = pending;
        Ok(simulation)
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self) {
        let mut events = std::mem::take(&mut self.pending);
        world::apply(&mut self.world, Command::Tick { dt: self.tick }, &mut events);

        for _ in 0..MAX_PASSES_PER_TICK {
            let commands = self.dispatch(&events);
            events.clear();
            if commands.is_empty() {
                return;
            }
            for command in commands {
                world::apply(&mut self.world, command, &mut events);
            }
            self.record(&events);
        }

        debug!(carried = events.len(), "pass limit reached");
        self.pending = events;
    }

    /// Advances the simulation by `ticks` ticks and reports the totals.
    pub fn run(&mut self, ticks: u64) -> Summary {
        for _ in 0..ticks {
            self.step();
            let tick_index = query::tick_index(&self.world);
            if tick_index % 50 == 0 {
                let summary = self.summary();
                info!(
                    tick = tick_index,
                    allies = summary.allies,
                    enemies = summary.enemies,
                    resources = summary.resources,
                    "progress"
                );
            }
        }
        self.summary()
    }

    /// Current totals.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            ticks: query::tick_index(&self.world),
            elapsed: query::elapsed(&self.world),
            allies: query::agent_count(&self.world, Faction::Ally),
            enemies: query::agent_count(&self.world, Faction::Enemy),
            allies_lost: self.allies_lost,
            enemies_lost: self.enemies_lost,
            resources: self.spawning.pool().current(),
        }
    }

    /// Authoritative world state.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Ally spawn scheduler.
    #[must_use]
    pub fn spawning(&self) -> &SpawnScheduler {
        &self.spawning
    }

    /// Ally behavior system.
    #[must_use]
    pub fn allies(&self) -> &AllyBehavior {
        &self.allies
    }

    /// Enemy behavior system.
    #[must_use]
    pub fn enemies(&self) -> &EnemyBehavior {
        &self.enemies
    }

    fn dispatch(&mut self, events: &[Event]) -> Vec<Command> {
        let mut commands = Vec::new();
        let grid = query::grid_view(&self.world);
        let agents = query::agent_view(&self.world);
        self.spawning.handle(events, grid, &agents, &mut commands);
        self.allies.handle(events, grid, &agents, &mut commands);
        self.enemies.handle(events, grid, &agents, &mut commands);
        commands
    }

    fn record(&mut self, events: &[Event]) {
        for event in events {
            if let Event::AgentRemoved {
                kind,
                cause: RemovalCause::Killed,
                ..
            } = event
            {
                match kind.faction() {
                    Faction::Ally => self.allies_lost += 1,
                    Faction::Enemy => self.enemies_lost += 1,
                }
            }
        }
    }
}
