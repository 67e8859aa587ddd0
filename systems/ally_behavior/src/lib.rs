#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Ally soldier behavior: path following, local engagement, and support.
//!
//! Soldiers announced by the world receive a route to a randomly chosen
//! objective. Each tick a moving soldier scans for enemies within its
//! detection radius, ranks them with [`CombatPriority`] and stops to attack
//! the best one. Attacks resolve after a cooldown; the target may dodge.
//! Idle soldiers next to an engaged ally join the fight.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use glam::Vec2;
use lane_skirmish_core::{
    move_towards, AgentId, AgentKind, AgentView, CellCoord, Command, Event, Faction, GridView,
    Path, SimulationError,
};
use lane_skirmish_system_pathfinding::Pathfinder;
use lane_skirmish_system_targeting::{select_best, within_range, CombatPriority};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::{debug, trace};

/// Configuration parameters required to construct the ally behavior system.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Travel speed in world units per second.
    pub speed: f32,
    /// Radius within which enemies are engaged.
    pub detection_radius: f32,
    /// Distance at which a waypoint counts as reached.
    pub arrival_epsilon: f32,
    /// Pause after reaching each waypoint.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub waypoint_pause: Duration,
    /// Time between engaging a target and striking it.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub attack_cooldown: Duration,
    /// Probability that a strike misses.
    pub dodge_chance: f32,
    /// Damage dealt by a successful strike.
    pub attack_damage: u32,
    /// Radius within which an idle soldier supports an engaged ally.
    pub support_radius: f32,
    /// Cells newly spawned soldiers are routed toward.
    pub objectives: Vec<CellCoord>,
    /// Seed for objective and dodge rolls.
    pub rng_seed: u64,
}

impl Config {
    /// Creates a configuration with the provided objectives and seed and
    /// default combat tuning.
    #[must_use]
    pub fn new(objectives: Vec<CellCoord>, rng_seed: u64) -> Self {
        Self {
            objectives,
            rng_seed,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed: 2.0,
            detection_radius: 1.0,
            arrival_epsilon: 0.01,
            waypoint_pause: Duration::from_millis(100),
            attack_cooldown: Duration::from_secs(1),
            dodge_chance: 0.2,
            attack_damage: 3,
            support_radius: 2.0,
            objectives: Vec::new(),
            rng_seed: 0xa11e_5010_d1e2_0001,
        }
    }
}

/// Behavioral state of a single soldier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitState {
    /// No route and no target.
    Idle,
    /// Following a route.
    Moving,
    /// Engaged with a target; the strike lands once the cooldown elapses.
    Attacking {
        /// Weak handle to the target.
        target: AgentId,
        /// Simulated time at which the engagement began.
        since: Duration,
    },
}

#[derive(Clone, Debug)]
struct UnitRecord {
    waypoints: VecDeque<Vec2>,
    state: UnitState,
    resume_at: Duration,
}

impl UnitRecord {
    fn new() -> Self {
        Self {
            waypoints: VecDeque::new(),
            state: UnitState::Idle,
            resume_at: Duration::ZERO,
        }
    }

    fn travel_state(&self) -> UnitState {
        if self.waypoints.is_empty() {
            UnitState::Idle
        } else {
            UnitState::Moving
        }
    }
}

/// Pure system that drives every ally soldier.
#[derive(Debug)]
pub struct AllyBehavior {
    config: Config,
    units: BTreeMap<AgentId, UnitRecord>,
    pathfinder: Pathfinder,
    clock: Duration,
    rng: ChaCha8Rng,
    scratch: Vec<AgentId>,
    engaged: Vec<Vec2>,
}

impl AllyBehavior {
    /// Creates a new ally behavior system using the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        Self {
            config,
            units: BTreeMap::new(),
            pathfinder: Pathfinder::new(),
            clock: Duration::ZERO,
            rng,
            scratch: Vec::new(),
            engaged: Vec::new(),
        }
    }

    /// Consumes world events and immutable views to emit movement and attack
    /// commands.
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
                } => self.enlist(*agent, *cell, grid.as_ref()),
                Event::AgentRemoved { agent, .. } => {
                    let _ = self.units.remove(agent);
                }
                Event::GridConfigured { .. } => self.units.clear(),
                _ => {}
            }
        }

        if elapsed.is_zero() {
            return;
        }
        self.clock = self.clock.saturating_add(elapsed);
        self.advance_units(elapsed, agents, out);
        self.rally_supporters(agents);
    }

    /// Replaces the soldier's route, cancelling whatever it was following.
    ///
    /// A soldier that is mid-engagement keeps fighting and follows the new
    /// route afterwards. Returns `false` when the soldier is not tracked.
    pub fn assign_path(&mut self, agent: AgentId, path: &Path) -> bool {
        let Some(record) = self.units.get_mut(&agent) else {
            return false;
        };
        record.waypoints = path.cells().iter().map(|cell| cell.world_point()).collect();
        record.resume_at = self.clock;
        if !matches!(record.state, UnitState::Attacking { .. }) {
            record.state = record.travel_state();
        }
        true
    }

    /// Routes the soldier from its current cell to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidTarget`] when the soldier is not
    /// tracked or not visible, and [`SimulationError::PathNotFound`] when no
    /// walkable route exists.
    pub fn retask(
        &mut self,
        agent: AgentId,
        grid: &GridView<'_>,
        agents: &AgentView,
        destination: CellCoord,
    ) -> Result<(), SimulationError> {
        if !self.units.contains_key(&agent) {
            return Err(SimulationError::InvalidTarget(agent));
        }
        let snapshot = agents.get(agent).ok_or(SimulationError::InvalidTarget(agent))?;
        let start = CellCoord::from_world_point(snapshot.position)
            .ok_or(SimulationError::InvalidTarget(agent))?;
        let path = self.pathfinder.find_path(grid, start, destination)?;
        let _ = self.assign_path(agent, &path);
        Ok(())
    }

    /// Current state of the soldier, if it is tracked.
    #[must_use]
    pub fn unit_state(&self, agent: AgentId) -> Option<UnitState> {
        self.units.get(&agent).map(|record| record.state)
    }

    /// Waypoints the soldier has yet to reach.
    #[must_use]
    pub fn remaining_waypoints(&self, agent: AgentId) -> Option<usize> {
        self.units.get(&agent).map(|record| record.waypoints.len())
    }

    /// Number of soldiers under this system's control.
    #[must_use]
    pub fn tracked_units(&self) -> usize {
        self.units.len()
    }

    fn enlist(&mut self, agent: AgentId, cell: CellCoord, grid: Option<&GridView<'_>>) {
        let _ = self.units.insert(agent, UnitRecord::new());
        let Some(objective) = self.config.objectives.choose(&mut self.rng).copied() else {
            return;
        };
        let Some(grid) = grid else {
            return;
        };
        match self.pathfinder.find_path(grid, cell, objective) {
            Ok(path) => {
                trace!(?agent, hops = path.hops(), "soldier routed");
                let _ = self.assign_path(agent, &path);
            }
            Err(error) => debug!(?agent, %error, "soldier left idle"),
        }
    }

    fn advance_units(&mut self, elapsed: Duration, agents: &AgentView, out: &mut Vec<Command>) {
        let step = self.config.speed * elapsed.as_secs_f32();
        self.scratch.clear();
        self.scratch.extend(self.units.keys().copied());
        self.engaged.clear();

        for index in 0..self.scratch.len() {
            let id = self.scratch[index];
            let Some(snapshot) = agents.get(id) else {
                continue;
            };
            if !snapshot.active {
                continue;
            }
            let position = snapshot.position;
            let Some(record) = self.units.get_mut(&id) else {
                continue;
            };

            match record.state {
                UnitState::Attacking { target, since } => {
                    if self.clock.saturating_sub(since) < self.config.attack_cooldown {
                        self.engaged.push(position);
                        continue;
                    }
                    match agents.resolve(target) {
                        Ok(_) if self.rng.gen::<f32>() < self.config.dodge_chance => {
                            debug!(attacker = ?id, ?target, "strike dodged");
                        }
                        Ok(_) => out.push(Command::DamageAgent {
                            source: Some(id),
                            target,
                            amount: self.config.attack_damage,
                        }),
                        Err(error) => debug!(attacker = ?id, %error, "strike abandoned"),
                    }
                    record.state = record.travel_state();
                    if let Some(next) = scan(agents, position, self.config.detection_radius) {
                        record.state = UnitState::Attacking {
                            target: next,
                            since: self.clock,
                        };
                    }
                }
                UnitState::Moving => {
                    if let Some(target) = scan(agents, position, self.config.detection_radius) {
                        trace!(attacker = ?id, ?target, "soldier engaging");
                        record.state = UnitState::Attacking {
                            target,
                            since: self.clock,
                        };
                    } else if self.clock >= record.resume_at {
                        if let Some(to) = follow(record, position, step, self.clock, &self.config)
                        {
                            out.push(Command::MoveAgent { agent: id, to });
                        }
                    }
                }
                UnitState::Idle => {}
            }

            if matches!(record.state, UnitState::Attacking { .. }) {
                self.engaged.push(position);
            }
        }
    }

    fn rally_supporters(&mut self, agents: &AgentView) {
        if self.engaged.is_empty() {
            return;
        }
        for (id, record) in &mut self.units {
            if matches!(record.state, UnitState::Attacking { .. }) {
                continue;
            }
            let Some(snapshot) = agents.get(*id).filter(|snapshot| snapshot.active) else {
                continue;
            };
            let position = snapshot.position;
            let radius = self.config.support_radius;
            let near_fight = self
                .engaged
                .iter()
                .any(|ally| *ally != position && ally.distance(position) <= radius);
            if !near_fight {
                continue;
            }
            if let Some(target) = scan(agents, position, self.config.detection_radius) {
                trace!(supporter = ?id, ?target, "soldier supporting ally");
                record.state = UnitState::Attacking {
                    target,
                    since: self.clock,
                };
            }
        }
    }
}

fn scan(agents: &AgentView, position: Vec2, radius: f32) -> Option<AgentId> {
    let candidates = within_range(agents, Faction::Enemy, position, radius);
    select_best(candidates, &CombatPriority::at(position)).map(|snapshot| snapshot.id)
}

/// Steps toward the head waypoint and returns the new position when it
/// differs from the current one.
fn follow(
    record: &mut UnitRecord,
    position: Vec2,
    step: f32,
    clock: Duration,
    config: &Config,
) -> Option<Vec2> {
    let Some(waypoint) = record.waypoints.front().copied() else {
        record.state = UnitState::Idle;
        return None;
    };
    let next = move_towards(position, waypoint, step);
    if next.distance(waypoint) <= config.arrival_epsilon {
        let _ = record.waypoints.pop_front();
        record.resume_at = clock.saturating_add(config.waypoint_pause);
        record.state = record.travel_state();
    }
    (next != position).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_pauses_at_each_waypoint() {
        let config = Config::default();
        let mut record = UnitRecord::new();
        record.waypoints.extend([Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)]);
        record.state = UnitState::Moving;

        let clock = Duration::from_secs(1);
        let moved = follow(&mut record, Vec2::new(0.5, 0.0), 0.5, clock, &config);

        assert_eq!(moved, Some(Vec2::new(1.0, 0.0)));
        assert_eq!(record.waypoints.len(), 1);
        assert_eq!(record.resume_at, clock + config.waypoint_pause);
        assert_eq!(record.state, UnitState::Moving);
    }

    #[test]
    fn reaching_the_last_waypoint_idles() {
        let config = Config::default();
        let mut record = UnitRecord::new();
        record.waypoints.push_back(Vec2::new(3.0, 3.0));
        record.state = UnitState::Moving;

        let moved = follow(&mut record, Vec2::new(3.0, 3.0), 0.2, Duration::ZERO, &config);

        assert_eq!(moved, None);
        assert_eq!(record.state, UnitState::Idle);
    }
}
