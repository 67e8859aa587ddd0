#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Enemy behavior: the patroller state machine and stationary sentries.
//!
//! Patrollers walk their patrol route until an ally enters their detection
//! radius with an unobstructed line of sight. They notice it, chase it,
//! attack it once in range and, after losing it, search around its last
//! known position before returning to the route. Damage taken triggers
//! dodges, retreats and a one-way enrage. Sentries never move; they shoot
//! the closest ally in range on a fixed interval.

mod patrol;
mod sentry;

use std::{collections::BTreeMap, time::Duration};

use glam::Vec2;
use lane_skirmish_core::{
    AgentId, AgentKind, AgentView, CellCoord, Command, Event, GridView, SimulationError,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    patrol::{Patroller, TickContext},
    sentry::Sentry,
};

/// Configuration parameters required to construct the enemy behavior system.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tuning shared by every patroller.
    pub patroller: PatrollerConfig,
    /// Tuning shared by every sentry.
    pub sentry: SentryConfig,
    /// Routes assigned to patrollers by spawn cell.
    pub patrol_routes: Vec<PatrolRoute>,
    /// Seed for patrol, search, dodge and combo rolls.
    pub rng_seed: u64,
}

/// Patrol waypoints for the patroller spawned at `spawn`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PatrolRoute {
    /// Cell the patroller is spawned in.
    pub spawn: CellCoord,
    /// Cells visited in random order, never repeating the previous one.
    pub waypoints: Vec<CellCoord>,
}

/// How often a patroller may dodge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DodgePolicy {
    /// Every hit may trigger a dodge.
    PerHit,
    /// A dodge may only follow the previous one after `cooldown`.
    Cooldown {
        /// Minimum time between dodges.
        #[serde(with = "lane_skirmish_core::seconds")]
        cooldown: Duration,
    },
}

impl Default for DodgePolicy {
    fn default() -> Self {
        Self::Cooldown {
            cooldown: Duration::from_secs(2),
        }
    }
}

/// Tuning for the patroller state machine.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PatrollerConfig {
    /// Radius within which allies are noticed.
    pub detection_radius: f32,
    /// Distance at which the patroller starts attacking.
    pub attack_range: f32,
    /// Extra distance tolerated before an attack turns back into a chase.
    pub attack_buffer: f32,
    /// Damage dealt by a primary strike before enrage.
    pub attack_damage: u32,
    /// Time between primary strikes.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub attack_cooldown: Duration,
    /// Travel speed in world units per second before enrage.
    pub speed: f32,
    /// Reaction delay between noticing and chasing.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub notice_delay: Duration,
    /// Time out of range after which a chased target counts as lost. Also
    /// bounds the search.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub lost_timeout: Duration,
    /// Pause at each patrol waypoint.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub dwell: Duration,
    /// Time an invalid attack target is tolerated before giving up.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub grace_period: Duration,
    /// Whether a lost target is searched for before returning to patrol.
    pub search_enabled: bool,
    /// Radius of the random offsets probed while searching.
    pub search_radius: f32,
    /// Distance at which a waypoint or search point counts as reached.
    pub arrival_epsilon: f32,
    /// Probability that a hit prompts a dodge attempt.
    pub dodge_trigger: f32,
    /// Dodge rate limiting.
    pub dodge_policy: DodgePolicy,
    /// Dodge success chance above one third of max health.
    pub dodge_chance: f32,
    /// Dodge success chance at or below one third of max health.
    pub desperate_dodge_chance: f32,
    /// Length of the dodge displacement.
    pub dodge_distance: f32,
    /// Multiplier applied to attack damage on enrage.
    pub enrage_damage_multiplier: u32,
    /// Multiplier applied to speed on enrage.
    pub enrage_speed_multiplier: f32,
    /// Probability that a primary strike is followed by a half-damage combo.
    pub secondary_attack_chance: f32,
}

impl Default for PatrollerConfig {
    fn default() -> Self {
        Self {
            detection_radius: 3.0,
            attack_range: 1.0,
            attack_buffer: 0.2,
            attack_damage: 10,
            attack_cooldown: Duration::from_millis(1500),
            speed: 2.0,
            notice_delay: Duration::from_secs(1),
            lost_timeout: Duration::from_secs(3),
            dwell: Duration::from_secs(1),
            grace_period: Duration::from_secs(1),
            search_enabled: true,
            search_radius: 2.0,
            arrival_epsilon: 0.1,
            dodge_trigger: 0.1,
            dodge_policy: DodgePolicy::default(),
            dodge_chance: 0.3,
            desperate_dodge_chance: 0.5,
            dodge_distance: 1.5,
            enrage_damage_multiplier: 2,
            enrage_speed_multiplier: 1.1,
            secondary_attack_chance: 0.25,
        }
    }
}

/// Tuning for stationary sentries.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SentryConfig {
    /// Firing range.
    pub range: f32,
    /// Time between shots.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub fire_interval: Duration,
    /// Damage dealt per shot.
    pub damage: u32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            range: 5.0,
            fire_interval: Duration::from_secs(2),
            damage: 5,
        }
    }
}

/// State of a patroller's finite state machine.
///
/// Every timer is stored as the simulated time at which it started.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EnemyState {
    /// Walking the patrol route.
    Patrolling {
        /// Start of the pause at the current waypoint, if arrived.
        dwell_started: Option<Duration>,
    },
    /// Reacting to a detected ally.
    Noticing {
        /// Ally that was detected.
        target: AgentId,
        /// When the ally was detected.
        since: Duration,
    },
    /// Pursuing the target's last known position.
    Chasing {
        /// Ally being chased.
        target: AgentId,
        /// Last time the target was within detection range.
        last_seen: Duration,
        /// Target position at `last_seen`.
        last_known: Vec2,
    },
    /// Striking the target whenever the cooldown allows.
    Attacking {
        /// Ally being attacked.
        target: AgentId,
        /// When the target stopped resolving, if it did.
        lost_since: Option<Duration>,
    },
    /// Probing random points around where the target was last seen.
    Searching {
        /// When the search began.
        since: Duration,
        /// Target position when it was lost.
        last_known: Vec2,
        /// Point currently being walked to.
        search_point: Vec2,
    },
}

impl EnemyState {
    /// Target the state is focused on, if any.
    #[must_use]
    pub const fn target(&self) -> Option<AgentId> {
        match self {
            Self::Noticing { target, .. }
            | Self::Chasing { target, .. }
            | Self::Attacking { target, .. } => Some(*target),
            Self::Patrolling { .. } | Self::Searching { .. } => None,
        }
    }
}

/// Combat profile of a patroller. Enrage only ever raises it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemyProfile {
    /// Damage dealt by a primary strike.
    pub attack_damage: u32,
    /// Travel speed in world units per second.
    pub speed: f32,
    /// Whether the patroller has enraged.
    pub enraged: bool,
}

/// Pure system that drives every enemy agent.
#[derive(Debug)]
pub struct EnemyBehavior {
    config: Config,
    patrollers: BTreeMap<AgentId, Patroller>,
    sentries: BTreeMap<AgentId, Sentry>,
    displacements: BTreeMap<AgentId, Vec2>,
    clock: Duration,
    rng: ChaCha8Rng,
    configuration_error: Option<SimulationError>,
}

impl EnemyBehavior {
    /// Creates a new enemy behavior system using the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        Self {
            config,
            patrollers: BTreeMap::new(),
            sentries: BTreeMap::new(),
            displacements: BTreeMap::new(),
            clock: Duration::ZERO,
            rng,
            configuration_error: None,
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
                Event::AgentSpawned { agent, kind, cell } => self.enlist(*agent, *kind, *cell),
                Event::HealthChanged {
                    agent,
                    previous,
                    current,
                    max,
                } if current < previous => {
                    self.react_to_damage(*agent, *current, *max, grid.as_ref(), agents);
                }
                Event::AgentRemoved { agent, .. } => {
                    let _ = self.patrollers.remove(agent);
                    let _ = self.sentries.remove(agent);
                    let _ = self.displacements.remove(agent);
                }
                Event::GridConfigured { .. } => {
                    self.patrollers.clear();
                    self.sentries.clear();
                    self.displacements.clear();
                }
                _ => {}
            }
        }

        if !elapsed.is_zero() {
            self.clock = self.clock.saturating_add(elapsed);
            self.advance(elapsed, grid.as_ref(), agents, out);
        }

        for (agent, to) in std::mem::take(&mut self.displacements) {
            out.push(Command::MoveAgent { agent, to });
        }
    }

    /// Current state of the patroller, if it is tracked.
    #[must_use]
    pub fn state_of(&self, agent: AgentId) -> Option<EnemyState> {
        self.patrollers.get(&agent).map(Patroller::state)
    }

    /// Combat profile of the patroller, if it is tracked.
    #[must_use]
    pub fn profile_of(&self, agent: AgentId) -> Option<EnemyProfile> {
        self.patrollers.get(&agent).map(Patroller::profile)
    }

    /// Number of patrollers and sentries under this system's control.
    #[must_use]
    pub fn tracked_enemies(&self) -> usize {
        self.patrollers.len() + self.sentries.len()
    }

    /// Setup failure that suspended the patrollers, if one was reported.
    #[must_use]
    pub fn configuration_error(&self) -> Option<&SimulationError> {
        self.configuration_error.as_ref()
    }

    fn enlist(&mut self, agent: AgentId, kind: AgentKind, cell: CellCoord) {
        match kind {
            AgentKind::Patroller => {
                let route = self
                    .config
                    .patrol_routes
                    .iter()
                    .find(|route| route.spawn == cell && !route.waypoints.is_empty())
                    .map_or_else(|| vec![cell], |route| route.waypoints.clone());
                debug!(?agent, waypoints = route.len(), "patroller enlisted");
                let _ = self
                    .patrollers
                    .insert(agent, Patroller::new(route, &self.config.patroller));
            }
            AgentKind::Sentry => {
                let _ = self
                    .sentries
                    .insert(agent, Sentry::new(self.clock, &self.config.sentry));
            }
            AgentKind::Soldier => {}
        }
    }

    fn react_to_damage(
        &mut self,
        agent: AgentId,
        current: u32,
        max: u32,
        grid: Option<&GridView<'_>>,
        agents: &AgentView,
    ) {
        if current == 0 {
            return;
        }
        let Some(patroller) = self.patrollers.get_mut(&agent) else {
            return;
        };
        let Some(snapshot) = agents.get(agent) else {
            return;
        };
        let position = self
            .displacements
            .get(&agent)
            .copied()
            .unwrap_or(snapshot.position);
        let dodge = patroller.react_to_damage(
            current,
            max,
            self.clock,
            position,
            grid,
            &self.config.patroller,
            &mut self.rng,
        );
        if let Some(to) = dodge {
            let _ = self.displacements.insert(agent, to);
        }
    }

    fn advance(
        &mut self,
        elapsed: Duration,
        grid: Option<&GridView<'_>>,
        agents: &AgentView,
        out: &mut Vec<Command>,
    ) {
        for (id, sentry) in &mut self.sentries {
            let Some(snapshot) = agents.get(*id).filter(|snapshot| snapshot.active) else {
                continue;
            };
            sentry.update(*id, snapshot.position, agents, self.clock, &self.config.sentry, out);
        }

        let Some(grid) = grid else {
            if !self.patrollers.is_empty() {
                self.report_missing_grid();
            }
            return;
        };

        let context = TickContext {
            agents,
            grid,
            clock: self.clock,
            dt: elapsed.as_secs_f32(),
            config: &self.config.patroller,
        };
        for (id, patroller) in &mut self.patrollers {
            let Some(snapshot) = agents.get(*id).filter(|snapshot| snapshot.active) else {
                continue;
            };
            let start = self
                .displacements
                .remove(id)
                .unwrap_or(snapshot.position);
            let next = patroller.update(*id, start, &context, &mut self.rng, out);
            if next != snapshot.position {
                out.push(Command::MoveAgent { agent: *id, to: next });
            }
        }
    }

    fn report_missing_grid(&mut self) {
        if self.configuration_error.is_some() {
            return;
        }
        let failure =
            SimulationError::Configuration("enemy behavior requires a configured grid".into());
        error!(%failure, patrollers = self.patrollers.len(), "patrollers suspended");
        self.configuration_error = Some(failure);
    }
}
