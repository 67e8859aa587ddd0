//! Patroller state machine.

use std::time::Duration;

use glam::Vec2;
use lane_skirmish_core::{move_towards, AgentId, AgentView, CellCoord, Command, Faction, GridView};
use lane_skirmish_system_targeting::{select_best, within_range, Proximity};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::{DodgePolicy, EnemyProfile, EnemyState, PatrollerConfig};

const PATROLLING: EnemyState = EnemyState::Patrolling {
    dwell_started: None,
};

/// Read-only inputs shared by every patroller during one tick.
pub(crate) struct TickContext<'a, 'g> {
    pub(crate) agents: &'a AgentView,
    pub(crate) grid: &'a GridView<'g>,
    pub(crate) clock: Duration,
    pub(crate) dt: f32,
    pub(crate) config: &'a PatrollerConfig,
}

impl TickContext<'_, '_> {
    /// Nearest ally within detection range that is in line of sight.
    fn detect(&self, position: Vec2) -> Option<AgentId> {
        let grid = self.grid;
        let visible = within_range(
            self.agents,
            Faction::Ally,
            position,
            self.config.detection_radius,
        )
        .filter(|snapshot| grid.line_of_sight(position, snapshot.position));
        select_best(visible, &Proximity::to(position)).map(|snapshot| snapshot.id)
    }

    fn engage_distance(&self) -> f32 {
        self.config.attack_range + self.config.attack_buffer
    }

    fn elapsed_since(&self, start: Duration) -> Duration {
        self.clock.saturating_sub(start)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Patroller {
    route: Vec<CellCoord>,
    waypoint: usize,
    state: EnemyState,
    profile: EnemyProfile,
    next_attack_at: Duration,
    last_dodge_at: Option<Duration>,
}

impl Patroller {
    pub(crate) fn new(route: Vec<CellCoord>, config: &PatrollerConfig) -> Self {
        Self {
            route,
            waypoint: 0,
            state: PATROLLING,
            profile: EnemyProfile {
                attack_damage: config.attack_damage,
                speed: config.speed,
                enraged: false,
            },
            next_attack_at: Duration::ZERO,
            last_dodge_at: None,
        }
    }

    pub(crate) fn state(&self) -> EnemyState {
        self.state
    }

    pub(crate) fn profile(&self) -> EnemyProfile {
        self.profile
    }

    /// Applies the health-reactive side effects of a hit and returns the
    /// dodge destination, if the patroller dodged.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn react_to_damage(
        &mut self,
        current: u32,
        max: u32,
        now: Duration,
        position: Vec2,
        grid: Option<&GridView<'_>>,
        config: &PatrollerConfig,
        rng: &mut ChaCha8Rng,
    ) -> Option<Vec2> {
        let dodge = self.try_dodge(current, max, now, position, grid, config, rng);

        if current <= max / 3 && !matches!(self.state, EnemyState::Patrolling { .. }) {
            debug!(current, max, "patroller retreating");
            self.state = PATROLLING;
        }

        if current <= max / 2 && !self.profile.enraged {
            self.profile.attack_damage = self
                .profile
                .attack_damage
                .saturating_mul(config.enrage_damage_multiplier);
            self.profile.speed *= config.enrage_speed_multiplier;
            self.profile.enraged = true;
            debug!(
                damage = self.profile.attack_damage,
                speed = self.profile.speed,
                "patroller enraged"
            );
        }

        dodge
    }

    #[allow(clippy::too_many_arguments)]
    fn try_dodge(
        &mut self,
        current: u32,
        max: u32,
        now: Duration,
        position: Vec2,
        grid: Option<&GridView<'_>>,
        config: &PatrollerConfig,
        rng: &mut ChaCha8Rng,
    ) -> Option<Vec2> {
        if rng.gen::<f32>() >= config.dodge_trigger {
            return None;
        }
        if let (DodgePolicy::Cooldown { cooldown }, Some(last)) =
            (config.dodge_policy, self.last_dodge_at)
        {
            if now.saturating_sub(last) < cooldown {
                return None;
            }
        }

        let chance = if current <= max / 3 {
            config.desperate_dodge_chance
        } else {
            config.dodge_chance
        };
        if rng.gen::<f32>() >= chance {
            return None;
        }

        let direction =
            Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)).normalize_or_zero();
        if direction == Vec2::ZERO {
            return None;
        }
        let destination = position + direction * config.dodge_distance;
        let grid = grid?;
        let cell = grid.locate(destination)?;
        if !grid.is_walkable(cell) {
            return None;
        }

        self.last_dodge_at = Some(now);
        Some(destination)
    }

    /// Runs one tick of the state machine and returns the new position.
    pub(crate) fn update(
        &mut self,
        id: AgentId,
        position: Vec2,
        context: &TickContext<'_, '_>,
        rng: &mut ChaCha8Rng,
        out: &mut Vec<Command>,
    ) -> Vec2 {
        let step = self.profile.speed * context.dt;
        match self.state {
            EnemyState::Patrolling { dwell_started } => {
                if let Some(target) = context.detect(position) {
                    trace!(enemy = ?id, ?target, "ally noticed");
                    self.state = EnemyState::Noticing {
                        target,
                        since: context.clock,
                    };
                    return position;
                }
                self.patrol(position, step, dwell_started, context, rng)
            }
            EnemyState::Noticing { target, since } => {
                if context.elapsed_since(since) >= context.config.notice_delay {
                    let last_known = context
                        .agents
                        .get(target)
                        .map_or(position, |snapshot| snapshot.position);
                    self.state = EnemyState::Chasing {
                        target,
                        last_seen: context.clock,
                        last_known,
                    };
                }
                position
            }
            EnemyState::Chasing {
                target,
                last_seen,
                last_known,
            } => self.chase(id, position, step, target, last_seen, last_known, context, rng),
            EnemyState::Attacking { target, lost_since } => {
                self.attack(id, position, target, lost_since, context, rng, out);
                position
            }
            EnemyState::Searching {
                since,
                last_known,
                search_point,
            } => self.search(position, step, since, last_known, search_point, context, rng),
        }
    }

    fn patrol(
        &mut self,
        position: Vec2,
        step: f32,
        dwell_started: Option<Duration>,
        context: &TickContext<'_, '_>,
        rng: &mut ChaCha8Rng,
    ) -> Vec2 {
        let Some(cell) = self.route.get(self.waypoint).copied() else {
            return position;
        };

        if let Some(started) = dwell_started {
            if context.elapsed_since(started) >= context.config.dwell {
                self.waypoint = next_waypoint(self.waypoint, self.route.len(), rng);
                self.state = PATROLLING;
            }
            return position;
        }

        if !context.grid.is_walkable(cell) {
            return position;
        }
        let destination = cell.world_point();
        let next = move_towards(position, destination, step);
        if next.distance(destination) < context.config.arrival_epsilon {
            self.state = EnemyState::Patrolling {
                dwell_started: Some(context.clock),
            };
        }
        next
    }

    #[allow(clippy::too_many_arguments)]
    fn chase(
        &mut self,
        id: AgentId,
        position: Vec2,
        step: f32,
        target: AgentId,
        last_seen: Duration,
        last_known: Vec2,
        context: &TickContext<'_, '_>,
        rng: &mut ChaCha8Rng,
    ) -> Vec2 {
        let snapshot = match context.agents.resolve(target) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                debug!(enemy = ?id, %error, "chase abandoned");
                self.state = PATROLLING;
                return position;
            }
        };

        let distance = position.distance(snapshot.position);
        let in_range = distance <= context.config.detection_radius;
        let (last_seen, last_known) = if in_range {
            (context.clock, snapshot.position)
        } else {
            (last_seen, last_known)
        };

        if !in_range && context.elapsed_since(last_seen) > context.config.lost_timeout {
            debug!(enemy = ?id, ?target, "target lost");
            self.state = give_up(last_known, context, rng);
            return position;
        }

        if distance <= context.engage_distance() {
            self.state = EnemyState::Attacking {
                target,
                lost_since: None,
            };
            return position;
        }

        let next = move_towards(position, last_known, step);
        self.state = if next.distance(snapshot.position) <= context.engage_distance() {
            EnemyState::Attacking {
                target,
                lost_since: None,
            }
        } else {
            EnemyState::Chasing {
                target,
                last_seen,
                last_known,
            }
        };
        next
    }

    #[allow(clippy::too_many_arguments)]
    fn attack(
        &mut self,
        id: AgentId,
        position: Vec2,
        target: AgentId,
        lost_since: Option<Duration>,
        context: &TickContext<'_, '_>,
        rng: &mut ChaCha8Rng,
        out: &mut Vec<Command>,
    ) {
        let snapshot = match context.agents.resolve(target) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                let lost = lost_since.unwrap_or(context.clock);
                self.state = if context.elapsed_since(lost) >= context.config.grace_period {
                    debug!(enemy = ?id, %error, "attack abandoned");
                    PATROLLING
                } else {
                    EnemyState::Attacking {
                        target,
                        lost_since: Some(lost),
                    }
                };
                return;
            }
        };

        if position.distance(snapshot.position) > context.engage_distance() {
            self.state = EnemyState::Chasing {
                target,
                last_seen: context.clock,
                last_known: snapshot.position,
            };
            return;
        }

        self.state = EnemyState::Attacking {
            target,
            lost_since: None,
        };
        if context.clock < self.next_attack_at {
            return;
        }

        out.push(Command::DamageAgent {
            source: Some(id),
            target,
            amount: self.profile.attack_damage,
        });
        if rng.gen::<f32>() < context.config.secondary_attack_chance {
            out.push(Command::DamageAgent {
                source: Some(id),
                target,
                amount: self.profile.attack_damage / 2,
            });
        }
        self.next_attack_at = context.clock.saturating_add(context.config.attack_cooldown);
    }

    #[allow(clippy::too_many_arguments)]
    fn search(
        &mut self,
        position: Vec2,
        step: f32,
        since: Duration,
        last_known: Vec2,
        search_point: Vec2,
        context: &TickContext<'_, '_>,
        rng: &mut ChaCha8Rng,
    ) -> Vec2 {
        if context.elapsed_since(since) > context.config.lost_timeout {
            self.state = PATROLLING;
            return position;
        }

        if let Some(target) = context.detect(position) {
            let last_known = context
                .agents
                .get(target)
                .map_or(last_known, |snapshot| snapshot.position);
            self.state = EnemyState::Chasing {
                target,
                last_seen: context.clock,
                last_known,
            };
            return position;
        }

        let next = move_towards(position, search_point, step);
        if next.distance(search_point) < context.config.arrival_epsilon {
            self.state = EnemyState::Searching {
                since,
                last_known,
                search_point: pick_search_point(last_known, context, rng),
            };
        }
        next
    }
}

fn give_up(last_known: Vec2, context: &TickContext<'_, '_>, rng: &mut ChaCha8Rng) -> EnemyState {
    if !context.config.search_enabled {
        return PATROLLING;
    }
    EnemyState::Searching {
        since: context.clock,
        last_known,
        search_point: pick_search_point(last_known, context, rng),
    }
}

/// Random index different from `current` unless the route has one waypoint.
fn next_waypoint(current: usize, len: usize, rng: &mut ChaCha8Rng) -> usize {
    if len <= 1 {
        return 0;
    }
    let pick = rng.gen_range(0..len - 1);
    if pick >= current {
        pick + 1
    } else {
        pick
    }
}

fn pick_search_point(center: Vec2, context: &TickContext<'_, '_>, rng: &mut ChaCha8Rng) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let reach = context.config.search_radius;
    let reach = if reach.is_finite() { reach.max(0.0) } else { 0.0 };
    let radius = rng.gen_range(0.0..=reach);
    let offset = Vec2::new(angle.cos(), angle.sin()) * radius;
    context.grid.size().clamp_point(center + offset)
}
