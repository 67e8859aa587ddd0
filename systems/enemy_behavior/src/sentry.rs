//! Stationary sentries that shoot the closest ally in range.

use std::time::Duration;

use glam::Vec2;
use lane_skirmish_core::{AgentId, AgentView, Command, Faction};
use lane_skirmish_system_targeting::{select_best, within_range, Proximity};
use tracing::trace;

use crate::SentryConfig;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Sentry {
    next_fire_at: Duration,
}

impl Sentry {
    pub(crate) fn new(spawned_at: Duration, config: &SentryConfig) -> Self {
        Self {
            next_fire_at: spawned_at.saturating_add(config.fire_interval),
        }
    }

    /// Fires at the closest ally in range once the interval has elapsed. A
    /// sentry with nothing to shoot stays loaded.
    pub(crate) fn update(
        &mut self,
        id: AgentId,
        position: Vec2,
        agents: &AgentView,
        now: Duration,
        config: &SentryConfig,
        out: &mut Vec<Command>,
    ) {
        if now < self.next_fire_at {
            return;
        }
        let candidates = within_range(agents, Faction::Ally, position, config.range);
        let Some(target) = select_best(candidates, &Proximity::to(position)) else {
            return;
        };

        trace!(sentry = ?id, target = ?target.id, "sentry firing");
        out.push(Command::DamageAgent {
            source: Some(id),
            target: target.id,
            amount: config.damage,
        });
        self.next_fire_at = now.saturating_add(config.fire_interval);
    }
}
