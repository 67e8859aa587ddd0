#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure scoring policies shared by combat engagement and spawn placement.
//!
//! Scores are recomputed from the views passed in on every call. Selection
//! keeps the first candidate with the highest score, so ties resolve by
//! input order and never by chance.

use glam::Vec2;
use lane_skirmish_core::{AgentSnapshot, AgentView, CellCoord, Faction};

/// Bonus applied to high-value targets by [`CombatPriority`].
pub const HIGH_VALUE_BONUS: f32 = 10.0;
/// Weight applied to target distance by [`CombatPriority`].
pub const DISTANCE_PENALTY: f32 = 2.0;
/// Attraction each ally exerts on a spawn cell.
pub const ALLY_ATTRACTION: f32 = 10.0;
/// Repulsion each enemy exerts on a spawn cell.
pub const ENEMY_REPULSION: f32 = 15.0;

/// Scores a candidate. Higher is better.
pub trait Scorer<T: ?Sized> {
    /// Computes the candidate's score.
    fn score(&self, candidate: &T) -> f32;
}

impl<T: ?Sized, F> Scorer<T> for F
where
    F: Fn(&T) -> f32,
{
    fn score(&self, candidate: &T) -> f32 {
        self(candidate)
    }
}

/// Returns the highest scoring candidate, or `None` when no candidate beats
/// negative infinity.
///
/// Only a strictly greater score replaces the current best, so the first of
/// several equal candidates wins. Candidates scoring `NaN` are never chosen.
pub fn select_best<'a, T, I, S>(candidates: I, scorer: &S) -> Option<&'a T>
where
    T: ?Sized + 'a,
    I: IntoIterator<Item = &'a T>,
    S: Scorer<T> + ?Sized,
{
    let mut best: Option<BestCandidate<'a, T>> = None;
    let mut best_score = f32::NEG_INFINITY;

    for candidate in candidates {
        let current = BestCandidate {
            score: scorer.score(candidate),
            candidate,
        };
        if current.precedes(best_score) {
            best_score = current.score;
            best = Some(current);
        }
    }

    best.map(|entry| entry.candidate)
}

struct BestCandidate<'a, T: ?Sized> {
    score: f32,
    candidate: &'a T,
}

impl<T: ?Sized> BestCandidate<'_, T> {
    fn precedes(&self, best_score: f32) -> bool {
        self.score > best_score
    }
}

/// Targetable agents of `faction` within `radius` of `origin`.
pub fn within_range<'a>(
    agents: &'a AgentView,
    faction: Faction,
    origin: Vec2,
    radius: f32,
) -> impl Iterator<Item = &'a AgentSnapshot> + 'a {
    agents
        .of_faction(faction)
        .filter(move |snapshot| snapshot.position.distance(origin) <= radius)
}

/// Combat priority: `bonus - health - 2 * distance`.
///
/// High-value kinds receive [`HIGH_VALUE_BONUS`], so wounded, close, valuable
/// targets are engaged first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CombatPriority {
    origin: Vec2,
}

impl CombatPriority {
    /// Scores targets relative to the attacker at `origin`.
    #[must_use]
    pub const fn at(origin: Vec2) -> Self {
        Self { origin }
    }
}

impl Scorer<AgentSnapshot> for CombatPriority {
    fn score(&self, candidate: &AgentSnapshot) -> f32 {
        let bonus = if candidate.kind.is_high_value() {
            HIGH_VALUE_BONUS
        } else {
            0.0
        };
        bonus
            - candidate.health.current() as f32
            - DISTANCE_PENALTY * candidate.position.distance(self.origin)
    }
}

/// Proximity: nearer candidates score higher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Proximity {
    origin: Vec2,
}

impl Proximity {
    /// Scores candidates by closeness to `origin`.
    #[must_use]
    pub const fn to(origin: Vec2) -> Self {
        Self { origin }
    }
}

impl Scorer<AgentSnapshot> for Proximity {
    fn score(&self, candidate: &AgentSnapshot) -> f32 {
        -candidate.position.distance(self.origin)
    }
}

/// Spawn-location desirability:
/// `sum(10 / (d_ally + 1)) - sum(15 / (d_enemy + 1))`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpawnDesirability {
    allies: Vec<Vec2>,
    enemies: Vec<Vec2>,
}

impl SpawnDesirability {
    /// Captures the current ally and enemy positions.
    #[must_use]
    pub fn new(allies: Vec<Vec2>, enemies: Vec<Vec2>) -> Self {
        Self { allies, enemies }
    }

    /// Captures positions of every targetable agent in the view.
    #[must_use]
    pub fn from_view(agents: &AgentView) -> Self {
        let positions = |faction| {
            agents
                .of_faction(faction)
                .map(|snapshot| snapshot.position)
                .collect()
        };
        Self::new(positions(Faction::Ally), positions(Faction::Enemy))
    }
}

impl Scorer<CellCoord> for SpawnDesirability {
    fn score(&self, candidate: &CellCoord) -> f32 {
        let point = candidate.world_point();
        let attraction: f32 = self
            .allies
            .iter()
            .map(|ally| ALLY_ATTRACTION / (point.distance(*ally) + 1.0))
            .sum();
        let repulsion: f32 = self
            .enemies
            .iter()
            .map(|enemy| ENEMY_REPULSION / (point.distance(*enemy) + 1.0))
            .sum();
        attraction - repulsion
    }
}

#[cfg(test)]
mod tests {
    use lane_skirmish_core::{AgentId, AgentKind, Health};

    use super::*;

    fn snapshot(index: u32, kind: AgentKind, position: Vec2, health: u32) -> AgentSnapshot {
        AgentSnapshot {
            id: AgentId::new(index, 0),
            kind,
            position,
            health: Health::with_current(health, kind.max_health()),
            active: true,
        }
    }

    #[test]
    fn equal_scores_keep_first_candidate() {
        let candidates = [3_u32, 7, 5, 7];
        let best = select_best(candidates.iter(), &|value: &u32| (*value % 4) as f32);
        assert_eq!(best, Some(&3));

        let best = select_best(candidates.iter(), &|_: &u32| 1.0);
        assert_eq!(best, Some(&3));
    }

    #[test]
    fn empty_or_unscorable_candidates_select_nothing() {
        let empty: [u32; 0] = [];
        assert_eq!(select_best(empty.iter(), &|_: &u32| 1.0), None);

        let values = [1_u32, 2];
        assert_eq!(
            select_best(values.iter(), &|_: &u32| f32::NEG_INFINITY),
            None
        );
        assert_eq!(select_best(values.iter(), &|_: &u32| f32::NAN), None);
    }

    #[test]
    fn combat_priority_prefers_high_value_wounded_and_close_targets() {
        let origin = Vec2::ZERO;
        let scorer = CombatPriority::at(origin);

        let sentry = snapshot(0, AgentKind::Sentry, Vec2::new(1.0, 0.0), 10);
        let patroller = snapshot(1, AgentKind::Patroller, Vec2::new(1.0, 0.0), 20);
        assert!((scorer.score(&sentry) - (-12.0)).abs() < 1e-5);
        assert!((scorer.score(&patroller) - (-12.0)).abs() < 1e-5);

        let candidates = [sentry, patroller];
        let best = select_best(candidates.iter(), &scorer).expect("candidate");
        assert_eq!(best.id, sentry.id, "first of equal scores wins");

        let wounded = snapshot(2, AgentKind::Patroller, Vec2::new(0.5, 0.0), 4);
        let candidates = [sentry, patroller, wounded];
        let best = select_best(candidates.iter(), &scorer).expect("candidate");
        assert_eq!(best.id, wounded.id);
    }

    #[test]
    fn spawn_desirability_rewards_allies_and_penalises_enemies() {
        let scorer = SpawnDesirability::new(vec![Vec2::new(0.0, 0.0)], vec![Vec2::new(4.0, 0.0)]);

        let near_ally = scorer.score(&CellCoord::new(0, 0));
        let near_enemy = scorer.score(&CellCoord::new(4, 0));
        assert!((near_ally - (10.0 - 15.0 / 5.0)).abs() < 1e-5);
        assert!((near_enemy - (10.0 / 5.0 - 15.0)).abs() < 1e-5);

        let cells = [CellCoord::new(4, 0), CellCoord::new(2, 0), CellCoord::new(0, 0)];
        assert_eq!(
            select_best(cells.iter(), &scorer),
            Some(&CellCoord::new(0, 0))
        );
    }

    #[test]
    fn spawn_desirability_is_flat_without_agents() {
        let scorer = SpawnDesirability::default();
        let cells = [CellCoord::new(2, 2), CellCoord::new(0, 0)];
        assert_eq!(
            select_best(cells.iter(), &scorer),
            Some(&CellCoord::new(2, 2))
        );
    }

    #[test]
    fn within_range_ignores_distant_and_inactive_agents() {
        let mut inactive = snapshot(2, AgentKind::Sentry, Vec2::new(0.5, 0.0), 10);
        inactive.active = false;
        let view = AgentView::from_snapshots(vec![
            snapshot(0, AgentKind::Sentry, Vec2::new(1.0, 0.0), 10),
            snapshot(1, AgentKind::Sentry, Vec2::new(3.0, 0.0), 10),
            inactive,
            snapshot(3, AgentKind::Soldier, Vec2::new(0.2, 0.0), 30),
        ]);

        let found: Vec<AgentId> = within_range(&view, Faction::Enemy, Vec2::ZERO, 1.0)
            .map(|snapshot| snapshot.id)
            .collect();
        assert_eq!(found, vec![AgentId::new(0, 0)]);
    }
}
