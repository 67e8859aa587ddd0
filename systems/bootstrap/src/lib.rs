#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Static scenario configuration that prepares a Lane Skirmish match.
//!
//! A [`Scenario`] describes the grid layout, the enemy garrison and the
//! tuning of every system. The default is the lane map: a wall across row 4
//! with gaps at columns 1 and 8, ally territory below the wall, four sentries
//! and two patrollers above it. Scenarios can also be read from TOML, where
//! every omitted field keeps its default.

use std::collections::BTreeSet;

use lane_skirmish_core::{AgentKind, CellCoord, Command, GridSize, SimulationError};
use lane_skirmish_system_ally_behavior::Config as AllyConfig;
use lane_skirmish_system_enemy_behavior::{Config as EnemyConfig, PatrolRoute};
use lane_skirmish_system_resources::Config as ResourceConfig;
use lane_skirmish_system_spawning::Config as SpawnConfig;
use serde::Deserialize;
use tracing::debug;

/// Movement cost stored on blocked cells.
pub const BLOCKED_MOVEMENT_COST: u32 = 999;

/// Complete description of a match.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Number of grid columns.
    pub columns: u32,
    /// Number of grid rows.
    pub rows: u32,
    /// Cells that cannot be traversed.
    pub blocked_cells: Vec<CellCoord>,
    /// Rows counted from row 0 that accept ally spawns.
    pub ally_territory_rows: u32,
    /// Cells garrisoned by sentries.
    pub sentries: Vec<CellCoord>,
    /// Tuning of the ally resource pool.
    pub resources: ResourceConfig,
    /// Tuning of the ally spawn scheduler.
    pub spawning: SpawnConfig,
    /// Tuning and objectives of ally soldiers.
    pub allies: AllyConfig,
    /// Tuning of enemies. A patroller is spawned at every patrol route.
    pub enemies: EnemyConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        let cell = CellCoord::new;
        let blocked_cells = [0, 2, 3, 4, 5, 6, 7, 9]
            .into_iter()
            .map(|column| cell(column, 4))
            .collect();

        Self {
            columns: 10,
            rows: 10,
            blocked_cells,
            ally_territory_rows: 5,
            sentries: vec![cell(1, 8), cell(4, 9), cell(8, 8), cell(5, 9)],
            resources: ResourceConfig::default(),
            spawning: SpawnConfig::default(),
            allies: AllyConfig {
                objectives: vec![cell(1, 1), cell(3, 3), cell(5, 5), cell(7, 7)],
                ..AllyConfig::default()
            },
            enemies: EnemyConfig {
                patrol_routes: vec![
                    patrol_route(&[(2, 7), (0, 7), (1, 6), (4, 7), (2, 9)]),
                    patrol_route(&[(7, 7), (9, 7), (8, 6), (5, 7), (7, 9)]),
                ],
                ..EnemyConfig::default()
            },
        }
    }
}

/// Route that starts at its first waypoint.
fn patrol_route(waypoints: &[(u32, u32)]) -> PatrolRoute {
    let waypoints: Vec<CellCoord> = waypoints
        .iter()
        .map(|&(column, row)| CellCoord::new(column, row))
        .collect();
    PatrolRoute {
        spawn: waypoints[0],
        waypoints,
    }
}

impl Scenario {
    /// Parses a scenario from TOML and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Configuration`] when the text is not valid
    /// TOML for a scenario or describes an inconsistent layout.
    pub fn from_toml_str(text: &str) -> Result<Self, SimulationError> {
        let scenario: Self = toml::from_str(text)
            .map_err(|error| SimulationError::Configuration(error.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Checks that every referenced cell lies inside the grid, that
    /// garrisons stand on walkable cells and that the system tuning is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Configuration`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let size = self.size();
        if size.cell_count() == 0 {
            return Err(SimulationError::Configuration(
                "scenario grid must have at least one cell".into(),
            ));
        }

        let outside = |cell: &CellCoord| !size.contains(*cell);
        if let Some(cell) = self.blocked_cells.iter().find(|cell| outside(*cell)) {
            return Err(SimulationError::Configuration(format!(
                "blocked cell {cell:?} lies outside the grid"
            )));
        }

        let blocked: BTreeSet<CellCoord> = self.blocked_cells.iter().copied().collect();
        let garrison = self
            .sentries
            .iter()
            .chain(self.enemies.patrol_routes.iter().map(|route| &route.spawn))
            .chain(
                self.enemies
                    .patrol_routes
                    .iter()
                    .flat_map(|route| route.waypoints.iter()),
            )
            .chain(self.allies.objectives.iter());
        for cell in garrison {
            if outside(cell) {
                return Err(SimulationError::Configuration(format!(
                    "cell {cell:?} lies outside the grid"
                )));
            }
            if blocked.contains(cell) {
                return Err(SimulationError::Configuration(format!(
                    "cell {cell:?} is blocked"
                )));
            }
        }
        self.validate_tuning()
    }

    fn validate_tuning(&self) -> Result<(), SimulationError> {
        let allies = &self.allies;
        let patroller = &self.enemies.patroller;
        let magnitudes = [
            ("allies.speed", allies.speed),
            ("allies.detection_radius", allies.detection_radius),
            ("allies.arrival_epsilon", allies.arrival_epsilon),
            ("allies.support_radius", allies.support_radius),
            ("enemies.patroller.detection_radius", patroller.detection_radius),
            ("enemies.patroller.attack_range", patroller.attack_range),
            ("enemies.patroller.attack_buffer", patroller.attack_buffer),
            ("enemies.patroller.speed", patroller.speed),
            ("enemies.patroller.search_radius", patroller.search_radius),
            ("enemies.patroller.arrival_epsilon", patroller.arrival_epsilon),
            ("enemies.patroller.dodge_distance", patroller.dodge_distance),
            (
                "enemies.patroller.enrage_speed_multiplier",
                patroller.enrage_speed_multiplier,
            ),
            ("enemies.sentry.range", self.enemies.sentry.range),
        ];
        if let Some((name, value)) = magnitudes
            .iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(SimulationError::Configuration(format!(
                "{name} must be finite and non-negative, got {value}"
            )));
        }

        let probabilities = [
            ("allies.dodge_chance", allies.dodge_chance),
            ("enemies.patroller.dodge_trigger", patroller.dodge_trigger),
            ("enemies.patroller.dodge_chance", patroller.dodge_chance),
            (
                "enemies.patroller.desperate_dodge_chance",
                patroller.desperate_dodge_chance,
            ),
            (
                "enemies.patroller.secondary_attack_chance",
                patroller.secondary_attack_chance,
            ),
        ];
        if let Some((name, value)) = probabilities
            .iter()
            .find(|(_, value)| !(0.0..=1.0).contains(value))
        {
            return Err(SimulationError::Configuration(format!(
                "{name} must lie in [0, 1], got {value}"
            )));
        }
        Ok(())
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn size(&self) -> GridSize {
        GridSize::new(self.columns, self.rows)
    }

    /// Derives a distinct seed for every system from a single match seed.
    pub fn reseed(&mut self, seed: u64) {
        let derive = |stream: u64| {
            seed.wrapping_add(stream.wrapping_mul(0x9e37_79b9_7f4a_7c15))
                .rotate_left(17)
        };
        self.spawning.rng_seed = derive(1);
        self.allies.rng_seed = derive(2);
        self.enemies.rng_seed = derive(3);
    }

    /// Commands that build the layout and garrison in an empty world.
    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        let mut commands = vec![Command::ConfigureGrid { size: self.size() }];

        let blocked: BTreeSet<CellCoord> = self.blocked_cells.iter().copied().collect();
        for row in 0..self.rows {
            for column in 0..self.columns {
                let cell = CellCoord::new(column, row);
                let is_blocked = blocked.contains(&cell);
                let ally_territory = row < self.ally_territory_rows;
                if !is_blocked && ally_territory {
                    continue;
                }
                commands.push(Command::UpdateCell {
                    cell,
                    walkable: !is_blocked,
                    movement_cost: if is_blocked { BLOCKED_MOVEMENT_COST } else { 1 },
                    ally_spawnable: Some(ally_territory),
                    enemy_spawnable: None,
                });
            }
        }

        commands.extend(self.sentries.iter().map(|&cell| Command::SpawnAgent {
            kind: AgentKind::Sentry,
            cell,
        }));
        commands.extend(
            self.enemies
                .patrol_routes
                .iter()
                .map(|route| Command::SpawnAgent {
                    kind: AgentKind::Patroller,
                    cell: route.spawn,
                }),
        );

        debug!(
            commands = commands.len(),
            sentries = self.sentries.len(),
            patrollers = self.enemies.patrol_routes.len(),
            "scenario prepared"
        );
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_is_valid() {
        assert_eq!(Scenario::default().validate(), Ok(()));
    }

    #[test]
    fn reseed_gives_each_system_its_own_stream() {
        let mut scenario = Scenario::default();
        scenario.reseed(42);
        let seeds = [
            scenario.spawning.rng_seed,
            scenario.allies.rng_seed,
            scenario.enemies.rng_seed,
        ];
        assert_ne!(seeds[0], seeds[1]);
        assert_ne!(seeds[1], seeds[2]);
        assert_ne!(seeds[0], seeds[2]);

        let mut again = Scenario::default();
        again.reseed(42);
        assert_eq!(again, scenario);
    }
}
