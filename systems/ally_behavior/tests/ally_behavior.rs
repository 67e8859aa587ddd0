use std::time::Duration;

use lane_skirmish_core::{AgentId, AgentKind, CellCoord, Command, Event, GridSize, Path};
use lane_skirmish_system_ally_behavior::{AllyBehavior, Config, UnitState};
use lane_skirmish_world::{self as world, query, World};

const TICK: Duration = Duration::from_millis(100);

fn configured_world(side: u32) -> World {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ConfigureGrid {
            size: GridSize::square(side),
        },
        &mut events,
    );
    world
}

fn spawn(
    world: &mut World,
    kind: AgentKind,
    cell: CellCoord,
    pending: &mut Vec<Event>,
) -> AgentId {
    let before = pending.len();
    world::apply(world, Command::SpawnAgent { kind, cell }, pending);
    pending[before..]
        .iter()
        .find_map(|event| match event {
            Event::AgentSpawned { agent, .. } => Some(*agent),
            _ => None,
        })
        .expect("spawn accepted")
}

fn behavior(objectives: Vec<CellCoord>) -> AllyBehavior {
    AllyBehavior::new(Config {
        dodge_chance: 0.0,
        ..Config::new(objectives, 7)
    })
}

/// Ticks the world once and lets the ally system react until it goes quiet.
fn pump(world: &mut World, allies: &mut AllyBehavior, pending: &mut Vec<Event>) {
    let mut events = std::mem::take(pending);
    world::apply(world, Command::Tick { dt: TICK }, &mut events);

    loop {
        let mut commands = Vec::new();
        let agents = query::agent_view(world);
        allies.handle(&events, query::grid_view(world), &agents, &mut commands);
        events.clear();
        if commands.is_empty() {
            break;
        }
        for command in commands {
            world::apply(world, command, &mut events);
        }
    }
}

fn cell_of(world: &World, agent: AgentId) -> Option<CellCoord> {
    query::agent(world, agent).and_then(|snapshot| CellCoord::from_world_point(snapshot.position))
}

#[test]
fn spawned_soldier_walks_to_its_objective() {
    let mut world = configured_world(5);
    let mut allies = behavior(vec![CellCoord::new(3, 0)]);
    let mut pending = Vec::new();
    let soldier = spawn(&mut world, AgentKind::Soldier, CellCoord::new(0, 0), &mut pending);

    for _ in 0..40 {
        pump(&mut world, &mut allies, &mut pending);
    }

    assert_eq!(cell_of(&world, soldier), Some(CellCoord::new(3, 0)));
    assert_eq!(allies.unit_state(soldier), Some(UnitState::Idle));
    assert_eq!(allies.remaining_waypoints(soldier), Some(0));
}

#[test]
fn soldier_without_objectives_stays_idle() {
    let mut world = configured_world(4);
    let mut allies = behavior(Vec::new());
    let mut pending = Vec::new();
    let soldier = spawn(&mut world, AgentKind::Soldier, CellCoord::new(1, 1), &mut pending);

    for _ in 0..10 {
        pump(&mut world, &mut allies, &mut pending);
    }

    assert_eq!(allies.tracked_units(), 1);
    assert_eq!(allies.unit_state(soldier), Some(UnitState::Idle));
    assert_eq!(cell_of(&world, soldier), Some(CellCoord::new(1, 1)));
}

#[test]
fn enemy_in_range_interrupts_travel_and_takes_damage() {
    let mut world = configured_world(6);
    let mut allies = behavior(vec![CellCoord::new(4, 0)]);
    let mut pending = Vec::new();
    let sentry = spawn(&mut world, AgentKind::Sentry, CellCoord::new(2, 0), &mut pending);
    let soldier = spawn(&mut world, AgentKind::Soldier, CellCoord::new(0, 0), &mut pending);

    let mut struck = false;
    for _ in 0..40 {
        pump(&mut world, &mut allies, &mut pending);
        let health = query::agent(&world, sentry).map(|snapshot| snapshot.health.current());
        if health != Some(10) {
            assert_eq!(health, Some(7));
            struck = true;
            break;
        }
    }

    assert!(struck, "soldier never struck the sentry");
    assert!(matches!(
        allies.unit_state(soldier),
        Some(UnitState::Attacking { target, .. }) if target == sentry
    ));
    let position = query::agent(&world, soldier).expect("soldier").position;
    assert!(position.x < 1.5, "soldier kept walking while engaged");
}

#[test]
fn vanished_target_is_abandoned_without_damage() {
    let mut world = configured_world(5);
    let mut allies = behavior(vec![CellCoord::new(1, 0)]);
    let mut pending = Vec::new();
    let sentry = spawn(&mut world, AgentKind::Sentry, CellCoord::new(1, 0), &mut pending);
    let soldier = spawn(&mut world, AgentKind::Soldier, CellCoord::new(0, 0), &mut pending);

    pump(&mut world, &mut allies, &mut pending);
    assert!(matches!(
        allies.unit_state(soldier),
        Some(UnitState::Attacking { .. })
    ));

    world::apply(&mut world, Command::DespawnAgent { agent: sentry }, &mut pending);
    for _ in 0..15 {
        pump(&mut world, &mut allies, &mut pending);
    }

    assert!(!matches!(
        allies.unit_state(soldier),
        Some(UnitState::Attacking { .. })
    ));
    assert!(query::agent(&world, sentry).is_none());
}

#[test]
fn idle_soldier_supports_engaged_neighbour() {
    let mut world = configured_world(6);
    let mut allies = behavior(Vec::new());
    let mut pending = Vec::new();
    let sentry = spawn(&mut world, AgentKind::Sentry, CellCoord::new(2, 2), &mut pending);
    let vanguard = spawn(&mut world, AgentKind::Soldier, CellCoord::new(1, 2), &mut pending);
    let supporter = spawn(&mut world, AgentKind::Soldier, CellCoord::new(2, 3), &mut pending);

    pump(&mut world, &mut allies, &mut pending);
    assert_eq!(allies.unit_state(supporter), Some(UnitState::Idle));

    let route = Path::new(vec![CellCoord::new(1, 2), CellCoord::new(1, 1)]);
    assert!(allies.assign_path(vanguard, &route));
    pump(&mut world, &mut allies, &mut pending);

    for soldier in [vanguard, supporter] {
        assert!(matches!(
            allies.unit_state(soldier),
            Some(UnitState::Attacking { target, .. }) if target == sentry
        ));
    }
}

#[test]
fn assigning_a_path_replaces_the_previous_route() {
    let mut world = configured_world(6);
    let mut allies = behavior(vec![CellCoord::new(5, 0)]);
    let mut pending = Vec::new();
    let soldier = spawn(&mut world, AgentKind::Soldier, CellCoord::new(0, 0), &mut pending);

    for _ in 0..3 {
        pump(&mut world, &mut allies, &mut pending);
    }
    let grid = query::grid_view(&world).expect("grid");
    let agents = query::agent_view(&world);
    allies
        .retask(soldier, &grid, &agents, CellCoord::new(0, 3))
        .expect("route exists");

    for _ in 0..40 {
        pump(&mut world, &mut allies, &mut pending);
    }

    assert_eq!(cell_of(&world, soldier), Some(CellCoord::new(0, 3)));
    assert_eq!(allies.unit_state(soldier), Some(UnitState::Idle));
}

#[test]
fn retasking_an_unknown_agent_is_rejected() {
    let world = configured_world(3);
    let mut allies = behavior(Vec::new());
    let grid = query::grid_view(&world).expect("grid");
    let agents = query::agent_view(&world);
    let stranger = AgentId::new(9, 0);

    assert!(allies
        .retask(stranger, &grid, &agents, CellCoord::new(1, 1))
        .is_err());
    assert!(!allies.assign_path(stranger, &Path::new(vec![CellCoord::new(0, 0)])));
}

#[test]
fn removed_soldiers_are_forgotten() {
    let mut world = configured_world(4);
    let mut allies = behavior(vec![CellCoord::new(3, 3)]);
    let mut pending = Vec::new();
    let soldier = spawn(&mut world, AgentKind::Soldier, CellCoord::new(0, 0), &mut pending);
    pump(&mut world, &mut allies, &mut pending);
    assert_eq!(allies.tracked_units(), 1);

    world::apply(
        &mut world,
        Command::DamageAgent {
            source: None,
            target: soldier,
            amount: 30,
        },
        &mut pending,
    );
    pump(&mut world, &mut allies, &mut pending);

    assert_eq!(allies.tracked_units(), 0);
    assert_eq!(allies.unit_state(soldier), None);
}
