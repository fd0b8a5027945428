use super::{bare_world, params};
use crate::game::{DifficultyTick, SpawnWave, Traffic};
use crate::net::{NetWorld, NodeKind, NodeParams, RunPhase};
use crate::sim::{SimTime, Simulator, StageSpec, TrafficSpec};
use crate::viz::VizEventKind;

fn spec(stages: Vec<StageSpec>) -> TrafficSpec {
    TrafficSpec {
        initial_delay_ms: 1_000,
        packets_per_wave: 3,
        stagger_ms: 50,
        write_ratio: 1.0,
        difficulty_interval_ms: 5_000,
        stages,
    }
}

fn stage(delay_ms: u64, packets_per_wave: u32) -> StageSpec {
    StageSpec {
        delay_ms,
        packets_per_wave,
        message: None,
    }
}

fn running_world(traffic: TrafficSpec) -> NetWorld {
    let mut world = bare_world(21);
    for _ in 0..2 {
        world
            .net
            .add_node(NodeKind::User, NodeParams::defaults(NodeKind::User), SimTime::ZERO);
    }
    world.net.add_node(
        NodeKind::AppServer,
        params(NodeKind::AppServer, 100, 300),
        SimTime::ZERO,
    );
    world.traffic = Traffic::from_spec(&traffic);
    world.net.set_phase(RunPhase::Running, SimTime::ZERO);
    world
}

fn spawn_times(world: &NetWorld) -> Vec<(u64, bool)> {
    world
        .net
        .viz
        .as_ref()
        .map(|v| {
            v.events
                .iter()
                .filter_map(|ev| match ev.kind {
                    VizEventKind::Spawn { write, .. } => Some((ev.t_ns, write)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn escalation_walks_the_stage_table_then_plateaus() {
    let mut traffic = Traffic::from_spec(&spec(vec![stage(800, 4), stage(600, 5)]));
    assert_eq!(traffic.traffic_delay, SimTime::from_millis(1_000));

    assert_eq!(traffic.escalate().map(|s| s.packets_per_wave), Some(4));
    assert_eq!(traffic.escalate().map(|s| s.packets_per_wave), Some(5));
    assert!(traffic.escalate().is_none());
    assert_eq!(traffic.difficulty, 2);
    assert_eq!(traffic.traffic_delay, SimTime::from_millis(600));
    assert_eq!(traffic.packets_per_wave, 5);
}

#[test]
fn waves_are_staggered_and_repeat_after_the_traffic_delay() {
    let mut sim = Simulator::default();
    let mut world = running_world(spec(Vec::new()));
    sim.schedule(SimTime::ZERO, SpawnWave);

    sim.run_until(SimTime::from_millis(999), &mut world);
    let times: Vec<u64> = spawn_times(&world).iter().map(|(t, _)| *t).collect();
    assert_eq!(
        times,
        vec![0, SimTime::from_millis(50).0, SimTime::from_millis(100).0]
    );

    sim.run_until(SimTime::from_millis(1_000), &mut world);
    assert_eq!(world.traffic.waves, 2);
    assert_eq!(spawn_times(&world).len(), 4);
    // write_ratio = 1.0：全部是写请求
    assert!(spawn_times(&world).iter().all(|(_, write)| *write));
}

#[test]
fn difficulty_ticks_change_the_wave_shape() {
    let mut sim = Simulator::default();
    let mut world = running_world(spec(vec![stage(500, 1)]));
    sim.schedule(SimTime::ZERO, SpawnWave);
    sim.schedule_in(world.traffic.difficulty_interval, DifficultyTick);

    sim.run_until(SimTime::from_secs(12), &mut world);
    assert_eq!(world.traffic.difficulty, 1);
    assert_eq!(world.net.stats.difficulty, 1);
    assert_eq!(world.traffic.traffic_delay, SimTime::from_millis(500));

    let changes = world
        .net
        .viz
        .as_ref()
        .map(|v| {
            v.events
                .iter()
                .filter(|ev| matches!(ev.kind, VizEventKind::DifficultyChanged { .. }))
                .count()
        })
        .unwrap_or(0);
    assert_eq!(changes, 1);

    // 5s 之前每秒一波，每波 3 个；之后每 500ms 一波，每波 1 个
    let after = spawn_times(&world)
        .iter()
        .filter(|(t, _)| *t > SimTime::from_secs(5).0)
        .count();
    assert!(after >= 12, "expected the faster cadence, got {after}");
}

#[test]
fn traffic_events_are_inert_unless_running() {
    let mut sim = Simulator::default();
    let mut world = running_world(spec(vec![stage(500, 1)]));
    world.net.set_phase(RunPhase::Paused, SimTime::ZERO);
    sim.schedule(SimTime::ZERO, SpawnWave);
    sim.schedule(SimTime::ZERO, DifficultyTick);

    sim.run(&mut world);
    assert!(spawn_times(&world).is_empty());
    assert_eq!(world.traffic.difficulty, 0);
    assert_eq!(sim.pending(), 0);
}
