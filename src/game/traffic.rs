//! 流量生成与难度递增
//!
//! 每隔 `traffic_delay` 产生一波请求（每个请求随机落在某个 User 上，
//! 相互错开 `stagger`）；每隔 `difficulty_interval` 查阶段表提升难度，
//! 超出阶段表后保持最后一档。

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::net::{NetWorld, NodeId, NodeKind, RunPhase};
use crate::sim::{Event, SimTime, Simulator, TrafficSpec, World};
use crate::viz::VizEventKind;

/// 难度阶段：新的波次间隔与每波请求数
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyStage {
    pub traffic_delay: SimTime,
    pub packets_per_wave: u32,
    pub message: Option<String>,
}

/// 流量生成状态
#[derive(Debug, Clone)]
pub struct Traffic {
    pub traffic_delay: SimTime,
    pub packets_per_wave: u32,
    pub stagger: SimTime,
    pub write_ratio: f64,
    pub difficulty_interval: SimTime,
    pub stages: Vec<DifficultyStage>,
    /// 已经生效的阶段数（0 = 初始参数）
    pub difficulty: u32,
    pub waves: u64,
}

impl Default for Traffic {
    fn default() -> Self {
        Self {
            traffic_delay: SimTime::from_secs(1),
            packets_per_wave: 0,
            stagger: SimTime::from_millis(50),
            write_ratio: 0.3,
            difficulty_interval: SimTime::from_secs(10),
            stages: Vec::new(),
            difficulty: 0,
            waves: 0,
        }
    }
}

impl Traffic {
    pub fn from_spec(spec: &TrafficSpec) -> Self {
        Self {
            traffic_delay: SimTime::from_millis(spec.initial_delay_ms),
            packets_per_wave: spec.packets_per_wave,
            stagger: SimTime::from_millis(spec.stagger_ms),
            write_ratio: spec.write_ratio,
            difficulty_interval: SimTime::from_millis(spec.difficulty_interval_ms),
            stages: spec
                .stages
                .iter()
                .map(|s| DifficultyStage {
                    traffic_delay: SimTime::from_millis(s.delay_ms),
                    packets_per_wave: s.packets_per_wave,
                    message: s.message.clone(),
                })
                .collect(),
            difficulty: 0,
            waves: 0,
        }
    }

    /// 进入下一阶段；阶段表用完后返回 None，参数保持不变
    pub fn escalate(&mut self) -> Option<&DifficultyStage> {
        let idx = usize::try_from(self.difficulty).ok()?;
        let stage = self.stages.get(idx)?;
        self.difficulty += 1;
        self.traffic_delay = stage.traffic_delay;
        self.packets_per_wave = stage.packets_per_wave;
        Some(stage)
    }
}

fn net_world(world: &mut dyn World) -> &mut NetWorld {
    world
        .as_any_mut()
        .downcast_mut::<NetWorld>()
        .expect("world must be NetWorld")
}

/// 事件：产生一波请求，并调度下一波
#[derive(Debug)]
pub struct SpawnWave;

impl Event for SpawnWave {
    #[tracing::instrument(skip(self, sim, world))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = net_world(world);
        if w.net.stats.phase != RunPhase::Running {
            return;
        }
        let users: Vec<NodeId> = w.net.topo.active_ids(NodeKind::User);
        let count = w.traffic.packets_per_wave;
        w.traffic.waves += 1;
        debug!(wave = w.traffic.waves, count, users = users.len(), "🌊 产生一波请求");

        let now = sim.now();
        for i in 0..u64::from(count) {
            let Some(user) = users.choose(w.net.rng()).copied() else {
                break;
            };
            let at = now.saturating_add(w.traffic.stagger.saturating_mul(i));
            sim.schedule(at, SpawnPacket { user });
        }
        sim.schedule_in(w.traffic.traffic_delay, SpawnWave);
    }
}

/// 事件：某个 User 发起一个请求，读写类型按写入比例随机决定
#[derive(Debug)]
pub struct SpawnPacket {
    pub user: NodeId,
}

impl Event for SpawnPacket {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = net_world(world);
        if w.net.stats.phase != RunPhase::Running {
            return;
        }
        let write_ratio = w.traffic.write_ratio;
        let write = w.net.rng().gen_bool(write_ratio);
        w.net.send_request(self.user, write, sim);
    }
}

/// 事件：难度递增
#[derive(Debug)]
pub struct DifficultyTick;

impl Event for DifficultyTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = net_world(world);
        if w.net.stats.phase != RunPhase::Running {
            return;
        }
        if let Some(stage) = w.traffic.escalate().cloned() {
            let kind = VizEventKind::DifficultyChanged {
                level: w.traffic.difficulty,
                traffic_delay_ns: stage.traffic_delay.0,
                packets_per_wave: stage.packets_per_wave,
                message: stage.message,
            };
            info!(
                level = w.traffic.difficulty,
                traffic_delay = ?w.traffic.traffic_delay,
                packets_per_wave = w.traffic.packets_per_wave,
                "📈 难度提升"
            );
            w.net.stats.difficulty = w.traffic.difficulty;
            w.net.viz_push(sim.now(), None, kind);
        }
        sim.schedule_in(w.traffic.difficulty_interval, DifficultyTick);
    }
}
