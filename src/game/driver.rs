//! 仿真驱动
//!
//! 对外的命令接口（CLI/UI/测试共用）：开始、暂停、继续、购买节点、升级节点、重置关卡，
//! 以及推进逻辑时钟和读取快照。每个驱动实例独占自己的仿真器与世界，
//! 多个实例之间互不影响。

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::net::{DbRole, LevelOutcome, NetWorld, Network, NodeId, NodeKind, RunPhase, RunStats};
use crate::sim::{CampaignSpec, LevelSpec, NodeSpec, SimTime, Simulator};
use crate::topo::build_level;
use crate::viz::VizEvent;

use super::economy::Economy;
use super::traffic::{DifficultyTick, SpawnWave};
use super::GameError;

/// 单个节点的状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub key: String,
    pub kind: NodeKind,
    pub replica: bool,
    pub active: bool,
    pub load: u32,
    pub capacity: u32,
    pub level: u32,
    pub delay_ms: u64,
    pub processed: u64,
    pub rejected: u64,
}

/// 供 UI 渲染的运行快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub level: usize,
    pub t_ms: u64,
    pub phase: RunPhase,
    pub money: u64,
    pub success: u64,
    pub errors: u64,
    pub total: u64,
    pub target_total: u64,
    pub error_rate: f64,
    pub storage: u64,
    pub difficulty: u32,
    pub throttled: u64,
    pub lost_writes: u64,
    pub outcome: Option<LevelOutcome>,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug)]
pub struct SimulationDriver {
    campaign: CampaignSpec,
    level_number: usize,
    level: LevelSpec,
    economy: Economy,
    seed_override: Option<u64>,
    record_events: bool,
    sim: Simulator,
    world: NetWorld,
}

impl SimulationDriver {
    /// 加载战役中的第 `level_number` 关（从 1 开始）
    pub fn new(campaign: CampaignSpec, level_number: usize) -> Result<Self, GameError> {
        let level = campaign.level(level_number)?.clone();
        let mut driver = Self {
            campaign,
            level_number,
            economy: Economy::new(level.economy.clone()),
            level,
            seed_override: None,
            record_events: false,
            sim: Simulator::default(),
            world: NetWorld::default(),
        };
        driver.reset_run(level_number)?;
        Ok(driver)
    }

    /// 只有一关的战役
    pub fn from_level(level: LevelSpec) -> Result<Self, GameError> {
        let campaign = CampaignSpec {
            schema_version: 1,
            levels: vec![level],
        };
        Self::new(campaign, 1)
    }

    /// 固定随机种子（覆盖关卡配置中的 seed），并重建当前关卡
    pub fn with_seed(mut self, seed: u64) -> Result<Self, GameError> {
        self.seed_override = Some(seed);
        self.reset_run(self.level_number)?;
        Ok(self)
    }

    /// 开启事件记录，并重建当前关卡
    pub fn with_event_log(mut self) -> Result<Self, GameError> {
        self.record_events = true;
        self.reset_run(self.level_number)?;
        Ok(self)
    }

    /// 重置到指定关卡：全新的仿真器、拓扑与统计，上一关的状态不会残留
    #[tracing::instrument(skip(self))]
    pub fn reset_run(&mut self, level_number: usize) -> Result<(), GameError> {
        let level = self.campaign.level(level_number)?.clone();
        let seed = self.seed_override.or(level.seed).unwrap_or(0);
        let world = build_level(&level, seed, self.record_events)?;

        // 旧世界的节点全部下线，待执行事件随旧仿真器一起丢弃
        self.world.net.topo.deactivate_all();
        self.sim = Simulator::default();
        self.world = world;
        self.economy = Economy::new(level.economy.clone());
        self.level = level;
        self.level_number = level_number;
        info!(level_number, seed, "🔄 关卡已重置");
        Ok(())
    }

    /// 开始运行；已在运行、暂停或已结束时不做任何事
    pub fn start(&mut self) {
        if self.world.net.stats.phase != RunPhase::Stopped {
            debug!(phase = ?self.world.net.stats.phase, "忽略 start");
            return;
        }
        let now = self.sim.now();
        self.world.net.set_phase(RunPhase::Running, now);
        self.sim.schedule(now, SpawnWave);
        self.sim
            .schedule_in(self.world.traffic.difficulty_interval, DifficultyTick);
        info!("▶️  关卡开始");
    }

    /// 暂停：冻结逻辑时钟，所有待执行事件与在途数据包保持原样
    pub fn pause(&mut self) {
        if self.world.net.stats.phase != RunPhase::Running {
            return;
        }
        self.sim.pause();
        self.world.net.set_phase(RunPhase::Paused, self.sim.now());
        info!("⏸️  已暂停");
    }

    pub fn resume(&mut self) {
        if self.world.net.stats.phase != RunPhase::Paused {
            return;
        }
        self.sim.resume();
        self.world.net.set_phase(RunPhase::Running, self.sim.now());
        info!("▶️  继续运行");
    }

    /// 购买并加入一个节点，参数取关卡中该类型的默认值
    pub fn add_node(&mut self, kind: NodeKind, role: DbRole) -> Result<NodeId, GameError> {
        if self.is_over() {
            return Err(GameError::RunOver);
        }
        let net = &mut self.world.net;
        let cost = self
            .economy
            .charge_purchase(&mut net.stats, &net.topo, kind, role)?;
        let params = self
            .level
            .params_for(kind, role == DbRole::Replica, &NodeSpec::default());
        let id = net.add_node(kind, params, self.sim.now());
        info!(%kind, ?role, cost, money = net.stats.money, "🛒 购买节点");
        Ok(id)
    }

    /// 升级节点；返回新的等级。达到容量上限时不扣款。
    pub fn upgrade_node(&mut self, key: &str) -> Result<u32, GameError> {
        if self.is_over() {
            return Err(GameError::RunOver);
        }
        let net = &mut self.world.net;
        let id = net
            .topo
            .id_of(key)
            .ok_or_else(|| GameError::UnknownNode(key.to_string()))?;
        let cost = self.economy.upgrade_cost();
        if net.stats.money < cost {
            return Err(GameError::InsufficientFunds {
                slug: "upgrade".to_string(),
                cost,
                money: net.stats.money,
            });
        }
        if !net.upgrade(id, self.sim.now()) {
            return Err(GameError::MaxedOut(key.to_string()));
        }
        Economy::debit(&mut net.stats, "upgrade", cost)?;
        let level = net.topo.get(id).map_or(1, |n| n.level());
        Ok(level)
    }

    /// 推进逻辑时钟 `dt`；暂停时不推进
    pub fn advance(&mut self, dt: SimTime) {
        if self.sim.is_paused() {
            return;
        }
        let until = self.sim.now().saturating_add(dt);
        self.sim.run_until(until, &mut self.world);
    }

    /// 尚未开始则先开始，然后一直运行到关卡结束或逻辑时间达到 `limit`
    pub fn run_to_completion(&mut self, limit: SimTime) -> Option<LevelOutcome> {
        self.start();
        if !self.sim.is_paused() {
            self.sim.run_until(limit, &mut self.world);
        }
        self.outcome()
    }

    pub fn now(&self) -> SimTime {
        self.sim.now()
    }

    pub fn level(&self) -> &LevelSpec {
        &self.level
    }

    pub fn level_number(&self) -> usize {
        self.level_number
    }

    pub fn stats(&self) -> &RunStats {
        &self.world.net.stats
    }

    pub fn network(&self) -> &Network {
        &self.world.net
    }

    pub fn phase(&self) -> RunPhase {
        self.world.net.stats.phase
    }

    pub fn is_over(&self) -> bool {
        self.world.net.stats.is_over()
    }

    pub fn outcome(&self) -> Option<LevelOutcome> {
        self.world.net.stats.outcome
    }

    pub fn events(&self) -> &[VizEvent] {
        self.world
            .net
            .viz
            .as_ref()
            .map(|v| v.events.as_slice())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let stats = &self.world.net.stats;
        let nodes = self
            .world
            .net
            .topo
            .nodes()
            .map(|n| NodeSnapshot {
                key: n.key.clone(),
                kind: n.kind,
                replica: n.is_replica(),
                active: n.is_active(),
                load: n.load(),
                capacity: n.capacity(),
                level: n.level(),
                delay_ms: n.delay().as_millis(),
                processed: n.processed,
                rejected: n.rejected,
            })
            .collect();
        RunSnapshot {
            level: self.level_number,
            t_ms: self.sim.now().as_millis(),
            phase: stats.phase,
            money: stats.money,
            success: stats.success,
            errors: stats.errors,
            total: stats.total,
            target_total: self.level.target_total,
            error_rate: stats.error_rate(),
            storage: stats.storage,
            difficulty: stats.difficulty,
            throttled: stats.throttled,
            lost_writes: stats.lost_writes,
            outcome: stats.outcome,
            nodes,
        }
    }
}
