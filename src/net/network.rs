//! 处理引擎
//!
//! 持有拓扑注册表、全局统计与随机数源；负责准入控制、处理完成后的路由分发、
//! 消息队列的缓冲与排空，以及成功/失败的记账和关卡结束判定。
//!
//! 所有节点间的跳转都是异步的：先经过固定的传输时延（`DeliverPacket`），
//! 到达后再进入准入控制和处理时延（`ProcessingDone`），两者可分别调节。

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use super::deliver_packet::DeliverPacket;
use super::id::NodeId;
use super::node::{NodeKind, NodeParams};
use super::packet::Packet;
use super::processing::{ProcessingDone, QueueDrain};
use super::routing::{DropReason, Hop, policy_for};
use super::stats::{LevelOutcome, RunPhase, RunStats};
use super::topology::Topology;
use crate::sim::{ConfigError, SimTime, Simulator};
use crate::viz::{VizEvent, VizEventKind, VizLogger, VizNodeInfo};

/// 引擎参数（来自关卡配置）
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// 节点间传输时延
    pub transit: SimTime,
    /// 达到该总数即结束关卡；None 表示不自动结束
    pub target_total: Option<u64>,
    pub max_error_rate: f64,
    pub reward_per_success: u64,
    /// 目标缺失/下线导致的丢包是否计为错误
    pub count_unroutable_as_error: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            transit: SimTime::ZERO,
            target_total: None,
            max_error_rate: 0.1,
            reward_per_success: 1,
            count_unroutable_as_error: true,
        }
    }
}

#[derive(Debug)]
pub struct Network {
    pub topo: Topology,
    pub stats: RunStats,
    pub cfg: NetConfig,
    pub viz: Option<VizLogger>,
    rng: ChaCha8Rng,
    next_pkt_id: u64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(NetConfig::default(), 0)
    }
}

impl Network {
    pub fn new(cfg: NetConfig, seed: u64) -> Self {
        Self {
            topo: Topology::default(),
            stats: RunStats::default(),
            cfg,
            viz: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_pkt_id: 0,
        }
    }

    /// 共享随机数源（路由与流量生成共用，保证给定种子可回放）
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// 添加节点（自动编号 key）
    pub fn add_node(&mut self, kind: NodeKind, params: NodeParams, now: SimTime) -> NodeId {
        let id = self.topo.add(kind, params);
        self.announce_node(id, now);
        id
    }

    /// 以指定 key 添加节点
    pub fn add_node_keyed(
        &mut self,
        key: &str,
        kind: NodeKind,
        params: NodeParams,
        now: SimTime,
    ) -> Result<NodeId, ConfigError> {
        let id = self.topo.add_keyed(key, kind, params)?;
        self.announce_node(id, now);
        Ok(id)
    }

    fn announce_node(&mut self, id: NodeId, now: SimTime) {
        let Some(node) = self.topo.get(id) else {
            return;
        };
        let kind = VizEventKind::NodeAdded {
            node: id.0,
            key: node.key.clone(),
            node_kind: node.kind,
        };
        self.viz_push(now, None, kind);
    }

    /// 升级节点；返回是否成功
    pub fn upgrade(&mut self, id: NodeId, now: SimTime) -> bool {
        let Some(node) = self.topo.get_mut(id) else {
            return false;
        };
        if !node.upgrade() {
            return false;
        }
        let kind = VizEventKind::NodeUpgraded {
            node: id.0,
            level: node.level(),
            capacity: node.capacity(),
            delay_ns: node.delay().0,
        };
        self.viz_push(now, None, kind);
        true
    }

    /// 创建数据包
    pub fn make_packet(&mut self, origin: NodeId, write: bool, now: SimTime) -> Packet {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        Packet::new(id, origin, write, now)
    }

    /// User 发起一个新请求；返回包 id（被限流或无法发起时为 None）
    #[tracing::instrument(skip(self, sim), fields(user = ?user))]
    pub fn send_request(&mut self, user: NodeId, write: bool, sim: &mut Simulator) -> Option<u64> {
        if self.stats.is_over() {
            return None;
        }
        let now = sim.now();
        let node = self
            .topo
            .get_mut(user)
            .filter(|n| n.is_active() && n.kind == NodeKind::User)?;
        if !node.begin_request() {
            // 客户端限流：不算服务端错误
            trace!("客户端并发已满，丢弃自身请求");
            self.stats.throttled += 1;
            let kind = VizEventKind::Dropped {
                node: Some(user.0),
                reason: DropReason::Throttled,
                counted: false,
            };
            self.viz_push(now, None, kind);
            return None;
        }

        let pkt = self.make_packet(user, write, now);
        let pkt_id = pkt.id;
        debug!(pkt_id, write, "🆕 User 发起请求");
        self.viz_push(now, Some(pkt_id), VizEventKind::Spawn { user: user.0, write });

        self.route_at(user, pkt, sim);
        Some(pkt_id)
    }

    /// 数据包到达节点
    #[tracing::instrument(skip(self, sim), fields(pkt_id = pkt.id, to = ?to))]
    pub fn deliver(&mut self, to: NodeId, pkt: Packet, sim: &mut Simulator) {
        if self.stats.is_over() {
            return;
        }
        let Some(kind) = self.topo.available(to).map(|n| n.kind) else {
            debug!("目标节点已下线");
            self.record_failure(Some(to), pkt, DropReason::InactiveDestination, sim);
            return;
        };
        trace!(%kind, is_response = pkt.is_response, write = pkt.is_write(), "📬 数据包到达节点");
        match kind {
            NodeKind::User => self.route_at(to, pkt, sim),
            NodeKind::Queue => self.enqueue_write(to, pkt, sim),
            _ => self.submit(to, pkt, sim),
        }
    }

    /// 准入控制：满载立即拒绝（无等待队列），否则占用一个槽位并在处理时延后完成。
    #[tracing::instrument(skip(self, sim), fields(pkt_id = pkt.id, node = ?at))]
    pub fn submit(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        if self.stats.is_over() {
            return;
        }
        let now = sim.now();
        let Some(node) = self.topo.get_mut(at).filter(|n| n.is_active()) else {
            self.record_failure(Some(at), pkt, DropReason::InactiveDestination, sim);
            return;
        };
        let load = node.load();
        let capacity = node.capacity();
        if !node.try_admit() {
            debug!(load, capacity, "🚫 容量已满，拒绝");
            self.viz_push(now, Some(pkt.id), VizEventKind::Reject { node: at.0, load, capacity });
            self.record_failure(Some(at), pkt, DropReason::Rejected, sim);
            return;
        }
        let delay = node.delay();
        trace!(load = load + 1, capacity, ?delay, "✅ 准入");
        self.viz_push(
            now,
            Some(pkt.id),
            VizEventKind::Admit {
                node: at.0,
                load: load + 1,
                capacity,
            },
        );
        sim.schedule_in(delay, ProcessingDone { node: at, pkt });
    }

    /// 处理完成：释放槽位，数据库记录写入，然后交给路由策略
    pub(crate) fn on_processed(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        if self.stats.is_over() {
            return;
        }
        let now = sim.now();
        let Some(node) = self.topo.get_mut(at) else {
            return;
        };
        node.finish();
        if !node.is_active() {
            self.record_failure(Some(at), pkt, DropReason::InactiveDestination, sim);
            return;
        }
        if node.kind == NodeKind::Database && !pkt.is_response && pkt.is_write() {
            node.record_write();
            let kind = VizEventKind::Write {
                node: at.0,
                writes_stored: node.writes_stored(),
                delay_ns: node.delay().0,
            };
            self.stats.storage += 1;
            self.viz_push(now, Some(pkt.id), kind);
        }
        self.route_at(at, pkt, sim);
    }

    /// 消息队列收到写请求：缓冲满则拒绝；否则入队、立即向 User 确认，并按需开始排空。
    fn enqueue_write(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        let now = sim.now();
        let ack = pkt.ack_for(self.next_pkt_id);
        let pkt_id = pkt.id;
        let Some(node) = self.topo.get_mut(at) else {
            return;
        };
        let capacity = node.capacity();
        if let Err(pkt) = node.enqueue(pkt) {
            node.rejected += 1;
            let load = node.load();
            debug!(load, capacity, "🚫 消息队列缓冲已满，拒绝");
            self.viz_push(now, Some(pkt_id), VizEventKind::Reject { node: at.0, load, capacity });
            self.record_failure(Some(at), pkt, DropReason::Rejected, sim);
            return;
        }
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        let depth = node.backlog_len();
        let start_draining = !node.draining;
        node.draining = true;
        let delay = node.delay();

        trace!(depth, capacity, "📥 写请求入队");
        self.viz_push(now, Some(pkt_id), VizEventKind::Enqueue { node: at.0, depth, capacity });
        self.viz_push(
            now,
            Some(ack.id),
            VizEventKind::Ack {
                node: at.0,
                origin: ack.origin.0,
            },
        );
        let origin = ack.origin;
        self.dispatch(at, Hop::Forward { to: origin, pkt: ack }, sim);

        if start_draining {
            sim.schedule_in(delay, QueueDrain { node: at });
        }
    }

    /// 排空一步：取出最早的写请求发往主库，缓冲非空则继续
    pub(crate) fn on_queue_drain(&mut self, at: NodeId, sim: &mut Simulator) {
        if self.stats.is_over() {
            return;
        }
        let Some(node) = self.topo.get_mut(at) else {
            return;
        };
        let Some(pkt) = node.dequeue() else {
            node.draining = false;
            return;
        };
        node.processed += 1;
        if node.is_active() {
            self.route_at(at, pkt, sim);
        } else {
            self.record_failure(Some(at), pkt, DropReason::InactiveDestination, sim);
        }

        let Some(node) = self.topo.get_mut(at) else {
            return;
        };
        if node.backlog_len() > 0 && !self.stats.is_over() {
            let delay = node.delay();
            sim.schedule_in(delay, QueueDrain { node: at });
        } else {
            node.draining = false;
        }
    }

    /// 调用节点的路由策略并执行决策
    fn route_at(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        let Some(node) = self.topo.get(at) else {
            return;
        };
        let hop = policy_for(node.kind).route(node, pkt, &self.topo, &mut self.rng);
        self.dispatch(at, hop, sim);
    }

    fn dispatch(&mut self, from: NodeId, hop: Hop, sim: &mut Simulator) {
        match hop {
            Hop::Forward { to, mut pkt } => {
                if self.topo.available(to).is_none() {
                    self.record_failure(Some(to), pkt, DropReason::InactiveDestination, sim);
                    return;
                }
                pkt.hops += 1;
                trace!(pkt_id = pkt.id, ?from, ?to, "🚀 转发");
                self.viz_push(sim.now(), Some(pkt.id), VizEventKind::Forward { from: from.0, to: to.0 });
                sim.schedule_in(self.cfg.transit, DeliverPacket { to, pkt });
            }
            Hop::Complete(pkt) => self.record_success(from, pkt, sim),
            Hop::Discard { pkt, reason } => self.record_failure(Some(from), pkt, reason, sim),
        }
    }

    fn record_success(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        self.stats.success += 1;
        self.stats.total += 1;
        self.stats.money = self.stats.money.saturating_add(self.cfg.reward_per_success);
        if let Some(user) = self.topo.get_mut(pkt.origin) {
            user.local_successes += 1;
            user.end_request();
        }
        debug!(
            pkt_id = pkt.id,
            hops = pkt.hops,
            cache_hit = pkt.cache_hit,
            cdn_hit = pkt.cdn_hit,
            success = self.stats.success,
            total = self.stats.total,
            "✅ 请求成功"
        );
        self.viz_push(sim.now(), Some(pkt.id), VizEventKind::Delivered { node: at.0 });
        self.finish_if_done(sim);
    }

    /// 失败路径：按原因决定是否计入错误，并归属到发起的 User
    fn record_failure(&mut self, at: Option<NodeId>, pkt: Packet, reason: DropReason, sim: &mut Simulator) {
        let now = sim.now();
        if pkt.acked {
            // 结果已通过确认计为成功
            if reason != DropReason::AlreadyAcknowledged {
                warn!(pkt_id = pkt.id, ?reason, "已确认的写入未能落库");
                self.stats.lost_writes += 1;
            }
            let kind = VizEventKind::Dropped {
                node: at.map(|id| id.0),
                reason,
                counted: false,
            };
            self.viz_push(now, Some(pkt.id), kind);
            return;
        }

        let counted = match reason {
            DropReason::Rejected => true,
            DropReason::NoRoute | DropReason::InactiveDestination => {
                self.cfg.count_unroutable_as_error
            }
            DropReason::Throttled | DropReason::AlreadyAcknowledged => false,
        };
        if let Some(user) = self.topo.get_mut(pkt.origin) {
            user.end_request();
            if counted {
                user.local_errors += 1;
            }
        }
        if counted {
            self.stats.errors += 1;
            self.stats.total += 1;
        } else {
            self.stats.uncounted_drops += 1;
        }
        debug!(pkt_id = pkt.id, ?reason, counted, errors = self.stats.errors, "❌ 丢包");
        let kind = VizEventKind::Dropped {
            node: at.map(|id| id.0),
            reason,
            counted,
        };
        self.viz_push(now, Some(pkt.id), kind);
        if counted {
            self.finish_if_done(sim);
        }
    }

    /// 每次成功/失败后检查是否达到目标总数
    fn finish_if_done(&mut self, sim: &mut Simulator) {
        let Some(target) = self.cfg.target_total else {
            return;
        };
        if self.stats.is_over() || self.stats.total < target {
            return;
        }
        let error_rate = self.stats.error_rate();
        let outcome = LevelOutcome {
            won: error_rate <= self.cfg.max_error_rate,
            error_rate,
            success: self.stats.success,
            errors: self.stats.errors,
            total: self.stats.total,
        };
        self.end_run(outcome, sim);
    }

    /// 进入终态：取消全部待执行事件并让所有节点下线
    pub(crate) fn end_run(&mut self, outcome: LevelOutcome, sim: &mut Simulator) {
        info!(
            won = outcome.won,
            error_rate = outcome.error_rate,
            success = outcome.success,
            errors = outcome.errors,
            total = outcome.total,
            "🏁 关卡结束"
        );
        self.stats.outcome = Some(outcome);
        self.set_phase(RunPhase::GameOver, sim.now());
        self.topo.deactivate_all();
        sim.cancel_all();
        self.viz_push(sim.now(), None, VizEventKind::LevelEnded(outcome));
    }

    pub(crate) fn set_phase(&mut self, phase: RunPhase, now: SimTime) {
        if self.stats.phase == phase {
            return;
        }
        debug!(from = ?self.stats.phase, to = ?phase, "运行状态切换");
        self.stats.phase = phase;
        self.viz_push(now, None, VizEventKind::PhaseChanged { phase });
    }

    pub(crate) fn viz_push(&mut self, now: SimTime, pkt_id: Option<u64>, kind: VizEventKind) {
        if let Some(v) = &mut self.viz {
            v.push(VizEvent {
                t_ns: now.0,
                pkt_id,
                kind,
            });
        }
    }

    /// 记录拓扑元信息
    pub fn emit_viz_meta(&mut self, now: SimTime) {
        if self.viz.is_none() {
            return;
        }
        let nodes = self
            .topo
            .nodes()
            .map(|n| VizNodeInfo {
                id: n.id.0,
                key: n.key.clone(),
                node_kind: n.kind,
                replica: n.is_replica(),
                capacity: n.capacity(),
                delay_ns: n.delay().0,
            })
            .collect::<Vec<_>>();
        self.viz_push(now, None, VizEventKind::Meta { nodes });
    }
}
