//! 节点类型
//!
//! 定义基础设施节点：类型标签、参数、容量准入与升级模型。
//! 路由逻辑不在这里，见 `routing` 模块。

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::id::NodeId;
use super::packet::Packet;
use crate::queue::{DropTailQueue, PacketQueue};
use crate::sim::SimTime;

/// 升级时容量乘以 12/5（即 ×2.4 向下取整）
const UPGRADE_CAPACITY_NUM: u64 = 12;
const UPGRADE_CAPACITY_DEN: u64 = 5;

/// 节点类型（封闭集合，决定使用哪条路由策略）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    User,
    AppServer,
    Cache,
    Cdn,
    LoadBalancer,
    Database,
    Queue,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::User,
        NodeKind::AppServer,
        NodeKind::Cache,
        NodeKind::Cdn,
        NodeKind::LoadBalancer,
        NodeKind::Database,
        NodeKind::Queue,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::AppServer => "app_server",
            Self::Cache => "cache",
            Self::Cdn => "cdn",
            Self::LoadBalancer => "load_balancer",
            Self::Database => "database",
            Self::Queue => "queue",
        }
    }

    /// 注册表 key 前缀，如 `App1`、`Database1`、`ReadReplica1`
    pub fn key_prefix(self, role: DbRole) -> &'static str {
        match (self, role) {
            (Self::User, _) => "User",
            (Self::AppServer, _) => "App",
            (Self::Cache, _) => "Cache",
            (Self::Cdn, _) => "CDN",
            (Self::LoadBalancer, _) => "LoadBalancer",
            (Self::Database, DbRole::Primary) => "Database",
            (Self::Database, DbRole::Replica) => "ReadReplica",
            (Self::Queue, _) => "Queue",
        }
    }

    /// 经济系统中的购买项名称
    pub fn purchase_slug(self, role: DbRole) -> &'static str {
        match (self, role) {
            (Self::Database, DbRole::Replica) => "read_replica",
            _ => self.slug(),
        }
    }

    /// 解析购买项名称，容忍大小写与 `-`/`_` 差异。
    pub fn parse_purchase(raw: &str) -> Result<(Self, DbRole), String> {
        let compact: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .collect();
        match compact.as_str() {
            "user" => Ok((Self::User, DbRole::Primary)),
            "app" | "appserver" => Ok((Self::AppServer, DbRole::Primary)),
            "cache" => Ok((Self::Cache, DbRole::Primary)),
            "cdn" => Ok((Self::Cdn, DbRole::Primary)),
            "lb" | "loadbalancer" => Ok((Self::LoadBalancer, DbRole::Primary)),
            "db" | "database" => Ok((Self::Database, DbRole::Primary)),
            "replica" | "readreplica" => Ok((Self::Database, DbRole::Replica)),
            "queue" | "mq" | "messagequeue" => Ok((Self::Queue, DbRole::Primary)),
            _ => Err(format!("unknown node kind: {raw}")),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// 数据库角色：只读副本只是另一个 Database 节点，写入隔离由 AppServer 路由保证。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbRole {
    #[default]
    Primary,
    Replica,
}

/// 创建节点所需的参数（已合并配置层）
#[derive(Debug, Clone, PartialEq)]
pub struct NodeParams {
    pub capacity: u32,
    pub delay: SimTime,
    pub min_delay: SimTime,
    pub max_capacity: Option<u32>,
    pub hit_rate: f64,
    pub max_inflight: Option<u32>,
    pub role: DbRole,
}

impl NodeParams {
    /// 内置的每类型默认值，关卡配置在其上覆盖
    pub fn defaults(kind: NodeKind) -> Self {
        let (capacity, delay_ms, hit_rate) = match kind {
            NodeKind::User => (u32::MAX, 0, 0.0),
            NodeKind::AppServer => (3, 300, 0.0),
            NodeKind::Cache => (10, 50, 0.7),
            NodeKind::Cdn => (20, 30, 0.8),
            NodeKind::LoadBalancer => (20, 20, 0.0),
            NodeKind::Database => (5, 400, 0.0),
            NodeKind::Queue => (20, 100, 0.0),
        };
        Self {
            capacity,
            delay: SimTime::from_millis(delay_ms),
            min_delay: SimTime::from_millis(10),
            max_capacity: None,
            hit_rate,
            max_inflight: None,
            role: DbRole::Primary,
        }
    }
}

/// 基础设施节点
#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub key: String,
    pub name: String,
    pub kind: NodeKind,
    pub role: DbRole,
    capacity: u32,
    max_capacity: Option<u32>,
    base_delay: SimTime,
    delay: SimTime,
    min_delay: SimTime,
    current_load: u32,
    level: u32,
    active: bool,
    hit_rate: f64,
    max_inflight: Option<u32>,
    writes_stored: u64,
    pub processed: u64,
    pub rejected: u64,
    pub local_successes: u64,
    pub local_errors: u64,
    /// 消息队列的待写缓冲（其它类型为空）
    backlog: DropTailQueue,
    pub(crate) draining: bool,
}

impl Node {
    pub fn new(id: NodeId, key: impl Into<String>, kind: NodeKind, params: NodeParams) -> Self {
        let key = key.into();
        let name = key.clone();
        Self {
            id,
            key,
            name,
            kind,
            role: params.role,
            capacity: params.capacity,
            max_capacity: params.max_capacity,
            base_delay: params.delay,
            delay: params.delay,
            min_delay: params.min_delay,
            current_load: 0,
            level: 1,
            active: true,
            hit_rate: params.hit_rate,
            max_inflight: params.max_inflight,
            writes_stored: 0,
            processed: 0,
            rejected: 0,
            local_successes: 0,
            local_errors: 0,
            backlog: DropTailQueue::new(u64::from(params.capacity)),
            draining: false,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn max_capacity(&self) -> Option<u32> {
        self.max_capacity
    }

    /// 当前生效的处理时延（数据库会随存储量增长而变慢）
    pub fn delay(&self) -> SimTime {
        self.delay
    }

    pub fn base_delay(&self) -> SimTime {
        self.base_delay
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn hit_rate(&self) -> f64 {
        self.hit_rate
    }

    pub fn writes_stored(&self) -> u64 {
        self.writes_stored
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_replica(&self) -> bool {
        self.kind == NodeKind::Database && self.role == DbRole::Replica
    }

    /// 当前负载：消息队列为缓冲占用，其余为并发处理数
    pub fn load(&self) -> u32 {
        match self.kind {
            NodeKind::Queue => u32::try_from(self.backlog.len()).unwrap_or(u32::MAX),
            _ => self.current_load,
        }
    }

    /// 负载率 load / capacity，用于最少负载选择
    pub fn load_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return f64::INFINITY;
        }
        f64::from(self.load()) / f64::from(self.capacity)
    }

    /// 准入控制：满载时拒绝且不改变负载
    pub fn try_admit(&mut self) -> bool {
        if self.current_load >= self.capacity {
            self.rejected += 1;
            return false;
        }
        self.current_load += 1;
        true
    }

    /// 处理完成，释放一个并发槽位
    pub fn finish(&mut self) {
        self.current_load = self.current_load.saturating_sub(1);
        self.processed += 1;
    }

    /// User 发起请求：受客户端并发上限约束
    pub fn begin_request(&mut self) -> bool {
        if let Some(cap) = self.max_inflight {
            if self.current_load >= cap {
                return false;
            }
        }
        self.current_load = self.current_load.saturating_add(1);
        true
    }

    /// User 的一次请求得到结果（成功或失败）
    pub fn end_request(&mut self) {
        self.current_load = self.current_load.saturating_sub(1);
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// 升级：容量 ×2.4（向下取整，受上限约束），时延减半（不低于下限）。
    ///
    /// 已达容量上限时返回 false 且不改变任何状态。
    #[tracing::instrument(skip(self), fields(key = %self.key, level = self.level))]
    pub fn upgrade(&mut self) -> bool {
        if self.kind == NodeKind::User {
            return false;
        }
        let grown = u64::from(self.capacity) * UPGRADE_CAPACITY_NUM / UPGRADE_CAPACITY_DEN;
        let grown = u32::try_from(grown).unwrap_or(u32::MAX);
        let next = match self.max_capacity {
            Some(max) if self.capacity >= max => {
                debug!(max, "已达容量上限，拒绝升级");
                return false;
            }
            Some(max) => grown.min(max),
            None => grown,
        };

        self.level += 1;
        self.capacity = next;
        self.base_delay = self.min_delay.max(SimTime(self.base_delay.0 / 2));
        self.recompute_delay();
        self.backlog.set_capacity(u64::from(next));
        info!(
            level = self.level,
            capacity = self.capacity,
            delay = ?self.delay,
            "⬆️  节点升级"
        );
        true
    }

    /// 数据库记录一次写入并按存储量重新计算时延
    pub fn record_write(&mut self) {
        self.writes_stored += 1;
        self.recompute_delay();
    }

    fn recompute_delay(&mut self) {
        self.delay = match self.kind {
            // floor(base * (1 + writes / 100))
            NodeKind::Database => {
                let scaled = u128::from(self.base_delay.0) * (100 + u128::from(self.writes_stored)) / 100;
                SimTime(u64::try_from(scaled).unwrap_or(u64::MAX))
            }
            _ => self.base_delay,
        };
    }

    /// 消息队列入缓冲；满时原样退回
    pub(crate) fn enqueue(&mut self, pkt: Packet) -> Result<(), Packet> {
        self.backlog.enqueue(pkt)
    }

    pub(crate) fn dequeue(&mut self) -> Option<Packet> {
        self.backlog.dequeue()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}
