//! 路由策略
//!
//! 每种节点类型一条策略：给定当前节点、数据包（方向 + 读写类型）和拓扑，
//! 决定下一跳。策略本身不修改任何状态，只返回 [`Hop`] 决策；
//! 准入、计数、调度都由 `Network` 完成，因此策略可以单独测试。
//!
//! 随机选择（数据库、缓存、副本）均为均匀分布；消息队列与 AppServer
//! （经负载均衡器）按负载率最低者选择，并列时取注册顺序靠前者。

use rand::RngCore;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::id::NodeId;
use super::node::{DbRole, Node, NodeKind};
use super::packet::Packet;
use super::topology::Topology;

/// 丢包原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// 准入控制拒绝（容量已满）
    Rejected,
    /// 拓扑中没有可用的下一跳
    NoRoute,
    /// 目标节点不存在或已下线
    InactiveDestination,
    /// 客户端自我限流
    Throttled,
    /// 已被消息队列确认，结果不再上报
    AlreadyAcknowledged,
}

/// 路由决策
#[derive(Debug)]
pub enum Hop {
    /// 发往下一个节点
    Forward { to: NodeId, pkt: Packet },
    /// 响应已回到发起的 User：请求成功
    Complete(Packet),
    /// 无法继续
    Discard { pkt: Packet, reason: DropReason },
}

/// 一种节点类型的路由策略
pub trait RoutingPolicy: Sync {
    fn route(&self, at: &Node, pkt: Packet, topo: &Topology, rng: &mut dyn RngCore) -> Hop;
}

/// 按节点类型查找策略
pub fn policy_for(kind: NodeKind) -> &'static dyn RoutingPolicy {
    match kind {
        NodeKind::User => &UserPolicy,
        NodeKind::AppServer => &AppServerPolicy,
        NodeKind::Cache => &CachePolicy,
        NodeKind::Cdn => &CdnPolicy,
        NodeKind::LoadBalancer => &LoadBalancerPolicy,
        NodeKind::Database => &DatabasePolicy,
        NodeKind::Queue => &QueuePolicy,
    }
}

fn pick(ids: &[NodeId], rng: &mut dyn RngCore) -> Option<NodeId> {
    ids.choose(rng).copied()
}

fn forward_or_drop(to: Option<NodeId>, pkt: Packet) -> Hop {
    match to {
        Some(to) => Hop::Forward { to, pkt },
        None => Hop::Discard {
            pkt,
            reason: DropReason::NoRoute,
        },
    }
}

fn to_origin(pkt: Packet, topo: &Topology) -> Hop {
    match topo.available(pkt.origin) {
        Some(user) => Hop::Forward { to: user.id, pkt },
        None => Hop::Discard {
            pkt,
            reason: DropReason::InactiveDestination,
        },
    }
}

fn to_anchor(pkt: Packet, topo: &Topology) -> Hop {
    match pkt.app_node.and_then(|id| topo.available(id)) {
        Some(app) => Hop::Forward { to: app.id, pkt },
        None => Hop::Discard {
            pkt,
            reason: DropReason::InactiveDestination,
        },
    }
}

/// CDN / User 之后的下一层：负载均衡器，否则任意 AppServer
fn app_tier(topo: &Topology, rng: &mut dyn RngCore) -> Option<NodeId> {
    topo.first_active(NodeKind::LoadBalancer)
        .or_else(|| pick(&topo.active_ids(NodeKind::AppServer), rng))
}

/// User：发起请求按 CDN → 负载均衡器 → AppServer 的优先级选择入口；收到响应即完成。
#[derive(Debug)]
pub struct UserPolicy;

impl RoutingPolicy for UserPolicy {
    fn route(&self, _at: &Node, pkt: Packet, topo: &Topology, rng: &mut dyn RngCore) -> Hop {
        if pkt.is_response {
            return Hop::Complete(pkt);
        }
        let next = topo
            .first_active(NodeKind::Cdn)
            .or_else(|| app_tier(topo, rng));
        forward_or_drop(next, pkt)
    }
}

/// AppServer 决策表中的一行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRule {
    /// 响应：直接回到发起的 User
    ReturnToOrigin,
    /// 没有任何数据库：进程内处理，直接转为响应
    Monolith,
    /// 缓存未命中：优先只读副本，否则任意数据库
    EscalateMiss,
    /// 写请求且有消息队列：发往最空闲的队列
    QueueWrite,
    /// 写请求且无队列：发往主库
    PrimaryWrite,
    /// 读请求且有缓存
    CachedRead,
    /// 读请求、无缓存、有只读副本
    ReplicaRead,
    /// 读请求、无缓存、无副本
    DatabaseRead,
}

/// AppServer 决策表：按行顺序匹配，第一条命中的规则生效。
pub fn app_rule(pkt: &Packet, topo: &Topology) -> AppRule {
    let backend = topo.has_active(NodeKind::Database);
    match (pkt.is_response, backend, pkt.cache_missed, pkt.is_write()) {
        (true, _, _, _) => AppRule::ReturnToOrigin,
        (false, false, _, _) => AppRule::Monolith,
        (false, true, true, _) => AppRule::EscalateMiss,
        (false, true, false, true) if topo.has_active(NodeKind::Queue) => AppRule::QueueWrite,
        (false, true, false, true) => AppRule::PrimaryWrite,
        (false, true, false, false) if topo.has_active(NodeKind::Cache) => AppRule::CachedRead,
        (false, true, false, false) if topo.has_replica() => AppRule::ReplicaRead,
        (false, true, false, false) => AppRule::DatabaseRead,
    }
}

#[derive(Debug)]
pub struct AppServerPolicy;

impl RoutingPolicy for AppServerPolicy {
    fn route(&self, at: &Node, mut pkt: Packet, topo: &Topology, rng: &mut dyn RngCore) -> Hop {
        let rule = app_rule(&pkt, topo);
        let target = match rule {
            AppRule::ReturnToOrigin => return to_origin(pkt, topo),
            AppRule::Monolith => return to_origin(pkt.into_response(), topo),
            AppRule::EscalateMiss => {
                pkt.cache_missed = false;
                let replicas = topo.databases(DbRole::Replica);
                if replicas.is_empty() {
                    pick(&topo.active_ids(NodeKind::Database), rng)
                } else {
                    pick(&replicas, rng)
                }
            }
            AppRule::QueueWrite => topo.least_loaded(NodeKind::Queue),
            // 写入只进主库，副本永远不接收写
            AppRule::PrimaryWrite => pick(&topo.databases(DbRole::Primary), rng),
            AppRule::CachedRead => pick(&topo.active_ids(NodeKind::Cache), rng),
            AppRule::ReplicaRead => pick(&topo.databases(DbRole::Replica), rng),
            AppRule::DatabaseRead => pick(&topo.active_ids(NodeKind::Database), rng),
        };
        forward_or_drop(target, pkt.anchored_at(at.id))
    }
}

/// Cache：按命中率做一次伯努利试验；命中则转为响应，未命中则打标记。
/// 两种情况都回到记录的 AppServer，缓存从不直接访问数据库。
#[derive(Debug)]
pub struct CachePolicy;

impl RoutingPolicy for CachePolicy {
    fn route(&self, at: &Node, mut pkt: Packet, topo: &Topology, rng: &mut dyn RngCore) -> Hop {
        if !pkt.is_response {
            if rng.gen_bool(at.hit_rate()) {
                pkt.is_response = true;
                pkt.cache_hit = true;
            } else {
                pkt.cache_missed = true;
            }
        }
        to_anchor(pkt, topo)
    }
}

/// CDN：写请求直接穿过；读请求命中则直接回到 User，未命中交给下一层。
#[derive(Debug)]
pub struct CdnPolicy;

impl RoutingPolicy for CdnPolicy {
    fn route(&self, at: &Node, mut pkt: Packet, topo: &Topology, rng: &mut dyn RngCore) -> Hop {
        if pkt.is_response {
            return to_origin(pkt, topo);
        }
        if !pkt.is_write() && rng.gen_bool(at.hit_rate()) {
            pkt.cdn_hit = true;
            return to_origin(pkt.into_response(), topo);
        }
        forward_or_drop(app_tier(topo, rng), pkt)
    }
}

/// LoadBalancer：请求发往负载率最低的 AppServer。
#[derive(Debug)]
pub struct LoadBalancerPolicy;

impl RoutingPolicy for LoadBalancerPolicy {
    fn route(&self, _at: &Node, pkt: Packet, topo: &Topology, _rng: &mut dyn RngCore) -> Hop {
        if pkt.is_response {
            return to_origin(pkt, topo);
        }
        forward_or_drop(topo.least_loaded(NodeKind::AppServer), pkt)
    }
}

/// Database：无论读写都转为响应，经记录的 AppServer 返回。
/// 写入计数由 `Network` 在处理完成时记录。
#[derive(Debug)]
pub struct DatabasePolicy;

impl RoutingPolicy for DatabasePolicy {
    fn route(&self, _at: &Node, pkt: Packet, topo: &Topology, _rng: &mut dyn RngCore) -> Hop {
        if pkt.acked {
            return Hop::Discard {
                pkt,
                reason: DropReason::AlreadyAcknowledged,
            };
        }
        to_anchor(pkt.into_response(), topo)
    }
}

/// Queue：缓冲的写请求出队后作为普通写发往主库。
/// 入队与确认由 `Network::enqueue_write` 处理，这里只负责出队后的去向。
#[derive(Debug)]
pub struct QueuePolicy;

impl RoutingPolicy for QueuePolicy {
    fn route(&self, _at: &Node, mut pkt: Packet, topo: &Topology, rng: &mut dyn RngCore) -> Hop {
        pkt.acked = true;
        pkt.app_node = None;
        forward_or_drop(pick(&topo.databases(DbRole::Primary), rng), pkt)
    }
}
