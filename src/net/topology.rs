//! 拓扑注册表
//!
//! key -> 节点 的映射，外加按类型维护的索引，路由策略通过它发现对端
//! （"所有在线的 AppServer"、"主库" 等）。注册表只在关卡搭建和购买节点时被修改，
//! 路由过程只读。

use std::collections::HashMap;

use tracing::debug;

use super::id::NodeId;
use super::node::{DbRole, Node, NodeKind, NodeParams};
use crate::sim::ConfigError;

#[derive(Debug, Default)]
pub struct Topology {
    nodes: Vec<Node>,
    by_key: HashMap<String, NodeId>,
    by_kind: HashMap<NodeKind, Vec<NodeId>>,
}

impl Topology {
    /// 添加节点，key 按类型前缀自动编号（`App1`, `App2`, ...）
    pub fn add(&mut self, kind: NodeKind, params: NodeParams) -> NodeId {
        let prefix = kind.key_prefix(params.role);
        let mut n = 1usize;
        let key = loop {
            let candidate = format!("{prefix}{n}");
            if !self.by_key.contains_key(&candidate) {
                break candidate;
            }
            n += 1;
        };
        self.insert(key, kind, params)
    }

    /// 以指定 key 添加节点；key 已存在时报错
    pub fn add_keyed(
        &mut self,
        key: impl Into<String>,
        kind: NodeKind,
        params: NodeParams,
    ) -> Result<NodeId, ConfigError> {
        let key = key.into();
        if self.by_key.contains_key(&key) {
            return Err(ConfigError::DuplicateKey(key));
        }
        Ok(self.insert(key, kind, params))
    }

    fn insert(&mut self, key: String, kind: NodeKind, params: NodeParams) -> NodeId {
        let id = NodeId(self.nodes.len());
        debug!(key = %key, %kind, ?id, "注册节点");
        self.by_key.insert(key.clone(), id);
        self.by_kind.entry(kind).or_default().push(id);
        self.nodes.push(Node::new(id, key, kind, params));
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn id_of(&self, key: &str) -> Option<NodeId> {
        self.by_key.get(key).copied()
    }

    pub fn by_key(&self, key: &str) -> Option<&Node> {
        self.id_of(key).and_then(|id| self.get(id))
    }

    /// "可用" = 存在且在线
    pub fn available(&self, id: NodeId) -> Option<&Node> {
        self.get(id).filter(|n| n.is_active())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter()
    }

    /// 某类型的所有在线节点，按注册顺序
    pub fn active(&self, kind: NodeKind) -> impl Iterator<Item = &Node> + '_ {
        self.by_kind
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.available(*id))
    }

    pub fn active_ids(&self, kind: NodeKind) -> Vec<NodeId> {
        self.active(kind).map(|n| n.id).collect()
    }

    pub fn has_active(&self, kind: NodeKind) -> bool {
        self.active(kind).next().is_some()
    }

    pub fn first_active(&self, kind: NodeKind) -> Option<NodeId> {
        self.active(kind).next().map(|n| n.id)
    }

    /// 在线节点计数（数据库按角色区分）
    pub fn count(&self, kind: NodeKind, role: DbRole) -> usize {
        self.active(kind).filter(|n| n.role == role).count()
    }

    /// 指定角色的在线数据库
    pub fn databases(&self, role: DbRole) -> Vec<NodeId> {
        self.active(NodeKind::Database)
            .filter(|n| n.role == role)
            .map(|n| n.id)
            .collect()
    }

    pub fn has_replica(&self) -> bool {
        self.active(NodeKind::Database).any(|n| n.is_replica())
    }

    /// 负载率最低的在线节点；并列时取注册顺序最靠前者
    pub fn least_loaded(&self, kind: NodeKind) -> Option<NodeId> {
        let mut best: Option<(&Node, f64)> = None;
        for node in self.active(kind) {
            let ratio = node.load_ratio();
            match best {
                Some((_, r)) if ratio >= r => {}
                _ => best = Some((node, ratio)),
            }
        }
        best.map(|(n, _)| n.id)
    }

    /// 关卡结束：所有节点下线，不再接收或转发
    pub fn deactivate_all(&mut self) {
        for node in &mut self.nodes {
            node.deactivate();
        }
    }
}
