use serde::{Deserialize, Serialize};

use crate::net::{DropReason, LevelOutcome, NodeKind, RunPhase};

/// 可视化事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VizEventKind {
    /// 拓扑元信息（关卡开始时的第一条事件）
    Meta { nodes: Vec<VizNodeInfo> },
    /// User 发起一个新请求
    Spawn { user: usize, write: bool },
    /// 节点把包发往下一跳（传输开始）
    Forward { from: usize, to: usize },
    /// 准入成功，开始处理
    Admit { node: usize, load: u32, capacity: u32 },
    /// 准入失败（背压）
    Reject { node: usize, load: u32, capacity: u32 },
    /// 写请求进入消息队列缓冲
    Enqueue { node: usize, depth: usize, capacity: u32 },
    /// 消息队列立即向 User 返回确认
    Ack { node: usize, origin: usize },
    /// 数据库写入落盘
    Write { node: usize, writes_stored: u64, delay_ns: u64 },
    /// 响应回到 User：请求成功
    Delivered { node: usize },
    /// 包被丢弃；`counted` 表示是否计入错误
    Dropped {
        node: Option<usize>,
        reason: DropReason,
        counted: bool,
    },
    NodeAdded {
        node: usize,
        key: String,
        node_kind: NodeKind,
    },
    NodeUpgraded {
        node: usize,
        level: u32,
        capacity: u32,
        delay_ns: u64,
    },
    DifficultyChanged {
        level: u32,
        traffic_delay_ns: u64,
        packets_per_wave: u32,
        message: Option<String>,
    },
    PhaseChanged { phase: RunPhase },
    LevelEnded(LevelOutcome),
}

/// 节点信息（用于 meta 事件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizNodeInfo {
    pub id: usize,
    pub key: String,
    pub node_kind: NodeKind,
    pub replica: bool,
    pub capacity: u32,
    pub delay_ns: u64,
}

/// 一条可视化事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizEvent {
    pub t_ns: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkt_id: Option<u64>,
    #[serde(flatten)]
    pub kind: VizEventKind,
}

/// 事件收集器
#[derive(Debug, Default)]
pub struct VizLogger {
    pub events: Vec<VizEvent>,
}

impl VizLogger {
    pub fn push(&mut self, ev: VizEvent) {
        self.events.push(ev);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
