//! 路由与处理引擎模块
//!
//! 此模块包含仿真的核心：节点、数据包、拓扑注册表、每类节点的路由策略，
//! 以及负责准入控制和记账的 Network。

// 子模块声明
mod deliver_packet;
mod id;
mod net_world;
mod network;
mod node;
mod packet;
mod processing;
mod routing;
mod stats;
mod topology;

// 重新导出公共接口
pub use deliver_packet::DeliverPacket;
pub use id::NodeId;
pub use net_world::NetWorld;
pub use network::{NetConfig, Network};
pub use node::{DbRole, Node, NodeKind, NodeParams};
pub use packet::Packet;
pub use processing::{ProcessingDone, QueueDrain};
pub use routing::{
    AppRule, AppServerPolicy, CachePolicy, CdnPolicy, DatabasePolicy, DropReason, Hop,
    LoadBalancerPolicy, QueuePolicy, RoutingPolicy, UserPolicy, app_rule, policy_for,
};
pub use stats::{LevelOutcome, RunPhase, RunStats};
pub use topology::Topology;
