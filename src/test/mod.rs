mod level_spec;
mod node;
mod sim_time;
mod simulator;
mod traffic;

use crate::net::{NetConfig, NetWorld, Network, NodeKind, NodeParams};
use crate::sim::SimTime;

/// 固定参数：容量与时延（毫秒）
fn params(kind: NodeKind, capacity: u32, delay_ms: u64) -> NodeParams {
    NodeParams {
        capacity,
        delay: SimTime::from_millis(delay_ms),
        ..NodeParams::defaults(kind)
    }
}

/// 零传输时延、不自动结束的世界，带事件记录
fn bare_world(seed: u64) -> NetWorld {
    let cfg = NetConfig {
        transit: SimTime::ZERO,
        target_total: None,
        ..NetConfig::default()
    };
    let mut net = Network::new(cfg, seed);
    net.viz = Some(crate::viz::VizLogger::default());
    NetWorld::new(net)
}
