//! 单请求追踪模式
//!
//! 只让一个 User 发出一个请求，打印它经过的每一跳和最终结果

use clap::Parser;
use sysdesign_sim::net::{NetWorld, NodeId, NodeKind};
use sysdesign_sim::sim::{CampaignSpec, Event, Simulator, SimTime, World};
use sysdesign_sim::topo::build_level;
use sysdesign_sim::viz::VizEventKind;
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "trace-single-packet", about = "单请求追踪模式：只发送一个请求，打印详细的执行流程")]
struct Args {
    /// 关卡编号（从 1 开始，取内置战役）
    #[arg(long, default_value_t = 1)]
    level: usize,
    /// 发送写请求（默认读）
    #[arg(long)]
    write: bool,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

/// 单请求追踪事件：由第一个 User 发起一个请求
#[derive(Debug)]
struct TraceSingleRequest {
    user: NodeId,
    write: bool,
}

impl Event for TraceSingleRequest {
    #[tracing::instrument(skip(self, sim, world), fields(user = ?self.user, write = self.write))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let TraceSingleRequest { user, write } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");

        info!("📦 创建并发送单个请求");
        match w.net.send_request(user, write, sim) {
            Some(pkt_id) => debug!(pkt_id, "请求已从 User 发出"),
            None => warn!("User 无法发起请求"),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let campaign = CampaignSpec::builtin().expect("built-in campaign must be valid");
    let level = campaign.level(args.level).expect("level must exist");
    let mut world = build_level(level, args.seed, true).expect("level must build");
    let mut sim = Simulator::default();

    info!(
        level = args.level,
        nodes = world.net.topo.len(),
        "单请求追踪模式启动"
    );

    let Some(user) = world.net.topo.first_active(NodeKind::User) else {
        eprintln!("level {} has no user node", args.level);
        std::process::exit(2);
    };
    sim.schedule(SimTime::ZERO, TraceSingleRequest { user, write: args.write });

    info!("开始运行仿真直到所有事件完成");
    sim.run(&mut world);

    let events = world.net.viz.as_ref().map(|v| v.events.as_slice()).unwrap_or_default();
    for ev in events.iter().filter(|ev| ev.pkt_id.is_some()) {
        let key_of = |id: usize| {
            world
                .net
                .topo
                .get(NodeId(id))
                .map_or_else(|| format!("#{id}"), |n| n.key.clone())
        };
        let line = match &ev.kind {
            VizEventKind::Forward { from, to } => format!("forward {} -> {}", key_of(*from), key_of(*to)),
            VizEventKind::Admit { node, load, capacity } => {
                format!("admit   {} ({load}/{capacity})", key_of(*node))
            }
            VizEventKind::Reject { node, load, capacity } => {
                format!("reject  {} ({load}/{capacity})", key_of(*node))
            }
            VizEventKind::Enqueue { node, depth, .. } => format!("enqueue {} depth={depth}", key_of(*node)),
            VizEventKind::Ack { node, .. } => format!("ack     {}", key_of(*node)),
            VizEventKind::Write { node, writes_stored, .. } => {
                format!("write   {} stored={writes_stored}", key_of(*node))
            }
            VizEventKind::Delivered { node } => format!("done    {}", key_of(*node)),
            VizEventKind::Dropped { node, reason, counted } => format!(
                "drop    {} {reason:?} counted={counted}",
                node.map_or_else(|| "-".to_string(), key_of)
            ),
            other => format!("{other:?}"),
        };
        println!("t={:>10}ns pkt={:?} {line}", ev.t_ns, ev.pkt_id);
    }

    let stats = &world.net.stats;
    println!(
        "done @ {:?}, success={}, errors={}, total={}",
        sim.now(),
        stats.success,
        stats.errors,
        stats.total
    );
}
