//! 处理完成事件（节点的"忙碌期"结束）

use super::id::NodeId;
use super::net_world::NetWorld;
use super::packet::Packet;
use crate::sim::{Event, Simulator, World};

/// 事件：节点处理完一个 packet，释放槽位并执行路由。
#[derive(Debug)]
pub struct ProcessingDone {
    pub node: NodeId,
    pub pkt: Packet,
}

impl Event for ProcessingDone {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let ProcessingDone { node, pkt } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.on_processed(node, pkt, sim);
    }
}

/// 事件：消息队列完成一次排空等待，发出最早缓冲的写请求。
#[derive(Debug)]
pub struct QueueDrain {
    pub node: NodeId,
}

impl Event for QueueDrain {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let QueueDrain { node } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.on_queue_drain(node, sim);
    }
}
