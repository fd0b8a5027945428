//! 世界 trait
//!
//! 事件通过它访问游戏状态（拓扑、统计、流量参数）。

use super::simulator::Simulator;
use std::any::Any;

/// 仿真世界：事件执行时向下转型为具体类型（见 `net::NetWorld`）。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// 每执行完一个事件调用一次
    fn on_tick(&mut self, _sim: &mut Simulator) {}
}
