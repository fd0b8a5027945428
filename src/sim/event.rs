//! 事件 trait
//!
//! 定义仿真事件接口。

use super::simulator::Simulator;
use super::world::World;

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
///
/// 事件触发时世界状态可能已经变化（关卡结束、节点下线），
/// 因此 `execute` 在修改状态前必须自行确认运行仍然有效。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);

    /// 事件名称，仅用于日志
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
