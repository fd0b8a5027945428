//! 网络世界实现
//!
//! 定义仿真的世界（World）实现：处理引擎 + 流量生成状态。

use super::network::Network;
use crate::game::Traffic;
use crate::sim::World;
use std::any::Any;

/// 默认的世界实现：持有 Network 与 Traffic。
///
/// 只测试路由引擎时 `traffic` 保持默认（不产生波次）。
#[derive(Debug, Default)]
pub struct NetWorld {
    pub net: Network,
    pub traffic: Traffic,
}

impl NetWorld {
    pub fn new(net: Network) -> Self {
        Self {
            net,
            traffic: Traffic::default(),
        }
    }
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
