//! 标识符类型
//!
//! 定义节点的唯一标识符。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 节点标识符：拓扑注册表中的下标，节点下线后不复用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
