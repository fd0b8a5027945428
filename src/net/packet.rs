//! 数据包类型
//!
//! 一个数据包代表一次请求或它的响应，在节点之间逐跳流动。

use super::id::NodeId;
use crate::sim::SimTime;

/// 请求/响应数据包
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    /// 创建该请求的 User 节点（响应最终回到这里，错误也记在它名下）
    pub origin: NodeId,
    write: bool,
    pub is_response: bool,
    /// 把请求转发给后端的 AppServer，后端响应经它返回
    pub app_node: Option<NodeId>,
    /// Cache 未命中：AppServer 据此升级到数据库
    pub cache_missed: bool,
    pub cache_hit: bool,
    pub cdn_hit: bool,
    /// 已由消息队列提前确认；后续结果不再计入统计
    pub acked: bool,
    pub hops: u32,
    pub born_at: SimTime,
}

impl Packet {
    pub fn new(id: u64, origin: NodeId, write: bool, born_at: SimTime) -> Self {
        Self {
            id,
            origin,
            write,
            is_response: false,
            app_node: None,
            cache_missed: false,
            cache_hit: false,
            cdn_hit: false,
            acked: false,
            hops: 0,
            born_at,
        }
    }

    /// 读/写类型在创建时确定，之后不可修改
    pub fn is_write(&self) -> bool {
        self.write
    }

    /// 转为响应方向
    pub fn into_response(mut self) -> Self {
        self.is_response = true;
        self
    }

    /// 记录返回锚点（转发给后端的 AppServer）
    pub fn anchored_at(mut self, app: NodeId) -> Self {
        self.app_node = Some(app);
        self
    }

    /// 为队列生成一份确认响应：同源、同读写类型、新 id
    pub fn ack_for(&self, id: u64) -> Packet {
        Packet::new(id, self.origin, self.write, self.born_at).into_response()
    }
}
