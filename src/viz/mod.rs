//! 可视化事件记录（供 UI/离线回放消费）
//!
//! 设计目标：
//! - **结构化**：用 JSON 事件而不是解析文本日志
//! - **轻量**：不引入复杂依赖/运行时服务
//! - **完整**：节点升级/新增、难度变化、请求送达/丢弃、关卡结束都有对应事件

mod types;

pub use types::{VizEvent, VizEventKind, VizLogger, VizNodeInfo};
