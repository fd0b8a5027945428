//! 统计信息
//!
//! 定义一次关卡运行的全局计数器。每次关卡开始时整体重置，不跨关卡泄漏。

use serde::{Deserialize, Serialize};

/// 运行状态机：Stopped → Running ⇄ Paused → GameOver（终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Stopped,
    Running,
    Paused,
    GameOver,
}

/// 关卡结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelOutcome {
    pub won: bool,
    pub error_rate: f64,
    pub success: u64,
    pub errors: u64,
    pub total: u64,
}

/// 全局运行统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    pub money: u64,
    /// 所有数据库累计写入数（展示用）
    pub storage: u64,
    pub difficulty: u32,
    pub phase: RunPhase,
    /// 客户端限流丢弃，不计入 total
    pub throttled: u64,
    /// 未计入错误的丢包（目标消失等，取决于关卡配置）
    pub uncounted_drops: u64,
    /// 已确认但最终未落库的写入
    pub lost_writes: u64,
    pub outcome: Option<LevelOutcome>,
}

impl RunStats {
    pub fn is_over(&self) -> bool {
        self.phase == RunPhase::GameOver
    }

    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.errors as f64 / self.total as f64
    }
}
