//! 游戏层
//!
//! 流量波次与难度递增、经济系统，以及对外的命令接口 `SimulationDriver`。

mod driver;
mod economy;
mod traffic;

pub use driver::{NodeSnapshot, RunSnapshot, SimulationDriver};
pub use economy::Economy;
pub use traffic::{DifficultyStage, DifficultyTick, SpawnPacket, SpawnWave, Traffic};

use crate::sim::ConfigError;

/// 命令执行失败的原因
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown node {0}")]
    UnknownNode(String),
    #[error("{slug} cannot be purchased")]
    NotPurchasable { slug: String },
    #[error("not enough money for {slug}: need {cost}, have {money}")]
    InsufficientFunds { slug: String, cost: u64, money: u64 },
    #[error("{slug} limit reached ({limit})")]
    LimitReached { slug: String, limit: u32 },
    #[error("node {0} is already at max capacity")]
    MaxedOut(String),
    #[error("the run is over")]
    RunOver,
}
