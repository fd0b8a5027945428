//! 拓扑构建
//!
//! 根据关卡配置搭建初始拓扑。

pub mod level;

pub use level::build_level;
