//! # Hub Tools - 共享数据结构与文件输出
//!
//! **依赖原则**: 只依赖 `hub-protocol`，避免依赖 `hub-driver`
//!
//! ## 包含模块
//!
//! - `records` - 试验记录行定义与 CSV 追加写入
//! - `config` - 持久化配置（TOML）

pub mod config;
pub mod records;

// 重新导出常用类型
pub use config::{BrokerSettings, HubConfig, OutputSettings, TrialSettings};
pub use records::{
    LocationKind, LocationRecord, RobotRecord, SystemRecord, TrialFiles, TrialRecords,
    append_records, write_trial,
};
