//! # Hub Driver
//!
//! 试验聚合状态机与总线监听层。
//!
//! ## 核心组件
//!
//! - `tracker`: 单机器人增量状态（步数、访问格子、重访、消息计数）
//! - `aggregator`: 团队级状态、首个线索/目标锁存、完成保护
//! - `export`: 试验结束后推导汇总与输出记录
//! - `pipeline`: 监听循环（开始命令、接收、解码、聚合）
//! - `listener`: 后台线程管理与完成等待
//! - `metrics`: 监听线程原子计数器
//!
//! ## 并发模型
//!
//! 聚合器只存在于监听线程中；主线程通过完成信号得知试验结束，
//! 清除运行标志并 join 线程后才取得聚合器的所有权，无需锁。

pub mod aggregator;
mod error;
pub mod export;
pub mod hooks;
pub mod listener;
pub mod metrics;
pub mod pipeline;
pub mod tracker;

pub use aggregator::{ClueSighting, FirstClue, Ingest, TrialAggregator, TrialEnd};
pub use error::TrialError;
pub use export::{ExportContext, TargetReport, TrialSummary, build_records};
pub use hooks::{NoopCallback, TrialCallback};
pub use listener::{TrialListener, TrialOutcome};
pub use metrics::{ListenerMetrics, MetricsSnapshot};
pub use pipeline::{TrialConfig, listen_loop};
pub use tracker::{MessageCounts, PositionUpdate, RobotTracker};
