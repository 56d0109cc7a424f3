//! 监听线程回调
//!
//! 上层（如 CLI）通过 [`TrialCallback`] 在监听线程中获得实时事件，
//! 用于打印 `[CLUE]` / `[RUN]` 进度行。回调不能修改试验状态。

use crate::aggregator::Ingest;
use hub_protocol::RobotEvent;

/// 试验事件回调
///
/// 在监听线程中同步调用，实现应尽快返回（打印一行、`try_send` 到通道等），
/// 否则会拖慢消息接收。
pub trait TrialCallback: Send + Sync {
    /// 开始命令已发布（t = 0）
    fn on_started(&self, topic: &str, payload: &str) {
        let _ = (topic, payload);
    }

    /// 一条机器人事件已交给聚合器
    ///
    /// `outcome` 为聚合器的处理结果，试验结束后的事件为 `Ignored` / `TargetIgnored`。
    fn on_event(&self, event: &RobotEvent, t_rel: f64, outcome: Ingest) {
        let _ = (event, t_rel, outcome);
    }
}

/// 空回调
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallback;

impl TrialCallback for NoopCallback {}
