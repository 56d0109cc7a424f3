//! 监听线程指标
//!
//! 原子计数器，监听线程写入，主线程随时读取快照，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 监听线程实时指标
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    /// 收到的总消息数（包括命令主题、未知主题）
    pub received: AtomicU64,

    /// 非机器人主题的消息数（静默忽略）
    pub ignored_topics: AtomicU64,

    /// 坐标载荷无法解析的消息数（仍计入消息计数）
    pub unparseable: AtomicU64,

    /// 试验结束后排空阶段丢弃的消息数
    pub drained: AtomicU64,

    /// 接收超时次数（正常现象，无数据时会超时）
    pub receive_timeouts: AtomicU64,
}

impl ListenerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用 `Ordering::Relaxed` 读取，各计数器之间可能有微小时间差
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            ignored_topics: self.ignored_topics.load(Ordering::Relaxed),
            unparseable: self.unparseable.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            receive_timeouts: self.receive_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（普通值）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub ignored_topics: u64,
    pub unparseable: u64,
    pub drained: u64,
    pub receive_timeouts: u64,
}

impl MetricsSnapshot {
    /// 被试验状态机接受的消息数
    pub fn accepted(&self) -> u64 {
        self.received
            .saturating_sub(self.ignored_topics)
            .saturating_sub(self.drained)
    }
}
