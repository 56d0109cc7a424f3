//! 驱动层错误类型定义

use hub_bus::BusError;
use thiserror::Error;

/// 试验错误类型
#[derive(Error, Debug)]
pub enum TrialError {
    /// 总线错误（连接失败、发布失败）
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// 试验未结束（没有收到目标事件），没有可导出的数据
    #[error("Trial not completed: no target event was observed")]
    NotCompleted,

    /// 监听线程 panic
    #[error("Listener thread panicked")]
    ListenerPanicked,

    /// 无法创建监听线程
    #[error("Failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    /// 无效输入（如空的机器人列表）
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
