//! # Hub Bus Adapter Layer
//!
//! 消息总线抽象层，提供统一的发布/接收接口。
//!
//! - `mqtt`（默认 feature）：基于 `rumqttc` 同步客户端的 MQTT 后端
//! - `mock`：内存总线，用于测试（无 broker 依赖）

use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBus, MqttConfig};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBus, MockBusHandle};

/// 总线消息
///
/// 载荷按 UTF-8 有损解码（无效字节替换为 U+FFFD），与坐标解析的容错策略一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn from_bytes(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

/// 总线适配层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Receive timeout")]
    Timeout,
    #[error("Bus closed")]
    Closed,
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Publish failed: {0}")]
    Publish(String),
}

impl BusError {
    /// 致命错误：连接失败或无法发布，整个试验中止（不重试）
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Publish(_))
    }
}

pub trait BusAdapter: Send {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError>;
    fn receive_timeout(&mut self, timeout: Duration) -> Result<BusMessage, BusError>;
    fn try_receive(&mut self) -> Result<Option<BusMessage>, BusError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(msg) => Ok(Some(msg)),
            Err(BusError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<B: BusAdapter + ?Sized> BusAdapter for Box<B> {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError> {
        (**self).publish(topic, payload)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<BusMessage, BusError> {
        (**self).receive_timeout(timeout)
    }
}
