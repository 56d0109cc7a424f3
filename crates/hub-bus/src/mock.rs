//! 内存 Mock 总线
//!
//! 测试侧持有 [`MockBusHandle`]，可以在任意线程注入入站消息、
//! 关闭总线、模拟连接故障，并检查被发布的消息。

use crate::{BusAdapter, BusError, BusMessage};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock 总线（交给监听线程）
pub struct MockBus {
    inbound: Receiver<Result<BusMessage, BusError>>,
    published: Arc<Mutex<Vec<BusMessage>>>,
    fail_publish: bool,
}

/// Mock 总线控制句柄（测试侧）
#[derive(Clone)]
pub struct MockBusHandle {
    inbound: Sender<Result<BusMessage, BusError>>,
    published: Arc<Mutex<Vec<BusMessage>>>,
}

impl MockBus {
    #[must_use]
    pub fn new() -> (Self, MockBusHandle) {
        let (tx, rx) = unbounded();
        let published = Arc::new(Mutex::new(Vec::new()));

        let bus = Self {
            inbound: rx,
            published: published.clone(),
            fail_publish: false,
        };
        let handle = MockBusHandle {
            inbound: tx,
            published,
        };

        (bus, handle)
    }

    /// 所有 `publish` 调用都返回 `BusError::Publish`
    #[must_use]
    pub fn with_failing_publish(mut self) -> Self {
        self.fail_publish = true;
        self
    }
}

impl BusAdapter for MockBus {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError> {
        if self.fail_publish {
            return Err(BusError::Publish("mock publish failure".to_string()));
        }
        if let Ok(mut published) = self.published.lock() {
            published.push(BusMessage::new(topic, payload));
        }
        Ok(())
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<BusMessage, BusError> {
        match self.inbound.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(BusError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Closed),
        }
    }
}

impl MockBusHandle {
    /// 注入一条入站消息
    pub fn inject(&self, topic: &str, payload: &str) {
        let _ = self.inbound.send(Ok(BusMessage::new(topic, payload)));
    }

    /// 注入一个总线错误（例如 `BusError::Connection`）
    pub fn inject_error(&self, error: BusError) {
        let _ = self.inbound.send(Err(error));
    }

    /// 关闭总线：已注入的消息被读完后，接收端返回 `BusError::Closed`
    pub fn close(self) {
        drop(self);
    }

    /// 已发布消息的快照
    pub fn published(&self) -> Vec<BusMessage> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }
}
