//! MQTT 后端
//!
//! 基于 `rumqttc` 同步客户端：
//!
//! ```text
//! broker ──► Connection::iter()（pump 线程）──► bounded channel ──► receive_timeout()
//! publish() ──► Client（请求队列）──► broker
//! ```
//!
//! 连接被拒绝或任何连接错误只上报一次 `BusError::Connection`，pump 线程随即退出，
//! 不做重连（试验失败即整体重跑）。

use crate::{BusAdapter, BusError, BusMessage};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use hub_protocol::SUBSCRIBE_ALL;
use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, QoS};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// pump 线程到接收端的缓冲容量
const INBOUND_CAPACITY: usize = 10_000;

/// MQTT 连接配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// 客户端 ID（同一 broker 上需唯一）
    pub client_id: String,
    pub keep_alive: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.10".to_string(),
            port: 1883,
            client_id: format!("hub-tap-{}", std::process::id()),
            keep_alive: Duration::from_secs(10),
        }
    }
}

/// MQTT 总线
pub struct MqttBus {
    client: Client,
    inbound: Receiver<Result<BusMessage, BusError>>,
}

impl MqttBus {
    /// 连接到 broker 并订阅全部主题
    ///
    /// 订阅请求在连接建立前进入客户端队列，连接成功后由事件循环发出。
    pub fn connect(config: &MqttConfig) -> Result<Self, BusError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);

        let (client, connection) = Client::new(options, 64);
        client
            .subscribe(SUBSCRIBE_ALL, QoS::AtMostOnce)
            .map_err(|e| BusError::Connection(e.to_string()))?;

        let (tx, inbound) = bounded(INBOUND_CAPACITY);
        thread::Builder::new()
            .name("hub-mqtt-pump".to_string())
            .spawn(move || pump_loop(connection, tx))
            .map_err(|e| BusError::Connection(format!("failed to spawn pump thread: {}", e)))?;

        info!(
            "MQTT client {} connecting to {}:{}",
            config.client_id, config.host, config.port
        );

        Ok(Self { client, inbound })
    }
}

/// pump 线程主循环
///
/// 接收端被丢弃（`send` 失败）或出现连接错误时退出。
fn pump_loop(mut connection: Connection, tx: Sender<Result<BusMessage, BusError>>) {
    for notification in connection.iter() {
        let forwarded = match notification {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                trace!("MQTT publish on {}", publish.topic);
                tx.send(Ok(BusMessage::from_bytes(publish.topic, &publish.payload)))
            },
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    info!("MQTT connected");
                    continue;
                }
                error!("MQTT connection refused: {:?}", ack.code);
                let _ = tx.send(Err(BusError::Connection(format!("{:?}", ack.code))));
                break;
            },
            Ok(Event::Incoming(Packet::Disconnect)) => {
                debug!("MQTT broker sent disconnect");
                let _ = tx.send(Err(BusError::Closed));
                break;
            },
            Ok(_) => continue,
            Err(e) => {
                error!("MQTT connection error: {}", e);
                let _ = tx.send(Err(BusError::Connection(e.to_string())));
                break;
            },
        };

        if forwarded.is_err() {
            // 接收端已关闭
            break;
        }
    }

    trace!("MQTT pump thread: loop exited");
}

impl BusAdapter for MqttBus {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| BusError::Publish(e.to_string()))
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<BusMessage, BusError> {
        match self.inbound.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(BusError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Closed),
        }
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        // 先关闭接收端：pump 线程下一次转发失败即退出，不会阻塞在满队列上
        drop(std::mem::replace(&mut self.inbound, crossbeam_channel::never()));

        // 不 join pump 线程：断开后事件循环返回错误，线程自行退出
        if let Err(e) = self.client.disconnect() {
            debug!("MQTT disconnect request failed: {}", e);
        }
    }
}
