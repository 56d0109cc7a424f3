//! Pipeline 监听循环模块
//!
//! 负责后台监听线程的开始命令发布、消息接收、解码与聚合。

use crate::aggregator::{Ingest, TrialAggregator, TrialEnd};
use crate::error::TrialError;
use crate::hooks::TrialCallback;
use crate::metrics::ListenerMetrics;
use crossbeam_channel::Sender;
use hub_bus::{BusAdapter, BusError};
use hub_protocol::{
    DEFAULT_ROBOT_IDS, HUB_COMMAND_TOPIC, RobotEvent, RobotId, START_PAYLOAD, TopicRouter,
};
use hub_tools::TrialSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, trace, warn};

/// 试验运行配置
///
/// # Example
///
/// ```
/// use hub_driver::TrialConfig;
/// use std::time::Duration;
///
/// // 默认：机器人 00..03，10ms 接收超时，1s 排空窗口
/// let config = TrialConfig::default();
///
/// let config = TrialConfig {
///     drain_window: Duration::from_millis(200),
///     ..TrialConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialConfig {
    /// 参与试验的机器人（顺序即导出顺序）
    pub robot_ids: Vec<RobotId>,
    /// 开始命令主题
    pub command_topic: String,
    /// 开始命令载荷
    pub start_payload: String,
    /// 总线接收超时（决定运行标志的检查频率）
    pub receive_timeout: Duration,
    /// 目标上报后继续排空消息的时间
    pub drain_window: Duration,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            robot_ids: hub_protocol::default_robot_ids(),
            command_topic: HUB_COMMAND_TOPIC.to_string(),
            start_payload: START_PAYLOAD.to_string(),
            receive_timeout: Duration::from_millis(10),
            drain_window: Duration::from_secs(1),
        }
    }
}

impl TrialConfig {
    /// 从持久化配置构造，校验机器人 ID
    pub fn from_settings(settings: &TrialSettings) -> Result<Self, TrialError> {
        let robot_ids = settings
            .robot_ids
            .iter()
            .map(|id| RobotId::new(id).map_err(|e| TrialError::InvalidInput(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            robot_ids,
            command_topic: settings.command_topic.clone(),
            start_payload: settings.start_payload.clone(),
            receive_timeout: Duration::from_millis(settings.receive_timeout_ms.max(1)),
            drain_window: Duration::from_millis(settings.drain_window_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrialError> {
        if self.robot_ids.is_empty() {
            return Err(TrialError::InvalidInput(format!(
                "robot list is empty (expected e.g. {:?})",
                DEFAULT_ROBOT_IDS
            )));
        }
        if self.command_topic.is_empty() {
            return Err(TrialError::InvalidInput("command topic is empty".to_string()));
        }
        Ok(())
    }
}

/// 监听循环
///
/// 1. 记录 t0 并立即发布开始命令
/// 2. 带超时接收消息，解码后交给聚合器
/// 3. 首个目标事件被锁存时通过 `done_tx` 发出一次完成信号
/// 4. 完成后继续排空（只计数，不修改状态），直到 `is_running` 被清除
///
/// 连接/发布失败在试验完成前是致命错误；总线关闭则正常返回（可能未完成）。
pub fn listen_loop(
    mut bus: impl BusAdapter,
    config: &TrialConfig,
    is_running: &AtomicBool,
    metrics: &ListenerMetrics,
    callback: &dyn TrialCallback,
    done_tx: Sender<TrialEnd>,
) -> Result<TrialAggregator, TrialError> {
    let router = TopicRouter::new(config.robot_ids.iter().copied());
    let mut agg = TrialAggregator::new(config.robot_ids.iter().copied());

    let t0 = Instant::now();
    if let Err(e) = bus.publish(&config.command_topic, &config.start_payload) {
        error!("Failed to publish start command: {}", e);
        return Err(e.into());
    }
    info!(
        "Published {} {:?} (t=0.000s)",
        config.command_topic, config.start_payload
    );
    callback.on_started(&config.command_topic, &config.start_payload);

    loop {
        // Acquire: 与 wait() 中的 Release 配对
        if !is_running.load(Ordering::Acquire) {
            trace!("Listener: is_running flag is false, exiting");
            break;
        }

        let msg = match bus.receive_timeout(config.receive_timeout) {
            Ok(msg) => {
                metrics.received.fetch_add(1, Ordering::Relaxed);
                msg
            },
            Err(BusError::Timeout) => {
                metrics.receive_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(BusError::Closed) => {
                warn!("Bus closed, listener exiting");
                break;
            },
            Err(e) if agg.is_complete() => {
                // 结果已锁存，排空阶段的故障不影响导出
                warn!("Bus error during drain: {}", e);
                break;
            },
            Err(e) => {
                error!("Fatal bus error: {}", e);
                return Err(e.into());
            },
        };

        let t_rel = t0.elapsed().as_secs_f64();
        let Some(event) = RobotEvent::decode(&router, &msg.topic, &msg.payload) else {
            metrics.ignored_topics.fetch_add(1, Ordering::Relaxed);
            trace!("Ignoring topic {:?}", msg.topic);
            continue;
        };

        let outcome = agg.ingest(&event, t_rel);
        match outcome {
            Ingest::Ignored | Ingest::TargetIgnored => {
                metrics.drained.fetch_add(1, Ordering::Relaxed);
            },
            Ingest::Unparseable => {
                metrics.unparseable.fetch_add(1, Ordering::Relaxed);
                trace!("Unparseable payload {:?} on {}", msg.payload, msg.topic);
            },
            Ingest::TargetLatched => {
                if let Some(end) = agg.trial_end() {
                    // bounded(1)，只会发送一次
                    let _ = done_tx.try_send(*end);
                }
            },
            _ => {},
        }
        callback.on_event(&event, t_rel, outcome);
    }

    Ok(agg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopCallback;
    use crossbeam_channel::bounded;
    use hub_bus::MockBus;
    use hub_protocol::Cell;

    #[test]
    fn test_config_default() {
        let config = TrialConfig::default();
        assert_eq!(config.robot_ids.len(), 4);
        assert_eq!(config.command_topic, "hub/command");
        assert_eq!(config.start_payload, "1");
        assert_eq!(config.receive_timeout, Duration::from_millis(10));
        assert_eq!(config.drain_window, Duration::from_secs(1));
    }

    #[test]
    fn test_config_from_settings() {
        let mut settings = TrialSettings::default();
        settings.robot_ids = vec!["0A".to_string(), "0B".to_string()];
        settings.drain_window_ms = 250;

        let config = TrialConfig::from_settings(&settings).unwrap();
        assert_eq!(config.robot_ids[1].as_str(), "0B");
        assert_eq!(config.drain_window, Duration::from_millis(250));

        settings.robot_ids = vec!["abc".to_string()];
        assert!(matches!(
            TrialConfig::from_settings(&settings),
            Err(TrialError::InvalidInput(_))
        ));

        settings.robot_ids.clear();
        assert!(matches!(
            TrialConfig::from_settings(&settings),
            Err(TrialError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_listen_loop_until_closed() {
        let (bus, handle) = MockBus::new();
        handle.inject("hub/command", "1");
        handle.inject("001", "0,0");
        handle.inject("001", "garbage");
        handle.inject("005", "0,0");
        handle.inject("011", "4,4");
        handle.close();

        let is_running = AtomicBool::new(true);
        let metrics = ListenerMetrics::new();
        let (done_tx, done_rx) = bounded(1);

        let agg = listen_loop(
            bus,
            &TrialConfig::default(),
            &is_running,
            &metrics,
            &NoopCallback,
            done_tx,
        )
        .unwrap();

        let end = done_rx.try_recv().unwrap();
        assert_eq!(end.location, Cell::new(0, 0));
        assert!(agg.is_complete());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received, 5);
        assert_eq!(snapshot.ignored_topics, 1);
        assert_eq!(snapshot.unparseable, 1);
        assert_eq!(snapshot.drained, 1);
        assert_eq!(agg.message_total(), 3);
    }

    #[test]
    fn test_listen_loop_publish_failure_is_fatal() {
        let (bus, _handle) = MockBus::new();
        let is_running = AtomicBool::new(true);
        let (done_tx, _done_rx) = bounded(1);

        let result = listen_loop(
            bus.with_failing_publish(),
            &TrialConfig::default(),
            &is_running,
            &ListenerMetrics::new(),
            &NoopCallback,
            done_tx,
        );
        assert!(matches!(result, Err(TrialError::Bus(BusError::Publish(_)))));
    }

    #[test]
    fn test_listen_loop_stops_on_flag() {
        let (bus, handle) = MockBus::new();
        let is_running = AtomicBool::new(false);
        let (done_tx, _done_rx) = bounded(1);

        let agg = listen_loop(
            bus,
            &TrialConfig::default(),
            &is_running,
            &ListenerMetrics::new(),
            &NoopCallback,
            done_tx,
        )
        .unwrap();

        assert!(!agg.is_complete());
        assert_eq!(handle.published().len(), 1);
    }
}
