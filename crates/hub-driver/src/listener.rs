//! 试验监听器
//!
//! 后台线程独占 [`TrialAggregator`]，主线程只做三件事：
//!
//! 1. 阻塞等待完成信号 / 操作员中断 / 监听线程退出（`select!`，无轮询）
//! 2. 完成后等待排空窗口，然后清除运行标志
//! 3. join 监听线程，取回已冻结的聚合器（先停止、后读取）

use crate::aggregator::{TrialAggregator, TrialEnd};
use crate::error::TrialError;
use crate::hooks::{NoopCallback, TrialCallback};
use crate::metrics::ListenerMetrics;
use crate::pipeline::{TrialConfig, listen_loop};
use crossbeam_channel::{Receiver, bounded, never, select};
use hub_bus::BusAdapter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

/// 一次试验的结果
#[derive(Debug)]
pub enum TrialOutcome {
    /// 收到目标事件，聚合器可以导出
    Completed(Box<TrialAggregator>),
    /// 试验完成前被操作员中断
    Interrupted,
    /// 总线关闭，没有收到目标事件
    Incomplete,
}

enum Signal {
    Completed(TrialEnd),
    Interrupted,
    ListenerExited,
}

/// 后台监听线程句柄
pub struct TrialListener {
    handle: Option<JoinHandle<Result<TrialAggregator, TrialError>>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<ListenerMetrics>,
    done_rx: Receiver<TrialEnd>,
    drain_window: Duration,
}

impl TrialListener {
    /// 启动监听线程（线程启动后立即发布开始命令）
    pub fn start<B>(bus: B, config: TrialConfig) -> Result<Self, TrialError>
    where
        B: BusAdapter + 'static,
    {
        Self::start_with_callback(bus, config, Arc::new(NoopCallback))
    }

    pub fn start_with_callback<B>(
        bus: B,
        config: TrialConfig,
        callback: Arc<dyn TrialCallback>,
    ) -> Result<Self, TrialError>
    where
        B: BusAdapter + 'static,
    {
        config.validate()?;

        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(ListenerMetrics::new());
        let (done_tx, done_rx) = bounded(1);
        let drain_window = config.drain_window;

        let thread_running = is_running.clone();
        let thread_metrics = metrics.clone();
        let handle = thread::Builder::new()
            .name("hub-listener".to_string())
            .spawn(move || {
                listen_loop(
                    bus,
                    &config,
                    &thread_running,
                    &thread_metrics,
                    callback.as_ref(),
                    done_tx,
                )
            })
            .map_err(|e| TrialError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            handle: Some(handle),
            is_running,
            metrics,
            done_rx,
            drain_window,
        })
    }

    pub fn metrics(&self) -> Arc<ListenerMetrics> {
        self.metrics.clone()
    }

    /// 等待试验结束
    ///
    /// `interrupt` 收到消息即视为操作员中断；其发送端全部关闭后不再监听中断。
    /// 没有中断源时传入 `crossbeam_channel::never()`。
    pub fn wait(mut self, interrupt: &Receiver<()>) -> Result<TrialOutcome, TrialError> {
        let no_interrupt = never();
        let mut interrupt_open = true;

        let signal = loop {
            let interrupt_rx = if interrupt_open { interrupt } else { &no_interrupt };
            select! {
                recv(self.done_rx) -> msg => break match msg {
                    Ok(end) => Signal::Completed(end),
                    Err(_) => Signal::ListenerExited,
                },
                recv(interrupt_rx) -> msg => match msg {
                    // 两者同时就绪时 select! 随机选择，已锁存的结果优先
                    Ok(()) => break match self.done_rx.try_recv() {
                        Ok(end) => Signal::Completed(end),
                        Err(_) => Signal::Interrupted,
                    },
                    Err(_) => interrupt_open = false,
                },
            }
        };

        match &signal {
            Signal::Completed(end) => {
                info!(
                    "Trial complete at t={:.3}s, draining for {:?}",
                    end.time, self.drain_window
                );
                thread::sleep(self.drain_window);
            },
            Signal::Interrupted => info!("Trial interrupted by operator"),
            Signal::ListenerExited => info!("Listener exited before completion signal"),
        }

        let result = self.stop_and_join();
        let snapshot = self.metrics.snapshot();
        info!(
            "Listener stopped: received={} ignored_topics={} unparseable={} drained={}",
            snapshot.received, snapshot.ignored_topics, snapshot.unparseable, snapshot.drained
        );

        if let Signal::Interrupted = signal {
            if let Err(e) = result {
                warn!("Listener error after interrupt: {}", e);
            }
            return Ok(TrialOutcome::Interrupted);
        }

        let agg = result?;
        if agg.is_complete() {
            Ok(TrialOutcome::Completed(Box::new(agg)))
        } else {
            Ok(TrialOutcome::Incomplete)
        }
    }

    /// 清除运行标志并 join 监听线程
    fn stop_and_join(&mut self) -> Result<TrialAggregator, TrialError> {
        // Release: 监听线程 Acquire 读取到 false 后退出
        self.is_running.store(false, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| TrialError::ListenerPanicked)?,
            None => Err(TrialError::ListenerPanicked),
        }
    }
}

impl Drop for TrialListener {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop_and_join();
        }
    }
}
