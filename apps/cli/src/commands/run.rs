//! 试验运行命令
//!
//! 连接 broker → 发布开始命令 → 等待目标事件 → 交互式补全导出参数 → 追加写入 CSV。
//!
//! 中断或取消提示时不写任何文件。

use crate::prompts;
use crate::validation::{parse_algorithm, parse_cell, parse_error_rate};
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::{Receiver, bounded};
use hub_bus::{BusAdapter, MqttBus, MqttConfig};
use hub_driver::{
    ExportContext, Ingest, TargetReport, TrialCallback, TrialConfig, TrialError, TrialListener,
    TrialOutcome, build_records,
};
use hub_protocol::{Cell, EventKind, RobotEvent};
use hub_tools::{HubConfig, TrialFiles, write_trial};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 运行一次试验
#[derive(Args, Debug)]
pub struct RunCommand {
    /// MQTT broker 地址（覆盖配置文件）
    #[arg(long)]
    pub host: Option<String>,

    /// MQTT broker 端口（覆盖配置文件）
    #[arg(long)]
    pub port: Option<u16>,

    /// 输出目录（覆盖配置文件）
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// 算法标识（2 位，如 VP）；未指定时试验结束后提示输入
    #[arg(long, value_parser = parse_algorithm)]
    pub alg: Option<String>,

    /// 消息错误率 [0, 1]；未指定时试验结束后提示输入
    #[arg(long, value_parser = parse_error_rate)]
    pub error_rate: Option<f64>,

    /// 目标上报为碰撞（误报），指定真实目标位置 x,y
    #[arg(long, value_parser = parse_cell, allow_hyphen_values = true, conflicts_with = "real")]
    pub collision: Option<Cell>,

    /// 目标上报为真实目标
    #[arg(long)]
    pub real: bool,

    /// 目标上报后的排空窗口（毫秒，覆盖配置文件）
    #[arg(long)]
    pub drain_ms: Option<u64>,
}

/// 终端实时输出
struct ConsoleCallback;

impl TrialCallback for ConsoleCallback {
    fn on_started(&self, topic: &str, payload: &str) {
        println!("[RUN] Published {} {:?} (t=0.000s)", topic, payload);
    }

    fn on_event(&self, event: &RobotEvent, t_rel: f64, outcome: Ingest) {
        let Some(cell) = event.cell else {
            return;
        };
        match (event.kind, outcome) {
            (EventKind::Clue, Ingest::Clue { first }) => {
                println!("[CLUE] {} @ {}", event.robot, cell.tuple_repr());
                if first {
                    println!(
                        "[RUN] First clue t={:.3}s loc={} from {}",
                        t_rel,
                        cell.tuple_repr(),
                        event.robot
                    );
                }
            },
            (EventKind::Target, Ingest::TargetLatched) => {
                println!(
                    "[RUN] End t={:.3}s loc={} from {}",
                    t_rel,
                    cell.tuple_repr(),
                    event.robot
                );
            },
            _ => {},
        }
    }
}

impl RunCommand {
    pub fn execute(self, config_path: &Path) -> Result<()> {
        let mut config = HubConfig::load_from_file(config_path)?;
        if let Some(host) = self.host.clone() {
            config.broker.host = host;
        }
        if let Some(port) = self.port {
            config.broker.port = port;
        }
        if let Some(out_dir) = self.out_dir.clone() {
            config.output.out_dir = out_dir;
        }
        if let Some(drain_ms) = self.drain_ms {
            config.trial.drain_window_ms = drain_ms;
        }

        let trial_config = TrialConfig::from_settings(&config.trial).context("试验配置无效")?;

        let mut mqtt = MqttConfig {
            host: config.broker.host.clone(),
            port: config.broker.port,
            keep_alive: Duration::from_secs(config.broker.keep_alive_secs),
            ..MqttConfig::default()
        };
        if let Some(client_id) = config.broker.client_id.clone() {
            mqtt.client_id = client_id;
        }

        println!("⏳ 连接 MQTT broker {}:{}...", mqtt.host, mqtt.port);
        let bus = MqttBus::connect(&mqtt)
            .with_context(|| format!("连接 MQTT broker 失败: {}:{}", mqtt.host, mqtt.port))?;

        let (interrupt_tx, interrupt_rx) = bounded(1);
        ctrlc::set_handler(move || {
            let _ = interrupt_tx.try_send(());
        })
        .context("设置 Ctrl-C 处理器失败")?;

        let Some(files) = run_trial(
            bus,
            trial_config,
            &interrupt_rx,
            &config.output.out_dir,
            |reported| self.export_context(reported),
        )?
        else {
            return Ok(());
        };

        println!();
        println!("[OK] Wrote:");
        for path in files.paths() {
            println!("  {}", path.display());
        }

        Ok(())
    }

    /// 命令行未给出的导出参数通过交互式提示补全
    fn export_context(&self, reported: Cell) -> Result<Option<ExportContext>> {
        let algorithm = match self.alg.clone() {
            Some(alg) => alg,
            None => match prompts::algorithm()? {
                Some(alg) => alg,
                None => return Ok(None),
            },
        };

        let error_rate = match self.error_rate {
            Some(rate) => rate,
            None => match prompts::error_rate()? {
                Some(rate) => rate,
                None => return Ok(None),
            },
        };

        let target_report = match (self.real, self.collision) {
            (true, _) => TargetReport::Real,
            (false, Some(true_target)) => TargetReport::Collision { true_target },
            (false, None) => match prompts::target_report(reported)? {
                Some(report) => report,
                None => return Ok(None),
            },
        };

        Ok(Some(ExportContext {
            algorithm,
            error_rate,
            target_report,
        }))
    }
}

/// 运行一次试验并导出
///
/// 返回 `Ok(None)` 表示没有写入任何文件（操作员中断或取消提示）。
/// `export_context` 收到原始上报位置，返回 `None` 表示取消。
pub(crate) fn run_trial<B, F>(
    bus: B,
    trial_config: TrialConfig,
    interrupt: &Receiver<()>,
    out_dir: &Path,
    export_context: F,
) -> Result<Option<TrialFiles>>
where
    B: BusAdapter + 'static,
    F: FnOnce(Cell) -> Result<Option<ExportContext>>,
{
    let listener =
        TrialListener::start_with_callback(bus, trial_config, Arc::new(ConsoleCallback))?;

    let agg = match listener.wait(interrupt)? {
        TrialOutcome::Completed(agg) => agg,
        TrialOutcome::Interrupted => {
            println!();
            println!("[RUN] Interrupted. No files written.");
            return Ok(None);
        },
        TrialOutcome::Incomplete => {
            return Err(TrialError::NotCompleted)
                .context("[ERR] No termination message (?5). No files written.");
        },
    };

    let end = *agg.trial_end().ok_or(TrialError::NotCompleted)?;
    println!(
        "[RUN] Reported target {} from {} at t={:.3}s",
        end.location, end.reporter, end.time
    );

    let Some(ctx) = export_context(end.location)? else {
        println!("[RUN] Cancelled. No files written.");
        return Ok(None);
    };

    let records = build_records(&agg, &ctx)?;
    let files = TrialFiles::for_algorithm(out_dir, &ctx.algorithm);
    write_trial(&files, &records)?;
    info!("Trial written for algorithm {}", ctx.algorithm);

    Ok(Some(files))
}
