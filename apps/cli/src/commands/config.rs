//! 配置管理命令
//!
//! 用于管理持久化配置（broker 地址、机器人列表、输出目录等）

use crate::validation::parse_robot_list;
use anyhow::Result;
use clap::Subcommand;
use hub_driver::TrialConfig;
use hub_tools::HubConfig;
use std::path::{Path, PathBuf};

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// MQTT broker 地址
        #[arg(long)]
        host: Option<String>,

        /// MQTT broker 端口
        #[arg(long)]
        port: Option<u16>,

        /// 参与试验的机器人（逗号分隔，如 00,01,02,03）
        #[arg(long)]
        robots: Option<String>,

        /// 目标上报后的排空窗口（毫秒）
        #[arg(long)]
        drain_ms: Option<u64>,

        /// 输出目录
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称（host, port, robots, drain_ms, out_dir, all）
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub fn execute(self, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                host,
                port,
                robots,
                drain_ms,
                out_dir,
            } => Self::set_(config_path, host, port, robots, drain_ms, out_dir),

            ConfigCommand::Get { key } => Self::get_(config_path, &key),

            ConfigCommand::Check => Self::check_(config_path),
        }
    }

    fn set_(
        config_path: &Path,
        host: Option<String>,
        port: Option<u16>,
        robots: Option<String>,
        drain_ms: Option<u64>,
        out_dir: Option<PathBuf>,
    ) -> Result<()> {
        let mut config = HubConfig::load_from_file(config_path)?;

        if let Some(host) = host {
            println!("✅ 设置 broker 地址: {}", host);
            config.broker.host = host;
        }

        if let Some(port) = port {
            println!("✅ 设置 broker 端口: {}", port);
            config.broker.port = port;
        }

        if let Some(robots) = robots {
            let robots = parse_robot_list(&robots)?;
            println!("✅ 设置机器人列表: {}", robots.join(","));
            config.trial.robot_ids = robots;
        }

        if let Some(drain_ms) = drain_ms {
            println!("✅ 设置排空窗口: {} ms", drain_ms);
            config.trial.drain_window_ms = drain_ms;
        }

        if let Some(out_dir) = out_dir {
            println!("✅ 设置输出目录: {}", out_dir.display());
            config.output.out_dir = out_dir;
        }

        config.save_to_file(config_path)?;
        Ok(())
    }

    fn get_(config_path: &Path, key: &str) -> Result<()> {
        let config = HubConfig::load_from_file(config_path)?;

        match key {
            "host" => println!("{}", config.broker.host),
            "port" => println!("{}", config.broker.port),
            "robots" => println!("{}", config.trial.robot_ids.join(",")),
            "drain_ms" => println!("{}", config.trial.drain_window_ms),
            "out_dir" => println!("{}", config.output.out_dir.display()),
            _ => {
                println!("Hub 配置:");
                println!("  broker: {}:{}", config.broker.host, config.broker.port);
                println!("  机器人: {}", config.trial.robot_ids.join(","));
                println!("  排空窗口: {} ms", config.trial.drain_window_ms);
                println!("  输出目录: {}", config.output.out_dir.display());
            },
        }

        Ok(())
    }

    fn check_(config_path: &Path) -> Result<()> {
        let config = HubConfig::load_from_file(config_path)?;

        println!("配置文件: {}", config_path.display());
        if !config_path.exists() {
            println!("  (文件不存在，使用默认配置)");
        }
        println!("  broker: {}:{}", config.broker.host, config.broker.port);
        println!("  输出目录: {}", config.output.out_dir.display());

        match TrialConfig::from_settings(&config.trial) {
            Ok(trial) => {
                println!("✅ 试验配置有效（{} 个机器人）", trial.robot_ids.len());
                Ok(())
            },
            Err(e) => {
                println!("❌ 试验配置无效: {}", e);
                Err(e.into())
            },
        }
    }
}
