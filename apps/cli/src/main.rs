//! # Hub CLI
//!
//! 多机器人搜索试验的指标采集终端。
//!
//! ```bash
//! # 配置 broker 地址
//! hub-cli config set --host 192.168.1.10 --port 1883
//!
//! # 运行一次试验（结束后提示输入算法、错误率、目标判定）
//! hub-cli run
//!
//! # 全部参数在命令行给出，不再提示
//! hub-cli run --alg VP --error-rate 0.15 --real
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use hub_tools::HubConfig;
use std::path::PathBuf;

mod commands;
mod prompts;
mod validation;

use commands::{ConfigCommand, RunCommand};

/// Hub CLI - 试验指标采集工具
#[derive(Parser, Debug)]
#[command(name = "hub-cli")]
#[command(about = "Metrics tap for multi-robot search trials", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认位于系统配置目录下的 hub-tap/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行一次试验并导出指标
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hub_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => HubConfig::default_path()?,
    };

    match cli.command {
        Commands::Run { args } => args.execute(&config_path),
        Commands::Config(cmd) => cmd.execute(&config_path),
    }
}
