//! # 持久化配置
//!
//! 配置文件路径：
//! - Linux: `~/.config/hub-tap/config.toml`
//! - macOS: `~/Library/Application Support/hub-tap/config.toml`
//! - Windows: `%APPDATA%\hub-tap\config.toml`
//!
//! 文件中缺失的字段取默认值；文件不存在时整体使用默认配置。
//!
//! ```toml
//! [broker]
//! host = "192.168.1.10"
//! port = 1883
//! keep_alive_secs = 10
//!
//! [trial]
//! robot_ids = ["00", "01", "02", "03"]
//! drain_window_ms = 1000
//!
//! [output]
//! out_dir = "./hub_logs"
//! ```

use anyhow::{Context, Result};
use hub_protocol::{DEFAULT_ROBOT_IDS, HUB_COMMAND_TOPIC, START_PAYLOAD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置目录名
pub const CONFIG_DIR_NAME: &str = "hub-tap";

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub broker: BrokerSettings,
    pub trial: TrialSettings,
    pub output: OutputSettings,
}

/// MQTT broker 设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    /// 为空时使用 `hub-tap-<pid>`
    pub client_id: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "192.168.1.10".to_string(),
            port: 1883,
            keep_alive_secs: 10,
            client_id: None,
        }
    }
}

/// 试验设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialSettings {
    pub robot_ids: Vec<String>,
    pub command_topic: String,
    pub start_payload: String,
    /// 目标上报后的排空窗口（毫秒）
    pub drain_window_ms: u64,
    /// 监听线程接收超时（毫秒）
    pub receive_timeout_ms: u64,
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            robot_ids: DEFAULT_ROBOT_IDS.iter().map(|id| id.to_string()).collect(),
            command_topic: HUB_COMMAND_TOPIC.to_string(),
            start_payload: START_PAYLOAD.to_string(),
            drain_window_ms: 1000,
            receive_timeout_ms: 10,
        }
    }
}

/// 输出设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub out_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("./hub_logs"),
        }
    }
}

impl HubConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
        path.push(CONFIG_DIR_NAME);
        path.push("config.toml");
        Ok(path)
    }

    /// 从文件加载配置，文件不存在时返回默认配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存配置到文件（自动创建目录）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content).with_context(|| format!("写入配置文件失败: {}", path.display()))
    }
}
