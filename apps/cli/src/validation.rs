//! 输入验证模块
//!
//! 纯函数，供命令行参数解析（clap `value_parser`）和交互式提示共用。

use anyhow::{Result, bail};
use hub_protocol::Cell;

/// 验证算法标识：2 个 ASCII 字母/数字字符，返回大写形式
///
/// 例如 `vp` → `VP`，`dp` → `DP`。
pub fn parse_algorithm(input: &str) -> Result<String> {
    let id = input.trim().to_ascii_uppercase();
    if id.len() != 2 || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("算法标识需要 2 个字母或数字（例如 VP、DP、AC），得到 {:?}", input);
    }
    Ok(id)
}

/// 验证消息错误率：`[0, 1]` 内的有限实数
pub fn parse_error_rate(input: &str) -> Result<f64> {
    let Ok(value) = input.trim().parse::<f64>() else {
        bail!("错误率需要 0 到 1 之间的数字（例如 0.15），得到 {:?}", input);
    };
    validate_error_rate(value)
}

pub fn validate_error_rate(value: f64) -> Result<f64> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        bail!("错误率 {} 超出范围 [0, 1]", value);
    }
    Ok(value)
}

/// 解析格子坐标 `x,y`
pub fn parse_cell(input: &str) -> Result<Cell> {
    match input.parse::<Cell>() {
        Ok(cell) => Ok(cell),
        Err(_) => bail!("坐标格式应为 x,y（例如 3,-4），得到 {:?}", input),
    }
}

/// 解析机器人列表 `00,01,02`
pub fn parse_robot_list(input: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if ids.is_empty() {
        bail!("机器人列表为空");
    }
    for id in &ids {
        if id.len() != 2 || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            bail!("机器人标识需要 2 个字母或数字，得到 {:?}", id);
        }
    }
    Ok(ids)
}
