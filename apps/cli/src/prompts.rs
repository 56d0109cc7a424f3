//! 试验结束后的交互式提示
//!
//! 所有提示返回 `Ok(None)` 表示操作员取消（Esc / Ctrl-C），
//! 调用方据此放弃导出，不写任何文件。

use crate::validation::{parse_algorithm, parse_cell, parse_error_rate};
use anyhow::{Result, anyhow};
use hub_driver::TargetReport;
use hub_protocol::Cell;
use inquire::validator::Validation;
use inquire::{Confirm, InquireError, Text};

fn cancellable<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(anyhow!("用户交互失败: {}", e)),
    }
}

/// 算法标识（2 位，自动转大写）
pub fn algorithm() -> Result<Option<String>> {
    let answer = Text::new("Algorithm (VP,DP,AC):")
        .with_validator(|s: &str| {
            Ok(match parse_algorithm(s) {
                Ok(_) => Validation::Valid,
                Err(e) => Validation::Invalid(e.to_string().into()),
            })
        })
        .prompt();

    match cancellable(answer)? {
        Some(s) => Ok(Some(parse_algorithm(&s)?)),
        None => Ok(None),
    }
}

/// 消息错误率 `[0, 1]`
pub fn error_rate() -> Result<Option<f64>> {
    let answer = Text::new("Message error (0..1, e.g. 0.15):")
        .with_validator(|s: &str| {
            Ok(match parse_error_rate(s) {
                Ok(_) => Validation::Valid,
                Err(e) => Validation::Invalid(e.to_string().into()),
            })
        })
        .prompt();

    match cancellable(answer)? {
        Some(s) => Ok(Some(parse_error_rate(&s)?)),
        None => Ok(None),
    }
}

/// 目标判定：真实或碰撞（碰撞时输入真实目标位置）
pub fn target_report(reported: Cell) -> Result<Option<TargetReport>> {
    let real = Confirm::new(&format!("Was the reported target {} real?", reported))
        .with_default(true)
        .with_help_message("n = collision / false positive")
        .prompt();

    match cancellable(real)? {
        Some(true) => Ok(Some(TargetReport::Real)),
        Some(false) => {
            let answer = Text::new("True target location (x,y):")
                .with_validator(|s: &str| {
                    Ok(match parse_cell(s) {
                        Ok(_) => Validation::Valid,
                        Err(e) => Validation::Invalid(e.to_string().into()),
                    })
                })
                .prompt();

            match cancellable(answer)? {
                Some(s) => Ok(Some(TargetReport::Collision {
                    true_target: parse_cell(&s)?,
                })),
                None => Ok(None),
            }
        },
        None => Ok(None),
    }
}
