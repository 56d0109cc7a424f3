//! 机器人标识与固定主题常量

use crate::ProtocolError;
use std::fmt;

/// 试验开始命令主题
pub const HUB_COMMAND_TOPIC: &str = "hub/command";

/// 试验开始命令载荷
pub const START_PAYLOAD: &str = "1";

/// 订阅全部主题（在 `TopicRouter` 中过滤）
pub const SUBSCRIBE_ALL: &str = "#";

/// 默认参与试验的机器人
pub const DEFAULT_ROBOT_IDS: [&str; 4] = ["00", "01", "02", "03"];

/// 机器人标识
///
/// 固定 2 个 ASCII 字母/数字字符，例如 `"00"`、`"03"`。
/// 使用定长数组存储，`Copy` 且可作为 `HashMap`/`BTreeMap` 键。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RobotId([u8; 2]);

impl RobotId {
    /// 创建机器人标识
    ///
    /// # 错误
    ///
    /// 长度不是 2 或包含非 ASCII 字母/数字字符时返回 `ProtocolError::InvalidRobotId`。
    pub fn new(id: &str) -> Result<Self, ProtocolError> {
        match id.as_bytes() {
            &[a, b] if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric() => Ok(Self([a, b])),
            _ => Err(ProtocolError::InvalidRobotId(id.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        // 构造时已保证为 ASCII
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RobotId({})", self.as_str())
    }
}

impl std::str::FromStr for RobotId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// 解析默认机器人列表
pub fn default_robot_ids() -> Vec<RobotId> {
    DEFAULT_ROBOT_IDS.iter().filter_map(|id| RobotId::new(id).ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robot_id_valid() {
        let id = RobotId::new("03").unwrap();
        assert_eq!(id.as_str(), "03");
        assert_eq!(format!("{}", id), "03");
        assert_eq!(format!("{:?}", id), "RobotId(03)");
    }

    #[test]
    fn test_robot_id_invalid() {
        assert!(matches!(RobotId::new("0"), Err(ProtocolError::InvalidRobotId(_))));
        assert!(RobotId::new("012").is_err());
        assert!(RobotId::new("0-").is_err());
        assert!(RobotId::new("").is_err());
    }

    #[test]
    fn test_default_robot_ids() {
        let ids = default_robot_ids();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0].as_str(), "00");
        assert_eq!(ids[3].as_str(), "03");
    }
}
