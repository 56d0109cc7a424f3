//! 主题路由
//!
//! 机器人主题固定为 3 个字符：前 2 位是机器人 ID，最后 1 位是事件码。
//!
//! | 事件码 | 类型 | 载荷 |
//! |--------|------|------|
//! | `1` | 位置 | `x,y` |
//! | `4` | 线索 | `x,y` |
//! | `5` | 目标/告警 | `x,y` |
//! | `2` `3` `6` | 仅计数 | 不解析 |
//!
//! 其他任何形状的主题（包括 `hub/command`）都不是机器人事件，静默忽略。

use crate::{ProtocolError, RobotId};
use std::collections::HashSet;

/// 事件类型
///
/// 在路由边界由事件码解码一次，之后不再做字符串比较。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// 位置上报（`1`）
    Position,
    /// 线索发现（`4`）
    Clue,
    /// 目标/告警（`5`），首个到达的结束试验
    Target,
    /// 仅计数的事件（`2`、`3`、`6`）
    Other(u8),
}

impl EventKind {
    /// 全部有效事件码
    pub const DIGITS: [u8; 6] = [1, 2, 3, 4, 5, 6];

    /// 从事件码字符解码
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '1' => Some(Self::Position),
            '4' => Some(Self::Clue),
            '5' => Some(Self::Target),
            '2' => Some(Self::Other(2)),
            '3' => Some(Self::Other(3)),
            '6' => Some(Self::Other(6)),
            _ => None,
        }
    }

    /// 事件码数值（1..=6）
    pub fn digit(self) -> u8 {
        match self {
            Self::Position => 1,
            Self::Clue => 4,
            Self::Target => 5,
            Self::Other(d) => d,
        }
    }

    /// 是否携带坐标载荷
    pub fn carries_cell(self) -> bool {
        matches!(self, Self::Position | Self::Clue | Self::Target)
    }
}

impl TryFrom<u8> for EventKind {
    type Error = ProtocolError;

    fn try_from(digit: u8) -> Result<Self, Self::Error> {
        let c = char::from(b'0'.wrapping_add(digit));
        Self::from_digit(c).ok_or(ProtocolError::InvalidEventDigit(c))
    }
}

/// 路由结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotTopic {
    pub robot: RobotId,
    pub kind: EventKind,
}

/// 主题路由器
///
/// 只接受预先登记的机器人 ID。无副作用。
#[derive(Debug, Clone)]
pub struct TopicRouter {
    robots: HashSet<RobotId>,
}

impl TopicRouter {
    pub fn new(robots: impl IntoIterator<Item = RobotId>) -> Self {
        Self {
            robots: robots.into_iter().collect(),
        }
    }

    /// 路由主题
    ///
    /// 返回 `None` 表示"不是机器人事件"，不是错误。
    pub fn route(&self, topic: &str) -> Option<RobotTopic> {
        let mut chars = topic.chars();
        let (a, b, d) = (chars.next()?, chars.next()?, chars.next()?);
        if chars.next().is_some() {
            return None;
        }

        let kind = EventKind::from_digit(d)?;
        let robot = RobotId::new(&String::from_iter([a, b])).ok()?;

        if !self.robots.contains(&robot) {
            return None;
        }

        Some(RobotTopic { robot, kind })
    }

    pub fn knows(&self, robot: &RobotId) -> bool {
        self.robots.contains(robot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::default_robot_ids;

    #[test]
    fn test_route_all_digits() {
        let router = TopicRouter::new(default_robot_ids());

        for (topic, kind) in [
            ("001", EventKind::Position),
            ("002", EventKind::Other(2)),
            ("003", EventKind::Other(3)),
            ("004", EventKind::Clue),
            ("005", EventKind::Target),
            ("006", EventKind::Other(6)),
        ] {
            let routed = router.route(topic).unwrap();
            assert_eq!(routed.robot.as_str(), "00");
            assert_eq!(routed.kind, kind, "topic {}", topic);
        }
    }

    #[test]
    fn test_route_rejects_bad_shapes() {
        let router = TopicRouter::new(default_robot_ids());

        assert!(router.route("").is_none());
        assert!(router.route("01").is_none());
        assert!(router.route("0111").is_none());
        assert!(router.route("hub/command").is_none());
        // 未登记的机器人
        assert!(router.route("041").is_none());
        // 无效事件码
        assert!(router.route("010").is_none());
        assert!(router.route("017").is_none());
        assert!(router.route("01x").is_none());
        // 多字节字符
        assert!(router.route("0é1").is_none());
    }

    #[test]
    fn test_event_kind_digits() {
        for digit in EventKind::DIGITS {
            let kind = EventKind::try_from(digit).unwrap();
            assert_eq!(kind.digit(), digit);
        }
        assert!(EventKind::try_from(0).is_err());
        assert!(EventKind::try_from(7).is_err());
    }

    #[test]
    fn test_carries_cell() {
        assert!(EventKind::Position.carries_cell());
        assert!(EventKind::Clue.carries_cell());
        assert!(EventKind::Target.carries_cell());
        assert!(!EventKind::Other(2).carries_cell());
    }
}
