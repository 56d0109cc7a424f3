//! # Hub Protocol
//!
//! 多机器人搜索试验的总线协议定义（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `ids`: 机器人标识与固定主题常量
//! - `topic`: 主题路由（`<2 位机器人 ID><1 位事件码>`）
//! - `coord`: 坐标载荷解析（`"x,y"`，可带一个尾部 `-`）
//!
//! ## 边界约定
//!
//! 总线输入中的格式错误（未知主题、无法解析的坐标）**不是**错误，
//! 只返回 `None`，由上层决定是否计数。`ProtocolError` 只用于配置阶段。

pub mod coord;
pub mod ids;
pub mod topic;

// 重新导出常用类型
pub use coord::{format_cell_list, parse_coord};
pub use ids::*;
pub use topic::{EventKind, RobotTopic, TopicRouter};

use std::fmt;
use thiserror::Error;

/// 网格单元坐标
///
/// 值语义，无边界约束（可为负数）。
///
/// `Display` 输出 `x/y`，避免在 CSV/Excel 中被逗号拆列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: i64,
    pub y: i64,
}

impl Cell {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// 元组形式 `(x,y)`，用于线索列表字段
    pub fn tuple_repr(&self) -> String {
        format!("({},{})", self.x, self.y)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.x, self.y)
    }
}

/// 与总线载荷同样的宽松格式（`"x,y"` 或 `"x,y-"`）
impl std::str::FromStr for Cell {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_coord(s).ok_or_else(|| ProtocolError::ParseError(format!("invalid cell {:?}", s)))
    }
}

impl From<(i64, i64)> for Cell {
    fn from((x, y): (i64, i64)) -> Self {
        Self::new(x, y)
    }
}

/// 一条已路由、已解码的机器人事件
///
/// 在主题路由边界解码一次：事件类型来自主题，坐标只对携带坐标的
/// 事件类型（位置/线索/目标）尝试解析。`cell == None` 表示载荷无法解析
/// （或该类型本就不带坐标），但消息计数仍然有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotEvent {
    pub robot: RobotId,
    pub kind: EventKind,
    pub cell: Option<Cell>,
}

impl RobotEvent {
    /// 从原始主题和载荷解码
    ///
    /// 返回 `None` 表示这不是机器人事件（命令主题、未知机器人、无效事件码等）。
    pub fn decode(router: &TopicRouter, topic: &str, payload: &str) -> Option<Self> {
        let RobotTopic { robot, kind } = router.route(topic)?;
        let cell = if kind.carries_cell() {
            parse_coord(payload)
        } else {
            None
        };

        Some(Self { robot, kind, cell })
    }
}

/// 协议配置错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid robot id {0:?}: expected exactly 2 ASCII alphanumeric characters")]
    InvalidRobotId(String),

    #[error("Invalid event digit {0:?}: expected one of 1..=6")]
    InvalidEventDigit(char),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> TopicRouter {
        TopicRouter::new(DEFAULT_ROBOT_IDS.iter().map(|id| RobotId::new(id).unwrap()))
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::new(3, -4).to_string(), "3/-4");
        assert_eq!(Cell::new(3, -4).tuple_repr(), "(3,-4)");
    }

    #[test]
    fn test_cell_from_str() {
        assert_eq!("3,-4".parse::<Cell>(), Ok(Cell::new(3, -4)));
        assert!(matches!("3/4".parse::<Cell>(), Err(ProtocolError::ParseError(_))));
    }

    #[test]
    fn test_decode_position() {
        let event = RobotEvent::decode(&router(), "021", "4,5-").unwrap();
        assert_eq!(event.robot.as_str(), "02");
        assert_eq!(event.kind, EventKind::Position);
        assert_eq!(event.cell, Some(Cell::new(4, 5)));
    }

    #[test]
    fn test_decode_unparseable_payload_still_routes() {
        let event = RobotEvent::decode(&router(), "004", "abc").unwrap();
        assert_eq!(event.kind, EventKind::Clue);
        assert_eq!(event.cell, None);
    }

    #[test]
    fn test_decode_count_only_kind_skips_parse() {
        // 2/3/6 类型即使载荷像坐标也不解析
        let event = RobotEvent::decode(&router(), "013", "1,1").unwrap();
        assert_eq!(event.kind, EventKind::Other(3));
        assert_eq!(event.cell, None);
    }

    #[test]
    fn test_decode_non_robot_topic() {
        assert!(RobotEvent::decode(&router(), HUB_COMMAND_TOPIC, START_PAYLOAD).is_none());
        assert!(RobotEvent::decode(&router(), "091", "1,1").is_none());
    }
}
