//! 坐标载荷解析
//!
//! 载荷格式：`"x,y"`，可带一个尾部标记字符 `-`（例如 `"7,8-"`）。
//! 两个整数周围允许空白，每个整数允许一个前导负号，不接受 `+`。

use crate::Cell;

/// 尾部标记字符
pub const TRAILING_MARKER: char = '-';

/// 解析坐标载荷
///
/// 1. 去掉首尾空白
/// 2. 若以 `-` 结尾，恰好去掉一个
/// 3. 剩余部分必须是 `<int>,<int>`
///
/// 任何不匹配都返回 `None`（不是错误）。调用方应忽略该事件的坐标效果，
/// 但仍保留消息计数。
///
/// ```
/// use hub_protocol::{Cell, parse_coord};
///
/// assert_eq!(parse_coord("7,8-"), Some(Cell::new(7, 8)));
/// assert_eq!(parse_coord(" -3 , 4 "), Some(Cell::new(-3, 4)));
/// assert_eq!(parse_coord("abc"), None);
/// ```
pub fn parse_coord(payload: &str) -> Option<Cell> {
    let s = payload.trim();
    let s = s.strip_suffix(TRAILING_MARKER).unwrap_or(s);
    let (x, y) = s.split_once(',')?;

    Some(Cell::new(parse_int(x)?, parse_int(y)?))
}

/// 解析单个整数分量：`\s*-?\d+\s*`
fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // 溢出 i64 视为无法解析
    s.parse().ok()
}

/// 线索列表格式：`[(x,y),(x,y)]`
///
/// CSV 写入时作为单个带引号字段。
pub fn format_cell_list(cells: &[Cell]) -> String {
    let inner: Vec<String> = cells.iter().map(Cell::tuple_repr).collect();
    format!("[{}]", inner.join(","))
}
