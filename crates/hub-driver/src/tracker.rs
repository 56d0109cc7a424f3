//! 单机器人增量状态
//!
//! 只在监听线程中被修改，由 [`TrialAggregator`](crate::TrialAggregator) 持有。

use hub_protocol::{Cell, EventKind, RobotId};
use std::collections::HashSet;

/// 按事件码（1..=6）的消息计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCounts([u64; 6]);

impl MessageCounts {
    pub fn record(&mut self, kind: EventKind) {
        if let Some(slot) = self.0.get_mut(Self::slot(kind.digit())) {
            *slot += 1;
        }
    }

    /// 某个事件码的计数，无效事件码返回 0
    pub fn get(&self, digit: u8) -> u64 {
        if digit == 0 {
            return 0;
        }
        self.0.get(Self::slot(digit)).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// 按事件码顺序（`m1..m6`）
    pub fn as_array(&self) -> [u64; 6] {
        self.0
    }

    fn slot(digit: u8) -> usize {
        usize::from(digit.saturating_sub(1))
    }
}

/// 一次位置事件对该机器人的影响
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionUpdate {
    /// 首次放置（不计步）
    Placed { revisit: bool },
    /// 与上次位置相同，无任何变化
    Stationary,
    /// 移动一步
    Stepped { post_clue: bool, revisit: bool },
}

impl PositionUpdate {
    /// 是否进入了一个格子（需要计入团队访问次数）
    pub fn entered_cell(&self) -> bool {
        !matches!(self, Self::Stationary)
    }
}

/// 单机器人状态
///
/// 不变量：`steps_total == steps_pre_clue + steps_post_clue`。
#[derive(Debug, Clone)]
pub struct RobotTracker {
    id: RobotId,
    last_position: Option<Cell>,
    steps_pre_clue: u64,
    steps_post_clue: u64,
    visited: HashSet<Cell>,
    revisits: u64,
    clues_reported: Vec<Cell>,
    found_target: bool,
    message_counts: MessageCounts,
}

impl RobotTracker {
    pub fn new(id: RobotId) -> Self {
        Self {
            id,
            last_position: None,
            steps_pre_clue: 0,
            steps_post_clue: 0,
            visited: HashSet::new(),
            revisits: 0,
            clues_reported: Vec::new(),
            found_target: false,
            message_counts: MessageCounts::default(),
        }
    }

    /// 处理一次位置上报
    ///
    /// `post_clue` 由调用方根据首个线索时间判定，只影响步数归类。
    pub fn apply_position(&mut self, cell: Cell, post_clue: bool) -> PositionUpdate {
        match self.last_position {
            None => {
                self.last_position = Some(cell);
                PositionUpdate::Placed {
                    revisit: self.enter(cell),
                }
            },
            Some(last) if last == cell => PositionUpdate::Stationary,
            Some(_) => {
                self.last_position = Some(cell);
                if post_clue {
                    self.steps_post_clue += 1;
                } else {
                    self.steps_pre_clue += 1;
                }
                PositionUpdate::Stepped {
                    post_clue,
                    revisit: self.enter(cell),
                }
            },
        }
    }

    /// 进入格子，返回是否为重访
    fn enter(&mut self, cell: Cell) -> bool {
        let revisit = !self.visited.insert(cell);
        if revisit {
            self.revisits += 1;
        }
        revisit
    }

    pub(crate) fn record_message(&mut self, kind: EventKind) {
        self.message_counts.record(kind);
    }

    pub(crate) fn record_clue(&mut self, cell: Cell) {
        self.clues_reported.push(cell);
    }

    pub(crate) fn mark_found_target(&mut self) {
        self.found_target = true;
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    pub fn last_position(&self) -> Option<Cell> {
        self.last_position
    }

    pub fn steps_total(&self) -> u64 {
        self.steps_pre_clue + self.steps_post_clue
    }

    pub fn steps_pre_clue(&self) -> u64 {
        self.steps_pre_clue
    }

    pub fn steps_post_clue(&self) -> u64 {
        self.steps_post_clue
    }

    pub fn visited(&self) -> &HashSet<Cell> {
        &self.visited
    }

    pub fn unique_cells(&self) -> u64 {
        self.visited.len() as u64
    }

    pub fn revisits(&self) -> u64 {
        self.revisits
    }

    pub fn clues_reported(&self) -> &[Cell] {
        &self.clues_reported
    }

    pub fn found_target(&self) -> bool {
        self.found_target
    }

    pub fn message_counts(&self) -> &MessageCounts {
        &self.message_counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> RobotTracker {
        RobotTracker::new(RobotId::new("00").unwrap())
    }

    #[test]
    fn test_first_placement_is_not_a_step() {
        let mut t = tracker();
        let update = t.apply_position(Cell::new(0, 0), false);

        assert_eq!(update, PositionUpdate::Placed { revisit: false });
        assert_eq!(t.last_position(), Some(Cell::new(0, 0)));
        assert_eq!(t.steps_total(), 0);
        assert_eq!(t.unique_cells(), 1);
        assert_eq!(t.revisits(), 0);
    }

    #[test]
    fn test_same_cell_is_noop() {
        let mut t = tracker();
        t.apply_position(Cell::new(1, 1), false);
        let update = t.apply_position(Cell::new(1, 1), false);

        assert_eq!(update, PositionUpdate::Stationary);
        assert!(!update.entered_cell());
        assert_eq!(t.steps_total(), 0);
        assert_eq!(t.revisits(), 0);
    }

    #[test]
    fn test_step_classification_and_revisit() {
        let mut t = tracker();
        t.apply_position(Cell::new(0, 0), false);
        t.apply_position(Cell::new(0, 1), false);
        let update = t.apply_position(Cell::new(0, 0), true);

        assert_eq!(
            update,
            PositionUpdate::Stepped {
                post_clue: true,
                revisit: true
            }
        );
        assert_eq!(t.steps_total(), 2);
        assert_eq!(t.steps_pre_clue(), 1);
        assert_eq!(t.steps_post_clue(), 1);
        assert_eq!(t.unique_cells(), 2);
        assert_eq!(t.revisits(), 1);
    }

    #[test]
    fn test_message_counts() {
        let mut counts = MessageCounts::default();
        counts.record(EventKind::Position);
        counts.record(EventKind::Position);
        counts.record(EventKind::Other(6));

        assert_eq!(counts.get(1), 2);
        assert_eq!(counts.get(6), 1);
        assert_eq!(counts.get(0), 0);
        assert_eq!(counts.get(9), 0);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.as_array(), [2, 0, 0, 0, 0, 1]);
    }
}
