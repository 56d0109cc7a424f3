//! 试验聚合状态机
//!
//! 持有全部 [`RobotTracker`] 与团队级状态，逐条消费已解码的事件。
//!
//! **生命周期**：
//! 1. 试验开始时创建（t0 = 监听循环启动时刻）
//! 2. 只由监听线程通过 [`TrialAggregator::ingest`] 修改
//! 3. 首个目标事件锁存结束信息后进入完成状态，之后任何事件都不再修改状态
//! 4. 监听线程退出后交给导出层只读使用

use crate::tracker::{MessageCounts, PositionUpdate, RobotTracker};
use hub_protocol::{Cell, EventKind, RobotEvent, RobotId};
use std::collections::HashMap;
use tracing::{debug, info};

/// 一次线索上报
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClueSighting {
    pub robot: RobotId,
    pub cell: Cell,
    /// 相对 t0 的时间（秒）
    pub t: f64,
}

/// 首个线索锁存的信息
#[derive(Debug, Clone, PartialEq)]
pub struct FirstClue {
    pub time: f64,
    pub location: Cell,
    /// 线索出现时每个机器人的位置（按机器人固定顺序，尚无位置时为 `None`）
    pub positions: Vec<(RobotId, Option<Cell>)>,
}

impl FirstClue {
    pub fn position_of(&self, robot: RobotId) -> Option<Cell> {
        self.positions
            .iter()
            .find(|(id, _)| *id == robot)
            .and_then(|(_, cell)| *cell)
    }
}

/// 首个目标事件锁存的结束信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialEnd {
    pub time: f64,
    pub reporter: RobotId,
    pub location: Cell,
}

/// 一次 `ingest` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// 试验已结束，事件被丢弃（不计数）
    Ignored,
    /// 仅计数（事件码 2/3/6）
    Counted,
    /// 已计数，但坐标无法解析
    Unparseable,
    Position(PositionUpdate),
    Clue { first: bool },
    /// 首个目标事件，试验结束
    TargetLatched,
    /// 试验结束后的目标事件，被丢弃
    TargetIgnored,
}

/// 试验聚合器
#[derive(Debug, Clone)]
pub struct TrialAggregator {
    robots: Vec<RobotTracker>,
    index: HashMap<RobotId, usize>,
    team_visit_counts: HashMap<Cell, u64>,
    first_clue: Option<FirstClue>,
    clues: Vec<ClueSighting>,
    end: Option<TrialEnd>,
    message_counts: MessageCounts,
}

impl TrialAggregator {
    /// 创建聚合器，机器人顺序即导出顺序（重复 ID 只保留第一个）
    pub fn new(robot_ids: impl IntoIterator<Item = RobotId>) -> Self {
        let mut robots = Vec::new();
        let mut index = HashMap::new();
        for id in robot_ids {
            if !index.contains_key(&id) {
                index.insert(id, robots.len());
                robots.push(RobotTracker::new(id));
            }
        }

        Self {
            robots,
            index,
            team_visit_counts: HashMap::new(),
            first_clue: None,
            clues: Vec::new(),
            end: None,
            message_counts: MessageCounts::default(),
        }
    }

    /// 消费一条事件
    ///
    /// `t_rel` 为相对 t0 的秒数。未知机器人的事件返回 `Ignored`。
    pub fn ingest(&mut self, event: &RobotEvent, t_rel: f64) -> Ingest {
        if self.is_complete() {
            return match event.kind {
                EventKind::Target => Ingest::TargetIgnored,
                _ => Ingest::Ignored,
            };
        }

        let Some(&idx) = self.index.get(&event.robot) else {
            return Ingest::Ignored;
        };

        // 计数与载荷是否可解析无关
        self.message_counts.record(event.kind);
        self.robots[idx].record_message(event.kind);

        if !event.kind.carries_cell() {
            return Ingest::Counted;
        }
        let Some(cell) = event.cell else {
            return Ingest::Unparseable;
        };

        match event.kind {
            EventKind::Position => Ingest::Position(self.handle_position(idx, cell, t_rel)),
            EventKind::Clue => Ingest::Clue {
                first: self.handle_clue(idx, cell, t_rel),
            },
            EventKind::Target => {
                self.handle_target(idx, cell, t_rel);
                Ingest::TargetLatched
            },
            EventKind::Other(_) => Ingest::Counted,
        }
    }

    fn handle_position(&mut self, idx: usize, cell: Cell, t_rel: f64) -> PositionUpdate {
        let post_clue = self.first_clue.as_ref().is_some_and(|fc| t_rel >= fc.time);
        let update = self.robots[idx].apply_position(cell, post_clue);
        if update.entered_cell() {
            *self.team_visit_counts.entry(cell).or_insert(0) += 1;
        }
        debug!("{} position {} -> {:?}", self.robots[idx].id(), cell, update);
        update
    }

    /// 返回是否为本次试验的首个线索
    fn handle_clue(&mut self, idx: usize, cell: Cell, t_rel: f64) -> bool {
        let robot = self.robots[idx].id();
        self.robots[idx].record_clue(cell);
        self.clues.push(ClueSighting {
            robot,
            cell,
            t: t_rel,
        });

        if self.first_clue.is_some() {
            return false;
        }

        let positions = self.robots.iter().map(|r| (r.id(), r.last_position())).collect();
        self.first_clue = Some(FirstClue {
            time: t_rel,
            location: cell,
            positions,
        });
        info!("First clue at t={:.3}s loc={} from {}", t_rel, cell, robot);
        true
    }

    fn handle_target(&mut self, idx: usize, cell: Cell, t_rel: f64) {
        let reporter = self.robots[idx].id();
        self.robots[idx].mark_found_target();
        self.end = Some(TrialEnd {
            time: t_rel,
            reporter,
            location: cell,
        });
        info!("Trial end at t={:.3}s loc={} from {}", t_rel, cell, reporter);
    }

    /// 是否已收到首个目标事件
    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }

    /// 按固定顺序的机器人状态
    pub fn robots(&self) -> &[RobotTracker] {
        &self.robots
    }

    pub fn robot(&self, id: RobotId) -> Option<&RobotTracker> {
        self.index.get(&id).map(|&idx| &self.robots[idx])
    }

    pub fn team_visit_counts(&self) -> &HashMap<Cell, u64> {
        &self.team_visit_counts
    }

    pub fn first_clue(&self) -> Option<&FirstClue> {
        self.first_clue.as_ref()
    }

    /// 全部线索（到达顺序）
    pub fn clue_sightings(&self) -> &[ClueSighting] {
        &self.clues
    }

    pub fn all_clue_locations(&self) -> Vec<Cell> {
        self.clues.iter().map(|c| c.cell).collect()
    }

    pub fn trial_end(&self) -> Option<&TrialEnd> {
        self.end.as_ref()
    }

    pub fn message_counts(&self) -> &MessageCounts {
        &self.message_counts
    }

    pub fn message_total(&self) -> u64 {
        self.message_counts.total()
    }
}
