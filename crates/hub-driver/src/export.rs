//! 指标导出
//!
//! 试验结束后，从只读的 [`TrialAggregator`] 一次性推导汇总与输出记录。
//! 纯函数，无重试；试验未结束时返回 [`TrialError::NotCompleted`]，
//! 不做部分导出。

use crate::aggregator::{TrialAggregator, TrialEnd};
use crate::error::TrialError;
use crate::tracker::MessageCounts;
use hub_protocol::Cell;
use hub_tools::{LocationKind, LocationRecord, RobotRecord, SystemRecord, TrialRecords};

/// 操作员对目标上报的判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetReport {
    /// 上报位置即真实目标
    Real,
    /// 误报（碰撞），使用操作员给出的真实目标位置
    Collision { true_target: Cell },
}

impl TargetReport {
    pub fn is_real(&self) -> bool {
        matches!(self, Self::Real)
    }

    /// 输出记录中使用的目标位置
    pub fn resolve(&self, reported: Cell) -> Cell {
        match self {
            Self::Real => reported,
            Self::Collision { true_target } => *true_target,
        }
    }
}

/// 导出上下文（试验结束后由操作员提供）
#[derive(Debug, Clone, PartialEq)]
pub struct ExportContext {
    /// 算法标识（2 位大写字母数字）
    pub algorithm: String,
    /// 消息错误率，取值 `[0, 1]`
    pub error_rate: f64,
    pub target_report: TargetReport,
}

/// 团队级汇总
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSummary {
    pub end: TrialEnd,
    pub clue_found: bool,
    pub first_clue_location: Option<Cell>,
    pub total_time: f64,
    pub time_before_clue: f64,
    pub time_after_clue: f64,
    pub steps_total: u64,
    pub steps_pre_clue: u64,
    pub steps_post_clue: u64,
    pub unique_cells: u64,
    pub team_revisits: u64,
    pub message_total: u64,
    pub message_counts: MessageCounts,
}

impl TrialSummary {
    pub fn derive(agg: &TrialAggregator) -> Result<Self, TrialError> {
        let end = *agg.trial_end().ok_or(TrialError::NotCompleted)?;
        let first_clue = agg.first_clue();

        let total_time = end.time;
        let time_before_clue = first_clue.map_or(total_time, |fc| fc.time);
        let time_after_clue = if first_clue.is_some() {
            total_time - time_before_clue
        } else {
            0.0
        };

        let visits = agg.team_visit_counts();
        let team_revisits = visits.values().map(|count| count.saturating_sub(1)).sum();

        let robots = agg.robots();
        Ok(Self {
            end,
            clue_found: first_clue.is_some(),
            first_clue_location: first_clue.map(|fc| fc.location),
            total_time,
            time_before_clue,
            time_after_clue,
            steps_total: robots.iter().map(|r| r.steps_total()).sum(),
            steps_pre_clue: robots.iter().map(|r| r.steps_pre_clue()).sum(),
            steps_post_clue: robots.iter().map(|r| r.steps_post_clue()).sum(),
            unique_cells: visits.len() as u64,
            team_revisits,
            message_total: agg.message_total(),
            message_counts: *agg.message_counts(),
        })
    }
}

/// 生成一次试验的全部输出记录
///
/// 判定为碰撞时，所有记录的目标列都替换为操作员给出的真实位置。
/// 原始上报位置由调用方在判定前展示。
pub fn build_records(
    agg: &TrialAggregator,
    ctx: &ExportContext,
) -> Result<TrialRecords, TrialError> {
    if !(0.0..=1.0).contains(&ctx.error_rate) {
        return Err(TrialError::InvalidInput(format!(
            "error rate {} is outside [0, 1]",
            ctx.error_rate
        )));
    }

    let summary = TrialSummary::derive(agg)?;
    let target = ctx.target_report.resolve(summary.end.location);

    let [m1, m2, m3, m4, m5, m6] = summary.message_counts.as_array();
    let system = SystemRecord {
        algorithm: ctx.algorithm.clone(),
        target,
        error_rate: ctx.error_rate,
        clue_found: summary.clue_found,
        steps_total: summary.steps_total,
        total_time: summary.total_time,
        steps_before_clue: summary.steps_pre_clue,
        time_before_clue: summary.time_before_clue,
        steps_after_clue: summary.steps_post_clue,
        time_after_clue: summary.time_after_clue,
        unique_cells: summary.unique_cells,
        revisits: summary.team_revisits,
        clue_locations: agg.all_clue_locations(),
        messages_total: summary.message_total,
        m1,
        m2,
        m3,
        m4,
        m5,
        m6,
        real_target: ctx.target_report.is_real(),
    };

    let first_clue = agg.first_clue();
    let robots = agg
        .robots()
        .iter()
        .map(|r| {
            let [m1, m2, m3, m4, m5, m6] = r.message_counts().as_array();
            RobotRecord {
                algorithm: ctx.algorithm.clone(),
                target,
                error_rate: ctx.error_rate,
                robot: r.id().to_string(),
                steps_total: r.steps_total(),
                steps_before_clue: r.steps_pre_clue(),
                steps_after_clue: r.steps_post_clue(),
                unique_cells: r.unique_cells(),
                revisits: r.revisits(),
                clues: r.clues_reported().to_vec(),
                position_at_first_clue: first_clue.and_then(|fc| fc.position_of(r.id())),
                found_target: r.found_target(),
                messages_total: r.message_counts().total(),
                m1,
                m2,
                m3,
                m4,
                m5,
                m6,
            }
        })
        .collect();

    let location = |kind: LocationKind, robot: Option<String>, cell: Cell| LocationRecord {
        algorithm: ctx.algorithm.clone(),
        target,
        error_rate: ctx.error_rate,
        kind,
        robot,
        location: cell,
    };

    let mut locations = Vec::new();
    if let (Some(fc), Some(first)) = (first_clue, agg.clue_sightings().first()) {
        locations.push(location(
            LocationKind::FirstClue,
            Some(first.robot.to_string()),
            fc.location,
        ));
    }
    for sighting in agg.clue_sightings() {
        locations.push(location(
            LocationKind::Clue,
            Some(sighting.robot.to_string()),
            sighting.cell,
        ));
    }
    if let Some(fc) = first_clue {
        for (id, cell) in &fc.positions {
            if let Some(cell) = cell {
                locations.push(location(
                    LocationKind::PosAtFirstClue,
                    Some(id.to_string()),
                    *cell,
                ));
            }
        }
    }
    for r in agg.robots() {
        if let Some(cell) = r.last_position() {
            locations.push(location(
                LocationKind::FinalPosition,
                Some(r.id().to_string()),
                cell,
            ));
        }
    }

    Ok(TrialRecords {
        system,
        robots,
        locations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_protocol::{EventKind, RobotEvent, RobotId};

    fn id(s: &str) -> RobotId {
        RobotId::new(s).unwrap()
    }

    fn ingest(agg: &mut TrialAggregator, robot: &str, kind: EventKind, cell: (i64, i64), t: f64) {
        let event = RobotEvent {
            robot: id(robot),
            kind,
            cell: Some(Cell::from(cell)),
        };
        agg.ingest(&event, t);
    }

    fn ctx(report: TargetReport) -> ExportContext {
        ExportContext {
            algorithm: "VP".to_string(),
            error_rate: 0.15,
            target_report: report,
        }
    }

    #[test]
    fn test_derive_requires_completion() {
        let agg = TrialAggregator::new([id("00")]);
        assert!(matches!(TrialSummary::derive(&agg), Err(TrialError::NotCompleted)));
        assert!(matches!(
            build_records(&agg, &ctx(TargetReport::Real)),
            Err(TrialError::NotCompleted)
        ));
    }

    #[test]
    fn test_derive_without_clue() {
        let mut agg = TrialAggregator::new([id("00"), id("01")]);
        ingest(&mut agg, "00", EventKind::Position, (0, 0), 0.0);
        ingest(&mut agg, "01", EventKind::Position, (0, 0), 0.1);
        ingest(&mut agg, "00", EventKind::Position, (0, 1), 1.0);
        ingest(&mut agg, "01", EventKind::Position, (0, 1), 2.0);
        ingest(&mut agg, "01", EventKind::Target, (0, 1), 4.0);

        let summary = TrialSummary::derive(&agg).unwrap();
        assert!(!summary.clue_found);
        assert_eq!(summary.total_time, 4.0);
        assert_eq!(summary.time_before_clue, 4.0);
        assert_eq!(summary.time_after_clue, 0.0);
        assert_eq!(summary.steps_total, 2);
        assert_eq!(summary.steps_pre_clue, 2);
        assert_eq!(summary.unique_cells, 2);
        assert_eq!(summary.team_revisits, 2);
        assert_eq!(summary.message_total, 5);
    }

    #[test]
    fn test_collision_substitutes_target_everywhere() {
        let mut agg = TrialAggregator::new([id("00"), id("01")]);
        ingest(&mut agg, "00", EventKind::Position, (0, 0), 0.0);
        ingest(&mut agg, "01", EventKind::Clue, (3, 3), 1.0);
        ingest(&mut agg, "00", EventKind::Target, (9, 9), 2.0);

        let true_target = Cell::new(4, 4);
        let records = build_records(&agg, &ctx(TargetReport::Collision { true_target })).unwrap();

        assert_eq!(records.system.target, true_target);
        assert!(!records.system.real_target);
        assert!(records.robots.iter().all(|r| r.target == true_target));
        assert!(records.locations.iter().all(|l| l.target == true_target));
    }

    #[test]
    fn test_location_rows() {
        let mut agg = TrialAggregator::new([id("00"), id("01")]);
        ingest(&mut agg, "00", EventKind::Position, (0, 0), 0.0);
        ingest(&mut agg, "01", EventKind::Clue, (3, 3), 1.0);
        ingest(&mut agg, "00", EventKind::Clue, (5, 5), 1.5);
        ingest(&mut agg, "00", EventKind::Target, (0, 0), 2.0);

        let records = build_records(&agg, &ctx(TargetReport::Real)).unwrap();
        let kinds: Vec<_> = records
            .locations
            .iter()
            .map(|l| (l.kind, l.robot.clone(), l.location))
            .collect();

        assert_eq!(
            kinds,
            vec![
                (LocationKind::FirstClue, Some("01".to_string()), Cell::new(3, 3)),
                (LocationKind::Clue, Some("01".to_string()), Cell::new(3, 3)),
                (LocationKind::Clue, Some("00".to_string()), Cell::new(5, 5)),
                (LocationKind::PosAtFirstClue, Some("00".to_string()), Cell::new(0, 0)),
                (LocationKind::FinalPosition, Some("00".to_string()), Cell::new(0, 0)),
            ]
        );
        assert_eq!(records.robots[0].position_at_first_clue, Some(Cell::new(0, 0)));
        assert_eq!(records.robots[1].position_at_first_clue, None);
        assert_eq!(records.system.clue_locations, vec![Cell::new(3, 3), Cell::new(5, 5)]);
    }

    #[test]
    fn test_error_rate_out_of_range() {
        let mut agg = TrialAggregator::new([id("00")]);
        ingest(&mut agg, "00", EventKind::Target, (0, 0), 1.0);

        let mut bad = ctx(TargetReport::Real);
        bad.error_rate = 1.5;
        assert!(matches!(build_records(&agg, &bad), Err(TrialError::InvalidInput(_))));
    }
}
