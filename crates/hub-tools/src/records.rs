//! # 试验记录格式
//!
//! 每次试验向三个 CSV 文件追加记录（每个算法一组文件）：
//!
//! | 文件 | 每次试验的行数 |
//! |------|----------------|
//! | `<ALG>_sys.csv` | 1（系统级汇总） |
//! | `<ALG>_robots.csv` | 每个机器人 1 行 |
//! | `<ALG>_locations.csv` | 每个空间事件 1 行 |
//!
//! 字段声明顺序即列顺序。坐标写作 `x/y`，坐标列表写作 `[(x,y),...]`，
//! 标志写作 `y`/`n`，时间保留 6 位小数。

use anyhow::{Context, Result};
use hub_protocol::{Cell, format_cell_list};
use serde::{Serialize, Serializer};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 系统级汇总行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemRecord {
    #[serde(rename = "alg")]
    pub algorithm: String,
    #[serde(rename = "tgt", serialize_with = "ser_cell")]
    pub target: Cell,
    #[serde(rename = "err")]
    pub error_rate: f64,
    #[serde(rename = "cf", serialize_with = "ser_flag")]
    pub clue_found: bool,
    #[serde(rename = "st")]
    pub steps_total: u64,
    #[serde(rename = "tt", serialize_with = "ser_time")]
    pub total_time: f64,
    #[serde(rename = "stbc")]
    pub steps_before_clue: u64,
    #[serde(rename = "tbc", serialize_with = "ser_time")]
    pub time_before_clue: f64,
    #[serde(rename = "stac")]
    pub steps_after_clue: u64,
    #[serde(rename = "tac", serialize_with = "ser_time")]
    pub time_after_clue: f64,
    #[serde(rename = "uc")]
    pub unique_cells: u64,
    #[serde(rename = "rv")]
    pub revisits: u64,
    #[serde(rename = "cl", serialize_with = "ser_cells")]
    pub clue_locations: Vec<Cell>,
    #[serde(rename = "msg")]
    pub messages_total: u64,
    /// 按事件码 1..=6 的消息计数
    pub m1: u64,
    pub m2: u64,
    pub m3: u64,
    pub m4: u64,
    pub m5: u64,
    pub m6: u64,
    #[serde(rename = "real", serialize_with = "ser_flag")]
    pub real_target: bool,
}

/// 单机器人行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotRecord {
    #[serde(rename = "alg")]
    pub algorithm: String,
    #[serde(rename = "tgt", serialize_with = "ser_cell")]
    pub target: Cell,
    #[serde(rename = "err")]
    pub error_rate: f64,
    #[serde(rename = "rid")]
    pub robot: String,
    #[serde(rename = "st")]
    pub steps_total: u64,
    #[serde(rename = "stbc")]
    pub steps_before_clue: u64,
    #[serde(rename = "stac")]
    pub steps_after_clue: u64,
    #[serde(rename = "uc")]
    pub unique_cells: u64,
    #[serde(rename = "rv")]
    pub revisits: u64,
    #[serde(rename = "cl", serialize_with = "ser_cells")]
    pub clues: Vec<Cell>,
    /// 首个线索出现时该机器人的位置（尚无位置时为空）
    #[serde(rename = "pfc", serialize_with = "ser_opt_cell")]
    pub position_at_first_clue: Option<Cell>,
    #[serde(rename = "tf", serialize_with = "ser_flag")]
    pub found_target: bool,
    #[serde(rename = "msg")]
    pub messages_total: u64,
    /// 按事件码 1..=6 的消息计数
    pub m1: u64,
    pub m2: u64,
    pub m3: u64,
    pub m4: u64,
    pub m5: u64,
    pub m6: u64,
}

/// 空间事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    FirstClue,
    Clue,
    PosAtFirstClue,
    FinalPosition,
}

/// 空间事件行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    #[serde(rename = "alg")]
    pub algorithm: String,
    #[serde(rename = "tgt", serialize_with = "ser_cell")]
    pub target: Cell,
    #[serde(rename = "err")]
    pub error_rate: f64,
    #[serde(rename = "type")]
    pub kind: LocationKind,
    #[serde(rename = "rid")]
    pub robot: Option<String>,
    #[serde(rename = "loc", serialize_with = "ser_cell")]
    pub location: Cell,
}

/// 一次试验的全部记录
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecords {
    pub system: SystemRecord,
    pub robots: Vec<RobotRecord>,
    pub locations: Vec<LocationRecord>,
}

/// 一个算法对应的输出文件组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialFiles {
    pub system: PathBuf,
    pub robots: PathBuf,
    pub locations: PathBuf,
}

impl TrialFiles {
    /// `<out_dir>/<ALG>_sys.csv` 等
    pub fn for_algorithm(out_dir: impl AsRef<Path>, algorithm: &str) -> Self {
        let dir = out_dir.as_ref();
        Self {
            system: dir.join(format!("{}_sys.csv", algorithm)),
            robots: dir.join(format!("{}_robots.csv", algorithm)),
            locations: dir.join(format!("{}_locations.csv", algorithm)),
        }
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.system, &self.robots, &self.locations]
    }
}

/// 写入一次试验
///
/// 全有或全无：
/// 1. 三个文件的内容全部先序列化到内存
/// 2. 三个文件全部打开成功后才开始写入，并记录各自写入前的长度
/// 3. 任何一步失败，已打开的文件恢复原状（新建的删除，已有的截断回原长度）
pub fn write_trial(files: &TrialFiles, records: &TrialRecords) -> Result<()> {
    let contents = [
        encode_rows(&files.system, std::slice::from_ref(&records.system))?,
        encode_rows(&files.robots, &records.robots)?,
        encode_rows(&files.locations, &records.locations)?,
    ];

    let mut pending = Vec::with_capacity(contents.len());
    for path in files.paths() {
        match PendingAppend::open(path) {
            Ok(target) => pending.push(target),
            Err(e) => {
                pending.into_iter().for_each(PendingAppend::rollback);
                return Err(e);
            },
        }
    }

    let mut failure = None;
    for (target, bytes) in pending.iter_mut().zip(&contents) {
        if let Err(e) = target.file.write_all(bytes).and_then(|()| target.file.flush()) {
            failure = Some((target.path, e));
            break;
        }
    }

    if let Some((path, e)) = failure {
        pending.into_iter().for_each(PendingAppend::rollback);
        return Err(e).with_context(|| format!("写入记录失败: {}", path.display()));
    }

    for (target, bytes) in pending.iter().zip(&contents) {
        debug!("Appended {} bytes to {}", bytes.len(), target.path.display());
    }
    Ok(())
}

/// 已打开、尚未提交的追加目标
struct PendingAppend<'a> {
    path: &'a Path,
    file: File,
    /// 打开前文件是否已存在
    existed: bool,
    /// 写入前的长度（回滚点）
    original_len: u64,
}

impl<'a> PendingAppend<'a> {
    fn open(path: &'a Path) -> Result<Self> {
        ensure_parent_dir(path)?;
        let existed = path.exists();
        let file = open_append(path)?;
        let original_len = file
            .metadata()
            .with_context(|| format!("读取文件信息失败: {}", path.display()))?
            .len();

        Ok(Self {
            path,
            file,
            existed,
            original_len,
        })
    }

    fn rollback(self) {
        let result = if self.existed {
            self.file.set_len(self.original_len)
        } else {
            drop(self.file);
            fs::remove_file(self.path)
        };

        if let Err(e) = result {
            warn!("Failed to roll back {}: {}", self.path.display(), e);
        }
    }
}

/// 追加记录到 CSV，文件不存在或为空时先写表头
pub fn append_records<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_rows(path, rows)?;

    ensure_parent_dir(path)?;
    let mut file = open_append(path)?;
    file.write_all(&bytes).context("写入记录失败")?;
    file.flush().context("刷新文件失败")?;

    debug!("Appended {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

fn needs_header(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

fn encode_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header(path))
        .from_writer(Vec::new());

    for row in rows {
        writer.serialize(row).with_context(|| format!("序列化记录失败: {}", path.display()))?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("刷新 CSV 缓冲区失败: {}", e.error()))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context("创建输出目录失败")?;
    }
    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开输出文件失败: {}", path.display()))
}

fn ser_cell<S: Serializer>(cell: &Cell, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(cell)
}

fn ser_opt_cell<S: Serializer>(cell: &Option<Cell>, s: S) -> Result<S::Ok, S::Error> {
    match cell {
        Some(cell) => s.collect_str(cell),
        None => s.serialize_str(""),
    }
}

fn ser_cells<S: Serializer>(cells: &[Cell], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_cell_list(cells))
}

fn ser_flag<S: Serializer>(flag: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(if *flag { "y" } else { "n" })
}

fn ser_time<S: Serializer>(t: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((t * 1e6).round() / 1e6)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_record() -> SystemRecord {
        SystemRecord {
            algorithm: "VP".to_string(),
            target: Cell::new(0, 2),
            error_rate: 0.15,
            clue_found: true,
            steps_total: 2,
            total_time: 10.0,
            steps_before_clue: 1,
            time_before_clue: 3.123_456_789,
            steps_after_clue: 1,
            time_after_clue: 7.0,
            unique_cells: 4,
            revisits: 0,
            clue_locations: vec![Cell::new(3, 3), Cell::new(-1, 4)],
            messages_total: 6,
            m1: 4,
            m2: 0,
            m3: 0,
            m4: 1,
            m5: 1,
            m6: 0,
            real_target: true,
        }
    }

    fn location_record(kind: LocationKind, robot: Option<&str>) -> LocationRecord {
        LocationRecord {
            algorithm: "VP".to_string(),
            target: Cell::new(0, 2),
            error_rate: 0.15,
            kind,
            robot: robot.map(str::to_string),
            location: Cell::new(3, 3),
        }
    }

    #[test]
    fn test_system_header_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VP_sys.csv");

        append_records(&path, &[system_record()]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "alg,tgt,err,cf,st,tt,stbc,tbc,stac,tac,uc,rv,cl,msg,m1,m2,m3,m4,m5,m6,real"
        );
        assert_eq!(
            lines.next().unwrap(),
            "VP,0/2,0.15,y,2,10.0,1,3.123457,1,7.0,4,0,\"[(3,3),(-1,4)]\",6,4,0,0,1,1,0,y"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VP_sys.csv");

        append_records(&path, &[system_record()]).unwrap();
        append_records(&path, &[system_record()]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(content.lines().filter(|l| l.starts_with("alg,")).count(), 1);
    }

    #[test]
    fn test_header_written_for_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VP_sys.csv");
        fs::write(&path, "").unwrap();

        append_records(&path, &[system_record()]).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("alg,tgt,"));
    }

    #[test]
    fn test_location_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VP_locations.csv");

        append_records(
            &path,
            &[
                location_record(LocationKind::FirstClue, None),
                location_record(LocationKind::PosAtFirstClue, Some("01")),
            ],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "alg,tgt,err,type,rid,loc");
        assert_eq!(lines[1], "VP,0/2,0.15,first_clue,,3/3");
        assert_eq!(lines[2], "VP,0/2,0.15,pos_at_first_clue,01,3/3");
    }

    #[test]
    fn test_robot_row_empty_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VP_robots.csv");
        let row = RobotRecord {
            algorithm: "VP".to_string(),
            target: Cell::new(0, 2),
            error_rate: 0.0,
            robot: "03".to_string(),
            steps_total: 0,
            steps_before_clue: 0,
            steps_after_clue: 0,
            unique_cells: 0,
            revisits: 0,
            clues: vec![],
            position_at_first_clue: None,
            found_target: false,
            messages_total: 0,
            m1: 0,
            m2: 0,
            m3: 0,
            m4: 0,
            m5: 0,
            m6: 0,
        };

        append_records(&path, &[row]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "alg,tgt,err,rid,st,stbc,stac,uc,rv,cl,pfc,tf,msg,m1,m2,m3,m4,m5,m6"
        );
        assert_eq!(lines[1], "VP,0/2,0.0,03,0,0,0,0,0,[],,n,0,0,0,0,0,0,0");
    }

    #[test]
    fn test_write_trial_creates_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = TrialFiles::for_algorithm(dir.path().join("hub_logs"), "VP");
        let records = TrialRecords {
            system: system_record(),
            robots: vec![],
            locations: vec![location_record(LocationKind::Clue, Some("01"))],
        };

        write_trial(&files, &records).unwrap();

        for path in files.paths() {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert!(files.system.ends_with("VP_sys.csv"));
        assert!(files.robots.ends_with("VP_robots.csv"));
        assert!(files.locations.ends_with("VP_locations.csv"));
    }

    fn small_trial() -> TrialRecords {
        TrialRecords {
            system: system_record(),
            robots: vec![],
            locations: vec![location_record(LocationKind::Clue, Some("01"))],
        }
    }

    #[test]
    fn test_write_trial_leaves_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = TrialFiles::for_algorithm(dir.path(), "VP");
        // 位置文件路径被目录占用，无法打开
        fs::create_dir_all(&files.locations).unwrap();

        assert!(write_trial(&files, &small_trial()).is_err());
        assert!(!files.system.exists());
        assert!(!files.robots.exists());
    }

    #[test]
    fn test_write_trial_failure_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let files = TrialFiles::for_algorithm(dir.path(), "VP");
        write_trial(&files, &small_trial()).unwrap();

        let system_before = fs::read_to_string(&files.system).unwrap();
        let robots_before = fs::read_to_string(&files.robots).unwrap();

        fs::remove_file(&files.locations).unwrap();
        fs::create_dir_all(&files.locations).unwrap();

        assert!(write_trial(&files, &small_trial()).is_err());
        assert_eq!(fs::read_to_string(&files.system).unwrap(), system_before);
        assert_eq!(fs::read_to_string(&files.robots).unwrap(), robots_before);
    }
}
