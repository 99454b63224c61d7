// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时本地库、预置远端主数据、班次/零件/成员构造
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use chrono::NaiveDate;
use production_capture::api::{ProductionApi, ShiftSetup};
use production_capture::app::AppState;
use production_capture::config::CaptureConfigReader;
use production_capture::db::{init_local_schema, open_sqlite_connection};
use production_capture::domain::{LocationRef, Part, ShiftDefinition, TeamMember};
use production_capture::logging;
use production_capture::remote::{EmployeeRecord, InMemoryRemoteStore};
use rusqlite::Connection;
use tempfile::NamedTempFile;

/// 早班（06:00 - 14:00）
pub const MORNING_SHIFT_ID: i64 = 1;
/// 夜班（22:00 - 06:00）
pub const NIGHT_SHIFT_ID: i64 = 2;
pub const PROJECT_ID: i64 = 10;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_local_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(open_sqlite_connection(db_path)?)
}

/// 写入一条 global 配置
pub fn insert_test_config(conn: &Connection, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    conn.execute(
        "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
         ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

// ==========================================
// 领域数据
// ==========================================

pub fn shift_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
}

pub fn part(target_per_hour: u32) -> Part {
    Part {
        part_id: 7,
        part_number: "BRK-4410".to_string(),
        target_per_hour,
        scrap_target_per_hour: 2,
    }
}

pub fn setup(shift_id: i64, target_per_hour: u32) -> ShiftSetup {
    ShiftSetup {
        shift_id,
        date: shift_date(),
        project_id: PROJECT_ID,
        location: LocationRef::Line(3),
        part: part(target_per_hour),
        zone_id: Some(4),
    }
}

pub fn member(employee_id: i64) -> TeamMember {
    TeamMember {
        employee_id,
        badge: format!("E{:03}", employee_id),
        name: format!("Operator {}", employee_id),
        workstation_id: Some(100 + employee_id),
        machine_id: None,
        qualification: Default::default(),
        role: Default::default(),
    }
}

pub fn employee(employee_id: i64, badge: &str, valid_until: Option<NaiveDate>) -> EmployeeRecord {
    EmployeeRecord {
        employee_id,
        badge: badge.to_string(),
        first_name: "Test".to_string(),
        last_name: format!("Employee{}", employee_id),
        qualification_valid_until: valid_until,
    }
}

/// 预置班次、项目、员工的进程内远端
pub fn seeded_remote() -> Arc<InMemoryRemoteStore> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.add_shift(ShiftDefinition::new(MORNING_SHIFT_ID, "早班", 6, 14).unwrap());
    remote.add_shift(ShiftDefinition::new(NIGHT_SHIFT_ID, "夜班", 22, 6).unwrap());
    remote.add_project(PROJECT_ID);
    for id in 1..=4 {
        remote.add_employee(employee(id, &format!("E{:03}", id), None));
    }
    remote
}

// ==========================================
// TestEnv - 临时库 + 进程内远端
// ==========================================
pub struct TestEnv {
    _temp_file: NamedTempFile,
    pub db_path: String,
    pub state: AppState,
    pub remote: Arc<InMemoryRemoteStore>,
}

impl TestEnv {
    pub fn new() -> Self {
        logging::init_test();
        let (temp_file, db_path) = create_test_db().expect("Failed to create test db");
        let state = AppState::new(db_path.clone()).expect("Failed to create AppState");
        Self {
            _temp_file: temp_file,
            db_path,
            state,
            remote: seeded_remote(),
        }
    }

    /// 新的 API 实例（模拟进程重启后的同一本地库）
    pub fn api(&self) -> ProductionApi<InMemoryRemoteStore> {
        self.state.production_api(self.remote.clone())
    }

    /// 使用指定配置读取器的 API 实例
    pub fn api_with_config(&self, config: Arc<dyn CaptureConfigReader>) -> ProductionApi<InMemoryRemoteStore> {
        ProductionApi::new(self.remote.clone(), self.state.snapshot_repo.clone(), config)
    }

    /// 开班并设置班次班组
    pub async fn started_api(&self, shift_id: i64, team: Vec<TeamMember>) -> ProductionApi<InMemoryRemoteStore> {
        let mut api = self.api();
        api.set_shift_team(team).expect("Failed to set shift team");
        api.start_session(setup(shift_id, 160))
            .await
            .expect("Failed to start session");
        api
    }
}
