// ==========================================
// 班次生产数据采集 - 诊断入口
// ==========================================
// 用法:
//   production-capture               输出本地会话快照与配置状态
//   production-capture --self-check  在内存库与进程内远端上跑一遍录入流程
//   production-capture --json-log    以 JSON 格式输出日志
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use production_capture::api::{ShiftSetup, SlotEntry};
use production_capture::app::{get_default_db_path, AppState};
use production_capture::domain::{LocationRef, Part, ShiftDefinition, TeamMember};
use production_capture::remote::InMemoryRemoteStore;
use production_capture::{logging, APP_NAME, VERSION};

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--json-log") {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("==================================================");
    tracing::info!("{}", APP_NAME);
    tracing::info!("系统版本: {}", VERSION);
    tracing::info!("==================================================");

    let self_check = std::env::args().any(|arg| arg == "--self-check");
    let result = if self_check {
        run_self_check().await
    } else {
        report_local_state()
    };

    if let Err(e) = result {
        tracing::error!("诊断失败: {}", e);
        std::process::exit(1);
    }
}

/// 输出本地会话快照状态
fn report_local_state() -> Result<(), String> {
    let db_path = get_default_db_path();
    let state = AppState::new(db_path)?;

    match state.config.get_config_snapshot() {
        Ok(snapshot) => tracing::info!(config = %snapshot, "当前配置"),
        Err(e) => tracing::warn!("读取配置快照失败: {}", e),
    }

    match state.snapshot_repo.load_snapshot() {
        Ok(Some(snapshot)) => {
            let session = &snapshot.session;
            let completed = session
                .slots()
                .iter()
                .filter(|s| s.status == production_capture::domain::SlotStatus::Completed)
                .count();
            tracing::info!(
                session_id = session.session_id(),
                age_minutes = (Utc::now() - snapshot.timestamp).num_minutes(),
                slots = session.slots().len(),
                completed,
                total_output = session.total_output(),
                total_target = session.total_target(),
                efficiency = ?session.shift_efficiency(),
                "本地会话快照"
            );
        }
        Ok(None) => tracing::info!("无本地会话快照"),
        Err(e) => tracing::warn!("本地会话快照不可读: {}", e),
    }

    Ok(())
}

/// 进程内自检：开班、确认班组、保存第 1 小时
async fn run_self_check() -> Result<(), String> {
    let state = AppState::new(":memory:".to_string())?;

    let remote = Arc::new(InMemoryRemoteStore::new());
    let shift = ShiftDefinition::new(1, "早班", 6, 14).map_err(|e| e.to_string())?;
    remote.add_shift(shift);
    remote.add_project(1);

    let mut api = state.production_api(remote.clone());
    api.start_session(ShiftSetup {
        shift_id: 1,
        date: Utc::now().date_naive(),
        project_id: 1,
        location: LocationRef::Line(1),
        part: Part {
            part_id: 1,
            part_number: "SELF-CHECK".to_string(),
            target_per_hour: 160,
            scrap_target_per_hour: 2,
        },
        zone_id: None,
    })
    .await
    .map_err(|e| e.to_string())?;

    api.set_shift_team(vec![TeamMember {
        employee_id: 1,
        badge: "0001".to_string(),
        name: "Self Check".to_string(),
        workstation_id: None,
        machine_id: None,
        qualification: Default::default(),
        role: Default::default(),
    }])
    .map_err(|e| e.to_string())?;

    api.open_slot(1).map_err(|e| e.to_string())?;
    let report = api
        .save_slot(
            1,
            SlotEntry {
                output: Some(150),
                scrap: Some(1),
                downtimes: Vec::new(),
            },
        )
        .await
        .map_err(|e| e.to_string())?;

    tracing::info!(
        record_id = report.record_id,
        team_assigned = report.team_assigned,
        efficiency = ?api.session().slot(1).and_then(|s| s.efficiency),
        remote_records = remote.hour_record_count(),
        "自检完成"
    );
    Ok(())
}
