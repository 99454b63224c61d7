// ==========================================
// 生产录入流程集成测试
// ==========================================
// 测试范围:
// 1. 班次设置与时段生成（含跨零点班次）
// 2. 小时类型切换与目标重算
// 3. 班组沿用与确认（保存前校验）
// 4. 时段保存: 主记录、班组分配、岗位工牌
// ==========================================

mod test_helpers;

use production_capture::api::{ApiError, SlotEntry};
use production_capture::domain::{
    DowntimeRecord, HourType, QualificationStatus, ShiftDefinition, SlotStatus, TeamRole,
    TeamState,
};
use production_capture::engine::SeedSource;
use production_capture::remote::{RemoteError, RemoteOp};
use test_helpers::{
    employee, member, setup, shift_date, TestEnv, MORNING_SHIFT_ID, NIGHT_SHIFT_ID,
};

fn entry(output: u32) -> SlotEntry {
    SlotEntry {
        output: Some(output),
        scrap: Some(0),
        downtimes: Vec::new(),
    }
}

// ==========================================
// 班次设置
// ==========================================

#[tokio::test]
async fn test_morning_shift_generates_eight_slots() {
    let env = TestEnv::new();
    let api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2)]).await;

    let session = api.session();
    assert!(session.is_setup_complete());
    assert!(session.is_team_complete());
    assert_eq!(session.slots().len(), 8);
    assert_eq!(session.total_target(), 1280);
    assert_eq!(session.slot(1).unwrap().time_range(), "06:00 - 07:00");
    assert_eq!(session.slot(8).unwrap().end_time(), "14:00");
    assert!(session
        .slots()
        .iter()
        .all(|s| s.status == SlotStatus::NotStarted && !s.remote_identity.is_confirmed()));
}

#[tokio::test]
async fn test_overnight_shift_wraps_midnight() {
    let env = TestEnv::new();
    let api = env.started_api(NIGHT_SHIFT_ID, vec![member(1)]).await;

    let slots = api.session().slots();
    assert_eq!(slots.len(), 8);
    assert_eq!(slots[0].time_range(), "22:00 - 23:00");
    assert_eq!(slots[1].time_range(), "23:00 - 00:00");
    assert_eq!(slots[2].start_time(), "00:00");
    assert_eq!(slots[7].end_time(), "06:00");
}

#[tokio::test]
async fn test_invalid_remote_shift_definition_is_rejected() {
    let env = TestEnv::new();
    let mut api = env.api();

    for (shift_id, start_hour, end_hour) in [(5, 8, 8), (6, 6, 30)] {
        env.remote.add_shift(ShiftDefinition {
            shift_id,
            name: "异常班".to_string(),
            start_hour,
            end_hour,
        });
        let result = api.start_session(setup(shift_id, 160)).await;
        assert!(matches!(result, Err(ApiError::Domain(_))), "shift {}", shift_id);
    }
    assert!(!api.session().is_setup_complete());
    assert!(api.session().slots().is_empty());
}

#[tokio::test]
async fn test_unknown_shift_or_project_is_rejected() {
    let env = TestEnv::new();
    let mut api = env.api();

    let result = api.start_session(setup(99, 160)).await;
    assert!(matches!(result, Err(ApiError::ReferenceNotFound(_))));

    env.remote.remove_project(test_helpers::PROJECT_ID);
    let result = api.start_session(setup(MORNING_SHIFT_ID, 160)).await;
    assert!(matches!(result, Err(ApiError::ReferenceNotFound(_))));
    assert!(!api.session().is_setup_complete());
}

#[tokio::test]
async fn test_open_slot_requires_session() {
    let env = TestEnv::new();
    let mut api = env.api();
    assert!(matches!(api.open_slot(1), Err(ApiError::SessionNotStarted)));
}

// ==========================================
// 小时类型
// ==========================================

#[tokio::test]
async fn test_setup_hour_halves_target() {
    let env = TestEnv::new();
    let mut api = env.api();
    api.start_session(setup(MORNING_SHIFT_ID, 120))
        .await
        .expect("start session");

    let slot = api
        .set_hour_type(1, HourType::Setup)
        .await
        .expect("set hour type");
    assert_eq!(slot.target, 60);

    let slot = api
        .set_hour_type(2, HourType::Break)
        .await
        .expect("set hour type");
    assert_eq!(slot.target, 0);
    assert_eq!(api.session().total_target(), 780);

    assert!(matches!(
        api.set_hour_type(42, HourType::Normal).await,
        Err(ApiError::SlotNotFound(42))
    ));
}

// ==========================================
// 保存
// ==========================================

#[tokio::test]
async fn test_save_first_slot_computes_efficiency() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2)]).await;

    let editor = api.open_slot(1).expect("open slot");
    assert_eq!(editor.state(), TeamState::AutoConfirmed);
    assert_eq!(editor.source(), SeedSource::ShiftTeam);

    let report = api.save_slot(1, entry(150)).await.expect("save slot");
    assert!(report.created);
    assert!(!report.recreated);
    assert_eq!(report.team_assigned, 2);
    assert_eq!(report.team_failed, 0);

    let slot = api.session().slot(1).unwrap();
    assert_eq!(slot.status, SlotStatus::Completed);
    assert_eq!(slot.efficiency, Some(94));
    assert_eq!(slot.scrap_rate, Some(0.0));
    assert_eq!(slot.remote_identity.confirmed_id(), Some(report.record_id));
    assert_eq!(api.session().shift_efficiency(), Some(94));
    assert!(api.team_editor().is_none());

    let record = env.remote.hour_record(report.record_id).expect("remote record");
    assert_eq!(record.result, Some(150));
    assert_eq!(record.target, 160);
    assert_eq!(record.headcount, 2);
    assert_eq!(record.hour_type_code, "NORMAL");
    assert_eq!(record.date, shift_date());
    assert_eq!(env.remote.assignments_of(report.record_id).len(), 2);
}

#[tokio::test]
async fn test_team_carries_forward_from_nearest_saved_slot() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2)]).await;

    api.open_slot(1).expect("open slot 1");
    api.modify_team().expect("modify");
    api.add_team_member(member(3)).expect("add member");
    api.confirm_team().expect("confirm");
    api.save_slot(1, entry(140)).await.expect("save slot 1");

    let editor = api.open_slot(3).expect("open slot 3");
    assert_eq!(editor.source(), SeedSource::CarriedFrom(1));
    assert_eq!(editor.state(), TeamState::AutoConfirmed);
    let ids: Vec<_> = editor.members().iter().map(|m| m.employee_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_later_slot_seeded_from_shift_team_needs_confirmation() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2)]).await;

    let editor = api.open_slot(2).expect("open slot 2");
    assert_eq!(editor.source(), SeedSource::ShiftTeam);
    assert_eq!(editor.state(), TeamState::NeedsConfirmation);
    assert_eq!(editor.members().len(), 2);

    let result = api.save_slot(2, entry(100)).await;
    assert!(matches!(result, Err(ApiError::TeamNotConfirmed(2))));

    api.accept_team().expect("accept");
    let report = api.save_slot(2, entry(100)).await.expect("save slot 2");
    assert_eq!(report.team_assigned, 2);
}

#[tokio::test]
async fn test_unconfirmed_team_blocks_save_without_remote_calls() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

    api.open_slot(1).expect("open slot");
    api.modify_team().expect("modify");

    let err = api.save_slot(1, entry(150)).await.unwrap_err();
    assert!(matches!(err, ApiError::TeamNotConfirmed(1)));
    assert!(err.is_validation());
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour), 0);
    assert_eq!(env.remote.call_count(RemoteOp::UpdateHour), 0);

    let slot = api.session().slot(1).unwrap();
    assert_eq!(slot.status, SlotStatus::NotStarted);
    assert_eq!(slot.output, None);
}

#[tokio::test]
async fn test_empty_team_blocks_save() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, Vec::new()).await;
    assert!(!api.session().is_team_complete());

    let editor = api.open_slot(1).expect("open slot");
    assert_eq!(editor.source(), SeedSource::Empty);
    api.confirm_team().expect("confirm");

    let err = api.save_slot(1, entry(150)).await.unwrap_err();
    assert!(matches!(err, ApiError::NoTeamAssigned(1)));
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour), 0);
}

#[tokio::test]
async fn test_save_requires_matching_open_slot() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

    assert!(matches!(
        api.save_slot(1, entry(10)).await,
        Err(ApiError::NoSlotOpen)
    ));
    api.open_slot(1).expect("open slot");
    assert!(matches!(
        api.save_slot(2, entry(10)).await,
        Err(ApiError::NoSlotOpen)
    ));
}

#[tokio::test]
async fn test_invalid_downtime_blocks_save() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;
    api.open_slot(1).expect("open slot");

    let entry = SlotEntry {
        output: Some(100),
        scrap: None,
        downtimes: vec![
            DowntimeRecord::new(0, 3, None, "jam"),
            DowntimeRecord::new(10, 3, None, "   "),
        ],
    };
    let err = api.save_slot(1, entry).await.unwrap_err();
    match err {
        ApiError::DowntimeValidation(violations) => assert_eq!(violations.len(), 2),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour), 0);
    assert_eq!(env.remote.call_count(RemoteOp::CreateDowntime), 0);
}

#[tokio::test]
async fn test_primary_failure_reverts_slot() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;
    api.open_slot(1).expect("open slot");

    env.remote
        .fail_next(RemoteOp::CreateHour, RemoteError::Transport("timeout".to_string()));
    let err = api.save_slot(1, entry(150)).await.unwrap_err();
    assert!(matches!(err, ApiError::Remote(RemoteError::Transport(_))));

    let slot = api.session().slot(1).unwrap();
    assert_eq!(slot.status, SlotStatus::NotStarted);
    assert!(slot.team.is_empty());
    assert_eq!(env.remote.hour_record_count(), 0);

    // 编辑器保留，可直接重试
    let report = api.save_slot(1, entry(150)).await.expect("retry save");
    assert!(report.created);
    assert_eq!(env.remote.hour_record_count(), 1);
}

#[tokio::test]
async fn test_resave_skips_existing_assignments() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2)]).await;

    api.open_slot(1).expect("open slot");
    let first = api.save_slot(1, entry(150)).await.expect("first save");

    let editor = api.open_slot(1).expect("reopen slot");
    assert_eq!(editor.source(), SeedSource::SavedOnSlot);
    let second = api.save_slot(1, entry(155)).await.expect("second save");

    assert!(!second.created);
    assert_eq!(second.record_id, first.record_id);
    assert_eq!(second.team_assigned, 0);
    assert_eq!(second.team_skipped, 2);
    assert_eq!(env.remote.assignments_of(first.record_id).len(), 2);
    assert_eq!(env.remote.call_count(RemoteOp::UpdateHour), 1);
    assert_eq!(
        env.remote.hour_record(first.record_id).unwrap().result,
        Some(155)
    );
}

#[tokio::test]
async fn test_failed_assignment_is_reported_not_fatal() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2), member(3)]).await;
    api.open_slot(1).expect("open slot");

    env.remote.fail_next(
        RemoteOp::CreateTeamAssignment,
        RemoteError::Rejected {
            status: 500,
            message: "busy".to_string(),
        },
    );
    let report = api.save_slot(1, entry(150)).await.expect("save slot");
    assert_eq!(report.team_assigned, 2);
    assert_eq!(report.team_failed, 1);
    assert_eq!(report.notifications.len(), 2);
    assert_eq!(
        api.session().slot(1).unwrap().status,
        SlotStatus::Completed
    );
}

// ==========================================
// 岗位与表单
// ==========================================

#[tokio::test]
async fn test_actor_badges_flow_into_hour_record() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

    let actor = api
        .assign_actor(TeamRole::LineLeader, " E002 ")
        .await
        .expect("assign line leader");
    assert_eq!(actor.employee_id, 2);
    assert_eq!(actor.qualification, QualificationStatus::Missing);
    api.assign_actor(TeamRole::Pqc, "E003").await.expect("assign pqc");
    api.set_order_number(Some("  ORD-778 ".to_string()))
        .expect("set order");

    api.open_slot(1).expect("open slot");
    let report = api.save_slot(1, entry(150)).await.expect("save slot");

    let record = env.remote.hour_record(report.record_id).unwrap();
    assert_eq!(record.line_leader_badge.as_deref(), Some("E002"));
    assert_eq!(record.pqc_badge.as_deref(), Some("E003"));
    assert_eq!(record.quality_agent_badge, None);
    assert_eq!(record.order_number.as_deref(), Some("ORD-778"));
}

#[tokio::test]
async fn test_unknown_badge_and_operator_role() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

    let err = api
        .assign_actor(TeamRole::QualityAgent, "NOPE")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::EmployeeNotFound(ref badge) if badge == "NOPE"));
    assert!(api.session().actors().quality_agent.is_none());

    assert!(matches!(
        api.assign_actor(TeamRole::Operator, "E001").await,
        Err(ApiError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_lookup_team_member_derives_qualification() {
    let env = TestEnv::new();
    env.remote.add_employee(employee(
        7,
        "E007",
        chrono::NaiveDate::from_ymd_opt(2026, 1, 31),
    ));
    env.remote.add_employee(employee(
        8,
        "E008",
        chrono::NaiveDate::from_ymd_opt(2027, 1, 31),
    ));
    let api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

    let expired = api
        .lookup_team_member("E007", Some(12), Some(5))
        .await
        .expect("lookup");
    assert_eq!(expired.qualification, QualificationStatus::Expired);
    assert_eq!(expired.workstation_id, Some(12));
    assert_eq!(expired.machine_id, Some(5));
    assert_eq!(expired.role, TeamRole::Operator);

    let valid = api.lookup_team_member("E008", None, None).await.expect("lookup");
    assert_eq!(valid.qualification, QualificationStatus::Valid);
    assert_eq!(valid.name, "Test Employee8");
}

#[tokio::test]
async fn test_form_values_are_mirrored() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

    api.set_order_number(Some("ORD-1".to_string())).expect("set order");
    api.set_comment(Some(" 换线后首检 ".to_string())).expect("set comment");
    let stored = env
        .state
        .snapshot_repo
        .load_snapshot()
        .expect("load snapshot")
        .expect("snapshot exists");
    assert_eq!(stored.form_values.order_number.as_deref(), Some("ORD-1"));
    assert_eq!(stored.form_values.comment.as_deref(), Some("换线后首检"));
    assert_eq!(stored.session.session_id(), api.session().session_id());

    api.set_order_number(Some("   ".to_string())).expect("clear order");
    assert_eq!(api.form_values().order_number, None);
    assert_eq!(api.form_values().comment.as_deref(), Some("换线后首检"));

    // 重启后表单随会话恢复
    drop(api);
    let mut restored = env.api();
    restored.restore().await.expect("restore");
    assert_eq!(restored.form_values().comment.as_deref(), Some("换线后首检"));
    assert_eq!(restored.form_values().order_number, None);
}

#[tokio::test]
async fn test_shift_team_is_deduplicated() {
    let env = TestEnv::new();
    let mut api = env.api();
    api.set_shift_team(vec![member(1), member(2), member(1)])
        .expect("set shift team");
    assert_eq!(api.session().shift_team().len(), 2);
}
