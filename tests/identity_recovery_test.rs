// ==========================================
// 远端身份恢复集成测试
// ==========================================
// 测试范围:
// 1. 创建响应形状（标识字段、嵌套、仅回显自然键、空响应）
// 2. 待确认记录在子记录写入前解析；未命中不重复创建
// 3. 本地 id 过期后重建一次，子记录随之重放
// 4. 同一动作内第二次 NotFound 为致命错误，时段回退
// ==========================================

mod test_helpers;

use production_capture::api::{ApiError, SlotEntry};
use production_capture::domain::{DowntimeRecord, NaturalKey, RemoteIdentity, SlotStatus};
use production_capture::engine::{IdentityResolver, ResolveError};
use production_capture::remote::{RemoteError, RemoteOp, ResponseShape};
use test_helpers::{member, shift_date, TestEnv, MORNING_SHIFT_ID};

fn entry_with_downtime(output: u32) -> SlotEntry {
    SlotEntry {
        output: Some(output),
        scrap: Some(2),
        downtimes: vec![DowntimeRecord::new(15, 4, Some(9), "换模具")],
    }
}

fn key(hour_number: u32) -> NaturalKey {
    NaturalKey {
        date: shift_date(),
        shift_id: MORNING_SHIFT_ID,
        hour_number,
    }
}

// ==========================================
// 响应形状
// ==========================================

#[tokio::test]
async fn test_identifier_shapes_confirm_directly() {
    for shape in [ResponseShape::UpperCaseId, ResponseShape::NestedData] {
        let env = TestEnv::new();
        env.remote.set_response_shape(shape);
        let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

        api.open_slot(1).expect("open slot");
        let report = api.save_slot(1, entry_with_downtime(150)).await.expect("save slot");

        assert_eq!(
            api.session().slot(1).unwrap().remote_identity,
            RemoteIdentity::Confirmed(report.record_id)
        );
        // 无需按自然键回查
        assert_eq!(env.remote.call_count(RemoteOp::FindHour), 0, "shape {:?}", shape);
        assert_eq!(env.remote.downtimes_of(report.record_id).len(), 1);
    }
}

#[tokio::test]
async fn test_echoed_key_is_resolved_before_child_writes() {
    let env = TestEnv::new();
    env.remote.set_response_shape(ResponseShape::EchoKeyOnly);
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2)]).await;

    api.open_slot(1).expect("open slot");
    let report = api.save_slot(1, entry_with_downtime(150)).await.expect("save slot");

    let expected_id = env.remote.find_id_by_key(&key(1)).expect("record exists");
    assert_eq!(report.record_id, expected_id);
    assert_eq!(env.remote.call_count(RemoteOp::FindHour), 1);
    assert_eq!(
        api.session().slot(1).unwrap().remote_identity,
        RemoteIdentity::Confirmed(expected_id)
    );
    assert_eq!(env.remote.assignments_of(expected_id).len(), 2);
    assert_eq!(env.remote.downtimes_of(expected_id).len(), 1);
}

#[tokio::test]
async fn test_empty_create_response_is_invalid() {
    let env = TestEnv::new();
    env.remote.set_response_shape(ResponseShape::Empty);
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

    api.open_slot(1).expect("open slot");
    let err = api.save_slot(1, entry_with_downtime(150)).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));

    let slot = api.session().slot(1).unwrap();
    assert_eq!(slot.status, SlotStatus::NotStarted);
    assert_eq!(slot.remote_identity, RemoteIdentity::Unsaved);
    assert_eq!(env.remote.call_count(RemoteOp::CreateDowntime), 0);
}

// ==========================================
// 待确认记录
// ==========================================

#[tokio::test]
async fn test_pending_miss_keeps_pending_and_reports_not_found() {
    let env = TestEnv::new();
    let resolver = IdentityResolver::new(env.remote.as_ref());

    let mut identity = RemoteIdentity::Pending(key(3));
    let err = resolver
        .resolve_for_child_write(&mut identity, false)
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::RecordNotFound(key(3)));
    assert_eq!(identity, RemoteIdentity::Pending(key(3)));

    let api_err = ApiError::from(err);
    assert!(api_err.to_string().contains("记录未找到"));
    assert!(!api_err.is_validation());

    // 重建之后仍未命中则为致命错误
    let err = resolver
        .resolve_for_child_write(&mut identity, true)
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::StaleAfterRecreate(key(3)));
}

#[tokio::test]
async fn test_unsaved_identity_cannot_host_children() {
    let env = TestEnv::new();
    let resolver = IdentityResolver::new(env.remote.as_ref());

    let mut identity = RemoteIdentity::Unsaved;
    assert_eq!(
        resolver.resolve(&mut identity).await,
        Err(ResolveError::NotPersisted)
    );
    assert_eq!(env.remote.call_count(RemoteOp::FindHour), 0);
}

#[tokio::test]
async fn test_pending_miss_never_creates_a_second_record() {
    let env = TestEnv::new();
    env.remote.set_response_shape(ResponseShape::EchoKeyOnly);
    env.remote.set_lookup_lag(true);
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;
    api.open_slot(1).expect("open slot");

    // 创建已受理但自然键索引滞后: 子记录不写入
    let err = api.save_slot(1, entry_with_downtime(150)).await.unwrap_err();
    assert!(matches!(err, ApiError::RecordNotFound(_)));
    assert!(err.to_string().contains("记录未找到"));
    assert_eq!(
        api.session().slot(1).unwrap().remote_identity,
        RemoteIdentity::Pending(key(1))
    );
    assert_eq!(api.session().slot(1).unwrap().status, SlotStatus::InProgress);
    assert_eq!(env.remote.call_count(RemoteOp::CreateDowntime), 0);

    // 再次保存仍未命中: 放弃写入，不重复创建
    let err = api.save_slot(1, entry_with_downtime(150)).await.unwrap_err();
    assert!(matches!(err, ApiError::RecordNotFound(_)));
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour), 1);
    assert_eq!(env.remote.hour_record_count(), 1);
    let slot = api.session().slot(1).unwrap();
    assert_eq!(slot.remote_identity, RemoteIdentity::Pending(key(1)));
    assert_eq!(slot.status, SlotStatus::NotStarted);

    // 索引追上后更新原记录
    env.remote.set_lookup_lag(false);
    let report = api.save_slot(1, entry_with_downtime(152)).await.expect("retry save");
    let expected_id = env.remote.find_id_by_key(&key(1)).expect("record exists");
    assert!(!report.created);
    assert_eq!(report.record_id, expected_id);
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour), 1);
    assert_eq!(env.remote.hour_record(expected_id).unwrap().result, Some(152));
    assert_eq!(env.remote.downtimes_of(expected_id).len(), 1);
    assert_eq!(
        api.session().slot(1).unwrap().status,
        SlotStatus::Completed
    );
}

#[tokio::test]
async fn test_lookup_transport_failure_keeps_pending() {
    let env = TestEnv::new();
    env.remote.set_response_shape(ResponseShape::EchoKeyOnly);
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;
    api.open_slot(1).expect("open slot");

    env.remote
        .fail_next(RemoteOp::FindHour, RemoteError::Transport("reset".to_string()));
    let err = api.save_slot(1, entry_with_downtime(150)).await.unwrap_err();
    assert!(matches!(err, ApiError::Remote(RemoteError::Transport(_))));
    assert_eq!(
        api.session().slot(1).unwrap().remote_identity,
        RemoteIdentity::Pending(key(1))
    );
    assert_eq!(api.session().slot(1).unwrap().status, SlotStatus::InProgress);
    assert_eq!(env.remote.call_count(RemoteOp::CreateDowntime), 0);

    let report = api.save_slot(1, entry_with_downtime(150)).await.expect("retry save");
    assert!(!report.created);
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour), 1);
    assert_eq!(env.remote.downtimes_of(report.record_id).len(), 1);
}

// ==========================================
// 过期 id 重建
// ==========================================

#[tokio::test]
async fn test_stale_confirmed_id_is_recreated_once() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2)]).await;

    api.open_slot(1).expect("open slot");
    let first = api.save_slot(1, entry_with_downtime(150)).await.expect("first save");
    env.remote.drop_hour_record(first.record_id);

    let downtimes = api.session().slot(1).unwrap().downtimes.clone();
    assert!(downtimes.iter().all(|d| d.remote_id().is_some()));

    api.open_slot(1).expect("reopen slot");
    let second = api
        .save_slot(
            1,
            SlotEntry {
                output: Some(152),
                scrap: Some(2),
                downtimes,
            },
        )
        .await
        .expect("second save");

    assert!(second.created);
    assert!(second.recreated);
    assert_ne!(second.record_id, first.record_id);
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour), 2);
    assert_eq!(env.remote.call_count(RemoteOp::UpdateHour), 1);

    // 子记录在新记录下重放
    assert_eq!(env.remote.assignments_of(second.record_id).len(), 2);
    let remote_downtimes = env.remote.downtimes_of(second.record_id);
    assert_eq!(remote_downtimes.len(), 1);
    assert_eq!(second.downtime.stats.created, 1);

    let slot = api.session().slot(1).unwrap();
    assert_eq!(slot.remote_identity, RemoteIdentity::Confirmed(second.record_id));
    assert_eq!(slot.downtimes[0].remote_id(), Some(remote_downtimes[0].id));
    assert_eq!(slot.total_downtime, 15);
    assert!(second
        .notifications
        .iter()
        .any(|n| n.severity == production_capture::Severity::Warning));
}

#[tokio::test]
async fn test_second_not_found_in_same_action_is_fatal() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1)]).await;

    api.open_slot(1).expect("open slot");
    let first = api.save_slot(1, entry_with_downtime(150)).await.expect("first save");
    env.remote.drop_hour_record(first.record_id);
    env.remote.fail_next(
        RemoteOp::CreateHour,
        RemoteError::not_found("hour_record", "recreate"),
    );

    let creates_before = env.remote.call_count(RemoteOp::CreateHour);
    api.open_slot(1).expect("reopen slot");
    let err = api.save_slot(1, entry_with_downtime(150)).await.unwrap_err();

    assert!(matches!(err, ApiError::StaleAfterRecreate(_)));
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour) - creates_before, 1);

    let slot = api.session().slot(1).unwrap();
    assert_eq!(slot.status, SlotStatus::NotStarted);
    assert_eq!(slot.remote_identity, RemoteIdentity::Unsaved);
    assert_eq!(env.remote.hour_record_count(), 0);

    // 下一次保存是新的动作，可以重新创建
    let report = api.save_slot(1, entry_with_downtime(150)).await.expect("later save");
    assert!(report.created);
    assert_eq!(env.remote.hour_record_count(), 1);
}

#[tokio::test]
async fn test_unresolvable_recreate_reverts_slot() {
    let env = TestEnv::new();
    let mut api = env.started_api(MORNING_SHIFT_ID, vec![member(1), member(2)]).await;

    api.open_slot(1).expect("open slot");
    let first = api.save_slot(1, entry_with_downtime(150)).await.expect("first save");
    env.remote.drop_hour_record(first.record_id);

    // 重建只回显自然键，且回查未命中
    env.remote.set_response_shape(ResponseShape::EchoKeyOnly);
    env.remote.set_lookup_lag(true);

    api.open_slot(1).expect("reopen slot");
    api.modify_team().expect("modify team");
    api.remove_team_member(2).expect("remove member");
    api.confirm_team().expect("confirm team");

    let err = api.save_slot(1, entry_with_downtime(150)).await.unwrap_err();
    assert!(matches!(err, ApiError::StaleAfterRecreate(_)));
    assert_eq!(env.remote.call_count(RemoteOp::CreateHour), 2);
    assert_eq!(env.remote.call_count(RemoteOp::CreateDowntime), 1);

    let slot = api.session().slot(1).unwrap();
    assert_eq!(slot.status, SlotStatus::NotStarted);
    assert_eq!(slot.remote_identity, RemoteIdentity::Pending(key(1)));
    let team_ids: Vec<_> = slot.team.iter().map(|m| m.employee_id).collect();
    assert_eq!(team_ids, vec![1, 2]);
}
