// ==========================================
// 班次生产数据采集 - 进程内远端存储
// ==========================================
// 职责: RemoteStore 的完整进程内实现
// 用途: 集成测试、离线自检；支持响应形状切换与故障注入
// ==========================================

use super::{
    DowntimePayload, EmployeeRecord, HourRecordPayload, RemoteDowntime, RemoteError,
    RemoteResult, RemoteStore, TeamAssignmentPayload, TeamAssignmentRecord,
};
use crate::domain::shift::ShiftDefinition;
use crate::domain::slot::NaturalKey;
use crate::domain::types::RecordId;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// 远端操作（用于调用计数与故障注入）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CreateHour,
    UpdateHour,
    FindHour,
    FetchDowntimes,
    CreateDowntime,
    UpdateDowntime,
    DeleteDowntime,
    CreateTeamAssignment,
    FetchTeamAssignments,
    FindEmployee,
    FetchShift,
    ProjectExists,
}

/// 小时记录创建响应形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// {"id": 1, ...}
    PlainId,
    /// {"ID": "1"}
    UpperCaseId,
    /// {"data": {"recordId": 1}}
    NestedData,
    /// 只回显自然键，不含标识
    EchoKeyOnly,
    /// {}
    Empty,
}

#[derive(Debug)]
struct State {
    next_id: RecordId,
    hour_records: BTreeMap<RecordId, HourRecordPayload>,
    downtimes: BTreeMap<RecordId, RemoteDowntime>,
    assignments: BTreeMap<RecordId, TeamAssignmentRecord>,
    employees: HashMap<String, EmployeeRecord>,
    shifts: HashMap<RecordId, ShiftDefinition>,
    projects: HashSet<RecordId>,
    shape: ResponseShape,
    /// 自然键索引滞后: 查询一律未命中
    lookup_lag: bool,
    failures: HashMap<RemoteOp, VecDeque<RemoteError>>,
    calls: HashMap<RemoteOp, usize>,
}

impl State {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }

    fn find_by_key(&self, key: &NaturalKey) -> Option<(RecordId, &HourRecordPayload)> {
        self.hour_records
            .iter()
            .find(|(_, r)| r.natural_key() == *key)
            .map(|(id, r)| (*id, r))
    }
}

// ==========================================
// InMemoryRemoteStore
// ==========================================
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    state: Mutex<State>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1000,
                hour_records: BTreeMap::new(),
                downtimes: BTreeMap::new(),
                assignments: BTreeMap::new(),
                employees: HashMap::new(),
                shifts: HashMap::new(),
                projects: HashSet::new(),
                shape: ResponseShape::PlainId,
                lookup_lag: false,
                failures: HashMap::new(),
                calls: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> RemoteResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| RemoteError::Transport(format!("锁获取失败: {}", e)))
    }

    /// 记录调用并弹出注入的故障
    fn enter(&self, op: RemoteOp) -> RemoteResult<MutexGuard<'_, State>> {
        let mut state = self.lock()?;
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(err) = state.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            tracing::debug!(?op, error = %err, "注入远端故障");
            return Err(err);
        }
        Ok(state)
    }

    // ===== 主数据准备 =====

    pub fn add_shift(&self, shift: ShiftDefinition) {
        if let Ok(mut state) = self.lock() {
            state.shifts.insert(shift.shift_id, shift);
        }
    }

    pub fn remove_shift(&self, shift_id: RecordId) {
        if let Ok(mut state) = self.lock() {
            state.shifts.remove(&shift_id);
        }
    }

    pub fn add_project(&self, project_id: RecordId) {
        if let Ok(mut state) = self.lock() {
            state.projects.insert(project_id);
        }
    }

    pub fn remove_project(&self, project_id: RecordId) {
        if let Ok(mut state) = self.lock() {
            state.projects.remove(&project_id);
        }
    }

    pub fn add_employee(&self, employee: EmployeeRecord) {
        if let Ok(mut state) = self.lock() {
            state.employees.insert(employee.badge.clone(), employee);
        }
    }

    // ===== 行为控制 =====

    pub fn set_response_shape(&self, shape: ResponseShape) {
        if let Ok(mut state) = self.lock() {
            state.shape = shape;
        }
    }

    /// 模拟自然键索引尚未更新: 已创建的记录暂时查不到
    pub fn set_lookup_lag(&self, lagging: bool) {
        if let Ok(mut state) = self.lock() {
            state.lookup_lag = lagging;
        }
    }

    /// 让下一次 op 调用返回给定错误（可叠加）
    pub fn fail_next(&self, op: RemoteOp, err: RemoteError) {
        if let Ok(mut state) = self.lock() {
            state.failures.entry(op).or_default().push_back(err);
        }
    }

    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.lock()
            .map(|s| s.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// 删除小时记录及其子记录（模拟他处清理导致的本地 id 过期）
    pub fn drop_hour_record(&self, id: RecordId) {
        if let Ok(mut state) = self.lock() {
            state.hour_records.remove(&id);
            state.downtimes.retain(|_, d| d.hour_record_id != id);
            state.assignments.retain(|_, a| a.hour_record_id != id);
        }
    }

    /// 直接写入一条班组分配（模拟远端已有数据）
    pub fn seed_team_assignment(&self, payload: TeamAssignmentPayload) -> Option<RecordId> {
        let mut state = self.lock().ok()?;
        let id = state.allocate_id();
        let employee = state
            .employees
            .values()
            .find(|e| e.employee_id == payload.employee_id)
            .cloned();
        state.assignments.insert(
            id,
            TeamAssignmentRecord {
                id,
                hour_record_id: payload.hour_record_id,
                employee_id: payload.employee_id,
                workstation_id: payload.workstation_id,
                machine_id: payload.machine_id,
                badge: employee.as_ref().map(|e| e.badge.clone()),
                name: employee.as_ref().map(|e| e.full_name()),
            },
        );
        Some(id)
    }

    // ===== 查询（断言用） =====

    pub fn hour_record(&self, id: RecordId) -> Option<HourRecordPayload> {
        self.lock().ok()?.hour_records.get(&id).cloned()
    }

    pub fn hour_record_count(&self) -> usize {
        self.lock().map(|s| s.hour_records.len()).unwrap_or(0)
    }

    pub fn find_id_by_key(&self, key: &NaturalKey) -> Option<RecordId> {
        self.lock().ok()?.find_by_key(key).map(|(id, _)| id)
    }

    pub fn downtimes_of(&self, hour_record_id: RecordId) -> Vec<RemoteDowntime> {
        self.lock()
            .map(|s| {
                s.downtimes
                    .values()
                    .filter(|d| d.hour_record_id == hour_record_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn assignments_of(&self, hour_record_id: RecordId) -> Vec<TeamAssignmentRecord> {
        self.lock()
            .map(|s| {
                s.assignments
                    .values()
                    .filter(|a| a.hour_record_id == hour_record_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn payload_json(id: Option<RecordId>, payload: &HourRecordPayload) -> RemoteResult<Value> {
    let mut value =
        serde_json::to_value(payload).map_err(|e| RemoteError::Decode(e.to_string()))?;
    if let (Some(id), Some(obj)) = (id, value.as_object_mut()) {
        obj.insert("id".to_string(), json!(id));
    }
    Ok(value)
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn create_hour_record(&self, payload: &HourRecordPayload) -> RemoteResult<Value> {
        let mut state = self.enter(RemoteOp::CreateHour)?;
        let key = payload.natural_key();
        if state.find_by_key(&key).is_some() {
            return Err(RemoteError::Rejected {
                status: 409,
                message: format!("小时记录已存在: {}", key),
            });
        }

        let id = state.allocate_id();
        state.hour_records.insert(id, payload.clone());

        match state.shape {
            ResponseShape::PlainId => payload_json(Some(id), payload),
            ResponseShape::UpperCaseId => Ok(json!({ "ID": id.to_string() })),
            ResponseShape::NestedData => Ok(json!({ "data": { "recordId": id } })),
            ResponseShape::EchoKeyOnly => payload_json(None, payload),
            ResponseShape::Empty => Ok(json!({})),
        }
    }

    async fn update_hour_record(
        &self,
        id: RecordId,
        payload: &HourRecordPayload,
    ) -> RemoteResult<Value> {
        let mut state = self.enter(RemoteOp::UpdateHour)?;
        match state.hour_records.get_mut(&id) {
            Some(record) => {
                *record = payload.clone();
                payload_json(Some(id), payload)
            }
            None => Err(RemoteError::not_found("hour_record", id)),
        }
    }

    async fn find_hour_record(&self, key: &NaturalKey) -> RemoteResult<Option<Value>> {
        let state = self.enter(RemoteOp::FindHour)?;
        if state.lookup_lag {
            return Ok(None);
        }
        match state.find_by_key(key) {
            Some((id, record)) => Ok(Some(payload_json(Some(id), record)?)),
            None => Ok(None),
        }
    }

    async fn fetch_downtimes(&self, hour_record_id: RecordId) -> RemoteResult<Vec<RemoteDowntime>> {
        let state = self.enter(RemoteOp::FetchDowntimes)?;
        if !state.hour_records.contains_key(&hour_record_id) {
            return Err(RemoteError::not_found("hour_record", hour_record_id));
        }
        Ok(state
            .downtimes
            .values()
            .filter(|d| d.hour_record_id == hour_record_id)
            .cloned()
            .collect())
    }

    async fn create_downtime(&self, payload: &DowntimePayload) -> RemoteResult<Value> {
        let mut state = self.enter(RemoteOp::CreateDowntime)?;
        if !state.hour_records.contains_key(&payload.hour_record_id) {
            return Err(RemoteError::not_found("hour_record", payload.hour_record_id));
        }
        let id = state.allocate_id();
        state.downtimes.insert(
            id,
            RemoteDowntime {
                id,
                hour_record_id: payload.hour_record_id,
                duration_minutes: payload.duration_minutes,
                comment: payload.comment.clone(),
                problem_type_id: payload.problem_type_id,
                machine_id: payload.machine_id,
            },
        );
        Ok(json!({ "id": id }))
    }

    async fn update_downtime(&self, id: RecordId, payload: &DowntimePayload) -> RemoteResult<()> {
        let mut state = self.enter(RemoteOp::UpdateDowntime)?;
        match state.downtimes.get_mut(&id) {
            Some(record) => {
                record.duration_minutes = payload.duration_minutes;
                record.comment = payload.comment.clone();
                record.problem_type_id = payload.problem_type_id;
                record.machine_id = payload.machine_id;
                Ok(())
            }
            None => Err(RemoteError::not_found("downtime", id)),
        }
    }

    async fn delete_downtime(&self, id: RecordId) -> RemoteResult<()> {
        let mut state = self.enter(RemoteOp::DeleteDowntime)?;
        match state.downtimes.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RemoteError::not_found("downtime", id)),
        }
    }

    async fn create_team_assignment(&self, payload: &TeamAssignmentPayload) -> RemoteResult<Value> {
        {
            let state = self.enter(RemoteOp::CreateTeamAssignment)?;
            if !state.hour_records.contains_key(&payload.hour_record_id) {
                return Err(RemoteError::not_found("hour_record", payload.hour_record_id));
            }
        }
        let id = self
            .seed_team_assignment(payload.clone())
            .ok_or_else(|| RemoteError::Transport("写入班组分配失败".to_string()))?;
        Ok(json!({ "id": id }))
    }

    async fn fetch_team_assignments(
        &self,
        hour_record_id: RecordId,
    ) -> RemoteResult<Vec<TeamAssignmentRecord>> {
        let state = self.enter(RemoteOp::FetchTeamAssignments)?;
        Ok(state
            .assignments
            .values()
            .filter(|a| a.hour_record_id == hour_record_id)
            .cloned()
            .collect())
    }

    async fn find_employee_by_badge(&self, badge: &str) -> RemoteResult<Option<EmployeeRecord>> {
        let state = self.enter(RemoteOp::FindEmployee)?;
        Ok(state.employees.get(badge.trim()).cloned())
    }

    async fn fetch_shift(&self, shift_id: RecordId) -> RemoteResult<Option<ShiftDefinition>> {
        let state = self.enter(RemoteOp::FetchShift)?;
        Ok(state.shifts.get(&shift_id).cloned())
    }

    async fn project_exists(&self, project_id: RecordId) -> RemoteResult<bool> {
        let state = self.enter(RemoteOp::ProjectExists)?;
        Ok(state.projects.contains(&project_id))
    }
}
