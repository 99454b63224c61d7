// ==========================================
// 班次生产数据采集 - 身份解析器
// ==========================================
// 职责: 为时段主记录产出 Confirmed 身份，供子记录写入使用
// 规则:
// 1. 首次保存: 创建；响应无标识但回显自然键 -> Pending
// 2. 更新或子记录写入前: Pending 按自然键查询，命中 -> Confirmed，未命中 -> 放弃写入并报错
// 3. 更新遇到 NotFound（本地 id 过期）: 清为 Unsaved，重建一次；同一动作内再次 NotFound 为致命错误
// 4. 已 Confirmed 的解析为空操作
// ==========================================

use crate::domain::slot::{NaturalKey, RemoteIdentity};
use crate::domain::types::RecordId;
use crate::remote::{
    decode_created_identity, extract_record_id, HourRecordPayload, RemoteError, RemoteStore,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// 单次保存动作允许的重建次数
pub const MAX_RECREATE_ATTEMPTS: u32 = 1;

/// 身份解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("记录未找到，请刷新后重试: {0}")]
    RecordNotFound(NaturalKey),

    #[error("记录尚未保存，无法写入子记录")]
    NotPersisted,

    #[error("远端响应缺少记录标识: {0}")]
    InvalidResponse(NaturalKey),

    #[error("重建后记录仍不存在: {0}")]
    StaleAfterRecreate(NaturalKey),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// 主记录保存结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimarySaveOutcome {
    /// 本次调用了创建接口
    pub created: bool,
    /// 本次因过期身份而重建（调用方需重放子记录写入）
    pub recreated: bool,
}

// ==========================================
// IdentityResolver
// ==========================================
pub struct IdentityResolver<'a, R: RemoteStore + ?Sized> {
    remote: &'a R,
}

impl<'a, R: RemoteStore + ?Sized> IdentityResolver<'a, R> {
    pub fn new(remote: &'a R) -> Self {
        Self { remote }
    }

    /// 解析为 Confirmed id
    ///
    /// # 返回
    /// - Ok(id): 已确认（Confirmed 为空操作）
    /// - Err(RecordNotFound): Pending 查询未命中，身份保持 Pending
    /// - Err(NotPersisted): 身份为 Unsaved
    pub async fn resolve(&self, identity: &mut RemoteIdentity) -> Result<RecordId, ResolveError> {
        match *identity {
            RemoteIdentity::Confirmed(id) => Ok(id),
            RemoteIdentity::Unsaved => Err(ResolveError::NotPersisted),
            RemoteIdentity::Pending(key) => {
                debug!(key = %key, "按自然键解析待确认记录");
                let found = self.remote.find_hour_record(&key).await?;
                match found.as_ref().and_then(extract_record_id) {
                    Some(id) => {
                        identity.confirm(id);
                        info!(key = %key, id, "待确认记录已解析");
                        Ok(id)
                    }
                    None => {
                        warn!(key = %key, "待确认记录查询未命中");
                        Err(ResolveError::RecordNotFound(key))
                    }
                }
            }
        }
    }

    /// 子记录写入前解析；`recreated` 为真时未命中视为第二次 NotFound（致命）
    pub async fn resolve_for_child_write(
        &self,
        identity: &mut RemoteIdentity,
        recreated: bool,
    ) -> Result<RecordId, ResolveError> {
        match self.resolve(identity).await {
            Err(ResolveError::RecordNotFound(key)) if recreated => {
                Err(ResolveError::StaleAfterRecreate(key))
            }
            other => other,
        }
    }

    /// 保存主记录（创建或更新），按需重建一次
    ///
    /// # 返回
    /// - Err(RecordNotFound): Pending 查询未命中，未发出创建，身份保持 Pending
    pub async fn save_primary(
        &self,
        identity: &mut RemoteIdentity,
        payload: &HourRecordPayload,
    ) -> Result<PrimarySaveOutcome, ResolveError> {
        match *identity {
            RemoteIdentity::Unsaved => {
                self.create(identity, payload).await?;
                Ok(PrimarySaveOutcome {
                    created: true,
                    recreated: false,
                })
            }
            // 未命中时保持 Pending 并报错，不再创建
            RemoteIdentity::Pending(_) => {
                let id = self.resolve(identity).await?;
                self.update_or_recreate(identity, id, payload).await
            }
            RemoteIdentity::Confirmed(id) => self.update_or_recreate(identity, id, payload).await,
        }
    }

    async fn update_or_recreate(
        &self,
        identity: &mut RemoteIdentity,
        id: RecordId,
        payload: &HourRecordPayload,
    ) -> Result<PrimarySaveOutcome, ResolveError> {
        match self.remote.update_hour_record(id, payload).await {
            Ok(_) => Ok(PrimarySaveOutcome {
                created: false,
                recreated: false,
            }),
            Err(e) if e.is_not_found() => {
                let stale = identity.clear_stale();
                warn!(stale_id = ?stale, key = %payload.natural_key(), "本地记录 id 已过期，重建");
                self.create_once_more(identity, payload).await?;
                Ok(PrimarySaveOutcome {
                    created: true,
                    recreated: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 重试性创建: 任何 NotFound 都是致命的
    async fn create_once_more(
        &self,
        identity: &mut RemoteIdentity,
        payload: &HourRecordPayload,
    ) -> Result<(), ResolveError> {
        self.create(identity, payload).await.map_err(|e| match e {
            ResolveError::Remote(ref remote) if remote.is_not_found() => {
                ResolveError::StaleAfterRecreate(payload.natural_key())
            }
            other => other,
        })
    }

    async fn create(
        &self,
        identity: &mut RemoteIdentity,
        payload: &HourRecordPayload,
    ) -> Result<(), ResolveError> {
        let key = payload.natural_key();
        let response = self.remote.create_hour_record(payload).await?;

        match decode_created_identity(&response, &key) {
            Some(RemoteIdentity::Confirmed(id)) => {
                identity.confirm(id);
                info!(key = %key, id, "小时记录已创建");
                Ok(())
            }
            Some(RemoteIdentity::Pending(echoed)) => {
                identity.mark_pending(echoed);
                info!(key = %key, "小时记录已创建，标识延迟返回");
                Ok(())
            }
            _ => {
                warn!(key = %key, response = %response, "创建响应既无标识也无自然键");
                Err(ResolveError::InvalidResponse(key))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shift::LocationRef;
    use crate::remote::{InMemoryRemoteStore, RemoteOp, ResponseShape};
    use chrono::NaiveDate;

    fn payload(hour: u32) -> HourRecordPayload {
        HourRecordPayload {
            date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            shift_id: 1,
            hour_number: hour,
            hour_type_code: "NORMAL".to_string(),
            part_id: 5,
            location: LocationRef::Line(3),
            zone_id: None,
            result: Some(100),
            scrap: Some(1),
            target: 120,
            headcount: 2,
            order_number: None,
            line_leader_badge: None,
            quality_agent_badge: None,
            maintenance_tech_badge: None,
            pqc_badge: None,
        }
    }

    #[tokio::test]
    async fn test_create_confirms_identity() {
        let remote = InMemoryRemoteStore::new();
        let resolver = IdentityResolver::new(&remote);
        let mut identity = RemoteIdentity::Unsaved;

        let outcome = resolver.save_primary(&mut identity, &payload(1)).await.unwrap();
        assert!(outcome.created);
        assert!(identity.is_confirmed());
    }

    #[tokio::test]
    async fn test_nested_and_uppercase_shapes() {
        let remote = InMemoryRemoteStore::new();
        let resolver = IdentityResolver::new(&remote);

        remote.set_response_shape(ResponseShape::UpperCaseId);
        let mut a = RemoteIdentity::Unsaved;
        resolver.save_primary(&mut a, &payload(1)).await.unwrap();
        assert!(a.is_confirmed());

        remote.set_response_shape(ResponseShape::NestedData);
        let mut b = RemoteIdentity::Unsaved;
        resolver.save_primary(&mut b, &payload(2)).await.unwrap();
        assert!(b.is_confirmed());
    }

    #[tokio::test]
    async fn test_echo_only_becomes_pending_then_resolves() {
        let remote = InMemoryRemoteStore::new();
        remote.set_response_shape(ResponseShape::EchoKeyOnly);
        let resolver = IdentityResolver::new(&remote);
        let mut identity = RemoteIdentity::Unsaved;

        resolver.save_primary(&mut identity, &payload(1)).await.unwrap();
        assert!(matches!(identity, RemoteIdentity::Pending(_)));

        let id = resolver.resolve(&mut identity).await.unwrap();
        assert_eq!(identity, RemoteIdentity::Confirmed(id));

        // 再次解析为空操作
        let lookups = remote.call_count(RemoteOp::FindHour);
        assert_eq!(resolver.resolve(&mut identity).await.unwrap(), id);
        assert_eq!(remote.call_count(RemoteOp::FindHour), lookups);
    }

    #[tokio::test]
    async fn test_pending_miss_on_resave_does_not_create_again() {
        let remote = InMemoryRemoteStore::new();
        remote.set_response_shape(ResponseShape::EchoKeyOnly);
        remote.set_lookup_lag(true);
        let resolver = IdentityResolver::new(&remote);
        let mut identity = RemoteIdentity::Unsaved;

        resolver.save_primary(&mut identity, &payload(1)).await.unwrap();
        let key = payload(1).natural_key();
        assert_eq!(identity, RemoteIdentity::Pending(key));

        let err = resolver.save_primary(&mut identity, &payload(1)).await.unwrap_err();
        assert_eq!(err, ResolveError::RecordNotFound(key));
        assert_eq!(identity, RemoteIdentity::Pending(key));
        assert_eq!(remote.call_count(RemoteOp::CreateHour), 1);
        assert_eq!(remote.call_count(RemoteOp::UpdateHour), 0);

        // 索引追上后按原记录更新
        remote.set_lookup_lag(false);
        let outcome = resolver.save_primary(&mut identity, &payload(1)).await.unwrap();
        assert!(!outcome.created);
        assert!(identity.is_confirmed());
        assert_eq!(remote.call_count(RemoteOp::CreateHour), 1);
        assert_eq!(remote.hour_record_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_is_invalid() {
        let remote = InMemoryRemoteStore::new();
        remote.set_response_shape(ResponseShape::Empty);
        let resolver = IdentityResolver::new(&remote);
        let mut identity = RemoteIdentity::Unsaved;

        let err = resolver.save_primary(&mut identity, &payload(1)).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidResponse(_)));
        assert_eq!(identity, RemoteIdentity::Unsaved);
    }

    #[tokio::test]
    async fn test_unsaved_cannot_be_resolved() {
        let remote = InMemoryRemoteStore::new();
        let resolver = IdentityResolver::new(&remote);
        let mut identity = RemoteIdentity::Unsaved;
        assert_eq!(
            resolver.resolve(&mut identity).await,
            Err(ResolveError::NotPersisted)
        );
    }
}
