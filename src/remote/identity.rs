// ==========================================
// 班次生产数据采集 - 远端身份解码
// ==========================================
// 职责: 在边界处把形状不固定的远端响应解码为 RemoteIdentity
// 规则: 标识字段名不唯一，可能嵌套在 data/record/result 下，可能为数字或数字字符串；
//       无标识但回显自然键 -> Pending(自然键)
// ==========================================

use crate::domain::slot::{NaturalKey, RemoteIdentity};
use crate::domain::types::RecordId;
use serde_json::Value;

/// 可能的标识字段名（按优先级）
pub const ID_FIELDS: &[&str] = &[
    "id",
    "ID",
    "Id",
    "recordId",
    "record_id",
    "hourlyProductionId",
    "hourly_production_id",
    "productionId",
    "production_id",
    "_id",
];

const WRAPPER_FIELDS: &[&str] = &["data", "record", "result"];
const KEY_WRAPPER_FIELDS: &[&str] = &["naturalKey", "natural_key", "compositeKey", "key"];

const DATE_FIELDS: &[&str] = &["date", "productionDate", "production_date"];
const SHIFT_FIELDS: &[&str] = &["shiftId", "shift_id", "shift"];
const HOUR_FIELDS: &[&str] = &["hourNumber", "hour_number", "hour"];

fn id_from_value(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64().filter(|id| *id > 0),
        Value::String(s) => s.trim().parse::<RecordId>().ok().filter(|id| *id > 0),
        _ => None,
    }
}

fn id_at_level(value: &Value) -> Option<RecordId> {
    let obj = value.as_object()?;
    ID_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(id_from_value)
}

/// 提取记录标识（顶层优先，其次包装字段）
pub fn extract_record_id(value: &Value) -> Option<RecordId> {
    if let Some(id) = id_at_level(value) {
        return Some(id);
    }
    let obj = value.as_object()?;
    WRAPPER_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(|inner| {
            // 列表响应取第一条
            match inner {
                Value::Array(items) => items.first().and_then(id_at_level),
                other => id_at_level(other),
            }
        })
}

fn first_field<'a>(obj: &'a serde_json::Map<String, Value>, fields: &[&str]) -> Option<&'a Value> {
    fields.iter().find_map(|f| obj.get(*f))
}

fn key_matches_at_level(value: &Value, key: &NaturalKey) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let date_ok = first_field(obj, DATE_FIELDS)
        .and_then(Value::as_str)
        .map(|s| s.starts_with(&key.date.format("%Y-%m-%d").to_string()))
        .unwrap_or(false);

    // 班次可能是数字、字符串或嵌套对象 {"id": ..}
    let shift_ok = first_field(obj, SHIFT_FIELDS)
        .and_then(|v| id_from_value(v).or_else(|| id_at_level(v)))
        .map(|id| id == key.shift_id)
        .unwrap_or(false);

    let hour_ok = first_field(obj, HOUR_FIELDS)
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
        .map(|h| h == key.hour_number as u64)
        .unwrap_or(false);

    date_ok && shift_ok && hour_ok
}

/// 响应是否回显了给定自然键
pub fn echoes_natural_key(value: &Value, key: &NaturalKey) -> bool {
    if key_matches_at_level(value, key) {
        return true;
    }
    let Some(obj) = value.as_object() else {
        return false;
    };
    WRAPPER_FIELDS
        .iter()
        .chain(KEY_WRAPPER_FIELDS.iter())
        .filter_map(|field| obj.get(*field))
        .any(|inner| echoes_natural_key(inner, key))
}

/// 解码创建响应
///
/// # 返回
/// - Some(Confirmed(id)): 找到标识
/// - Some(Pending(key)): 无标识但回显自然键
/// - None: 两者皆无（调用方视为无效响应）
pub fn decode_created_identity(value: &Value, key: &NaturalKey) -> Option<RemoteIdentity> {
    if let Some(id) = extract_record_id(value) {
        return Some(RemoteIdentity::Confirmed(id));
    }
    if echoes_natural_key(value, key) {
        return Some(RemoteIdentity::Pending(*key));
    }
    None
}
