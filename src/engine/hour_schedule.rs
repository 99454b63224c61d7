// ==========================================
// 班次生产数据采集 - 小时时段生成器
// ==========================================
// 规则: duration = end - start; duration <= 0 时 += 24（跨零点）
//       第 i 个时段: hour = i+1, start = (start+i) mod 24, end = (start+i+1) mod 24
//       目标 = round(零件小时目标 × 类型百分比 / 100)
// 红线: 纯函数，不做远端调用
// ==========================================

use crate::domain::shift::{HourTypePercentages, Part, ShiftDefinition};
use crate::domain::slot::HourSlot;

/// 班次时长（小时），已处理跨零点
///
/// start == end 属于调用方违约，`ShiftDefinition::new` 已拒绝该输入；
/// 这里按 24 小时处理，保证结果始终为正。
pub fn shift_duration_hours(start_hour: u32, end_hour: u32) -> u32 {
    let mut duration = end_hour as i32 - start_hour as i32;
    if duration <= 0 {
        duration += 24;
    }
    duration as u32
}

/// 根据班次定义生成时段序列
pub fn generate_hour_slots(
    shift: &ShiftDefinition,
    part: &Part,
    percentages: &HourTypePercentages,
) -> Vec<HourSlot> {
    let duration = shift_duration_hours(shift.start_hour, shift.end_hour);

    let slots: Vec<HourSlot> = (0..duration)
        .map(|i| {
            HourSlot::scaffold(
                i + 1,
                (shift.start_hour + i) % 24,
                (shift.start_hour + i + 1) % 24,
                percentages.default_type,
                part,
                percentages,
            )
        })
        .collect();

    tracing::debug!(
        shift_id = shift.shift_id,
        start = shift.start_hour,
        end = shift.end_hour,
        slots = slots.len(),
        "生成小时时段"
    );

    slots
}
