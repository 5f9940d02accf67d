//! 通用工具函数

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::modality::Modality;

/// DICOM DA 格式 (YYYYMMDD)
pub fn dicom_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// DICOM TM 格式 (HHMMSS)
pub fn dicom_time(time: NaiveTime) -> String {
    time.format("%H%M%S").to_string()
}

/// 生成检查号：设备前缀 + 申请单号 + 预约时间 (YYYYMMDDHH)
///
/// 时间后缀只取自预约时间，同一申请在任意轮次、任意进程中得到同一检查号。
pub fn accession_number(
    modality: Modality,
    order_id: &str,
    scheduled_date: NaiveDate,
    scheduled_time: NaiveTime,
) -> String {
    format!(
        "{}{}{}{:02}",
        modality.as_str(),
        order_id.trim(),
        dicom_date(scheduled_date),
        scheduled_time.hour()
    )
}

/// 预约步骤ID：申请单号 + 日期 + 时间，截取前16个字符 (SH 长度上限)
pub fn scheduled_step_id(order_id: &str, scheduled_date: NaiveDate, scheduled_time: NaiveTime) -> String {
    format!(
        "{}{}{}",
        order_id.trim(),
        dicom_date(scheduled_date),
        dicom_time(scheduled_time)
    )
    .chars()
    .take(16)
    .collect()
}
