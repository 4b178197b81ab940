// ==========================================
// 泊位维修周计划排程系统 - 行映射工具
// ==========================================
// 职责: 日期/时间戳/枚举/JSON 列的公共解析函数
// 约束: 解析失败返回 FromSqlConversionFailure, 不静默吞掉坏数据
// ==========================================

use crate::db::{DATETIME_FORMAT, DATE_FORMAT};
use crate::domain::types::{Overdue, OverdueUnit};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_datetime(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

/// 读取必填日期列
pub fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| conversion_error(idx, format!("日期格式错误 {}: {}", raw, e)))
}

/// 读取可空日期列
pub fn get_opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => NaiveDate::parse_from_str(&raw, DATE_FORMAT)
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("日期格式错误 {}: {}", raw, e))),
        None => Ok(None),
    }
}

/// 读取必填时间戳列
pub fn get_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
        .map_err(|e| conversion_error(idx, format!("时间格式错误 {}: {}", raw, e)))
}

/// 读取可空时间戳列
pub fn get_opt_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("时间格式错误 {}: {}", raw, e))),
        None => Ok(None),
    }
}

/// 读取枚举列（经由 from_db_str 解析）
pub fn get_enum<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("未知枚举值: {}", raw)))
}

/// 读取可空枚举列
pub fn get_opt_enum<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) if !raw.trim().is_empty() => parse(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("未知枚举值: {}", raw))),
        _ => Ok(None),
    }
}

/// 读取 JSON 数组列
pub fn get_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| conversion_error(idx, format!("JSON 解析失败 {}: {}", raw, e)))
}

/// 读取超期量（magnitude + unit 两列）
pub fn get_overdue(
    row: &Row<'_>,
    magnitude_idx: usize,
    unit_idx: usize,
) -> rusqlite::Result<Option<Overdue>> {
    let magnitude: Option<f64> = row.get(magnitude_idx)?;
    let unit = get_opt_enum(row, unit_idx, OverdueUnit::from_db_str)?;
    Ok(match (magnitude, unit) {
        (Some(magnitude), Some(unit)) => Some(Overdue { magnitude, unit }),
        _ => None,
    })
}

/// 超期量拆分为 (magnitude, unit) 两列
pub fn overdue_columns(overdue: Option<&Overdue>) -> (Option<f64>, Option<&'static str>) {
    match overdue {
        Some(o) => (Some(o.magnitude), Some(o.unit.to_db_str())),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_bad_date_is_conversion_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT '2026/03/02'", [], |row| get_date(row, 0))
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(0, _, _)));

        let ok = conn
            .query_row("SELECT '2026-03-02', NULL", [], |row| {
                Ok((get_date(row, 0)?, get_opt_date(row, 1)?))
            })
            .unwrap();
        assert_eq!(ok, (NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), None));
    }
}
