// ==========================================
// 食品生产排产核心 - 行字段编解码
// ==========================================
// Decimal 以 TEXT 存储；枚举以 snake_case 字符串存储
// ==========================================

use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use std::str::FromStr;

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// 读取 Decimal 列
pub(crate) fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(raw.trim())
        .map_err(|e| conversion_error(idx, format!("非法数量 '{}': {}", raw, e)))
}

/// 读取枚举列
pub(crate) fn enum_col<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("未知状态值 '{}'", raw)))
}

/// Decimal 写入格式（规范化，去除多余的尾零）
pub(crate) fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

/// 生成 `?1, ?2, ...` 占位符
pub(crate) fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?1, ?2, ?3");
        assert_eq!(placeholders(0), "");
    }

    #[test]
    fn test_decimal_text_normalizes() {
        assert_eq!(decimal_text(Decimal::new(15000, 2)), "150");
        assert_eq!(decimal_text(Decimal::new(105, 1)), "10.5");
    }
}
