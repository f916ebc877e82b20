// ==========================================
// 食品生产排产核心 - 工作日历
// ==========================================
// 工作日: 周一至周五（不含节假日）
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// 若为周末则顺延到下一个工作日，否则原样返回
pub fn roll_to_business_day(date: NaiveDate) -> NaiveDate {
    let mut d = date;
    while !is_business_day(d) {
        d += Duration::days(1);
    }
    d
}

/// 严格晚于 date 的下一个工作日
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    roll_to_business_day(date + Duration::days(1))
}

/// 从 start（顺延后）起连续 n 个工作日
pub fn business_days_from(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(n);
    let mut d = roll_to_business_day(start);
    while days.len() < n {
        days.push(d);
        d = next_business_day(d);
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekend_rolls_to_monday() {
        // 2026-03-07 是周六
        assert_eq!(roll_to_business_day(date(2026, 3, 7)), date(2026, 3, 9));
        assert_eq!(roll_to_business_day(date(2026, 3, 9)), date(2026, 3, 9));
    }

    #[test]
    fn test_next_business_day_skips_weekend() {
        assert_eq!(next_business_day(date(2026, 3, 6)), date(2026, 3, 9));
        assert_eq!(next_business_day(date(2026, 3, 9)), date(2026, 3, 10));
    }

    #[test]
    fn test_business_days_from() {
        let days = business_days_from(date(2026, 3, 5), 4);
        assert_eq!(
            days,
            vec![date(2026, 3, 5), date(2026, 3, 6), date(2026, 3, 9), date(2026, 3, 10)]
        );
    }
}
