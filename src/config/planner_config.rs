// ==========================================
// 食品生产排产核心 - 排产参数
// ==========================================
// 由 ConfigManager 从 config_kv 显式构建并注入引擎，不使用全局变量
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

// ==========================================
// 参数取值范围
// ==========================================
pub const ALLOCATION_CUTOFF_DAYS_RANGE: RangeInclusive<i64> = 0..=3650;
pub const ALLOCATION_DEFAULT_LIMIT_RANGE: RangeInclusive<usize> = 1..=10_000;
pub const BATCH_DURATION_HOURS_RANGE: RangeInclusive<i64> = 1..=168;
pub const BUSINESS_UTC_OFFSET_HOURS_RANGE: RangeInclusive<i32> = -12..=14;
pub const MAX_PROJECTION_DAYS_RANGE: RangeInclusive<u32> = 1..=3660;

/// 排产参数快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// 日产能系数：日产能 = 生产线批次上限 × 系数
    pub daily_capacity_factor: Decimal,
    /// 原料分配时批次到期日必须不早于 今天 + N 天（0 表示只排除已过期批次）
    pub allocation_cutoff_days: i64,
    /// 未指定订单时，单次分配处理的订单上限
    pub allocation_default_limit: usize,
    /// 单个批次的计划时长（小时）
    pub batch_duration_hours: i64,
    /// 业务时区相对 UTC 的偏移（小时）
    pub business_utc_offset_hours: i32,
    /// 不限天数投影时最多开启的工作日数
    pub max_projection_days: u32,
    /// 剩余重量小于等于该值视为已完成 (kg)
    pub firm_mass_epsilon_kg: Decimal,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            daily_capacity_factor: Decimal::from(2),
            allocation_cutoff_days: 0,
            allocation_default_limit: 50,
            batch_duration_hours: 3,
            business_utc_offset_hours: -3,
            max_projection_days: 260,
            firm_mass_epsilon_kg: Decimal::new(1, 4),
        }
    }
}

impl PlannerConfig {
    /// 校验参数范围
    ///
    /// # 返回
    /// - Err(ConfigError): 第一个越界的参数
    pub fn validate(&self) -> RepositoryResult<()> {
        fn check<T: PartialOrd + std::fmt::Display>(
            key: &str,
            value: T,
            range: &RangeInclusive<T>,
        ) -> RepositoryResult<()> {
            if range.contains(&value) {
                Ok(())
            } else {
                Err(RepositoryError::ConfigError(format!(
                    "{}={} 超出范围 [{}, {}]",
                    key,
                    value,
                    range.start(),
                    range.end()
                )))
            }
        }

        check(
            "allocation_cutoff_days",
            self.allocation_cutoff_days,
            &ALLOCATION_CUTOFF_DAYS_RANGE,
        )?;
        check(
            "allocation_default_limit",
            self.allocation_default_limit,
            &ALLOCATION_DEFAULT_LIMIT_RANGE,
        )?;
        check(
            "batch_duration_hours",
            self.batch_duration_hours,
            &BATCH_DURATION_HOURS_RANGE,
        )?;
        check(
            "business_utc_offset_hours",
            self.business_utc_offset_hours,
            &BUSINESS_UTC_OFFSET_HOURS_RANGE,
        )?;
        check(
            "max_projection_days",
            self.max_projection_days,
            &MAX_PROJECTION_DAYS_RANGE,
        )?;
        if self.daily_capacity_factor <= Decimal::ZERO {
            return Err(RepositoryError::ConfigError(format!(
                "daily_capacity_factor={} 必须为正",
                self.daily_capacity_factor
            )));
        }
        if self.firm_mass_epsilon_kg < Decimal::ZERO {
            return Err(RepositoryError::ConfigError(format!(
                "firm_mass_epsilon_kg={} 不能为负",
                self.firm_mass_epsilon_kg
            )));
        }
        Ok(())
    }

    /// 业务时区下的当前日期；偏移无效时按 UTC
    pub fn business_date(&self, now: DateTime<Utc>) -> NaiveDate {
        match self
            .business_utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
        {
            Some(tz) => now.with_timezone(&tz).date_naive(),
            None => now.date_naive(),
        }
    }

    /// 原料分配截止日 = 业务日期 + allocation_cutoff_days
    ///
    /// # 返回
    /// - Err(ValidationError): 天数越界或日期溢出
    pub fn allocation_cutoff(&self, now: DateTime<Utc>) -> RepositoryResult<NaiveDate> {
        Duration::try_days(self.allocation_cutoff_days)
            .and_then(|offset| self.business_date(now).checked_add_signed(offset))
            .ok_or_else(|| {
                RepositoryError::ValidationError(format!(
                    "allocation_cutoff_days={} 无法计算截止日",
                    self.allocation_cutoff_days
                ))
            })
    }

    /// 单个批次的计划时长
    ///
    /// # 返回
    /// - Err(ValidationError): 时长不为正或越界
    pub fn batch_duration(&self) -> RepositoryResult<Duration> {
        Duration::try_hours(self.batch_duration_hours)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| {
                RepositoryError::ValidationError(format!(
                    "batch_duration_hours={} 无效",
                    self.batch_duration_hours
                ))
            })
    }

    /// 单条生产线的日产能（溢出时取上限）
    pub fn daily_capacity(&self, line_capacity_kg: Decimal) -> Decimal {
        line_capacity_kg.saturating_mul(self.daily_capacity_factor)
    }
}
