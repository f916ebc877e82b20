// ==========================================
// 食品生产排产核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::planner_config::PlannerConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(rows)
    }

    /// 读取并解析配置值；缺失或格式错误时使用默认值
    fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> RepositoryResult<T> {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 构建排产参数
    ///
    /// 缺失或格式错误的键使用默认值；解析成功但越界的值返回错误
    ///
    /// # 返回
    /// - Err(ConfigError): 参数越界
    pub fn load_planner_config(&self) -> RepositoryResult<PlannerConfig> {
        let defaults = PlannerConfig::default();

        let mut daily_capacity_factor = self.get_parsed_or::<Decimal>(
            config_keys::DAILY_CAPACITY_FACTOR,
            defaults.daily_capacity_factor,
        )?;
        if daily_capacity_factor <= Decimal::ZERO {
            tracing::warn!(value = %daily_capacity_factor, "日产能系数必须为正，使用默认值");
            daily_capacity_factor = defaults.daily_capacity_factor;
        }

        let config = PlannerConfig {
            daily_capacity_factor,
            allocation_cutoff_days: self.get_parsed_or(
                config_keys::ALLOCATION_CUTOFF_DAYS,
                defaults.allocation_cutoff_days,
            )?,
            allocation_default_limit: self.get_parsed_or(
                config_keys::ALLOCATION_DEFAULT_LIMIT,
                defaults.allocation_default_limit,
            )?,
            batch_duration_hours: self
                .get_parsed_or(config_keys::BATCH_DURATION_HOURS, defaults.batch_duration_hours)?,
            business_utc_offset_hours: self.get_parsed_or(
                config_keys::BUSINESS_UTC_OFFSET_HOURS,
                defaults.business_utc_offset_hours,
            )?,
            max_projection_days: self
                .get_parsed_or(config_keys::MAX_PROJECTION_DAYS, defaults.max_projection_days)?,
            firm_mass_epsilon_kg: self.get_parsed_or(
                config_keys::FIRM_MASS_EPSILON_KG,
                defaults.firm_mass_epsilon_kg,
            )?,
        };
        config.validate()?;
        Ok(config)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 产能
    pub const DAILY_CAPACITY_FACTOR: &str = "daily_capacity_factor";
    pub const BATCH_DURATION_HOURS: &str = "batch_duration_hours";

    // 原料分配
    pub const ALLOCATION_CUTOFF_DAYS: &str = "allocation_cutoff_days";
    pub const ALLOCATION_DEFAULT_LIMIT: &str = "allocation_default_limit";

    // 日历
    pub const BUSINESS_UTC_OFFSET_HOURS: &str = "business_utc_offset_hours";
    pub const MAX_PROJECTION_DAYS: &str = "max_projection_days";

    pub const FIRM_MASS_EPSILON_KG: &str = "firm_mass_epsilon_kg";
}
