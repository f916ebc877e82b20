// ==========================================
// 食品生产排产核心 - SQLite 连接与事务
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供事务组合器: 提交 / 无条件回滚（影子模拟）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
///
/// 数量类字段（kg / 单位用量）以 TEXT 存储十进制字符串，读取时解析为 Decimal
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS product (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            unit_weight_kg TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_material (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            unit TEXT NOT NULL DEFAULT 'kg'
        );

        CREATE TABLE IF NOT EXISTS raw_material_lot (
            id INTEGER PRIMARY KEY,
            material_id INTEGER NOT NULL REFERENCES raw_material(id),
            available_qty TEXT NOT NULL,
            expiration_date TEXT,
            status TEXT NOT NULL,
            lot_code TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_lot_material_status
            ON raw_material_lot(material_id, status);

        -- material_id 不加外键：配方引用不存在的原料由分配器报校验错误
        CREATE TABLE IF NOT EXISTS recipe_requirement (
            product_id INTEGER NOT NULL REFERENCES product(id),
            material_id INTEGER NOT NULL,
            qty_per_unit TEXT NOT NULL,
            PRIMARY KEY (product_id, material_id)
        );

        CREATE TABLE IF NOT EXISTS sales_order (
            id INTEGER PRIMARY KEY,
            requested_delivery_date TEXT,
            priority INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE TABLE IF NOT EXISTS production_order (
            id INTEGER PRIMARY KEY,
            sales_order_id INTEGER REFERENCES sales_order(id),
            product_id INTEGER NOT NULL REFERENCES product(id),
            quantity TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_order_status ON production_order(status);
        CREATE INDEX IF NOT EXISTS idx_order_sales_order ON production_order(sales_order_id);

        CREATE TABLE IF NOT EXISTS lot_consumption (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lot_id INTEGER NOT NULL REFERENCES raw_material_lot(id),
            production_order_id INTEGER NOT NULL REFERENCES production_order(id),
            quantity TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_consumption_order ON lot_consumption(production_order_id);

        CREATE TABLE IF NOT EXISTS production_line (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            max_capacity_kg TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS product_line_compatibility (
            product_id INTEGER NOT NULL REFERENCES product(id),
            line_id INTEGER NOT NULL REFERENCES production_line(id),
            priority INTEGER,
            PRIMARY KEY (product_id, line_id)
        );

        CREATE TABLE IF NOT EXISTS production_batch (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            production_order_id INTEGER NOT NULL REFERENCES production_order(id),
            line_id INTEGER NOT NULL REFERENCES production_line(id),
            quantity_kg TEXT NOT NULL,
            status TEXT NOT NULL,
            line_sequence INTEGER NOT NULL,
            planned_start TEXT,
            planned_finish TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_batch_line_status ON production_batch(line_id, status);
        CREATE INDEX IF NOT EXISTS idx_batch_order ON production_batch(production_order_id);

        CREATE TABLE IF NOT EXISTS daily_plan (
            plan_date TEXT NOT NULL,
            production_order_id INTEGER NOT NULL,
            PRIMARY KEY (plan_date, production_order_id)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

// ==========================================
// 事务组合器
// ==========================================

/// 事务结束策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPolicy {
    /// 闭包成功则提交，失败回滚
    Commit,
    /// 无论成功与否均回滚（影子模拟）
    AlwaysRollback,
}

/// 共享数据库句柄
///
/// 进程内通过 Mutex 串行化；跨进程由 IMMEDIATE 事务在 BEGIN 时取得写锁，
/// 等价于对所涉及行的 FOR UPDATE
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// 打开数据库并建表
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享连接（供 ConfigManager 等复用）
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 获取数据库连接
    pub fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在 IMMEDIATE 事务中执行闭包
    ///
    /// # 参数
    /// - policy: 结束策略
    /// - f: 事务体；返回 Err 时一律回滚
    ///
    /// # 返回
    /// 闭包的返回值（AlwaysRollback 下数据已回滚，返回值仍保留）
    pub fn run_in_transaction<T, F>(&self, policy: TxPolicy, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> RepositoryResult<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        match (policy, f(&tx)) {
            (TxPolicy::Commit, Ok(value)) => {
                tx.commit()
                    .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
                Ok(value)
            }
            (_, outcome) => {
                if let Err(e) = tx.rollback() {
                    tracing::warn!(error = %e, "事务回滚失败");
                    if outcome.is_ok() {
                        return Err(RepositoryError::DatabaseTransactionError(e.to_string()));
                    }
                }
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Database {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        Database::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn count_lines(db: &Database) -> i64 {
        let conn = db.get_conn().unwrap();
        conn.query_row("SELECT COUNT(*) FROM production_line", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_schema_version_recorded() {
        let db = memory_db();
        let conn = db.get_conn().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_commit_policy_persists() {
        let db = memory_db();
        db.run_in_transaction(TxPolicy::Commit, |tx| {
            tx.execute(
                "INSERT INTO production_line (id, name, max_capacity_kg) VALUES (1, 'L1', '100')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count_lines(&db), 1);
    }

    #[test]
    fn test_always_rollback_discards_but_returns_value() {
        let db = memory_db();
        let inserted = db
            .run_in_transaction(TxPolicy::AlwaysRollback, |tx| {
                let n = tx.execute(
                    "INSERT INTO production_line (id, name, max_capacity_kg) VALUES (1, 'L1', '100')",
                    [],
                )?;
                Ok(n)
            })
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(count_lines(&db), 0);
    }

    #[test]
    fn test_error_rolls_back() {
        let db = memory_db();
        let result: RepositoryResult<()> = db.run_in_transaction(TxPolicy::Commit, |tx| {
            tx.execute(
                "INSERT INTO production_line (id, name, max_capacity_kg) VALUES (1, 'L1', '100')",
                [],
            )?;
            Err(RepositoryError::ValidationError("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(count_lines(&db), 0);
    }
}
