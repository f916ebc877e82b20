// ==========================================
// 食品生产排产核心 - 日计划快照仓储
// ==========================================
// 每次影子模拟成功后整体替换（DELETE + INSERT，同一事务）
// ==========================================

use crate::domain::plan::DailyPlanEntry;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};

pub struct DailyPlanRepository<'c> {
    conn: &'c Connection,
}

impl<'c> DailyPlanRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 整体替换快照
    ///
    /// # 返回
    /// 写入行数
    pub fn replace_all(&self, entries: &[DailyPlanEntry]) -> RepositoryResult<usize> {
        self.conn.execute("DELETE FROM daily_plan", [])?;
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO daily_plan (plan_date, production_order_id) VALUES (?1, ?2)",
        )?;
        let mut count = 0;
        for entry in entries {
            count += stmt.execute(params![entry.plan_date, entry.production_order_id])?;
        }
        Ok(count)
    }

    pub fn find_all(&self) -> RepositoryResult<Vec<DailyPlanEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT plan_date, production_order_id FROM daily_plan ORDER BY plan_date, production_order_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DailyPlanEntry {
                    plan_date: row.get(0)?,
                    production_order_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
