// ==========================================
// 食品生产排产核心 - 生产线数据仓储
// ==========================================

use crate::domain::line::{LineCompatibility, ProductionLine};
use crate::repository::error::RepositoryResult;
use crate::repository::row_codec::decimal_col;
use rusqlite::{params, Connection, OptionalExtension, Row};

fn map_line(row: &Row<'_>) -> rusqlite::Result<ProductionLine> {
    Ok(ProductionLine {
        id: row.get(0)?,
        name: row.get(1)?,
        max_capacity_kg: decimal_col(row, 2)?,
        active: row.get::<_, i64>(3)? != 0,
    })
}

pub struct LineRepository<'c> {
    conn: &'c Connection,
}

impl<'c> LineRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_id(&self, line_id: i64) -> RepositoryResult<Option<ProductionLine>> {
        let line = self
            .conn
            .query_row(
                "SELECT id, name, max_capacity_kg, active FROM production_line WHERE id = ?1",
                params![line_id],
                map_line,
            )
            .optional()?;
        Ok(line)
    }

    /// 查询启用中的生产线（按ID排序）
    pub fn find_active(&self) -> RepositoryResult<Vec<ProductionLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, max_capacity_kg, active FROM production_line WHERE active = 1 ORDER BY id",
        )?;
        let lines = stmt
            .query_map([], map_line)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    /// 全部兼容关系（含停用生产线，用于区分“无兼容线”与“兼容线均停用”）
    pub fn find_compatibilities(&self) -> RepositoryResult<Vec<LineCompatibility>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, line_id, priority
            FROM product_line_compatibility
            ORDER BY product_id, COALESCE(priority, 9999), line_id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LineCompatibility {
                    product_id: row.get(0)?,
                    line_id: row.get(1)?,
                    priority: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_active(&self, line_id: i64, active: bool) -> RepositoryResult<usize> {
        let n = self.conn.execute(
            "UPDATE production_line SET active = ?1 WHERE id = ?2",
            params![active as i64, line_id],
        )?;
        Ok(n)
    }
}
