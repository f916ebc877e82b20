// ==========================================
// 食品生产排产核心 - 生产批次数据仓储
// ==========================================
// 职责: production_batch 表访问
// 说明: 数量汇总在 Rust 侧以 Decimal 完成（TEXT 列上的 SUM 会丢精度）
// ==========================================

use crate::domain::batch::{NewBatch, ProductionBatch, ProjectableBatch};
use crate::domain::types::BatchStatus;
use crate::repository::error::RepositoryResult;
use crate::repository::row_codec::{decimal_col, decimal_text, enum_col, placeholders};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;

const BATCH_COLUMNS: &str = "id, production_order_id, line_id, quantity_kg, status, line_sequence, planned_start, planned_finish";

fn map_batch(row: &Row<'_>) -> rusqlite::Result<ProductionBatch> {
    Ok(ProductionBatch {
        id: row.get(0)?,
        production_order_id: row.get(1)?,
        line_id: row.get(2)?,
        quantity_kg: decimal_col(row, 3)?,
        status: enum_col(row, 4, BatchStatus::from_str)?,
        line_sequence: row.get(5)?,
        planned_start: row.get(6)?,
        planned_finish: row.get(7)?,
    })
}

fn status_values(statuses: &[BatchStatus]) -> Vec<Value> {
    statuses
        .iter()
        .map(|s| Value::Text(s.as_str().to_string()))
        .collect()
}

// ==========================================
// BatchRepository - 生产批次仓储
// ==========================================
pub struct BatchRepository<'c> {
    conn: &'c Connection,
}

impl<'c> BatchRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, batch: &NewBatch) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO production_batch (
                production_order_id, line_id, quantity_kg, status,
                line_sequence, planned_start, planned_finish
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                batch.production_order_id,
                batch.line_id,
                decimal_text(batch.quantity_kg),
                batch.status.as_str(),
                batch.line_sequence,
                batch.planned_start,
                batch.planned_finish,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_by_ids(&self, batch_ids: &[i64]) -> RepositoryResult<Vec<ProductionBatch>> {
        if batch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM production_batch WHERE id IN ({}) ORDER BY id",
            BATCH_COLUMNS,
            placeholders(batch_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params_from_iter(batch_ids.iter()), map_batch)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(batches)
    }

    /// 按状态查询（按生产线、序号、ID排序）
    pub fn find_by_statuses(&self, statuses: &[BatchStatus]) -> RepositoryResult<Vec<ProductionBatch>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM production_batch WHERE status IN ({}) ORDER BY line_id, line_sequence, id",
            BATCH_COLUMNS,
            placeholders(statuses.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params_from_iter(status_values(statuses)), map_batch)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(batches)
    }

    pub fn find_by_order(&self, order_id: i64) -> RepositoryResult<Vec<ProductionBatch>> {
        let sql = format!(
            "SELECT {} FROM production_batch WHERE production_order_id = ?1 ORDER BY id",
            BATCH_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params![order_id], map_batch)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(batches)
    }

    /// 读取计划批次及其订单交期（供日历投影）
    ///
    /// 顺序: 生产线、序号、批次ID
    pub fn find_projectable(&self) -> RepositoryResult<Vec<ProjectableBatch>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT b.id, b.production_order_id, b.line_id, b.quantity_kg,
                   b.line_sequence, s.requested_delivery_date
            FROM production_batch b
            JOIN production_order o ON o.id = b.production_order_id
            LEFT JOIN sales_order s ON s.id = o.sales_order_id
            WHERE b.status = ?1
            ORDER BY b.line_id, b.line_sequence, b.id
            "#,
        )?;
        let batches = stmt
            .query_map(params![BatchStatus::Planned.as_str()], |row| {
                Ok(ProjectableBatch {
                    batch_id: row.get(0)?,
                    order_id: row.get(1)?,
                    line_id: row.get(2)?,
                    quantity_kg: decimal_col(row, 3)?,
                    line_sequence: row.get(4)?,
                    due_date: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(batches)
    }

    pub fn delete_by_status(&self, status: BatchStatus) -> RepositoryResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM production_batch WHERE status = ?1",
            params![status.as_str()],
        )?;
        Ok(n)
    }

    pub fn delete_by_line_and_statuses(
        &self,
        line_id: i64,
        statuses: &[BatchStatus],
    ) -> RepositoryResult<usize> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM production_batch WHERE line_id = ?1 AND status IN ({})",
            (2..2 + statuses.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut values = vec![Value::Integer(line_id)];
        values.extend(status_values(statuses));
        let n = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(n)
    }

    /// 每条生产线在给定状态批次中的最大序号
    pub fn max_sequence_by_line(
        &self,
        statuses: &[BatchStatus],
    ) -> RepositoryResult<HashMap<i64, i64>> {
        if statuses.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT line_id, MAX(line_sequence) FROM production_batch WHERE status IN ({}) GROUP BY line_id",
            placeholders(statuses.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(status_values(statuses)), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(rows)
    }

    /// 单条生产线全部批次的最大序号（无批次返回 0）
    pub fn max_sequence_for_line(&self, line_id: i64) -> RepositoryResult<i64> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(line_sequence) FROM production_batch WHERE line_id = ?1",
            params![line_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// 每条生产线在给定状态批次中的最晚计划完工时间
    pub fn latest_finish_by_line(
        &self,
        statuses: &[BatchStatus],
    ) -> RepositoryResult<HashMap<i64, NaiveDateTime>> {
        let mut latest: HashMap<i64, NaiveDateTime> = HashMap::new();
        for batch in self.find_by_statuses(statuses)? {
            if let Some(finish) = batch.planned_finish {
                latest
                    .entry(batch.line_id)
                    .and_modify(|t| *t = (*t).max(finish))
                    .or_insert(finish);
            }
        }
        Ok(latest)
    }

    /// 每个订单在给定状态批次中的重量合计
    pub fn kg_by_order(&self, statuses: &[BatchStatus]) -> RepositoryResult<HashMap<i64, Decimal>> {
        let mut totals: HashMap<i64, Decimal> = HashMap::new();
        for batch in self.find_by_statuses(statuses)? {
            *totals.entry(batch.production_order_id).or_insert(Decimal::ZERO) += batch.quantity_kg;
        }
        Ok(totals)
    }

    pub fn count_by_line_and_status(&self, line_id: i64, status: BatchStatus) -> RepositoryResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM production_batch WHERE line_id = ?1 AND status = ?2",
            params![line_id, status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn update_status(&self, batch_ids: &[i64], status: BatchStatus) -> RepositoryResult<usize> {
        if batch_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE production_batch SET status = ?1 WHERE id IN ({})",
            (2..2 + batch_ids.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut values = vec![Value::Text(status.as_str().to_string())];
        values.extend(batch_ids.iter().map(|id| Value::Integer(*id)));
        let n = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(n)
    }
}
