// ==========================================
// 食品生产排产核心 - 原料批次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 仓储借用调用方的连接/事务，便于多个仓储共享同一事务
// ==========================================

use crate::domain::lot::{LotConsumption, NewLot, RawMaterialLot};
use crate::domain::types::LotStatus;
use crate::repository::error::RepositoryResult;
use crate::repository::row_codec::{decimal_col, decimal_text, enum_col, placeholders};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

const LOT_COLUMNS: &str = "id, material_id, available_qty, expiration_date, status, lot_code";

fn map_lot(row: &Row<'_>) -> rusqlite::Result<RawMaterialLot> {
    Ok(RawMaterialLot {
        id: row.get(0)?,
        material_id: row.get(1)?,
        available_qty: decimal_col(row, 2)?,
        expiration_date: row.get(3)?,
        status: enum_col(row, 4, LotStatus::from_str)?,
        lot_code: row.get(5)?,
    })
}

// ==========================================
// LotRepository - 原料批次仓储
// ==========================================
pub struct LotRepository<'c> {
    conn: &'c Connection,
}

impl<'c> LotRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_id(&self, lot_id: i64) -> RepositoryResult<Option<RawMaterialLot>> {
        let sql = format!("SELECT {} FROM raw_material_lot WHERE id = ?1", LOT_COLUMNS);
        let lot = self
            .conn
            .query_row(&sql, params![lot_id], map_lot)
            .optional()?;
        Ok(lot)
    }

    /// 查询可分配批次（先到期先出）
    ///
    /// # 参数
    /// - material_id: 原料ID
    /// - cutoff: 最早可接受的到期日（到期日为空的批次始终可用）
    ///
    /// # 返回
    /// 按 到期日升序（空值最后）、批次ID升序 排列，且可用数量 > 0
    pub fn find_allocatable(
        &self,
        material_id: i64,
        cutoff: NaiveDate,
    ) -> RepositoryResult<Vec<RawMaterialLot>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM raw_material_lot
            WHERE material_id = ?1
              AND status = ?2
              AND (expiration_date IS NULL OR expiration_date >= ?3)
            ORDER BY expiration_date IS NULL, expiration_date, id
            "#,
            LOT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let lots = stmt
            .query_map(
                params![material_id, LotStatus::Available.as_str(), cutoff],
                map_lot,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(lots
            .into_iter()
            .filter(|lot| lot.available_qty > Decimal::ZERO)
            .collect())
    }

    /// 更新可用数量与状态
    pub fn update_quantity(
        &self,
        lot_id: i64,
        available_qty: Decimal,
        status: LotStatus,
    ) -> RepositoryResult<usize> {
        let n = self.conn.execute(
            "UPDATE raw_material_lot SET available_qty = ?1, status = ?2 WHERE id = ?3",
            params![decimal_text(available_qty), status.as_str(), lot_id],
        )?;
        Ok(n)
    }

    /// 更新质检状态（到期日 / 批号仅在提供时覆盖）
    pub fn update_status(
        &self,
        lot_id: i64,
        status: LotStatus,
        expiration_date: Option<NaiveDate>,
        lot_code: Option<&str>,
    ) -> RepositoryResult<usize> {
        let n = self.conn.execute(
            r#"
            UPDATE raw_material_lot
            SET status = ?1,
                expiration_date = COALESCE(?2, expiration_date),
                lot_code = COALESCE(?3, lot_code)
            WHERE id = ?4
            "#,
            params![status.as_str(), expiration_date, lot_code, lot_id],
        )?;
        Ok(n)
    }

    pub fn insert(&self, lot: &NewLot) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO raw_material_lot (material_id, available_qty, expiration_date, status, lot_code)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                lot.material_id,
                decimal_text(lot.available_qty),
                lot.expiration_date,
                lot.status.as_str(),
                lot.lot_code
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 某原料的批次数量（任意状态）
    pub fn count_by_material(&self, material_id: i64) -> RepositoryResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_material_lot WHERE material_id = ?1",
            params![material_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn lot_code_exists(&self, material_id: i64, lot_code: &str) -> RepositoryResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM raw_material_lot WHERE material_id = ?1 AND lot_code = ?2",
                params![material_id, lot_code],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    pub fn material_exists(&self, material_id: i64) -> RepositoryResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM raw_material WHERE id = ?1",
                params![material_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }
}

// ==========================================
// ConsumptionRepository - 批次消耗记录仓储
// ==========================================
pub struct ConsumptionRepository<'c> {
    conn: &'c Connection,
}

impl<'c> ConsumptionRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_orders(&self, order_ids: &[i64]) -> RepositoryResult<Vec<LotConsumption>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT lot_id, production_order_id, quantity
            FROM lot_consumption
            WHERE production_order_id IN ({})
            ORDER BY id
            "#,
            placeholders(order_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(order_ids.iter()), |row| {
                Ok(LotConsumption {
                    lot_id: row.get(0)?,
                    production_order_id: row.get(1)?,
                    quantity: decimal_col(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_by_orders(&self, order_ids: &[i64]) -> RepositoryResult<usize> {
        if order_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM lot_consumption WHERE production_order_id IN ({})",
            placeholders(order_ids.len())
        );
        let n = self.conn.execute(&sql, params_from_iter(order_ids.iter()))?;
        Ok(n)
    }

    pub fn insert(&self, consumption: &LotConsumption) -> RepositoryResult<i64> {
        self.conn.execute(
            "INSERT INTO lot_consumption (lot_id, production_order_id, quantity) VALUES (?1, ?2, ?3)",
            params![
                consumption.lot_id,
                consumption.production_order_id,
                decimal_text(consumption.quantity)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 某订单对某原料已消耗的总量
    pub fn consumed_for(&self, order_id: i64, material_id: i64) -> RepositoryResult<Decimal> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.quantity
            FROM lot_consumption c
            JOIN raw_material_lot l ON l.id = c.lot_id
            WHERE c.production_order_id = ?1 AND l.material_id = ?2
            "#,
        )?;
        let quantities = stmt
            .query_map(params![order_id, material_id], |row| decimal_col(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(quantities.into_iter().sum())
    }
}
