// ==========================================
// 食品生产排产核心 - 订单数据仓储
// ==========================================
// 职责: production_order / sales_order 表访问
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::order::{OrderDemand, ProductionOrder, SalesOrder};
use crate::domain::types::{OrderStatus, SalesOrderStatus};
use crate::repository::error::RepositoryResult;
use crate::repository::row_codec::{decimal_col, enum_col, placeholders};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const ORDER_COLUMNS: &str = "o.id, o.sales_order_id, o.product_id, o.quantity, o.status, o.created_at";

fn map_order(row: &Row<'_>) -> rusqlite::Result<ProductionOrder> {
    Ok(ProductionOrder {
        id: row.get(0)?,
        sales_order_id: row.get(1)?,
        product_id: row.get(2)?,
        quantity: decimal_col(row, 3)?,
        status: enum_col(row, 4, OrderStatus::from_str)?,
        created_at: row.get(5)?,
    })
}

// ==========================================
// OrderRepository - 生产订单仓储
// ==========================================
pub struct OrderRepository<'c> {
    conn: &'c Connection,
}

impl<'c> OrderRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_id(&self, order_id: i64) -> RepositoryResult<Option<ProductionOrder>> {
        let sql = format!("SELECT {} FROM production_order o WHERE o.id = ?1", ORDER_COLUMNS);
        let order = self
            .conn
            .query_row(&sql, params![order_id], map_order)
            .optional()?;
        Ok(order)
    }

    /// 按ID列表查询（按创建时间、ID排序；不存在的ID不返回）
    pub fn find_by_ids(&self, order_ids: &[i64]) -> RepositoryResult<Vec<ProductionOrder>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM production_order o WHERE o.id IN ({}) ORDER BY o.created_at, o.id",
            ORDER_COLUMNS,
            placeholders(order_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params_from_iter(order_ids.iter()), map_order)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    /// 按状态查询，最多 limit 条（按创建时间、ID排序）
    pub fn find_by_statuses(
        &self,
        statuses: &[OrderStatus],
        limit: usize,
    ) -> RepositoryResult<Vec<ProductionOrder>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM production_order o WHERE o.status IN ({}) ORDER BY o.created_at, o.id LIMIT {}",
            ORDER_COLUMNS,
            placeholders(statuses.len()),
            limit
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params_from_iter(statuses.iter().map(|s| s.as_str())), map_order)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    pub fn find_by_sales_order(&self, sales_order_id: i64) -> RepositoryResult<Vec<ProductionOrder>> {
        let sql = format!(
            "SELECT {} FROM production_order o WHERE o.sales_order_id = ?1 ORDER BY o.id",
            ORDER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params![sales_order_id], map_order)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    /// 查询排程需求：订单 + 产品单重 + 销售订单交期/优先级
    pub fn find_demands(&self, statuses: &[OrderStatus]) -> RepositoryResult<Vec<OrderDemand>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {}, p.unit_weight_kg, s.requested_delivery_date, COALESCE(s.priority, 0)
            FROM production_order o
            JOIN product p ON p.id = o.product_id
            LEFT JOIN sales_order s ON s.id = o.sales_order_id
            WHERE o.status IN ({})
            ORDER BY o.id
            "#,
            ORDER_COLUMNS,
            placeholders(statuses.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let demands = stmt
            .query_map(params_from_iter(statuses.iter().map(|s| s.as_str())), |row| {
                Ok(OrderDemand {
                    order: map_order(row)?,
                    unit_weight_kg: decimal_col(row, 6)?,
                    due_date: row.get(7)?,
                    priority: row.get::<_, i64>(8)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(demands)
    }

    pub fn update_status(&self, order_id: i64, status: OrderStatus) -> RepositoryResult<usize> {
        let n = self.conn.execute(
            "UPDATE production_order SET status = ?1 WHERE id = ?2",
            params![status.as_str(), order_id],
        )?;
        Ok(n)
    }

    /// 条件更新：仅当当前状态属于 `from` 时生效
    ///
    /// # 返回
    /// 受影响行数（0 表示状态不满足条件）
    pub fn update_status_from(
        &self,
        order_id: i64,
        status: OrderStatus,
        from: &[OrderStatus],
    ) -> RepositoryResult<usize> {
        if from.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE production_order SET status = ?1 WHERE id = ?2 AND status IN ({})",
            (3..3 + from.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut values: Vec<Value> = vec![
            Value::Text(status.as_str().to_string()),
            Value::Integer(order_id),
        ];
        values.extend(from.iter().map(|s| Value::Text(s.as_str().to_string())));
        let n = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(n)
    }
}

// ==========================================
// SalesOrderRepository - 销售订单仓储
// ==========================================
pub struct SalesOrderRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SalesOrderRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_id(&self, sales_order_id: i64) -> RepositoryResult<Option<SalesOrder>> {
        let so = self
            .conn
            .query_row(
                "SELECT id, requested_delivery_date, priority, status FROM sales_order WHERE id = ?1",
                params![sales_order_id],
                |row| {
                    Ok(SalesOrder {
                        id: row.get(0)?,
                        requested_delivery_date: row.get(1)?,
                        priority: row.get::<_, i64>(2)? != 0,
                        status: enum_col(row, 3, SalesOrderStatus::from_str)?,
                    })
                },
            )
            .optional()?;
        Ok(so)
    }

    pub fn update_due_date(
        &self,
        sales_order_id: i64,
        requested_delivery_date: NaiveDate,
    ) -> RepositoryResult<usize> {
        let n = self.conn.execute(
            "UPDATE sales_order SET requested_delivery_date = ?1 WHERE id = ?2",
            params![requested_delivery_date, sales_order_id],
        )?;
        Ok(n)
    }

    pub fn update_status(
        &self,
        sales_order_id: i64,
        status: SalesOrderStatus,
    ) -> RepositoryResult<usize> {
        let n = self.conn.execute(
            "UPDATE sales_order SET status = ?1 WHERE id = ?2",
            params![status.as_str(), sales_order_id],
        )?;
        Ok(n)
    }
}
