// ==========================================
// 食品生产排产核心 - 产品与配方数据仓储
// ==========================================

use crate::domain::lot::RecipeRequirement;
use crate::domain::order::Product;
use crate::repository::error::RepositoryResult;
use crate::repository::row_codec::decimal_col;
use rusqlite::{params, Connection, OptionalExtension};

pub struct ProductRepository<'c> {
    conn: &'c Connection,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_id(&self, product_id: i64) -> RepositoryResult<Option<Product>> {
        let product = self
            .conn
            .query_row(
                "SELECT id, name, unit_weight_kg FROM product WHERE id = ?1",
                params![product_id],
                |row| {
                    Ok(Product {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        unit_weight_kg: decimal_col(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(product)
    }

    /// 查询产品配方（按原料ID排序，保证分配顺序稳定）
    pub fn find_recipe(&self, product_id: i64) -> RepositoryResult<Vec<RecipeRequirement>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, material_id, qty_per_unit
            FROM recipe_requirement
            WHERE product_id = ?1
            ORDER BY material_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![product_id], |row| {
                Ok(RecipeRequirement {
                    product_id: row.get(0)?,
                    material_id: row.get(1)?,
                    qty_per_unit: decimal_col(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
