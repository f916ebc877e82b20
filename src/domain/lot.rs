// ==========================================
// 食品生产排产核心 - 原料批次领域模型
// ==========================================
// 职责: 原料批次、配方需求、批次消耗记录
// 红线: 可用数量永不为负；归零即标记 depleted
// ==========================================

use crate::domain::types::LotStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// RawMaterialLot - 原料批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMaterialLot {
    pub id: i64,
    pub material_id: i64,
    pub available_qty: Decimal,
    pub expiration_date: Option<NaiveDate>, // None 表示不过期，排在最后
    pub status: LotStatus,
    pub lot_code: Option<String>,
}

impl RawMaterialLot {
    /// 从批次中扣减数量，返回扣减后的 (剩余数量, 状态)
    ///
    /// 扣减量不会超过当前可用数量
    pub fn consume(&self, qty: Decimal) -> (Decimal, LotStatus) {
        let take = qty.min(self.available_qty).max(Decimal::ZERO);
        let remaining = self.available_qty - take;
        let status = if remaining.is_zero() {
            LotStatus::Depleted
        } else {
            self.status
        };
        (remaining, status)
    }
}

/// 新建批次（采购下单时 status = ordered）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLot {
    pub material_id: i64,
    pub available_qty: Decimal,
    pub expiration_date: Option<NaiveDate>,
    pub status: LotStatus,
    pub lot_code: String,
}

// ==========================================
// RecipeRequirement - 配方需求（只读）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRequirement {
    pub product_id: i64,
    pub material_id: i64,
    pub qty_per_unit: Decimal,
}

// ==========================================
// LotConsumption - 批次消耗记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotConsumption {
    pub lot_id: i64,
    pub production_order_id: i64,
    pub quantity: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(qty: i64) -> RawMaterialLot {
        RawMaterialLot {
            id: 1,
            material_id: 10,
            available_qty: Decimal::from(qty),
            expiration_date: None,
            status: LotStatus::Available,
            lot_code: None,
        }
    }

    #[test]
    fn test_consume_partial() {
        let (remaining, status) = lot(70).consume(Decimal::from(60));
        assert_eq!(remaining, Decimal::from(10));
        assert_eq!(status, LotStatus::Available);
    }

    #[test]
    fn test_consume_exhausts_lot() {
        let (remaining, status) = lot(40).consume(Decimal::from(100));
        assert_eq!(remaining, Decimal::ZERO);
        assert_eq!(status, LotStatus::Depleted);
    }
}
