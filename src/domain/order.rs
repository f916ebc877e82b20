// ==========================================
// 食品生产排产核心 - 订单领域模型
// ==========================================
// 职责: 产品、生产订单、销售订单、排程需求视图
// ==========================================

use crate::domain::types::{OrderStatus, SalesOrderStatus};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 产品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub unit_weight_kg: Decimal,
}

// ==========================================
// ProductionOrder - 生产订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: i64,
    pub sales_order_id: Option<i64>,
    pub product_id: i64,
    pub quantity: Decimal,
    pub status: OrderStatus,
    pub created_at: NaiveDateTime,
}

// ==========================================
// SalesOrder - 销售订单（提供交期与优先标记）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: i64,
    pub requested_delivery_date: Option<NaiveDate>,
    pub priority: bool,
    pub status: SalesOrderStatus,
}

// ==========================================
// OrderDemand - 排程需求
// ==========================================
// 生产订单 + 产品单重 + 所属销售订单的交期/优先级
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDemand {
    pub order: ProductionOrder,
    pub unit_weight_kg: Decimal,
    pub due_date: Option<NaiveDate>,
    pub priority: bool,
}

impl OrderDemand {
    /// 订单总重量 (kg)；溢出时返回 None
    pub fn total_kg(&self) -> Option<Decimal> {
        self.order.quantity.checked_mul(self.unit_weight_kg)
    }
}
