// ==========================================
// 食品生产排产核心 - 生产批次领域模型
// ==========================================
// 红线: 排程器生成的批次重量不超过所在生产线上限
// 红线: 同一生产线的 line_sequence 单调递增
// ==========================================

use crate::domain::types::BatchStatus;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionBatch - 生产批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionBatch {
    pub id: i64,
    pub production_order_id: i64,
    pub line_id: i64,
    pub quantity_kg: Decimal,
    pub status: BatchStatus,
    pub line_sequence: i64,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_finish: Option<NaiveDateTime>,
}

/// 待插入的批次
#[derive(Debug, Clone, PartialEq)]
pub struct NewBatch {
    pub production_order_id: i64,
    pub line_id: i64,
    pub quantity_kg: Decimal,
    pub status: BatchStatus,
    pub line_sequence: i64,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_finish: Option<NaiveDateTime>,
}

/// 日历投影输入：计划批次 + 订单交期
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectableBatch {
    pub batch_id: i64,
    pub order_id: i64,
    pub line_id: i64,
    pub quantity_kg: Decimal,
    pub line_sequence: i64,
    pub due_date: Option<NaiveDate>,
}
