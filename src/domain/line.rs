// ==========================================
// 食品生产排产核心 - 生产线领域模型
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 生产线
///
/// `max_capacity_kg` 为单个批次的上限；日产能 = 上限 × 日产能系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionLine {
    pub id: i64,
    pub name: String,
    pub max_capacity_kg: Decimal,
    pub active: bool,
}

/// 产品-生产线兼容关系
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCompatibility {
    pub product_id: i64,
    pub line_id: i64,
    pub priority: Option<i32>, // 越小越优先，缺省按 9999
}

impl LineCompatibility {
    pub const DEFAULT_PRIORITY: i32 = 9999;

    pub fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(Self::DEFAULT_PRIORITY)
    }
}
