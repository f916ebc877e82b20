// ==========================================
// 食品生产排产核心 - 日计划快照
// ==========================================
// 每次影子模拟成功后整体替换
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPlanEntry {
    pub plan_date: NaiveDate,
    pub production_order_id: i64,
}
