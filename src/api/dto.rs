// ==========================================
// 食品生产排产核心 - API 请求/响应 DTO
// ==========================================
// 说明: 引擎结果类型本身可序列化，此处只补充门面层独有的结构
// ==========================================

use crate::domain::plan::DailyPlanEntry;
use crate::engine::daily_projector::{ProjectionDay, UnplacedBatch};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 预览请求；days 省略表示不限天数（受 max_projection_days 约束）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
}

/// 预览响应
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    /// 按日期排序的 `{"YYYY-MM-DD": [...]}` 列表
    pub plan: Vec<ProjectionDay>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unplaced: Vec<UnplacedBatch>,
    pub snapshot_written: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WhatIfRequest {
    pub sales_order_id: i64,
}

/// 日计划快照
#[derive(Debug, Clone, Serialize)]
pub struct DailyPlanResponse {
    pub entries: Vec<DailyPlanEntry>,
}
