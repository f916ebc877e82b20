// ==========================================
// 食品生产排产核心 - API 层
// ==========================================
// 职责: 请求/响应门面，供 CLI 或宿主服务调用
// ==========================================

pub mod dto;
pub mod error;
pub mod planning_api;

// 重导出核心类型
pub use dto::{DailyPlanResponse, PreviewRequest, PreviewResponse, WhatIfRequest};
pub use error::{ApiError, ApiResult};
pub use planning_api::PlanningApi;
