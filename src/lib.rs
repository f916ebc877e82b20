// ==========================================
// 食品生产排产核心 - 核心库
// ==========================================
// 范围: 原料批次分配 + 生产批次排程 + 日历投影 + 影子模拟
// 技术栈: Rust + SQLite (rusqlite) + tokio
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表/事务）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BatchStatus, LotStatus, OrderStatus, Punctuality, SalesOrderStatus};

// 领域实体
pub use domain::{
    DailyPlanEntry, LineCompatibility, LotConsumption, Product, ProductionBatch, ProductionLine,
    ProductionOrder, RawMaterialLot, RecipeRequirement, SalesOrder,
};

// 引擎
pub use engine::{
    BatchScheduler, DailyProjector, LotAllocator, LotStatusService, ManualBatchService,
    ShadowSimulator, StateReconciler, WhatIfComparator,
};

// API
pub use api::{ApiError, ApiResult, PlanningApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "食品生产排产核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
