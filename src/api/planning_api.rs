// ==========================================
// 食品生产排产核心 - 排产 API 门面
// ==========================================
// 职责: 每次调用加载配置、取当前时间，调用对应引擎，转换错误
// 红线: 事件只在事务提交后发布；发布失败不影响调用结果
// ==========================================

use std::sync::Arc;

use crate::api::dto::{DailyPlanResponse, PreviewRequest, PreviewResponse, WhatIfRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, PlannerConfig};
use crate::db::{Database, TxPolicy};
use crate::domain::line::ProductionLine;
use crate::domain::lot::RawMaterialLot;
use crate::domain::order::SalesOrder;
use crate::engine::batch_scheduler::{BatchScheduler, SchedulingSummary};
use crate::engine::clock::Clock;
use crate::engine::daily_projector::ProjectionHorizon;
use crate::engine::due_date::{DueDateService, DueDateUpdate};
use crate::engine::events::OptionalEventPublisher;
use crate::engine::line_activation::{LineActivationRequest, LineActivationService};
use crate::engine::lot_allocator::{AllocationReport, AllocationRequest, LotAllocator};
use crate::engine::lot_status::{LotStatusService, LotStatusUpdate};
use crate::engine::manual_batches::{ManualBatchReport, ManualBatchRequest, ManualBatchService};
use crate::engine::purchase_lots::{PurchaseLotRequest, PurchaseLotService};
use crate::engine::reconciler::{BatchStatusRequest, ReconcileReport, StateReconciler};
use crate::engine::shadow::ShadowSimulator;
use crate::engine::what_if::{WhatIfComparator, WhatIfReport};
use crate::repository::DailyPlanRepository;

// ==========================================
// PlanningApi - 排产 API
// ==========================================

/// 排产API
///
/// 职责：
/// 1. 原料批次分配
/// 2. 批次排程（提交）与影子预览
/// 3. 假设分析
/// 4. 批次 / 原料批次状态变更、人工批次替换
/// 5. 产线启停、交期变更、原料采购
pub struct PlanningApi {
    db: Database,
    config_manager: Arc<ConfigManager>,
    event_publisher: OptionalEventPublisher,
    clock: Arc<dyn Clock>,
}

impl PlanningApi {
    pub fn new(
        db: Database,
        config_manager: Arc<ConfigManager>,
        event_publisher: OptionalEventPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            config_manager,
            event_publisher,
            clock,
        }
    }

    fn load_config(&self) -> ApiResult<PlannerConfig> {
        Ok(self.config_manager.load_planner_config()?)
    }

    /// 原料批次分配（提交）
    pub fn allocate(&self, request: &AllocationRequest) -> ApiResult<AllocationReport> {
        let config = self.load_config()?;
        let now = self.clock.now();
        let report = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            LotAllocator::new().allocate(tx, request, &config, now)
        })?;
        Ok(report)
    }

    /// 批次排程（提交）
    pub fn plan(&self) -> ApiResult<SchedulingSummary> {
        let config = self.load_config()?;
        let now = self.clock.now();
        let summary = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            BatchScheduler::new().plan(tx, &config, now)
        })?;
        Ok(summary)
    }

    /// 影子预览（批次表不变，日计划快照刷新）
    pub fn preview(&self, request: &PreviewRequest) -> ApiResult<PreviewResponse> {
        let config = self.load_config()?;
        let horizon = match request.days {
            Some(0) => {
                return Err(ApiError::InvalidInput("days 必须大于 0".to_string()));
            }
            Some(days) => ProjectionHorizon::Fixed(days),
            None => ProjectionHorizon::Open {
                max_days: config.max_projection_days,
            },
        };
        let now = self.clock.now();
        let run = ShadowSimulator::new(self.db.clone(), config).simulate(horizon, request.from, now)?;

        Ok(PreviewResponse {
            plan: run.projection.days,
            unplaced: run.projection.unplaced,
            snapshot_written: run.snapshot_rows.is_some(),
        })
    }

    /// 假设分析：提前投产某销售订单
    pub fn what_if(&self, request: &WhatIfRequest) -> ApiResult<WhatIfReport> {
        let config = self.load_config()?;
        let shadow = ShadowSimulator::new(self.db.clone(), config);
        let report =
            WhatIfComparator::new(&self.db, &shadow).compare(request.sales_order_id, self.clock.now())?;
        Ok(report)
    }

    /// 批次状态变更
    pub fn update_batch_status(&self, request: &BatchStatusRequest) -> ApiResult<ReconcileReport> {
        let config = self.load_config()?;
        let reconciler = StateReconciler::new(self.db.clone(), self.event_publisher.clone());
        Ok(reconciler.reconcile(request, &config)?)
    }

    /// 原料批次质检状态变更
    pub fn update_lot_status(&self, update: &LotStatusUpdate) -> ApiResult<RawMaterialLot> {
        let service = LotStatusService::new(self.db.clone(), self.event_publisher.clone());
        Ok(service.update(update)?)
    }

    /// 人工替换生产线批次
    pub fn replace_line_batches(&self, request: &ManualBatchRequest) -> ApiResult<ManualBatchReport> {
        let config = self.load_config()?;
        let service = ManualBatchService::new(self.db.clone(), self.event_publisher.clone());
        Ok(service.replace_line_batches(request, &config, self.clock.now())?)
    }

    /// 生产线启用 / 停用
    pub fn set_line_active(&self, request: &LineActivationRequest) -> ApiResult<ProductionLine> {
        let service = LineActivationService::new(self.db.clone(), self.event_publisher.clone());
        Ok(service.set_active(request)?)
    }

    /// 销售订单交期变更
    pub fn update_due_date(&self, update: &DueDateUpdate) -> ApiResult<SalesOrder> {
        let config = self.load_config()?;
        let service = DueDateService::new(self.db.clone(), self.event_publisher.clone());
        Ok(service.update(update, &config, self.clock.now())?)
    }

    /// 原料采购下单（ordered 批次）
    pub fn create_purchase_lot(&self, request: &PurchaseLotRequest) -> ApiResult<RawMaterialLot> {
        Ok(PurchaseLotService::new(self.db.clone()).create(request)?)
    }

    /// 当前日计划快照
    pub fn daily_plan(&self) -> ApiResult<DailyPlanResponse> {
        let conn = self.db.get_conn()?;
        let entries = DailyPlanRepository::new(&conn).find_all()?;
        Ok(DailyPlanResponse { entries })
    }
}
