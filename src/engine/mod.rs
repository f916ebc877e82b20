// ==========================================
// 食品生产排产核心 - 引擎层
// ==========================================
// 职责: 原料批次分配 / 批次排程 / 日历投影 / 影子模拟 / 状态协调 / 主数据维护
// 红线: 引擎不拼 SQL，数据访问全部经过 repository
// ==========================================

pub mod batch_scheduler;
pub mod calendar;
pub mod clock;
pub mod daily_projector;
pub mod due_date;
pub mod events;
pub mod line_activation;
pub mod lot_allocator;
pub mod lot_status;
pub mod manual_batches;
pub mod purchase_lots;
pub mod reconciler;
pub mod replan_worker;
pub mod shadow;
pub mod what_if;

// 重导出核心引擎
pub use batch_scheduler::{AlertReason, BatchScheduler, SchedulingAlert, SchedulingSummary};
pub use clock::{Clock, FixedClock, SystemClock};
pub use daily_projector::{DailyProjector, Projection, ProjectionHorizon};
pub use due_date::{DueDateService, DueDateUpdate};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, PlanningEvent, PlanningEventKind,
    PlanningEventPublisher,
};
pub use line_activation::{LineActivationRequest, LineActivationService};
pub use lot_allocator::{AllocationReport, AllocationRequest, LotAllocator};
pub use lot_status::{LotStatusService, LotStatusUpdate};
pub use manual_batches::{ManualBatchLine, ManualBatchReport, ManualBatchRequest, ManualBatchService};
pub use purchase_lots::{PurchaseLotRequest, PurchaseLotService};
pub use reconciler::{BatchStatusRequest, ReconcileReport, StateReconciler};
pub use replan_worker::{ChannelEventPublisher, PlanningEventHandler, ReplanWorker, WorkerStats};
pub use shadow::{ShadowRun, ShadowSimulator};
pub use what_if::{WhatIfComparator, WhatIfReport};
