// ==========================================
// 食品生产排产核心 - 排产事件处理器
// ==========================================
// 职责: 把 ReplanWorker 收到的事件落到引擎上（阻塞线程池执行）
// 红线: 处理过程中不再发布事件，避免事件自激
// ==========================================

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConfigManager;
use crate::db::{Database, TxPolicy};
use crate::domain::types::OrderStatus;
use crate::engine::batch_scheduler::BatchScheduler;
use crate::engine::clock::Clock;
use crate::engine::events::{PlanningEvent, PlanningEventKind};
use crate::engine::lot_allocator::{AllocationRequest, LotAllocator};
use crate::engine::replan_worker::PlanningEventHandler;
use crate::repository::{OrderRepository, RepositoryResult};

/// 基于引擎的事件处理器
#[derive(Clone)]
pub struct EngineEventHandler {
    db: Database,
    config_manager: Arc<ConfigManager>,
    clock: Arc<dyn Clock>,
}

impl EngineEventHandler {
    pub fn new(db: Database, config_manager: Arc<ConfigManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            config_manager,
            clock,
        }
    }

    /// 同步执行单个事件
    pub fn handle_blocking(&self, event: &PlanningEvent) -> RepositoryResult<()> {
        let config = self.config_manager.load_planner_config()?;
        let now = self.clock.now();
        match event.kind {
            PlanningEventKind::Replan => {
                let summary = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
                    BatchScheduler::new().plan(tx, &config, now)
                })?;
                tracing::info!(
                    origin = %event.origin,
                    new_batches = summary.new_batches,
                    alerts = summary.alerts.len(),
                    "事件触发重排完成"
                );
            }
            PlanningEventKind::Reallocate => {
                let report = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
                    let waiting =
                        OrderRepository::new(tx).find_by_statuses(OrderStatus::ALLOCATABLE, 1)?;
                    if waiting.is_empty() {
                        return Ok(None);
                    }
                    LotAllocator::new()
                        .allocate(tx, &AllocationRequest::default(), &config, now)
                        .map(Some)
                })?;
                match report {
                    Some(report) => {
                        tracing::info!(
                            origin = %event.origin,
                            orders = report.results.len(),
                            "事件触发重新分配完成"
                        );
                    }
                    None => {
                        tracing::debug!(origin = %event.origin, "无待分配订单，跳过");
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlanningEventHandler for EngineEventHandler {
    async fn handle(&self, event: PlanningEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        let handler = self.clone();
        tokio::task::spawn_blocking(move || handler.handle_blocking(&event)).await??;
        Ok(())
    }
}
