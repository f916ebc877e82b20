// ==========================================
// 食品生产排产核心 - 人工批次替换
// ==========================================
// 职责: 操作员以显式列表替换某条生产线的活动批次
// 红线: 新批次直接 in_progress；序号接续该线剩余批次最大序号；生产线置为占用
// ==========================================

use crate::config::PlannerConfig;
use crate::db::{Database, TxPolicy};
use crate::domain::batch::NewBatch;
use crate::domain::types::BatchStatus;
use crate::engine::events::{OptionalEventPublisher, PlanningEvent};
use crate::engine::reconciler::{reconcile_order, OrderStatusChange};
use crate::repository::{
    BatchRepository, LineRepository, OrderRepository, RepositoryError, RepositoryResult,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualBatchLine {
    pub order_id: i64,
    pub quantity_kg: Decimal,
}

/// 人工批次替换请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualBatchRequest {
    pub line_id: i64,
    pub batches: Vec<ManualBatchLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualBatchReport {
    pub line_id: i64,
    pub removed_batches: usize,
    pub created_batches: Vec<i64>,
    pub affected_orders: Vec<OrderStatusChange>,
}

pub struct ManualBatchService {
    db: Database,
    publisher: OptionalEventPublisher,
}

impl ManualBatchService {
    pub fn new(db: Database, publisher: OptionalEventPublisher) -> Self {
        Self { db, publisher }
    }

    /// 替换生产线批次
    ///
    /// # 返回
    /// - Err(ValidationError): 空列表 / 非正数量 / 订单不存在
    /// - Err(NotFound): 生产线不存在
    #[instrument(skip(self, request, config), fields(line_id = request.line_id, count = request.batches.len()))]
    pub fn replace_line_batches(
        &self,
        request: &ManualBatchRequest,
        config: &PlannerConfig,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ManualBatchReport> {
        validate_request(request)?;

        let report = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            let line_repo = LineRepository::new(tx);
            let batch_repo = BatchRepository::new(tx);
            let order_repo = OrderRepository::new(tx);

            if line_repo.find_by_id(request.line_id)?.is_none() {
                return Err(RepositoryError::not_found("ProductionLine", request.line_id));
            }

            let order_ids: BTreeSet<i64> = request.batches.iter().map(|b| b.order_id).collect();
            let ids: Vec<i64> = order_ids.iter().copied().collect();
            let found: BTreeSet<i64> = order_repo.find_by_ids(&ids)?.iter().map(|o| o.id).collect();
            let missing: Vec<i64> = order_ids.difference(&found).copied().collect();
            if !missing.is_empty() {
                return Err(RepositoryError::ValidationError(format!(
                    "生产订单不存在: {:?}",
                    missing
                )));
            }

            // 被替换批次所属订单也需要重新计算状态
            let mut touched: BTreeSet<i64> = batch_repo
                .find_by_statuses(&[BatchStatus::Planned, BatchStatus::InProgress])?
                .into_iter()
                .filter(|b| b.line_id == request.line_id)
                .map(|b| b.production_order_id)
                .collect();
            touched.extend(order_ids.iter().copied());

            let removed = batch_repo.delete_by_line_and_statuses(
                request.line_id,
                &[BatchStatus::Planned, BatchStatus::InProgress],
            )?;

            let mut sequence = batch_repo.max_sequence_for_line(request.line_id)?;
            let start = now.naive_utc();
            let duration = config.batch_duration()?;
            let mut created = Vec::with_capacity(request.batches.len());
            for (i, item) in request.batches.iter().enumerate() {
                sequence += 1;
                let batch_start = start + duration * i as i32;
                let id = batch_repo.insert(&NewBatch {
                    production_order_id: item.order_id,
                    line_id: request.line_id,
                    quantity_kg: item.quantity_kg,
                    status: BatchStatus::InProgress,
                    line_sequence: sequence,
                    planned_start: Some(batch_start),
                    planned_finish: Some(batch_start + duration),
                })?;
                created.push(id);
            }

            line_repo.set_active(request.line_id, false)?;

            let mut affected_orders = Vec::new();
            for order_id in touched {
                if let Some(change) = reconcile_order(tx, order_id, config.firm_mass_epsilon_kg)? {
                    affected_orders.push(change);
                }
            }

            Ok(ManualBatchReport {
                line_id: request.line_id,
                removed_batches: removed,
                created_batches: created,
                affected_orders,
            })
        })?;

        info!(
            removed = report.removed_batches,
            created = report.created_batches.len(),
            "生产线批次已人工替换"
        );
        self.publisher.publish_or_log(PlanningEvent::replan(
            format!("line:{}", request.line_id),
            report.created_batches.clone(),
        ));
        Ok(report)
    }
}

fn validate_request(request: &ManualBatchRequest) -> RepositoryResult<()> {
    if request.batches.is_empty() {
        return Err(RepositoryError::ValidationError(
            "批次列表不能为空".to_string(),
        ));
    }
    if let Some(bad) = request.batches.iter().find(|b| b.quantity_kg <= Decimal::ZERO) {
        return Err(RepositoryError::FieldValueError {
            field: "quantity_kg".to_string(),
            message: format!("订单 {} 的批次重量必须大于 0", bad.order_id),
        });
    }
    Ok(())
}
