// ==========================================
// 食品生产排产核心 - 销售订单交期变更
// ==========================================
// 职责: 修改销售订单的要求交期
// 红线: 新交期必须晚于业务日期；提交后发布重排事件
// ==========================================

use crate::config::PlannerConfig;
use crate::db::{Database, TxPolicy};
use crate::domain::order::SalesOrder;
use crate::engine::events::{OptionalEventPublisher, PlanningEvent};
use crate::repository::{RepositoryError, RepositoryResult, SalesOrderRepository};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDateUpdate {
    pub sales_order_id: i64,
    pub requested_delivery_date: NaiveDate,
}

pub struct DueDateService {
    db: Database,
    publisher: OptionalEventPublisher,
}

impl DueDateService {
    pub fn new(db: Database, publisher: OptionalEventPublisher) -> Self {
        Self { db, publisher }
    }

    /// 更新要求交期并返回更新后的销售订单
    ///
    /// # 返回
    /// - Err(ValidationError): 销售订单不存在 / 新交期不晚于业务日期
    #[instrument(skip(self, config), fields(sales_order_id = update.sales_order_id, due = %update.requested_delivery_date))]
    pub fn update(
        &self,
        update: &DueDateUpdate,
        config: &PlannerConfig,
        now: DateTime<Utc>,
    ) -> RepositoryResult<SalesOrder> {
        let today = config.business_date(now);
        if update.requested_delivery_date <= today {
            return Err(RepositoryError::ValidationError(format!(
                "新交期 {} 必须晚于今天 {}",
                update.requested_delivery_date, today
            )));
        }

        let sales_order = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            let repo = SalesOrderRepository::new(tx);
            if repo.update_due_date(update.sales_order_id, update.requested_delivery_date)? == 0 {
                return Err(RepositoryError::ValidationError(format!(
                    "销售订单不存在: {}",
                    update.sales_order_id
                )));
            }
            repo.find_by_id(update.sales_order_id)?
                .ok_or_else(|| RepositoryError::not_found("SalesOrder", update.sales_order_id))
        })?;

        info!("销售订单交期已更新");
        self.publisher.publish_or_log(PlanningEvent::replan(
            format!("due_date:{}", sales_order.id),
            vec![],
        ));
        Ok(sales_order)
    }
}
