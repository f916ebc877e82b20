// ==========================================
// 食品生产排产核心 - 原料批次质检状态
// ==========================================
// 职责: 接收 / 隔离 / 拒收原料批次，可选覆盖到期日与批号
// 说明: 批次变为 available 时发布重新分配事件
// ==========================================

use crate::db::{Database, TxPolicy};
use crate::domain::lot::RawMaterialLot;
use crate::domain::types::LotStatus;
use crate::engine::events::{OptionalEventPublisher, PlanningEvent};
use crate::repository::{LotRepository, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// 原料批次状态变更请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotStatusUpdate {
    pub lot_id: i64,
    pub new_status: LotStatus,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub lot_code: Option<String>,
}

pub struct LotStatusService {
    db: Database,
    publisher: OptionalEventPublisher,
}

impl LotStatusService {
    pub fn new(db: Database, publisher: OptionalEventPublisher) -> Self {
        Self { db, publisher }
    }

    /// 更新批次状态并返回更新后的批次
    ///
    /// # 返回
    /// - Err(ValidationError): 目标状态不是 available / quarantined / rejected，或批次已耗尽
    /// - Err(NotFound): 批次不存在
    #[instrument(skip(self), fields(lot_id = update.lot_id, status = %update.new_status))]
    pub fn update(&self, update: &LotStatusUpdate) -> RepositoryResult<RawMaterialLot> {
        if !update.new_status.is_receiving_target() {
            return Err(RepositoryError::ValidationError(format!(
                "不支持的批次状态: {}",
                update.new_status
            )));
        }

        let lot = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            let repo = LotRepository::new(tx);
            let current = repo
                .find_by_id(update.lot_id)?
                .ok_or_else(|| RepositoryError::not_found("RawMaterialLot", update.lot_id))?;
            // 已耗尽批次保持 depleted
            if current.available_qty <= Decimal::ZERO {
                return Err(RepositoryError::ValidationError(format!(
                    "批次 {} 可用数量为 {}，不能变更为 {}",
                    current.id, current.available_qty, update.new_status
                )));
            }

            repo.update_status(
                update.lot_id,
                update.new_status,
                update.expiration_date,
                update.lot_code.as_deref(),
            )?;
            repo.find_by_id(update.lot_id)?
                .ok_or_else(|| RepositoryError::not_found("RawMaterialLot", update.lot_id))
        })?;

        info!(lot_code = ?lot.lot_code, "原料批次状态已更新");
        if lot.status == LotStatus::Available {
            self.publisher
                .publish_or_log(PlanningEvent::reallocate(format!("lot:{}", lot.id)));
        }
        Ok(lot)
    }
}
