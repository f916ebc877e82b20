// ==========================================
// 食品生产排产核心 - 生产线启用 / 停用
// ==========================================
// 职责: 操作员切换生产线启用标记
// 说明: 提交后发布重排事件，让批次按新的可用产线重新分配
// ==========================================

use crate::db::{Database, TxPolicy};
use crate::domain::line::ProductionLine;
use crate::engine::events::{OptionalEventPublisher, PlanningEvent};
use crate::repository::{LineRepository, RepositoryError, RepositoryResult};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineActivationRequest {
    pub line_id: i64,
    pub active: bool,
}

pub struct LineActivationService {
    db: Database,
    publisher: OptionalEventPublisher,
}

impl LineActivationService {
    pub fn new(db: Database, publisher: OptionalEventPublisher) -> Self {
        Self { db, publisher }
    }

    /// 设置生产线启用标记并返回更新后的生产线
    ///
    /// # 返回
    /// - Err(ValidationError): 生产线不存在
    #[instrument(skip(self), fields(line_id = request.line_id, active = request.active))]
    pub fn set_active(&self, request: &LineActivationRequest) -> RepositoryResult<ProductionLine> {
        let line = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            let repo = LineRepository::new(tx);
            if repo.set_active(request.line_id, request.active)? == 0 {
                return Err(RepositoryError::ValidationError(format!(
                    "生产线不存在: {}",
                    request.line_id
                )));
            }
            repo.find_by_id(request.line_id)?
                .ok_or_else(|| RepositoryError::not_found("ProductionLine", request.line_id))
        })?;

        info!(name = %line.name, "生产线启用状态已更新");
        self.publisher
            .publish_or_log(PlanningEvent::replan(format!("line_active:{}", line.id), vec![]));
        Ok(line)
    }
}
