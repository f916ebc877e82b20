// ==========================================
// 食品生产排产核心 - 原料采购下单
// ==========================================
// 职责: 为短缺原料登记一个 ordered 状态的新批次
// 批号: LT-{原料ID:03}-{序号:04}，同一原料内唯一
// 说明: ordered 批次不参与分配；到货后经质检放行为 available 才触发重新分配
// ==========================================

use crate::db::{Database, TxPolicy};
use crate::domain::lot::{NewLot, RawMaterialLot};
use crate::domain::types::LotStatus;
use crate::repository::{LotRepository, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// 采购请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLotRequest {
    pub material_id: i64,
    pub quantity: Decimal,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    /// 为空时自动生成
    #[serde(default)]
    pub lot_code: Option<String>,
}

/// 批号格式
pub fn format_lot_code(material_id: i64, sequence: i64) -> String {
    format!("LT-{:03}-{:04}", material_id, sequence)
}

pub struct PurchaseLotService {
    db: Database,
}

impl PurchaseLotService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 创建 ordered 批次
    ///
    /// # 返回
    /// - Err(FieldValueError): 数量不为正
    /// - Err(ValidationError): 原料不存在 / 指定批号已存在
    #[instrument(skip(self), fields(material_id = request.material_id, quantity = %request.quantity))]
    pub fn create(&self, request: &PurchaseLotRequest) -> RepositoryResult<RawMaterialLot> {
        if request.quantity <= Decimal::ZERO {
            return Err(RepositoryError::FieldValueError {
                field: "quantity".to_string(),
                message: "必须大于 0".to_string(),
            });
        }

        let lot = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            let repo = LotRepository::new(tx);
            if !repo.material_exists(request.material_id)? {
                return Err(RepositoryError::ValidationError(format!(
                    "原料不存在: {}",
                    request.material_id
                )));
            }

            let lot_code = match request.lot_code.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => {
                    if repo.lot_code_exists(request.material_id, code)? {
                        return Err(RepositoryError::ValidationError(format!(
                            "批号已存在: {}",
                            code
                        )));
                    }
                    code.to_string()
                }
                _ => {
                    let mut sequence = repo.count_by_material(request.material_id)? + 1;
                    let mut code = format_lot_code(request.material_id, sequence);
                    while repo.lot_code_exists(request.material_id, &code)? {
                        sequence += 1;
                        code = format_lot_code(request.material_id, sequence);
                    }
                    code
                }
            };

            let id = repo.insert(&NewLot {
                material_id: request.material_id,
                available_qty: request.quantity,
                expiration_date: request.expiration_date,
                status: LotStatus::Ordered,
                lot_code,
            })?;
            repo.find_by_id(id)?
                .ok_or_else(|| RepositoryError::not_found("RawMaterialLot", id))
        })?;

        info!(lot_id = lot.id, lot_code = ?lot.lot_code, "采购批次已登记");
        Ok(lot)
    }
}
