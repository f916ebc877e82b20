// ==========================================
// 食品生产排产核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、状态类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod batch;
pub mod line;
pub mod lot;
pub mod order;
pub mod plan;
pub mod types;

// 重导出核心类型
pub use batch::{NewBatch, ProductionBatch, ProjectableBatch};
pub use line::{LineCompatibility, ProductionLine};
pub use lot::{LotConsumption, NewLot, RawMaterialLot, RecipeRequirement};
pub use order::{OrderDemand, Product, ProductionOrder, SalesOrder};
pub use plan::DailyPlanEntry;
pub use types::{BatchStatus, LotStatus, OrderStatus, Punctuality, SalesOrderStatus};
