// ==========================================
// 食品生产排产核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 仓储借用调用方连接，事务边界由引擎/服务决定
// ==========================================

pub mod batch_repo;
pub mod daily_plan_repo;
pub mod error;
pub mod line_repo;
pub mod lot_repo;
pub mod order_repo;
pub mod product_repo;
pub(crate) mod row_codec;

// 重导出核心仓储
pub use batch_repo::BatchRepository;
pub use daily_plan_repo::DailyPlanRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use line_repo::LineRepository;
pub use lot_repo::{ConsumptionRepository, LotRepository};
pub use order_repo::{OrderRepository, SalesOrderRepository};
pub use product_repo::ProductRepository;
