// ==========================================
// 食品生产排产核心 - 应用层
// ==========================================
// 职责: 组装状态、异步重排事件处理
// ==========================================

pub mod replan_handler;
pub mod state;

// 重导出
pub use replan_handler::EngineEventHandler;
pub use state::{get_default_db_path, AppState};
