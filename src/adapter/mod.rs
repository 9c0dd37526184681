// ==========================================
// 批量导入引擎 - 方言层
// ==========================================
// 职责: SQL 方言能力抽象与具体后端
// 红线: 方言差异只通过 Adapter Trait 暴露
// ==========================================

pub mod adapter_trait;
pub mod error;
pub mod redshift_adapter;
pub mod sqlite_adapter;

// 重导出
pub use adapter_trait::Adapter;
pub use error::{AdapterError, AdapterResult};
pub use redshift_adapter::{RedshiftAdapter, SqlExecutor};
pub use sqlite_adapter::SqliteAdapter;
