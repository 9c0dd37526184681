// ==========================================
// 批量导入引擎 - 领域模型层
// ==========================================
// 职责: 定义值类型、模型元数据、映射层契约与导入结果
// 红线: 不含 SQL 组装逻辑,不含方言逻辑
// ==========================================

pub mod dynamic_record;
pub mod import_result;
pub mod model;
pub mod schema;
pub mod value;

// 重导出核心类型
pub use dynamic_record::DynamicRecord;
pub use import_result::{ImportResult, RawOutcome};
pub use model::{Model, ValidationError, ValidationErrors};
pub use schema::{ColumnDef, ColumnType, ModelSchema};
pub use value::{Projection, Value};
