// ==========================================
// 批量导入引擎 - 核心库
// ==========================================
// 定位: ORM 层之下的多行 INSERT 组装与执行
// 技术栈: Rust + SQLite (rusqlite)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 值、模型契约、导入结果
pub mod domain;

// 方言层 - 能力接口与后端
pub mod adapter;

// 导入层 - 管线组件与入口
pub mod importer;

// 配置层 - 导入选项与档案
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use adapter::{Adapter, AdapterError, RedshiftAdapter, SqlExecutor, SqliteAdapter};
pub use config::{ConfigManager, DuplicateKeyUpdate, ImportConfigReader, ImportOptions, UpdateColumns};
pub use domain::{
    ColumnDef, ColumnType, DynamicRecord, ImportResult, Model, ModelSchema, Projection, Value,
};
pub use importer::{AssociationCollector, BulkImporter, ImportError, ImportInput, ImportOutcome};

// ==========================================
// 常量定义
// ==========================================

// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
