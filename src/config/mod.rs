// ==========================================
// 批量导入引擎 - 配置层
// ==========================================
// 职责: 导入选项定义与档案管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod import_options;

// 重导出核心配置类型
pub use config_manager::ConfigManager;
pub use import_config_trait::ImportConfigReader;
pub use import_options::{DuplicateKeyUpdate, DuplicateKeyUpdateSpec, ImportOptions, UpdateColumns};
