// ==========================================
// 批量导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 方言能力不匹配只记录 warn,不构成错误
// ==========================================

use crate::adapter::error::AdapterError;
use crate::domain::model::ValidationErrors;
use crate::domain::value::Value;
use thiserror::Error;

/// 校验失败的记录（raise_error 时随错误返回）
#[derive(Debug, Clone)]
pub struct InvalidRecord {
    pub table: String,
    pub row_index: usize, // 在规范化批次中的原始行号
    pub attributes: Vec<(String, Value)>,
    pub errors: ValidationErrors,
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 输入形状错误 =====
    #[error("输入形状错误: {0}")]
    InvalidInput(String),

    // ===== 校验错误 =====
    #[error("记录校验失败 (表 {}, 行 {}): {}", .0.table, .0.row_index, .0.errors)]
    RecordInvalid(Box<InvalidRecord>),

    // ===== 方言执行错误 =====
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    // ===== 配置错误 =====
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ImportError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ImportError::InvalidInput(message.into())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Adapter(AdapterError::from(err))
    }
}

/// Result 类型别名
pub type ImportOutcome<T> = Result<T, ImportError>;

// ==========================================
// ConfigError - 导入选项配置错误
// ==========================================
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败 (key: {key}): {message}")]
    ReadError { key: String, message: String },

    #[error("配置解析失败 (key: {key}): {message}")]
    ParseError { key: String, message: String },

    #[error("配置不存在: {0}")]
    NotFound(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),
}

impl From<rusqlite::Error> for ConfigError {
    fn from(err: rusqlite::Error) -> Self {
        ConfigError::ReadError {
            key: "config_kv".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
