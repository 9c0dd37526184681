// ==========================================
// 批量导入引擎 - 方言层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 执行失败原样上抛,不做重试
// ==========================================

use thiserror::Error;

/// 方言层错误类型
#[derive(Error, Debug)]
pub enum AdapterError {
    // ===== 连接与锁 =====
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    // ===== 约束错误 =====
    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 执行错误 =====
    #[error("语句执行失败: {0}")]
    Execution(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for AdapterError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    AdapterError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    AdapterError::ForeignKeyViolation(msg)
                } else {
                    AdapterError::Execution(msg)
                }
            }
            _ => AdapterError::Execution(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type AdapterResult<T> = Result<T, AdapterError>;
