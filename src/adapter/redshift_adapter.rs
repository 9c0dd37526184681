// ==========================================
// 批量导入引擎 - Redshift 方言实现
// ==========================================
// 职责: 列式数仓方言（无 upsert、无主键回写、无身份列插入）
// 传输: 通过 SqlExecutor 执行,连接管理不在本模块
// 红线: 忽略 returning；冲突忽略请求只告警,不报错
// ==========================================

use crate::adapter::adapter_trait::{assemble_insert_sql, quote_string, standard_literal, Adapter};
use crate::adapter::error::AdapterResult;
use crate::config::import_options::ImportOptions;
use crate::domain::import_result::RawOutcome;
use crate::domain::value::Value;
use tracing::{debug, warn};

/// Redshift 时间戳字面量格式
const REDSHIFT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

// ==========================================
// SqlExecutor Trait
// ==========================================
// 用途: 语句传输层（连接池、驱动）
// 实现者: 调用方提供
pub trait SqlExecutor: Send + Sync {
    /// 执行一条语句
    ///
    /// # 返回
    /// - RawOutcome: 影响行数（及可能的回传行）
    fn execute(&self, sql: &str) -> AdapterResult<RawOutcome>;
}

// ==========================================
// RedshiftAdapter
// ==========================================
pub struct RedshiftAdapter {
    executor: Box<dyn SqlExecutor>,
}

impl RedshiftAdapter {
    pub fn new(executor: Box<dyn SqlExecutor>) -> Self {
        Self { executor }
    }
}

impl Adapter for RedshiftAdapter {
    fn adapter_name(&self) -> &str {
        "redshift"
    }

    fn quote_value(&self, value: &Value) -> String {
        match value {
            Value::Timestamp(ts) => quote_string(&ts.format(REDSHIFT_TIMESTAMP_FORMAT).to_string()),
            other => standard_literal(other),
        }
    }

    fn post_sql_statements(&self, table_name: &str, options: &ImportOptions) -> Vec<String> {
        let mut sql = Vec::new();

        if options.on_duplicate_key_ignore && options.on_duplicate_key_update.is_none() {
            warn!(
                adapter = "redshift",
                table = %table_name,
                "数据库不支持 on_duplicate_key_ignore,已忽略"
            );
        }

        if let Some(post_sql) = &options.post_sql {
            sql.push(post_sql.clone());
        }
        sql
    }

    fn insert_many(
        &self,
        statement_parts: &[String],
        value_groups: &[String],
        _options: &ImportOptions,
    ) -> AdapterResult<RawOutcome> {
        let sql = assemble_insert_sql(statement_parts, value_groups);
        debug!(adapter = "redshift", rows = value_groups.len(), sql_len = sql.len(), "执行多行插入");

        // 回传行一律丢弃
        let outcome = self.executor.execute(&sql)?;
        Ok(RawOutcome::affected(outcome.rows_affected))
    }

    fn supports_identity_insert(&self) -> bool {
        false
    }
}
