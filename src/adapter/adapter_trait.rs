// ==========================================
// 批量导入引擎 - 方言能力接口
// ==========================================
// 职责: 定义每个 SQL 方言后端必须实现的契约
// 红线: 导入管线只通过能力查询分支,不判断后端身份
// 红线: 每次 insert_many 恰好执行一条语句
// ==========================================

use crate::adapter::error::AdapterResult;
use crate::config::import_options::ImportOptions;
use crate::domain::import_result::RawOutcome;
use crate::domain::value::{Projection, Value};

/// 默认插入命令
pub const DEFAULT_INSERT_COMMAND: &str = "INSERT";

// ==========================================
// Adapter Trait
// ==========================================
// 用途: 方言后端的能力查询、语句片段生成与执行
// 实现者: SqliteAdapter / RedshiftAdapter
pub trait Adapter {
    /// 方言名称（用于日志）
    fn adapter_name(&self) -> &str;

    // ===== 标识符与字面量 =====

    fn quote_table_name(&self, name: &str) -> String {
        quote_identifier(name)
    }

    fn quote_column_name(&self, name: &str) -> String {
        quote_identifier(name)
    }

    /// 将单元格值格式化为 SQL 字面量
    fn quote_value(&self, value: &Value) -> String {
        standard_literal(value)
    }

    // ===== 语句片段 =====

    /// 语句头部片段: [pre_sql?, command 或 INSERT, keywords...]
    fn pre_sql_statements(&self, options: &ImportOptions) -> Vec<String> {
        let mut sql = Vec::new();
        if let Some(pre_sql) = &options.pre_sql {
            sql.push(pre_sql.clone());
        }
        sql.push(
            options
                .command
                .clone()
                .unwrap_or_else(|| DEFAULT_INSERT_COMMAND.to_string()),
        );
        sql.extend(options.keywords.iter().cloned());
        sql
    }

    /// 语句尾部片段（冲突子句、RETURNING、post_sql 等）
    fn post_sql_statements(&self, table_name: &str, options: &ImportOptions) -> Vec<String>;

    /// 执行一条多行 INSERT
    ///
    /// # 参数
    /// - statement_parts: [头部, 尾部片段...]
    /// - value_groups: 每行一个 "(v1, v2, ...)" 字面量组
    ///
    /// # 返回
    /// - RawOutcome: 后端回传的原始行（可能为空）
    fn insert_many(
        &self,
        statement_parts: &[String],
        value_groups: &[String],
        options: &ImportOptions,
    ) -> AdapterResult<RawOutcome>;

    /// 按列名从原始回传行中拆出主键投影与 returning 投影
    ///
    /// 单列时解包为 Single；未请求的一侧返回空
    fn split_ids_and_results(
        &self,
        raw: &RawOutcome,
        options: &ImportOptions,
    ) -> (Vec<Projection>, Vec<Projection>) {
        let id_indexes = column_indexes(&raw.columns, &options.primary_key);
        let returning_indexes = column_indexes(&raw.columns, &options.returning);

        let mut ids = Vec::new();
        let mut results = Vec::new();
        for row in &raw.rows {
            if !id_indexes.is_empty() {
                ids.push(project(row, &id_indexes));
            }
            if !returning_indexes.is_empty() {
                results.push(project(row, &returning_indexes));
            }
        }
        (ids, results)
    }

    // ===== 能力查询 =====

    fn supports_on_duplicate_key_update(&self) -> bool {
        false
    }

    /// 能否回传生成主键并写回模型
    fn supports_setting_primary_key_of_imported_objects(&self) -> bool {
        false
    }

    /// 是否通过序列预取主键
    fn prefetch_primary_key(&self) -> bool {
        false
    }

    /// 能否为自增主键显式赋值
    fn supports_identity_insert(&self) -> bool {
        true
    }

    fn supports_virtual_columns(&self) -> bool {
        false
    }

    /// 序列取值表达式（不支持时为 None）
    fn next_value_for_sequence(&self, _sequence_name: &str) -> Option<String> {
        None
    }

    /// 按键值回读行（synchronize 使用）
    ///
    /// # 返回
    /// - Ok(None): 方言不支持回读
    fn select_rows(
        &self,
        _table_name: &str,
        _columns: &[String],
        _key_columns: &[String],
        _keys: &[Vec<Value>],
    ) -> AdapterResult<Option<RawOutcome>> {
        Ok(None)
    }
}

// ==========================================
// 方言共用的辅助函数
// ==========================================

/// 标准 SQL 双引号标识符
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 标准 SQL 字符串字面量
pub fn quote_string(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// 标准 SQL 字面量（时间戳按 RFC3339,非有限浮点数写为 NULL）
pub fn standard_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) if v.is_finite() => format!("{:?}", v),
        Value::Real(_) => "NULL".to_string(),
        Value::Timestamp(v) => quote_string(&v.to_rfc3339()),
        Value::Uuid(v) => quote_string(&v.to_string()),
        Value::Text(v) => quote_string(v),
    }
}

/// 组装最终语句: 头部 + 值组逗号拼接 + 尾部片段
pub fn assemble_insert_sql(statement_parts: &[String], value_groups: &[String]) -> String {
    let (head, tail) = match statement_parts.split_first() {
        Some((head, tail)) => (head.as_str(), tail),
        None => ("", &[][..]),
    };

    let mut sql = String::with_capacity(head.len() + value_groups.len() * 16);
    sql.push_str(head);
    sql.push_str(&value_groups.join(","));
    let trailing: Vec<&str> = tail
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !trailing.is_empty() {
        sql.push(' ');
        sql.push_str(&trailing.join(" "));
    }
    sql
}

fn column_indexes(columns: &[String], wanted: &[String]) -> Vec<Option<usize>> {
    wanted
        .iter()
        .map(|key| columns.iter().position(|c| c == key))
        .collect()
}

fn project(row: &[Value], indexes: &[Option<usize>]) -> Projection {
    let pick = |idx: &Option<usize>| {
        idx.and_then(|i| row.get(i).cloned())
            .unwrap_or(Value::Null)
    };
    if indexes.len() == 1 {
        Projection::Single(pick(&indexes[0]))
    } else {
        Projection::Tuple(indexes.iter().map(pick).collect())
    }
}
