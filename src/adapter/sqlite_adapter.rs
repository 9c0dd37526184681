// ==========================================
// 批量导入引擎 - SQLite 方言实现
// ==========================================
// 职责: 基于 rusqlite 执行多行 INSERT,支持 ON CONFLICT 与 RETURNING
// 红线: 一次 insert_many 只执行一条语句,不开启隐式分块
// ==========================================

use crate::adapter::adapter_trait::{assemble_insert_sql, quote_identifier, quote_string, standard_literal, Adapter};
use crate::adapter::error::{AdapterError, AdapterResult};
use crate::config::import_options::{DuplicateKeyUpdate, ImportOptions, UpdateColumns};
use crate::db::open_sqlite_connection;
use crate::domain::import_result::RawOutcome;
use crate::domain::schema::{ColumnDef, ColumnType, ModelSchema, UPDATE_TIMESTAMP_CANDIDATES};
use crate::domain::value::Value;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// SQLite 时间戳存储格式（UTC）
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// ==========================================
// SqliteAdapter
// ==========================================
pub struct SqliteAdapter {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAdapter {
    /// 由共享连接创建
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开数据库文件并应用统一 PRAGMA
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn open(db_path: &str) -> AdapterResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 共享连接（供调用方建表、查询）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 从 PRAGMA table_xinfo 读取表结构
    ///
    /// # 返回
    /// - ModelSchema: 列定义、主键（按声明顺序）、生成列标记
    pub fn load_schema(&self, table_name: &str) -> AdapterResult<ModelSchema> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| AdapterError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare(&format!("PRAGMA table_xinfo({})", quote_identifier(table_name)))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>("name")?,
                row.get::<_, Option<String>>("type")?.unwrap_or_default(),
                row.get::<_, i64>("notnull")?,
                row.get::<_, Option<String>>("dflt_value")?,
                row.get::<_, i64>("pk")?,
                row.get::<_, i64>("hidden")?,
            ))
        })?;

        let mut columns = Vec::new();
        let mut primary_key: Vec<(i64, String)> = Vec::new();
        for row in rows {
            let (name, declared, notnull, default, pk, hidden) = row?;
            // hidden: 1 = 虚表隐藏列, 2 = VIRTUAL 生成列, 3 = STORED 生成列
            if hidden == 1 {
                continue;
            }
            let column_type = ColumnType::from_declared(&declared);
            let mut column = if hidden >= 2 {
                ColumnDef::virtual_column(name.clone(), column_type)
            } else {
                ColumnDef::new(name.clone(), column_type)
            };
            if notnull != 0 {
                column = column.not_null();
            }
            if default.is_some() {
                column = column.with_default();
            }
            if pk > 0 {
                primary_key.push((pk, name));
            }
            columns.push(column);
        }

        if columns.is_empty() {
            return Err(AdapterError::Execution(format!("表不存在: {}", table_name)));
        }

        primary_key.sort_by_key(|(order, _)| *order);
        let schema = ModelSchema::new(table_name, columns)
            .with_primary_key(primary_key.into_iter().map(|(_, name)| name));

        debug!(
            table = %table_name,
            columns = schema.columns.len(),
            primary_key = ?schema.primary_key,
            "表结构已加载"
        );
        Ok(schema)
    }

    /// 冲突更新子句: ON CONFLICT(target) DO UPDATE SET ... [WHERE ...]
    fn on_conflict_update_clause(
        &self,
        table_name: &str,
        update: &DuplicateKeyUpdate,
        options: &ImportOptions,
    ) -> String {
        let quoted_table = self.quote_table_name(table_name);
        let target: &[String] = if update.conflict_target().is_empty() {
            &options.primary_key
        } else {
            update.conflict_target()
        };

        let mut clause = String::from("ON CONFLICT");
        if !target.is_empty() {
            let cols: Vec<String> = target.iter().map(|c| self.quote_column_name(c)).collect();
            clause.push_str(&format!("({})", cols.join(", ")));
            if let Some(predicate) = update.index_predicate() {
                clause.push_str(&format!(" WHERE {}", predicate));
            }
        }

        let assignments: Vec<String> = match update.update_columns() {
            UpdateColumns::List(cols) => cols
                .iter()
                .map(|col| self.assignment(&quoted_table, col, col, options))
                .collect(),
            UpdateColumns::Mapping(map) => map
                .iter()
                .map(|(target_col, source_col)| {
                    self.assignment(&quoted_table, target_col, source_col, options)
                })
                .collect(),
            // 入口处已展开为列清单
            UpdateColumns::All => Vec::new(),
        };

        if assignments.is_empty() || target.is_empty() {
            clause.push_str(" DO NOTHING");
            return clause;
        }

        clause.push_str(" DO UPDATE SET ");
        clause.push_str(&assignments.join(", "));
        if let Some(condition) = update.condition() {
            clause.push_str(&format!(" WHERE {}", condition));
        }
        clause
    }

    fn assignment(&self, quoted_table: &str, target: &str, source: &str, options: &ImportOptions) -> String {
        let quoted_target = self.quote_column_name(target);
        let quoted_source = self.quote_column_name(source);
        if options.locking_column.as_deref() == Some(target) {
            // 乐观锁列在冲突更新时递增
            format!("{} = {}.{} + 1", quoted_target, quoted_table, quoted_target)
        } else if UPDATE_TIMESTAMP_CANDIDATES.contains(&target) {
            // 更新时间戳为 NULL 表示保留原值
            format!(
                "{} = COALESCE(excluded.{}, {}.{})",
                quoted_target, quoted_source, quoted_table, quoted_target
            )
        } else {
            format!("{} = excluded.{}", quoted_target, quoted_source)
        }
    }

    /// RETURNING 列: 主键 + returning,需要回传时追加对齐键
    fn returning_columns(options: &ImportOptions) -> Vec<String> {
        if !options.wants_returned_values() {
            return Vec::new();
        }
        let match_keys = options.row_match_keys();
        let mut cols: Vec<String> = Vec::new();
        for col in options
            .primary_key
            .iter()
            .chain(options.returning.iter())
            .chain(match_keys.iter())
        {
            if !cols.contains(col) {
                cols.push(col.clone());
            }
        }
        cols
    }
}

/// 执行语句并收集回传行（无结果列时返回影响行数）
///
/// SQLite 不保证 RETURNING 行与 VALUES 值组同序,按对齐键重排由语句组装层负责
fn run_statement(conn: &Connection, sql: &str) -> AdapterResult<RawOutcome> {
    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() == 0 {
        let affected = stmt.execute([])?;
        return Ok(RawOutcome::affected(affected));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(value_from_sql(row.get_ref(i)?));
        }
        collected.push(values);
    }

    Ok(RawOutcome {
        rows_affected: collected.len(),
        columns,
        rows: collected,
    })
}

fn value_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl Adapter for SqliteAdapter {
    fn adapter_name(&self) -> &str {
        "sqlite"
    }

    fn quote_value(&self, value: &Value) -> String {
        match value {
            Value::Bool(v) => (if *v { "1" } else { "0" }).to_string(),
            Value::Timestamp(ts) => quote_string(&ts.format(SQLITE_TIMESTAMP_FORMAT).to_string()),
            other => standard_literal(other),
        }
    }

    fn post_sql_statements(&self, table_name: &str, options: &ImportOptions) -> Vec<String> {
        let mut sql = Vec::new();

        if let Some(update) = &options.on_duplicate_key_update {
            sql.push(self.on_conflict_update_clause(table_name, update, options));
        } else if options.on_duplicate_key_ignore {
            sql.push("ON CONFLICT DO NOTHING".to_string());
        }

        let returning = Self::returning_columns(options);
        if !returning.is_empty() {
            let cols: Vec<String> = returning.iter().map(|c| self.quote_column_name(c)).collect();
            sql.push(format!("RETURNING {}", cols.join(", ")));
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
        debug!(adapter = "sqlite", rows = value_groups.len(), sql_len = sql.len(), "执行多行插入");

        let conn = self
            .conn
            .lock()
            .map_err(|e| AdapterError::LockError(e.to_string()))?;
        run_statement(&conn, &sql)
    }

    fn supports_on_duplicate_key_update(&self) -> bool {
        true
    }

    fn supports_setting_primary_key_of_imported_objects(&self) -> bool {
        true
    }

    fn supports_virtual_columns(&self) -> bool {
        true
    }

    fn select_rows(
        &self,
        table_name: &str,
        columns: &[String],
        key_columns: &[String],
        keys: &[Vec<Value>],
    ) -> AdapterResult<Option<RawOutcome>> {
        let predicates: Vec<String> = keys
            .iter()
            .filter(|key| key.len() == key_columns.len() && key.iter().all(|v| !v.is_null()))
            .map(|key| {
                let parts: Vec<String> = key_columns
                    .iter()
                    .zip(key.iter())
                    .map(|(col, value)| format!("{} = {}", self.quote_column_name(col), self.quote_value(value)))
                    .collect();
                format!("({})", parts.join(" AND "))
            })
            .collect();

        if predicates.is_empty() || key_columns.is_empty() {
            return Ok(Some(RawOutcome::default()));
        }

        let select_list: Vec<String> = columns.iter().map(|c| self.quote_column_name(c)).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            select_list.join(", "),
            self.quote_table_name(table_name),
            predicates.join(" OR ")
        );

        let conn = self
            .conn
            .lock()
            .map_err(|e| AdapterError::LockError(e.to_string()))?;
        run_statement(&conn, &sql).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::import_options::DuplicateKeyUpdateSpec;
    use chrono::{TimeZone, Utc};
    use indexmap::IndexMap;

    fn adapter() -> SqliteAdapter {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE widgets (
                id INTEGER PRIMARY KEY,
                sku TEXT NOT NULL UNIQUE,
                price REAL,
                lock_version INTEGER NOT NULL DEFAULT 0,
                updated_at DATETIME,
                sku_upper TEXT GENERATED ALWAYS AS (upper(sku)) VIRTUAL
            )",
        )
        .unwrap();
        SqliteAdapter::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_load_schema_reads_pk_and_generated_columns() {
        let schema = adapter().load_schema("widgets").unwrap();
        assert_eq!(schema.primary_key, vec!["id"]);
        assert!(schema.column("sku_upper").unwrap().is_virtual);
        assert!(!schema.column("sku").unwrap().null);
        assert!(schema.column("lock_version").unwrap().has_default);
        assert_eq!(schema.column("updated_at").unwrap().column_type, ColumnType::Timestamp);
    }

    #[test]
    fn test_load_schema_missing_table() {
        assert!(matches!(
            adapter().load_schema("nope"),
            Err(AdapterError::Execution(_))
        ));
    }

    #[test]
    fn test_quote_value_dialect() {
        let adapter = adapter();
        assert_eq!(adapter.quote_value(&Value::Bool(true)), "1");
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(adapter.quote_value(&Value::Timestamp(ts)), "'2024-01-02 03:04:05'");
    }

    #[test]
    fn test_post_sql_upsert_clause() {
        let adapter = adapter();
        let mut mapping = IndexMap::new();
        mapping.insert("price".to_string(), "price".to_string());
        let options = ImportOptions {
            primary_key: vec!["id".to_string()],
            locking_column: Some("lock_version".to_string()),
            on_duplicate_key_update: Some(DuplicateKeyUpdate::Spec(DuplicateKeyUpdateSpec {
                columns: UpdateColumns::List(vec![
                    "price".to_string(),
                    "lock_version".to_string(),
                    "updated_at".to_string(),
                ]),
                conflict_target: vec!["sku".to_string()],
                index_predicate: None,
                condition: Some("\"widgets\".\"price\" IS NOT NULL".to_string()),
            })),
            ..Default::default()
        };

        let post = adapter.post_sql_statements("widgets", &options);
        assert_eq!(
            post[0],
            "ON CONFLICT(\"sku\") DO UPDATE SET \"price\" = excluded.\"price\", \
             \"lock_version\" = \"widgets\".\"lock_version\" + 1, \
             \"updated_at\" = COALESCE(excluded.\"updated_at\", \"widgets\".\"updated_at\") \
             WHERE \"widgets\".\"price\" IS NOT NULL"
        );
        assert_eq!(post[1], "RETURNING \"id\", \"sku\"");
    }

    #[test]
    fn test_post_sql_ignore_and_empty_update() {
        let adapter = adapter();
        let ignore = ImportOptions {
            on_duplicate_key_ignore: true,
            ..Default::default()
        };
        assert_eq!(adapter.post_sql_statements("widgets", &ignore), vec!["ON CONFLICT DO NOTHING"]);

        let empty_update = ImportOptions {
            primary_key: vec!["id".to_string()],
            on_duplicate_key_update: Some(DuplicateKeyUpdate::Columns(Vec::new())),
            ..Default::default()
        };
        assert_eq!(
            adapter.post_sql_statements("widgets", &empty_update)[0],
            "ON CONFLICT(\"id\") DO NOTHING"
        );
    }

    #[test]
    fn test_insert_many_returns_generated_ids() {
        let adapter = adapter();
        let options = ImportOptions {
            primary_key: vec!["id".to_string()],
            returning: vec!["sku".to_string()],
            ..Default::default()
        };
        let mut parts = vec!["INSERT INTO \"widgets\" (\"sku\",\"price\") VALUES ".to_string()];
        parts.extend(adapter.post_sql_statements("widgets", &options));

        let raw = adapter
            .insert_many(&parts, &["('a',1.0)".to_string(), "('b',2.0)".to_string()], &options)
            .unwrap();
        assert_eq!(raw.rows_affected, 2);
        assert_eq!(raw.columns, vec!["id", "sku"]);

        let (ids, results) = adapter.split_ids_and_results(&raw, &options);
        assert_eq!(ids.len(), 2);
        assert_eq!(results[1], crate::domain::value::Projection::Single(Value::from("b")));
    }

    #[test]
    fn test_unique_violation_propagates() {
        let adapter = adapter();
        let parts = vec!["INSERT INTO \"widgets\" (\"sku\") VALUES ".to_string()];
        let err = adapter
            .insert_many(&parts, &["('a')".to_string(), "('a')".to_string()], &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, AdapterError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_select_rows_by_key() {
        let adapter = adapter();
        let parts = vec!["INSERT INTO \"widgets\" (\"id\",\"sku\") VALUES ".to_string()];
        adapter
            .insert_many(&parts, &["(7,'x')".to_string(), "(8,'y')".to_string()], &ImportOptions::default())
            .unwrap();

        let raw = adapter
            .select_rows(
                "widgets",
                &["id".to_string(), "sku".to_string()],
                &["id".to_string()],
                &[vec![Value::Integer(8)], vec![Value::Null]],
            )
            .unwrap()
            .unwrap();
        assert_eq!(raw.rows, vec![vec![Value::Integer(8), Value::from("y")]]);
    }
}
