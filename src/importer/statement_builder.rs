// ==========================================
// 批量导入引擎 - 语句组装
// ==========================================
// 职责: 组装值组并调用一次 insert_many
// 红线: 每次调用恰好一次执行；分块由入口负责
// ==========================================

use crate::adapter::adapter_trait::Adapter;
use crate::config::import_options::ImportOptions;
use crate::domain::import_result::RawOutcome;
use crate::domain::schema::ModelSchema;
use crate::domain::value::{Projection, Value};
use crate::importer::error::{ImportError, ImportOutcome};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// 一次执行的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutedBatch {
    pub num_inserts: usize,
    pub ids: Vec<Projection>,
    pub results: Vec<Projection>,
}

pub struct StatementBuilder<'a> {
    adapter: &'a dyn Adapter,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(adapter: &'a dyn Adapter) -> Self {
        Self { adapter }
    }

    /// 语句头部: "[pre_sql] INSERT [keywords] INTO table (cols) VALUES "
    pub fn statement_head(&self, schema: &ModelSchema, column_names: &[String], options: &ImportOptions) -> String {
        let pre = self.adapter.pre_sql_statements(options);
        let columns: Vec<String> = column_names
            .iter()
            .map(|c| self.adapter.quote_column_name(c))
            .collect();
        format!(
            "{} INTO {} ({}) VALUES ",
            pre.join(" "),
            self.adapter.quote_table_name(&schema.table_name),
            columns.join(",")
        )
    }

    /// 单行值组 "(v1,v2,...)"
    ///
    /// 锁列为 Null 时写 0；配置序列的主键列为 Null 时写序列取值表达式
    pub fn value_group(&self, schema: &ModelSchema, column_names: &[String], row: &[Value], options: &ImportOptions) -> String {
        let sequence_expr = schema
            .sequence_name
            .as_deref()
            .and_then(|seq| self.adapter.next_value_for_sequence(seq));

        let literals: Vec<String> = column_names
            .iter()
            .zip(row.iter())
            .map(|(column, value)| {
                if value.is_null() {
                    if options.locking_column.as_deref() == Some(column.as_str()) {
                        return "0".to_string();
                    }
                    if let Some(expr) = &sequence_expr {
                        if schema.is_primary_key(column) {
                            return expr.clone();
                        }
                    }
                }
                self.adapter.quote_value(value)
            })
            .collect();
        format!("({})", literals.join(","))
    }

    /// 组装并执行一条多行 INSERT
    pub fn execute(
        &self,
        schema: &ModelSchema,
        column_names: &[String],
        rows: &[Vec<Value>],
        options: &ImportOptions,
    ) -> ImportOutcome<ExecutedBatch> {
        if rows.is_empty() {
            return Ok(ExecutedBatch::default());
        }
        if column_names.is_empty() {
            return Err(ImportError::invalid_input(format!(
                "表 {} 没有可插入的列",
                schema.table_name
            )));
        }

        let mut statement_parts = vec![self.statement_head(schema, column_names, options)];
        statement_parts.extend(self.adapter.post_sql_statements(&schema.table_name, options));

        let value_groups: Vec<String> = rows
            .iter()
            .map(|row| self.value_group(schema, column_names, row, options))
            .collect();

        let raw = self.adapter.insert_many(&statement_parts, &value_groups, options)?;
        let returned = raw.rows.len();

        let (ids, results) = if self.adapter.supports_setting_primary_key_of_imported_objects()
            && options.wants_returned_values()
        {
            let raw = self.align_returned_rows(schema, column_names, rows, raw, options);
            self.adapter.split_ids_and_results(&raw, options)
        } else {
            (Vec::new(), Vec::new())
        };

        debug!(
            table = %schema.table_name,
            rows = rows.len(),
            returned,
            ids = ids.len(),
            "多行插入已执行"
        );

        Ok(ExecutedBatch {
            num_inserts: rows.len(),
            ids,
            results,
        })
    }

    /// 按对齐键把回传行重排为值组顺序
    ///
    /// 无对齐键、行数不一致或任一行无法匹配时保持回传顺序
    fn align_returned_rows(
        &self,
        schema: &ModelSchema,
        column_names: &[String],
        rows: &[Vec<Value>],
        mut raw: RawOutcome,
        options: &ImportOptions,
    ) -> RawOutcome {
        let keys = options.row_match_keys();
        if keys.is_empty() || raw.rows.len() != rows.len() {
            return raw;
        }

        match self.match_order(&keys, column_names, rows, &raw) {
            Some(order) => {
                let mut returned: Vec<Option<Vec<Value>>> = raw.rows.drain(..).map(Some).collect();
                raw.rows = order.iter().filter_map(|&i| returned[i].take()).collect();
            }
            None => debug!(
                table = %schema.table_name,
                keys = ?keys,
                "回传行无法按对齐键匹配,保持回传顺序"
            ),
        }
        raw
    }

    /// 每个输入行对应的回传行下标
    fn match_order(
        &self,
        keys: &[String],
        column_names: &[String],
        rows: &[Vec<Value>],
        raw: &RawOutcome,
    ) -> Option<Vec<usize>> {
        let input_indexes = key_positions(column_names, keys)?;
        let returned_indexes = key_positions(&raw.columns, keys)?;

        let mut buckets: HashMap<Vec<String>, VecDeque<usize>> = HashMap::new();
        for (position, row) in raw.rows.iter().enumerate() {
            let key = self.render_key(row, &returned_indexes)?;
            buckets.entry(key).or_default().push_back(position);
        }

        rows.iter()
            .map(|row| {
                let key = self.render_key(row, &input_indexes)?;
                buckets.get_mut(&key)?.pop_front()
            })
            .collect()
    }

    /// 键值按方言字面量渲染；含 NULL 时不可用于对齐
    fn render_key(&self, row: &[Value], indexes: &[usize]) -> Option<Vec<String>> {
        indexes
            .iter()
            .map(|&i| {
                row.get(i)
                    .filter(|value| !value.is_null())
                    .map(|value| self.adapter.quote_value(value))
            })
            .collect()
    }
}

fn key_positions(columns: &[String], keys: &[String]) -> Option<Vec<usize>> {
    keys.iter()
        .map(|key| columns.iter().position(|c| c == key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::error::AdapterResult;
    use crate::domain::schema::{ColumnDef, ColumnType};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingAdapter {
        statements: Mutex<Vec<(Vec<String>, Vec<String>)>>,
    }

    impl Adapter for CapturingAdapter {
        fn adapter_name(&self) -> &str {
            "capturing"
        }
        fn post_sql_statements(&self, _: &str, options: &ImportOptions) -> Vec<String> {
            options.post_sql.iter().cloned().collect()
        }
        fn insert_many(&self, parts: &[String], values: &[String], _: &ImportOptions) -> AdapterResult<RawOutcome> {
            self.statements
                .lock()
                .unwrap()
                .push((parts.to_vec(), values.to_vec()));
            Ok(RawOutcome::affected(values.len()))
        }
        fn next_value_for_sequence(&self, sequence_name: &str) -> Option<String> {
            Some(format!("nextval('{}')", sequence_name))
        }
    }

    /// 回写型方言: 回传行顺序与值组顺序相反
    struct ReversedReturningAdapter;

    impl Adapter for ReversedReturningAdapter {
        fn adapter_name(&self) -> &str {
            "reversed"
        }
        fn post_sql_statements(&self, _: &str, _: &ImportOptions) -> Vec<String> {
            Vec::new()
        }
        fn insert_many(&self, _: &[String], values: &[String], _: &ImportOptions) -> AdapterResult<RawOutcome> {
            let rows: Vec<Vec<Value>> = values
                .iter()
                .enumerate()
                .rev()
                .map(|(i, group)| {
                    let name = group.trim_matches(|c| c == '(' || c == ')' || c == '\'');
                    vec![Value::Integer(i as i64 + 1), Value::from(name)]
                })
                .collect();
            Ok(RawOutcome {
                rows_affected: rows.len(),
                columns: vec!["id".to_string(), "name".to_string()],
                rows,
            })
        }
        fn supports_setting_primary_key_of_imported_objects(&self) -> bool {
            true
        }
    }

    fn schema() -> ModelSchema {
        ModelSchema::new(
            "items",
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::new("name", ColumnType::Text),
                ColumnDef::new("lock_version", ColumnType::Integer),
            ],
        )
        .with_sequence("items_id_seq")
        .with_locking_column("lock_version")
    }

    #[test]
    fn test_one_statement_with_sequence_and_lock_defaults() {
        let adapter = CapturingAdapter::default();
        let schema = schema();
        let options = ImportOptions {
            primary_key: vec!["id".to_string()],
            locking_column: Some("lock_version".to_string()),
            keywords: vec!["OR IGNORE".to_string()],
            post_sql: Some("/* tail */".to_string()),
            ..Default::default()
        };
        let columns = vec!["id".to_string(), "name".to_string(), "lock_version".to_string()];
        let rows = vec![
            vec![Value::Null, Value::from("a"), Value::Null],
            vec![Value::Integer(9), Value::from("b"), Value::Integer(3)],
        ];

        let executed = StatementBuilder::new(&adapter)
            .execute(&schema, &columns, &rows, &options)
            .unwrap();
        assert_eq!(executed.num_inserts, 2);
        // 方言不支持主键回写,ids 为空
        assert!(executed.ids.is_empty());

        let statements = adapter.statements.lock().unwrap();
        assert_eq!(statements.len(), 1);
        let (parts, values) = &statements[0];
        assert_eq!(parts[0], "INSERT OR IGNORE INTO \"items\" (\"id\",\"name\",\"lock_version\") VALUES ");
        assert_eq!(parts[1], "/* tail */");
        assert_eq!(values[0], "(nextval('items_id_seq'),'a',0)");
        assert_eq!(values[1], "(9,'b',3)");
    }

    #[test]
    fn test_no_rows_no_statement() {
        let adapter = CapturingAdapter::default();
        let executed = StatementBuilder::new(&adapter)
            .execute(&schema(), &["name".to_string()], &[], &ImportOptions::default())
            .unwrap();
        assert_eq!(executed, ExecutedBatch::default());
        assert!(adapter.statements.lock().unwrap().is_empty());
    }

    #[test]
    fn test_returned_rows_realigned_by_synchronize_keys() {
        let adapter = ReversedReturningAdapter;
        let columns = vec!["name".to_string()];
        let rows = vec![vec![Value::from("a")], vec![Value::from("b")], vec![Value::from("c")]];
        let options = ImportOptions {
            primary_key: vec!["id".to_string()],
            synchronize_keys: Some(vec!["name".to_string()]),
            ..Default::default()
        };

        let executed = StatementBuilder::new(&adapter)
            .execute(&schema(), &columns, &rows, &options)
            .unwrap();
        assert_eq!(
            executed.ids,
            vec![
                Projection::Single(Value::Integer(1)),
                Projection::Single(Value::Integer(2)),
                Projection::Single(Value::Integer(3)),
            ]
        );
    }

    #[test]
    fn test_returned_rows_keep_order_without_match_keys() {
        let adapter = ReversedReturningAdapter;
        let columns = vec!["name".to_string()];
        let rows = vec![vec![Value::from("a")], vec![Value::from("b")]];
        let options = ImportOptions {
            primary_key: vec!["id".to_string()],
            ..Default::default()
        };

        let executed = StatementBuilder::new(&adapter)
            .execute(&schema(), &columns, &rows, &options)
            .unwrap();
        assert_eq!(
            executed.ids,
            vec![
                Projection::Single(Value::Integer(2)),
                Projection::Single(Value::Integer(1)),
            ]
        );
    }
}
