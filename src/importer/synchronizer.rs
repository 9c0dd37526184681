// ==========================================
// 批量导入引擎 - 结果回写与同步
// ==========================================
// 职责: 将生成主键、时间戳、returning 列写回源对象并清空变更追踪
// 红线: 只触碰保留行对应的源对象；失败对象保持原样
// ==========================================

use crate::adapter::adapter_trait::Adapter;
use crate::config::import_options::ImportOptions;
use crate::domain::import_result::RawOutcome;
use crate::domain::model::Model;
use crate::domain::schema::ModelSchema;
use crate::domain::value::{Projection, Value};
use crate::importer::error::ImportOutcome;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, warn};

pub struct Synchronizer<'a> {
    adapter: &'a dyn Adapter,
    schema: &'a ModelSchema,
}

impl<'a> Synchronizer<'a> {
    pub fn new(adapter: &'a dyn Adapter, schema: &'a ModelSchema) -> Self {
        Self { adapter, schema }
    }

    /// 回写主键/时间戳/returning 列并标记为已持久化
    ///
    /// # 参数
    /// - survivors: 保留行对应的源对象（按插入顺序）
    /// - timestamps: 本次填充的时间戳（只写入仍为 Null 的属性）
    pub fn set_attributes_and_mark_clean<M: Model>(
        &self,
        survivors: &mut [&mut M],
        ids: &[Projection],
        results: &[Projection],
        timestamps: &IndexMap<String, DateTime<Utc>>,
        options: &ImportOptions,
    ) {
        if ids.len() == survivors.len() {
            for (model, id) in survivors.iter_mut().zip(ids.iter()) {
                self.write_projection(&mut **model, &options.primary_key, id);
                for (attribute, stamped) in timestamps {
                    if model.read_attribute(attribute).is_null() {
                        model.write_attribute(attribute, Value::Timestamp(*stamped));
                    }
                }
            }
        } else if !ids.is_empty() {
            debug!(
                table = %self.schema.table_name,
                ids = ids.len(),
                survivors = survivors.len(),
                "回传主键数与保留行数不一致,跳过主键回写"
            );
        }

        if !options.returning.is_empty() && results.len() == survivors.len() {
            for (model, result) in survivors.iter_mut().zip(results.iter()) {
                self.write_projection(&mut **model, &options.returning, result);
            }
        }

        for model in survivors.iter_mut() {
            model.mark_clean();
        }
    }

    /// 从存储回读保留行（按 synchronize_keys,默认主键）
    ///
    /// # 返回
    /// - 成功同步的对象数
    pub fn synchronize<M: Model>(&self, survivors: &mut [&mut M], options: &ImportOptions) -> ImportOutcome<usize> {
        let keys: Vec<String> = options
            .synchronize_keys
            .clone()
            .unwrap_or_else(|| self.schema.primary_key.clone());
        if keys.is_empty() || survivors.is_empty() {
            return Ok(0);
        }

        let key_values: Vec<Vec<Value>> = survivors
            .iter()
            .map(|model| keys.iter().map(|k| model.read_attribute(k)).collect())
            .collect();

        let raw = match self.adapter.select_rows(
            &self.schema.table_name,
            &self.schema.column_names(),
            &keys,
            &key_values,
        )? {
            Some(raw) => raw,
            None => {
                warn!(
                    adapter = self.adapter.adapter_name(),
                    table = %self.schema.table_name,
                    "方言不支持回读,跳过 synchronize"
                );
                return Ok(0);
            }
        };

        let RawOutcome { columns, rows, .. } = raw;
        let rows: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| self.coerce(column, value))
                    .collect()
            })
            .collect();
        let key_indexes: Vec<Option<usize>> = keys
            .iter()
            .map(|k| columns.iter().position(|c| c == k))
            .collect();

        let mut synced = 0;
        for (model, wanted) in survivors.iter_mut().zip(key_values.iter()) {
            let matched = rows.iter().find(|row| {
                key_indexes
                    .iter()
                    .zip(wanted.iter())
                    .all(|(idx, value)| idx.and_then(|i| row.get(i)) == Some(value))
            });
            let Some(row) = matched else {
                continue;
            };
            for (column, value) in columns.iter().zip(row.iter()) {
                model.write_attribute(column, value.clone());
            }
            model.mark_clean();
            synced += 1;
        }

        debug!(table = %self.schema.table_name, synced, "synchronize 完成");
        Ok(synced)
    }

    fn write_projection<M: Model>(&self, model: &mut M, columns: &[String], projection: &Projection) {
        for (column, value) in columns.iter().zip(projection.values()) {
            model.write_attribute(column, self.coerce(column, value));
        }
    }

    /// 回传值按列类型还原
    fn coerce(&self, column: &str, value: Value) -> Value {
        match self.schema.column(column) {
            Some(def) => value.coerce_to(def.column_type),
            None => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::error::AdapterResult;
    use crate::domain::dynamic_record::DynamicRecord;
    use crate::domain::schema::{ColumnDef, ColumnType};
    use chrono::TimeZone;

    struct ReadBackAdapter {
        stored: RawOutcome,
    }

    impl Adapter for ReadBackAdapter {
        fn adapter_name(&self) -> &str {
            "read_back"
        }
        fn post_sql_statements(&self, _: &str, _: &ImportOptions) -> Vec<String> {
            Vec::new()
        }
        fn insert_many(&self, _: &[String], _: &[String], _: &ImportOptions) -> AdapterResult<RawOutcome> {
            Ok(RawOutcome::default())
        }
        fn select_rows(
            &self,
            _: &str,
            _: &[String],
            _: &[String],
            _: &[Vec<Value>],
        ) -> AdapterResult<Option<RawOutcome>> {
            Ok(Some(self.stored.clone()))
        }
    }

    fn schema() -> ModelSchema {
        ModelSchema::new(
            "notes",
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::new("body", ColumnType::Text),
                ColumnDef::new("updated_at", ColumnType::Timestamp),
            ],
        )
    }

    fn adapter() -> ReadBackAdapter {
        ReadBackAdapter {
            stored: RawOutcome::default(),
        }
    }

    #[test]
    fn test_ids_and_timestamps_written_when_counts_match() {
        let schema = schema();
        let adapter = adapter();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut a = DynamicRecord::with_attributes(&schema, [("body", "a")]);
        let mut b = DynamicRecord::with_attributes(&schema, [("body", "b")]);
        let mut timestamps = IndexMap::new();
        timestamps.insert("updated_at".to_string(), now);
        let options = ImportOptions {
            primary_key: vec!["id".to_string()],
            ..Default::default()
        };

        {
            let mut survivors = vec![&mut a, &mut b];
            Synchronizer::new(&adapter, &schema).set_attributes_and_mark_clean(
                &mut survivors,
                &[Projection::Single(Value::Integer(10)), Projection::Single(Value::Integer(11))],
                &[],
                &timestamps,
                &options,
            );
        }

        assert_eq!(a.read_attribute("id"), Value::Integer(10));
        assert_eq!(b.read_attribute("id"), Value::Integer(11));
        assert_eq!(a.read_attribute("updated_at"), Value::Timestamp(now));
        assert!(a.is_persisted() && b.is_persisted());
        assert!(!a.attribute_changed("body"));
    }

    #[test]
    fn test_mismatched_id_count_still_marks_clean() {
        let schema = schema();
        let adapter = adapter();
        let mut a = DynamicRecord::with_attributes(&schema, [("body", "a")]);
        let mut b = DynamicRecord::with_attributes(&schema, [("body", "b")]);
        let options = ImportOptions {
            primary_key: vec!["id".to_string()],
            ..Default::default()
        };

        {
            let mut survivors = vec![&mut a, &mut b];
            Synchronizer::new(&adapter, &schema).set_attributes_and_mark_clean(
                &mut survivors,
                &[Projection::Single(Value::Integer(10))],
                &[],
                &IndexMap::new(),
                &options,
            );
        }
        assert_eq!(a.read_attribute("id"), Value::Null);
        assert!(a.is_persisted());
    }

    #[test]
    fn test_returning_columns_coerced_by_type() {
        let schema = schema();
        let adapter = adapter();
        let mut a = DynamicRecord::with_attributes(&schema, [("body", "a")]);
        let options = ImportOptions {
            returning: vec!["updated_at".to_string()],
            ..Default::default()
        };

        {
            let mut survivors = vec![&mut a];
            Synchronizer::new(&adapter, &schema).set_attributes_and_mark_clean(
                &mut survivors,
                &[],
                &[Projection::Single(Value::from("2024-06-01 00:00:00"))],
                &IndexMap::new(),
                &options,
            );
        }
        assert_eq!(
            a.read_attribute("updated_at"),
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_synchronize_reloads_matching_rows() {
        let schema = schema();
        let adapter = ReadBackAdapter {
            stored: RawOutcome {
                rows_affected: 1,
                columns: vec!["id".to_string(), "body".to_string(), "updated_at".to_string()],
                rows: vec![vec![Value::Integer(1), Value::from("from db"), Value::Null]],
            },
        };
        let mut a = DynamicRecord::with_attributes(&schema, [("id", Value::Integer(1)), ("body", "local".into())]);
        let mut b = DynamicRecord::with_attributes(&schema, [("id", Value::Integer(2)), ("body", "other".into())]);

        let synced = {
            let mut survivors = vec![&mut a, &mut b];
            Synchronizer::new(&adapter, &schema)
                .synchronize(&mut survivors, &ImportOptions::default())
                .unwrap()
        };
        assert_eq!(synced, 1);
        assert_eq!(a.read_attribute("body"), Value::from("from db"));
        assert!(a.is_persisted());
        assert_eq!(b.read_attribute("body"), Value::from("other"));
        assert!(!b.is_persisted());
    }
}
