// ==========================================
// 批量导入引擎 - 时间戳填充
// ==========================================
// 职责: 为创建/更新时间戳列填充当前时间,缺失时追加列
// 规则: 冲突更新下,已持久化且未修改的对象,其更新时间戳写 NULL（保留存储值）
// ==========================================

use crate::adapter::adapter_trait::Adapter;
use crate::config::import_options::ImportOptions;
use crate::domain::schema::ModelSchema;
use crate::domain::value::Value;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StampAction {
    Create,
    Update,
}

pub struct TimestampStamper<'a> {
    adapter: &'a dyn Adapter,
}

impl<'a> TimestampStamper<'a> {
    pub fn new(adapter: &'a dyn Adapter) -> Self {
        Self { adapter }
    }

    /// 填充时间戳
    ///
    /// # 参数
    /// - now: 本次调用的统一时间
    /// - keep_unchanged: (行号, 列名) → 该行是否为已持久化且未修改该列的对象
    ///
    /// # 返回
    /// - 列名 → 填充的时间（供回写使用）
    pub fn stamp(
        &self,
        schema: &ModelSchema,
        column_names: &mut Vec<String>,
        rows: &mut [Vec<Value>],
        options: &mut ImportOptions,
        now: DateTime<Utc>,
        keep_unchanged: &dyn Fn(usize, &str) -> bool,
    ) -> IndexMap<String, DateTime<Utc>> {
        let mut stamped = IndexMap::new();
        let upserting = options.on_duplicate_key_update.is_some();

        let targets = schema
            .timestamp_attributes_for_create()
            .into_iter()
            .map(|c| (StampAction::Create, c))
            .chain(
                schema
                    .timestamp_attributes_for_update()
                    .into_iter()
                    .map(|c| (StampAction::Update, c)),
            );

        for (action, column) in targets {
            stamped.insert(column.clone(), now);
            let leave_null =
                |row_index: usize| upserting && action == StampAction::Update && keep_unchanged(row_index, &column);

            match column_names.iter().position(|c| c == &column) {
                Some(index) => {
                    for (row_index, row) in rows.iter_mut().enumerate() {
                        if leave_null(row_index) {
                            row[index] = Value::Null;
                        } else if row[index].is_null() {
                            row[index] = Value::Timestamp(now);
                        }
                    }
                }
                None => {
                    column_names.push(column.clone());
                    for (row_index, row) in rows.iter_mut().enumerate() {
                        row.push(if leave_null(row_index) {
                            Value::Null
                        } else {
                            Value::Timestamp(now)
                        });
                    }
                }
            }

            if action == StampAction::Update && self.adapter.supports_on_duplicate_key_update() {
                if let Some(update) = options.on_duplicate_key_update.as_mut() {
                    update.add_update_column(&column);
                }
            }
        }

        debug!(table = %schema.table_name, columns = ?stamped.keys().collect::<Vec<_>>(), "时间戳已填充");
        stamped
    }
}
