// ==========================================
// 批量导入引擎 - 序列主键注入
// ==========================================
// 职责: 方言通过序列预取主键时,补齐列清单中缺失的主键列
// 适用: 仅模型形态与原始矩阵形态
// ==========================================

use crate::adapter::adapter_trait::Adapter;
use crate::domain::schema::ModelSchema;
use crate::domain::value::Value;
use tracing::debug;

pub struct KeyInjector<'a> {
    adapter: &'a dyn Adapter,
}

impl<'a> KeyInjector<'a> {
    pub fn new(adapter: &'a dyn Adapter) -> Self {
        Self { adapter }
    }

    /// 追加缺失的主键列并为每行补 Null 占位
    ///
    /// # 返回
    /// - 追加的列数（未触发时为 0）
    pub fn inject(
        &self,
        schema: &ModelSchema,
        column_names: &mut Vec<String>,
        rows: &mut [Vec<Value>],
    ) -> usize {
        let missing: Vec<&String> = schema
            .primary_key
            .iter()
            .filter(|pk| !column_names.contains(pk))
            .collect();

        if missing.is_empty() || !self.adapter.prefetch_primary_key() || schema.sequence_name.is_none() {
            return 0;
        }

        let mut added = 0;
        for pk in missing {
            if !column_names.contains(pk) {
                column_names.push(pk.clone());
                added += 1;
            }
        }
        for row in rows.iter_mut() {
            row.extend(std::iter::repeat(Value::Null).take(added));
        }

        debug!(
            table = %schema.table_name,
            sequence = ?schema.sequence_name,
            added,
            "已注入序列主键列"
        );
        added
    }
}
