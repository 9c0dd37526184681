// ==========================================
// 批量导入引擎 - 输入规范化
// ==========================================
// 职责: 将四种输入形态统一为 (列清单, 行矩阵, 源对象)
// 红线: 下游组件不再检查输入形态
// 红线: 空批次直接短路,不生成任何语句
// ==========================================

use crate::adapter::adapter_trait::Adapter;
use crate::domain::model::Model;
use crate::domain::schema::{ColumnType, ModelSchema};
use crate::domain::value::Value;
use crate::importer::error::{ImportError, ImportOutcome};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

// ==========================================
// ImportInput - 导入输入形态
// ==========================================
pub enum ImportInput<'m, M> {
    /// 模型实例序列（可选显式列清单）
    Models {
        columns: Option<Vec<String>>,
        models: Vec<&'m mut M>,
    },
    /// 键值映射行（显式列清单时允许多余键）
    Mappings {
        columns: Option<Vec<String>>,
        rows: Vec<IndexMap<String, Value>>,
    },
    /// 空批次
    Empty,
    /// 原始列清单 + 行矩阵
    Raw {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

impl<'m, M> ImportInput<'m, M> {
    pub fn models(models: &'m mut [M]) -> Self {
        ImportInput::Models {
            columns: None,
            models: models.iter_mut().collect(),
        }
    }

    pub fn models_with_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        models: &'m mut [M],
    ) -> Self {
        ImportInput::Models {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            models: models.iter_mut().collect(),
        }
    }

    pub fn mappings(rows: Vec<IndexMap<String, Value>>) -> Self {
        ImportInput::Mappings { columns: None, rows }
    }

    pub fn raw<S: Into<String>>(columns: impl IntoIterator<Item = S>, rows: Vec<Vec<Value>>) -> Self {
        ImportInput::Raw {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }
}

/// 规范化后的输入来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputForm {
    Models,
    Mappings,
    Raw,
}

impl InputForm {
    /// 主键注入只适用于模型与原始矩阵形态
    pub fn allows_key_injection(&self) -> bool {
        matches!(self, InputForm::Models | InputForm::Raw)
    }
}

// ==========================================
// NormalizedBatch - 规范化批次（调用内局部状态）
// ==========================================
pub struct NormalizedBatch<'m, M> {
    pub form: InputForm,
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub source_objects: Vec<&'m mut M>, // 仅模型形态非空,与 rows 同序
}

// ==========================================
// InputNormalizer
// ==========================================
pub struct InputNormalizer<'a> {
    adapter: &'a dyn Adapter,
    schema: &'a ModelSchema,
}

impl<'a> InputNormalizer<'a> {
    pub fn new(adapter: &'a dyn Adapter, schema: &'a ModelSchema) -> Self {
        Self { adapter, schema }
    }

    /// 规范化输入
    ///
    /// # 返回
    /// - Ok(None): 空批次
    /// - Ok(Some(batch)): 规范化批次
    /// - Err(InvalidInput): 输入形状错误
    pub fn normalize<'m, M: Model>(
        &self,
        input: ImportInput<'m, M>,
    ) -> ImportOutcome<Option<NormalizedBatch<'m, M>>> {
        match input {
            ImportInput::Empty => Ok(None),
            ImportInput::Models { models, .. } if models.is_empty() => Ok(None),
            ImportInput::Mappings { rows, .. } if rows.is_empty() => Ok(None),
            ImportInput::Raw { rows, .. } if rows.is_empty() => Ok(None),
            ImportInput::Models { columns, models } => self.normalize_models(columns, models).map(Some),
            ImportInput::Mappings { columns, rows } => self.normalize_mappings(columns, rows).map(Some),
            ImportInput::Raw { columns, rows } => self.normalize_raw(columns, rows).map(Some),
        }
    }

    fn normalize_models<'m, M: Model>(
        &self,
        columns: Option<Vec<String>>,
        mut models: Vec<&'m mut M>,
    ) -> ImportOutcome<NormalizedBatch<'m, M>> {
        let mut column_names = match columns {
            Some(explicit) => {
                self.check_columns(&explicit)?;
                explicit
            }
            None if self.adapter.supports_virtual_columns() => self.schema.insertable_column_names(),
            None => self.schema.column_names(),
        };

        // 整批均为新对象时,UUID 主键由应用或服务端生成
        if models.iter().all(|model| model.id(self.schema).is_null()) {
            column_names.retain(|c| {
                !(self.schema.is_primary_key(c)
                    && self
                        .schema
                        .column(c)
                        .map(|def| def.column_type == ColumnType::Uuid)
                        .unwrap_or(false))
            });
        }

        if !self.adapter.supports_identity_insert() {
            column_names.retain(|c| !self.schema.is_primary_key(c));
        }

        if self.adapter.supports_setting_primary_key_of_imported_objects() {
            for model in models.iter_mut() {
                model.load_association_ids();
            }
        }

        let rows: Vec<Vec<Value>> = models
            .iter()
            .map(|model| column_names.iter().map(|c| model.read_attribute(c)).collect())
            .collect();

        debug!(form = "models", columns = ?column_names, rows = models.len(), "输入规范化完成");
        Ok(NormalizedBatch {
            form: InputForm::Models,
            column_names,
            rows,
            source_objects: models,
        })
    }

    fn normalize_mappings<'m, M>(
        &self,
        columns: Option<Vec<String>>,
        mappings: Vec<IndexMap<String, Value>>,
    ) -> ImportOutcome<NormalizedBatch<'m, M>> {
        let (column_names, allow_extra_keys) = match columns {
            Some(explicit) => (explicit, true),
            None => (mappings[0].keys().cloned().collect::<Vec<_>>(), false),
        };
        self.check_columns(&column_names)?;

        let mut rows = Vec::with_capacity(mappings.len());
        for (index, mut mapping) in mappings.into_iter().enumerate() {
            if !allow_extra_keys {
                if let Some(extra) = mapping.keys().find(|k| !column_names.contains(k)) {
                    return Err(ImportError::invalid_input(format!(
                        "第 {} 行包含列清单之外的键: {}",
                        index, extra
                    )));
                }
            }
            rows.push(
                column_names
                    .iter()
                    .map(|c| mapping.swap_remove(c).unwrap_or(Value::Null))
                    .collect(),
            );
        }

        debug!(form = "mappings", columns = ?column_names, rows = rows.len(), "输入规范化完成");
        Ok(NormalizedBatch {
            form: InputForm::Mappings,
            column_names,
            rows,
            source_objects: Vec::new(),
        })
    }

    fn normalize_raw<'m, M>(
        &self,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> ImportOutcome<NormalizedBatch<'m, M>> {
        self.check_columns(&columns)?;

        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(ImportError::invalid_input(format!(
                "第 {} 行宽度 {} 与列数 {} 不一致",
                index,
                row.len(),
                columns.len()
            )));
        }

        debug!(form = "raw", columns = ?columns, rows = rows.len(), "输入规范化完成");
        Ok(NormalizedBatch {
            form: InputForm::Raw,
            column_names: columns,
            rows,
            source_objects: Vec::new(),
        })
    }

    /// 列清单不能为空、不能重复、必须是模型的列
    fn check_columns(&self, columns: &[String]) -> ImportOutcome<()> {
        if columns.is_empty() {
            return Err(ImportError::invalid_input("列清单为空"));
        }
        let mut seen = HashSet::new();
        for column in columns {
            if !seen.insert(column.as_str()) {
                return Err(ImportError::invalid_input(format!("列名重复: {}", column)));
            }
            if !self.schema.has_column(column) {
                return Err(ImportError::invalid_input(format!(
                    "表 {} 不存在列: {}",
                    self.schema.table_name, column
                )));
            }
        }
        Ok(())
    }
}
