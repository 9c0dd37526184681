// ==========================================
// 批量导入引擎 - 校验管线
// ==========================================
// 职责: 逐行执行模型校验,区分保留行与失败实例
// 红线: raise_error 时在任何语句执行前中止
// 红线: 保留行记住原始行号,回写据此定位源对象
// ==========================================

use crate::config::import_options::ImportOptions;
use crate::domain::model::Model;
use crate::domain::schema::ModelSchema;
use crate::domain::value::Value;
use crate::importer::error::{ImportError, ImportOutcome, InvalidRecord};
use tracing::{debug, warn};

// ==========================================
// RowOutcome - 单行校验结果
// ==========================================
#[derive(Debug, Clone)]
pub enum RowOutcome<M> {
    Kept { row: Vec<Value>, original_index: usize },
    Skipped(M),
}

/// 保留行
#[derive(Debug, Clone, PartialEq)]
pub struct KeptRow {
    pub row: Vec<Value>,
    pub original_index: usize,
}

/// 校验后的批次
#[derive(Debug, Clone)]
pub struct ValidatedRows<M> {
    pub kept: Vec<KeptRow>,
    pub failed: Vec<M>,
}

impl<M> ValidatedRows<M> {
    /// 由逐行结果拆分为保留行与失败实例（各自保持原顺序）
    pub fn from_outcomes(outcomes: Vec<RowOutcome<M>>) -> Self {
        let mut kept = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                RowOutcome::Kept { row, original_index } => kept.push(KeptRow { row, original_index }),
                RowOutcome::Skipped(instance) => failed.push(instance),
            }
        }
        Self { kept, failed }
    }
}

pub struct ValidationPipeline<'a> {
    schema: &'a ModelSchema,
    options: &'a ImportOptions,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(schema: &'a ModelSchema, options: &'a ImportOptions) -> Self {
        Self { schema, options }
    }

    /// 校验全部行
    ///
    /// # 参数
    /// - sources: 模型形态的源对象（与 rows 同序）；映射/矩阵形态为空,按行构造临时实例
    ///
    /// # 返回
    /// - Err(RecordInvalid): raise_error 且存在失败行
    pub fn run<M: Model>(
        &self,
        column_names: &[String],
        rows: Vec<Vec<Value>>,
        sources: &mut [&mut M],
    ) -> ImportOutcome<ValidatedRows<M>> {
        if !self.options.is_validating() {
            let kept = rows
                .into_iter()
                .enumerate()
                .map(|(original_index, row)| KeptRow { row, original_index })
                .collect();
            return Ok(ValidatedRows {
                kept,
                failed: Vec::new(),
            });
        }

        let context = self.options.validate_with_context.as_deref();
        let mut outcomes = Vec::with_capacity(rows.len());

        for (index, row) in rows.into_iter().enumerate() {
            let failure = match sources.get_mut(index) {
                Some(model) => {
                    if model.validate(context) {
                        None
                    } else {
                        Some((**model).clone())
                    }
                }
                None => {
                    let attributes: Vec<(String, Value)> =
                        column_names.iter().cloned().zip(row.iter().cloned()).collect();
                    let mut transient = M::build(self.schema, &attributes);
                    if transient.validate(context) {
                        None
                    } else {
                        Some(transient)
                    }
                }
            };

            match failure {
                None => outcomes.push(RowOutcome::Kept {
                    row,
                    original_index: index,
                }),
                Some(instance) if self.options.raise_error => {
                    return Err(ImportError::RecordInvalid(Box::new(InvalidRecord {
                        table: self.schema.table_name.clone(),
                        row_index: index,
                        attributes: column_names.iter().cloned().zip(row).collect(),
                        errors: instance.errors().clone(),
                    })));
                }
                Some(instance) => {
                    debug!(row = index, errors = %instance.errors(), "校验失败,跳过该行");
                    outcomes.push(RowOutcome::Skipped(instance));
                }
            }
        }

        let mut validated = ValidatedRows::from_outcomes(outcomes);
        if self.options.all_or_none && !validated.failed.is_empty() && !validated.kept.is_empty() {
            warn!(
                table = %self.schema.table_name,
                failed = validated.failed.len(),
                dropped = validated.kept.len(),
                "all_or_none: 存在校验失败的行,整批不写入"
            );
            validated.kept.clear();
        }
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dynamic_record::DynamicRecord;
    use crate::domain::schema::{ColumnDef, ColumnType};

    fn schema() -> ModelSchema {
        ModelSchema::new(
            "people",
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::new("name", ColumnType::Text).not_null(),
            ],
        )
    }

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![Value::from("a")],
            vec![Value::Null],
            vec![Value::from("c")],
        ]
    }

    #[test]
    fn test_transient_instances_keep_original_indices() {
        let schema = schema();
        let options = ImportOptions::default();
        let columns = vec!["name".to_string()];

        let validated = ValidationPipeline::new(&schema, &options)
            .run::<DynamicRecord>(&columns, rows(), &mut [])
            .unwrap();

        assert_eq!(
            validated.kept.iter().map(|k| k.original_index).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(validated.failed.len(), 1);
        assert_eq!(validated.failed[0].errors().on("name"), vec!["不能为空"]);
    }

    #[test]
    fn test_raise_error_aborts_with_record() {
        let schema = schema();
        let options = ImportOptions {
            raise_error: true,
            ..Default::default()
        };
        let columns = vec!["name".to_string()];

        let err = ValidationPipeline::new(&schema, &options)
            .run::<DynamicRecord>(&columns, rows(), &mut [])
            .unwrap_err();
        match err {
            ImportError::RecordInvalid(record) => {
                assert_eq!(record.row_index, 1);
                assert_eq!(record.table, "people");
            }
            other => panic!("期望 RecordInvalid, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_all_or_none_drops_every_row() {
        let schema = schema();
        let options = ImportOptions {
            all_or_none: true,
            ..Default::default()
        };
        let columns = vec!["name".to_string()];

        let validated = ValidationPipeline::new(&schema, &options)
            .run::<DynamicRecord>(&columns, rows(), &mut [])
            .unwrap();
        assert!(validated.kept.is_empty());
        assert_eq!(validated.failed.len(), 1);
    }

    #[test]
    fn test_source_objects_validated_in_place() {
        let schema = schema();
        let options = ImportOptions {
            validate_with_context: Some("import".to_string()),
            validate: false,
            ..Default::default()
        };
        let columns = vec!["name".to_string()];
        let mut good = DynamicRecord::with_attributes(&schema, [("name", "a")]);
        let mut bad = DynamicRecord::new(&schema);

        let validated = {
            let mut sources = vec![&mut good, &mut bad];
            ValidationPipeline::new(&schema, &options)
                .run(&columns, vec![vec![Value::from("a")], vec![Value::Null]], &mut sources)
                .unwrap()
        };
        assert_eq!(validated.kept.len(), 1);
        assert_eq!(validated.failed.len(), 1);
        // 源对象上保留了校验错误
        assert!(!bad.errors().is_empty());
        assert!(good.errors().is_empty());
    }

    #[test]
    fn test_validation_disabled_keeps_all_rows() {
        let schema = schema();
        let options = ImportOptions {
            validate: false,
            ..Default::default()
        };
        let columns = vec!["name".to_string()];
        let validated = ValidationPipeline::new(&schema, &options)
            .run::<DynamicRecord>(&columns, rows(), &mut [])
            .unwrap();
        assert_eq!(validated.kept.len(), 3);
        assert!(validated.failed.is_empty());
    }
}
