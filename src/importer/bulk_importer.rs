// ==========================================
// 批量导入引擎 - 导入入口
// ==========================================
// 职责: 串联规范化 → 主键注入 → 冲突展开 → 时间戳 → 校验 → 执行 → 回写 → 级联
// 红线: 调用方选项只克隆一次,不做原地修改
// 红线: 所有中间状态为调用内局部变量（级联会重入本入口）
// ==========================================

use crate::adapter::adapter_trait::Adapter;
use crate::config::import_options::ImportOptions;
use crate::domain::import_result::ImportResult;
use crate::domain::model::Model;
use crate::domain::schema::ModelSchema;
use crate::domain::value::Value;
use crate::importer::association_cascade;
use crate::importer::duplicate_key_resolver::DuplicateKeyResolver;
use crate::importer::error::ImportOutcome;
use crate::importer::input_normalizer::{ImportInput, InputNormalizer, NormalizedBatch};
use crate::importer::key_injector::KeyInjector;
use crate::importer::statement_builder::StatementBuilder;
use crate::importer::synchronizer::Synchronizer;
use crate::importer::timestamp_stamper::TimestampStamper;
use crate::importer::validation::{ValidatedRows, ValidationPipeline};
use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, instrument};

// ==========================================
// BulkImporter - 批量导入器
// ==========================================
pub struct BulkImporter<'a> {
    adapter: &'a dyn Adapter,
}

impl<'a> BulkImporter<'a> {
    pub fn new(adapter: &'a dyn Adapter) -> Self {
        Self { adapter }
    }

    /// 批量导入
    ///
    /// # 参数
    /// - schema: 模型表结构
    /// - input: 四种输入形态之一
    /// - options: 调用方选项（不会被修改）
    ///
    /// # 返回
    /// - Ok(ImportResult): 失败实例、插入数、主键与 returning 投影
    /// - Err(InvalidInput): 输入形状错误,未执行任何语句
    /// - Err(RecordInvalid): raise_error 下的校验失败,未执行任何语句
    /// - Err(Adapter): 语句执行失败（原样上抛）
    #[instrument(skip_all, fields(table = %schema.table_name, adapter = %self.adapter.adapter_name()))]
    pub fn import<'m, M: Model + 'm>(
        &self,
        schema: &ModelSchema,
        input: ImportInput<'m, M>,
        options: &ImportOptions,
    ) -> ImportOutcome<ImportResult<M>> {
        let (result, survivors) = self.run_pipeline(schema, input, options)?;

        if options.recursive
            && self.adapter.supports_setting_primary_key_of_imported_objects()
            && !survivors.is_empty()
        {
            let summary = association_cascade::cascade(self, survivors, options)?;
            info!(
                groups = summary.groups_imported,
                skipped = summary.groups_skipped,
                num_inserts = summary.num_inserts,
                failed = summary.failed,
                "关联级联导入完成"
            );
        }

        info!(
            num_inserts = result.num_inserts,
            failed = result.failed_count(),
            ids = result.ids.len(),
            "批量导入完成"
        );
        Ok(result)
    }

    /// 单批次管线（不含级联）
    ///
    /// # 返回
    /// - (结果, 保留行对应的源对象)
    pub(crate) fn run_pipeline<'m, M: Model + 'm>(
        &self,
        schema: &ModelSchema,
        input: ImportInput<'m, M>,
        caller_options: &ImportOptions,
    ) -> ImportOutcome<(ImportResult<M>, Vec<&'m mut M>)> {
        let mut options = caller_options.clone();
        options.primary_key = schema.primary_key.clone();
        options.locking_column = schema
            .locking_column
            .clone()
            .filter(|column| schema.has_column(column));

        // 步骤 1: 输入规范化
        let batch = match InputNormalizer::new(self.adapter, schema).normalize(input)? {
            Some(batch) => batch,
            None => {
                debug!(table = %schema.table_name, "空批次,不生成语句");
                return Ok((ImportResult::empty(), Vec::new()));
            }
        };
        let NormalizedBatch {
            form,
            mut column_names,
            mut rows,
            mut source_objects,
        } = batch;

        // 步骤 2: 序列主键注入
        if form.allows_key_injection() {
            KeyInjector::new(self.adapter).inject(schema, &mut column_names, &mut rows);
        }

        // 步骤 3: 冲突更新展开
        options.on_duplicate_key_update = DuplicateKeyResolver::resolve(
            caller_options.on_duplicate_key_update.as_ref(),
            &column_names,
            &options.primary_key,
        );

        // 步骤 4: 时间戳
        let timestamps = if schema.record_timestamps && options.timestamps {
            let sources = &source_objects;
            let keep_unchanged = |row: usize, column: &str| {
                sources
                    .get(row)
                    .map(|model| model.is_persisted() && !model.attribute_changed(column))
                    .unwrap_or(false)
            };
            TimestampStamper::new(self.adapter).stamp(
                schema,
                &mut column_names,
                &mut rows,
                &mut options,
                Utc::now(),
                &keep_unchanged,
            )
        } else {
            IndexMap::new()
        };

        // 步骤 5: 校验
        let ValidatedRows { kept, failed } =
            ValidationPipeline::new(schema, &options).run(&column_names, rows, &mut source_objects)?;

        let mut slots: Vec<Option<&'m mut M>> = source_objects.into_iter().map(Some).collect();
        let mut survivors: Vec<&'m mut M> = kept
            .iter()
            .filter_map(|k| slots.get_mut(k.original_index).and_then(Option::take))
            .collect();

        // 步骤 6: 执行（按 batch_size 分块,每块一条语句）
        let mut result = ImportResult {
            failed_instances: failed,
            ..ImportResult::empty()
        };
        let kept_rows: Vec<Vec<Value>> = kept.into_iter().map(|k| k.row).collect();
        let chunk_size = options
            .batch_size
            .filter(|size| *size > 0)
            .unwrap_or_else(|| kept_rows.len().max(1));

        let builder = StatementBuilder::new(self.adapter);
        for chunk in kept_rows.chunks(chunk_size) {
            let executed = builder.execute(schema, &column_names, chunk, &options)?;
            result.absorb(ImportResult {
                failed_instances: Vec::new(),
                num_inserts: executed.num_inserts,
                ids: executed.ids,
                results: executed.results,
            });
        }

        // 步骤 7: 回写与同步
        let synchronizer = Synchronizer::new(self.adapter, schema);
        if !survivors.is_empty() && self.adapter.supports_setting_primary_key_of_imported_objects() {
            synchronizer.set_attributes_and_mark_clean(
                &mut survivors,
                &result.ids,
                &result.results,
                &timestamps,
                &options,
            );
        }
        if options.synchronize && !survivors.is_empty() {
            synchronizer.synchronize(&mut survivors, &options)?;
        }

        debug!(
            table = %schema.table_name,
            num_inserts = result.num_inserts,
            failed = result.failed_count(),
            survivors = survivors.len(),
            "单批次管线完成"
        );
        Ok((result, survivors))
    }
}
