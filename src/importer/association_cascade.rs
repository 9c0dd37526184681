// ==========================================
// 批量导入引擎 - 关联级联导入
// ==========================================
// 职责: 主批次成功后,按关系分组导入新建的关联对象
// 红线: 已持久化的对象不重复导入
// 红线: 以 (表, 关系) 为键的访问集防止环形关系重复处理
// ==========================================

use crate::config::import_options::{DuplicateKeyUpdate, ImportOptions};
use crate::domain::model::Model;
use crate::domain::schema::ModelSchema;
use crate::importer::bulk_importer::BulkImporter;
use crate::importer::error::ImportOutcome;
use crate::importer::input_normalizer::ImportInput;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

// ==========================================
// GroupKey - 关系分组标识
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub table: String,
    pub relation: String,
}

/// 一次级联的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub groups_imported: usize,
    pub groups_skipped: usize,
    pub num_inserts: usize,
    pub failed: usize,
}

// ==========================================
// PendingGroup - 待导入的关联分组
// ==========================================
pub trait PendingGroup<'a> {
    fn key(&self) -> &GroupKey;

    fn len(&self) -> usize;

    /// 导入本组,并将本组新建对象的关联交给 next
    fn run(
        self: Box<Self>,
        importer: &BulkImporter<'_>,
        options: &ImportOptions,
        next: &mut AssociationCollector<'a>,
    ) -> ImportOutcome<(usize, usize)>;
}

struct ChildGroup<'a, C> {
    key: GroupKey,
    schema: ModelSchema,
    children: Vec<&'a mut C>,
}

impl<'a, C: Model + 'a> PendingGroup<'a> for ChildGroup<'a, C> {
    fn key(&self) -> &GroupKey {
        &self.key
    }

    fn len(&self) -> usize {
        self.children.len()
    }

    fn run(
        self: Box<Self>,
        importer: &BulkImporter<'_>,
        options: &ImportOptions,
        next: &mut AssociationCollector<'a>,
    ) -> ImportOutcome<(usize, usize)> {
        let ChildGroup { schema, children, .. } = *self;
        let (result, survivors) = importer.run_pipeline(
            &schema,
            ImportInput::Models {
                columns: None,
                models: children,
            },
            options,
        )?;
        if !survivors.is_empty() {
            C::collect_associations(survivors, next);
        }
        Ok((result.num_inserts, result.failed_count()))
    }
}

// ==========================================
// AssociationCollector - 关联对象收集器
// ==========================================
// 由 Model::collect_associations 填充
#[derive(Default)]
pub struct AssociationCollector<'a> {
    groups: Vec<Box<dyn PendingGroup<'a> + 'a>>,
}

impl<'a> AssociationCollector<'a> {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// 登记一组关联对象（只保留未持久化的）
    ///
    /// # 参数
    /// - relation: 关系名（如 "books"）
    /// - schema: 关联模型的表结构
    /// - children: 关联对象（外键由调用方写好）
    pub fn push<C: Model + 'a>(&mut self, relation: impl Into<String>, schema: &ModelSchema, children: Vec<&'a mut C>) {
        let children: Vec<&'a mut C> = children.into_iter().filter(|c| !c.is_persisted()).collect();
        if children.is_empty() {
            return;
        }
        self.groups.push(Box::new(ChildGroup {
            key: GroupKey {
                table: schema.table_name.clone(),
                relation: relation.into(),
            },
            schema: schema.clone(),
            children,
        }));
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn drain(&mut self) -> Vec<Box<dyn PendingGroup<'a> + 'a>> {
        std::mem::take(&mut self.groups)
    }
}

/// 子批次选项: 去掉 returning；冲突更新只保留 "all"
pub fn child_options(options: &ImportOptions) -> ImportOptions {
    let mut child = options.clone();
    child.returning.clear();
    if child.on_duplicate_key_update != Some(DuplicateKeyUpdate::All) {
        child.on_duplicate_key_update = None;
    }
    child
}

/// 级联导入
///
/// # 参数
/// - parents: 主批次的保留对象（主键已回写）
/// - options: 调用方原始选项
pub fn cascade<'a, M: Model + 'a>(
    importer: &BulkImporter<'_>,
    parents: Vec<&'a mut M>,
    options: &ImportOptions,
) -> ImportOutcome<CascadeSummary> {
    let options = child_options(options);
    let mut summary = CascadeSummary::default();

    let mut collector = AssociationCollector::new();
    M::collect_associations(parents, &mut collector);

    let mut worklist: VecDeque<(usize, Box<dyn PendingGroup<'a> + 'a>)> =
        collector.drain().into_iter().map(|g| (0, g)).collect();
    // 分组键 → 首次处理的层级
    let mut visited: HashMap<GroupKey, usize> = HashMap::new();

    while let Some((level, group)) = worklist.pop_front() {
        let key = group.key().clone();
        match visited.get(&key) {
            Some(first_level) if *first_level < level => {
                warn!(
                    table = %key.table,
                    relation = %key.relation,
                    level,
                    "关联分组在更早层级已处理,跳过"
                );
                summary.groups_skipped += 1;
                continue;
            }
            Some(_) => {}
            None => {
                visited.insert(key.clone(), level);
            }
        }

        debug!(table = %key.table, relation = %key.relation, level, objects = group.len(), "导入关联分组");
        let mut next = AssociationCollector::new();
        let (num_inserts, failed) = group.run(importer, &options, &mut next)?;
        summary.groups_imported += 1;
        summary.num_inserts += num_inserts;
        summary.failed += failed;

        worklist.extend(next.drain().into_iter().map(|g| (level + 1, g)));
    }

    Ok(summary)
}
