// ==========================================
// 批量导入引擎 - 导入结果
// ==========================================
// 职责: 汇总一次导入调用的输出（失败实例、插入数、主键与回传列）
// 约束: ids/results 与成功插入的行按插入顺序一一对应
// ==========================================

use crate::domain::value::Projection;

#[derive(Debug, Clone)]
pub struct ImportResult<M> {
    pub failed_instances: Vec<M>, // 校验失败的实例（携带错误信息）
    pub num_inserts: usize,       // 成功写入的行数
    pub ids: Vec<Projection>,     // 生成的主键（方言不支持时为空）
    pub results: Vec<Projection>, // returning 列投影（未请求时为空）
}

impl<M> ImportResult<M> {
    /// 空结果（空批次短路返回）
    pub fn empty() -> Self {
        Self {
            failed_instances: Vec::new(),
            num_inserts: 0,
            ids: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed_instances.len()
    }

    /// 合并另一个分块的结果（保持顺序）
    pub fn absorb(&mut self, other: ImportResult<M>) {
        self.failed_instances.extend(other.failed_instances);
        self.num_inserts += other.num_inserts;
        self.ids.extend(other.ids);
        self.results.extend(other.results);
    }
}

impl<M> Default for ImportResult<M> {
    fn default() -> Self {
        Self::empty()
    }
}

// ==========================================
// RawOutcome - 方言执行的原始输出
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutcome {
    pub rows_affected: usize,
    pub columns: Vec<String>, // 回传行的列顺序
    pub rows: Vec<Vec<crate::domain::value::Value>>,
}

impl RawOutcome {
    pub fn affected(rows_affected: usize) -> Self {
        Self {
            rows_affected,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}
