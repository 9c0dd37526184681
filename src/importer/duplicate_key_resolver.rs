// ==========================================
// 批量导入引擎 - 冲突更新配置展开
// ==========================================
// 职责: 将 "all" 展开为列清单中除主键外的全部列
// 红线: 返回新值,不修改调用方的选项
// ==========================================

use crate::config::import_options::{DuplicateKeyUpdate, DuplicateKeyUpdateSpec, UpdateColumns};

pub struct DuplicateKeyResolver;

impl DuplicateKeyResolver {
    /// 展开冲突更新配置
    ///
    /// # 参数
    /// - update: 调用方配置（None 表示未配置）
    /// - column_names: 最终列清单
    /// - primary_key: 主键列
    pub fn resolve(
        update: Option<&DuplicateKeyUpdate>,
        column_names: &[String],
        primary_key: &[String],
    ) -> Option<DuplicateKeyUpdate> {
        let update = update?;
        let updatable = || -> Vec<String> {
            column_names
                .iter()
                .filter(|c| !primary_key.contains(c))
                .cloned()
                .collect()
        };

        Some(match update {
            DuplicateKeyUpdate::All => DuplicateKeyUpdate::Columns(updatable()),
            DuplicateKeyUpdate::Spec(spec) if spec.columns == UpdateColumns::All => {
                DuplicateKeyUpdate::Spec(DuplicateKeyUpdateSpec {
                    columns: UpdateColumns::List(updatable()),
                    ..spec.clone()
                })
            }
            other => other.clone(),
        })
    }
}
