// ==========================================
// 批量导入引擎 - 导入选项配置读取 Trait
// ==========================================
// 职责: 定义导入选项档案的读取接口（不包含实现）
// 红线: 不包含配置写入、不包含导入逻辑
// ==========================================

use crate::config::import_options::ImportOptions;
use crate::importer::error::{ConfigError, ConfigResult};

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 按名称读取预存的导入选项档案
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader: Send + Sync {
    /// 读取指定名称的导入选项档案
    ///
    /// # 参数
    /// - name: 档案名称（如 "nightly_upsert"）
    ///
    /// # 返回
    /// - Some(ImportOptions): 档案存在
    /// - None: 档案不存在
    fn get_import_profile(&self, name: &str) -> ConfigResult<Option<ImportOptions>>;

    /// 读取档案,不存在时返回默认选项
    ///
    /// # 默认值
    /// - validate = true, timestamps = true
    fn get_import_profile_or_default(&self, name: &str) -> ConfigResult<ImportOptions> {
        Ok(self.get_import_profile(name)?.unwrap_or_default())
    }

    /// 读取档案,不存在时报错
    ///
    /// # 返回
    /// - Err(NotFound): 档案不存在
    fn require_import_profile(&self, name: &str) -> ConfigResult<ImportOptions> {
        self.get_import_profile(name)?
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))
    }

    /// 列出全部档案名称（按名称排序）
    fn list_import_profiles(&self) -> ConfigResult<Vec<String>>;
}
