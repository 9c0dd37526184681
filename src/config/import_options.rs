// ==========================================
// 批量导入引擎 - 导入选项
// ==========================================
// 职责: 定义一次导入调用的全部可识别配置项
// 约束: 调用方持有选项；引擎入口克隆一次,之后只读
// 说明: 未识别的 JSON 键被忽略（serde 默认行为）
// ==========================================

use crate::importer::error::{ConfigError, ConfigResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// "全部列" 标记
pub const ALL_COLUMNS_MARKER: &str = "all";

// ==========================================
// UpdateColumns - 冲突时更新的列
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUpdateColumns", into = "RawUpdateColumns")]
pub enum UpdateColumns {
    All,
    List(Vec<String>),
    Mapping(IndexMap<String, String>), // 目标列 → 取值来源列
}

impl Default for UpdateColumns {
    fn default() -> Self {
        UpdateColumns::List(Vec::new())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawUpdateColumns {
    Marker(String),
    List(Vec<String>),
    Mapping(IndexMap<String, String>),
}

impl TryFrom<RawUpdateColumns> for UpdateColumns {
    type Error = String;

    fn try_from(raw: RawUpdateColumns) -> Result<Self, Self::Error> {
        match raw {
            RawUpdateColumns::Marker(m) if m == ALL_COLUMNS_MARKER => Ok(UpdateColumns::All),
            RawUpdateColumns::Marker(m) => Err(format!("无法识别的列标记: {}", m)),
            RawUpdateColumns::List(cols) => Ok(UpdateColumns::List(cols)),
            RawUpdateColumns::Mapping(map) => Ok(UpdateColumns::Mapping(map)),
        }
    }
}

impl From<UpdateColumns> for RawUpdateColumns {
    fn from(cols: UpdateColumns) -> Self {
        match cols {
            UpdateColumns::All => RawUpdateColumns::Marker(ALL_COLUMNS_MARKER.to_string()),
            UpdateColumns::List(cols) => RawUpdateColumns::List(cols),
            UpdateColumns::Mapping(map) => RawUpdateColumns::Mapping(map),
        }
    }
}

// ==========================================
// DuplicateKeyUpdateSpec - 完整的冲突更新配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateKeyUpdateSpec {
    pub columns: UpdateColumns,
    pub conflict_target: Vec<String>, // 为空时使用主键
    pub index_predicate: Option<String>,
    pub condition: Option<String>, // DO UPDATE ... WHERE 条件
}

// ==========================================
// DuplicateKeyUpdate - 冲突更新（upsert）配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDuplicateKeyUpdate", into = "RawDuplicateKeyUpdate")]
pub enum DuplicateKeyUpdate {
    All,
    Columns(Vec<String>),
    Spec(DuplicateKeyUpdateSpec),
}

impl DuplicateKeyUpdate {
    /// 归一化后的更新列（All 需先经 DuplicateKeyResolver 展开）
    pub fn update_columns(&self) -> UpdateColumns {
        match self {
            DuplicateKeyUpdate::All => UpdateColumns::All,
            DuplicateKeyUpdate::Columns(cols) => UpdateColumns::List(cols.clone()),
            DuplicateKeyUpdate::Spec(spec) => spec.columns.clone(),
        }
    }

    pub fn conflict_target(&self) -> &[String] {
        match self {
            DuplicateKeyUpdate::Spec(spec) => &spec.conflict_target,
            _ => &[],
        }
    }

    pub fn condition(&self) -> Option<&str> {
        match self {
            DuplicateKeyUpdate::Spec(spec) => spec.condition.as_deref(),
            _ => None,
        }
    }

    pub fn index_predicate(&self) -> Option<&str> {
        match self {
            DuplicateKeyUpdate::Spec(spec) => spec.index_predicate.as_deref(),
            _ => None,
        }
    }

    /// 追加一列到更新清单（已存在或为 All 时不变）
    pub fn add_update_column(&mut self, column: &str) {
        let columns = match self {
            DuplicateKeyUpdate::All => return,
            DuplicateKeyUpdate::Columns(cols) => cols,
            DuplicateKeyUpdate::Spec(spec) => match &mut spec.columns {
                UpdateColumns::All => return,
                UpdateColumns::List(cols) => cols,
                UpdateColumns::Mapping(map) => {
                    map.entry(column.to_string())
                        .or_insert_with(|| column.to_string());
                    return;
                }
            },
        };
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_string());
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawDuplicateKeyUpdate {
    Marker(String),
    Columns(Vec<String>),
    Spec(DuplicateKeyUpdateSpec),
}

impl TryFrom<RawDuplicateKeyUpdate> for DuplicateKeyUpdate {
    type Error = String;

    fn try_from(raw: RawDuplicateKeyUpdate) -> Result<Self, Self::Error> {
        match raw {
            RawDuplicateKeyUpdate::Marker(m) if m == ALL_COLUMNS_MARKER => Ok(DuplicateKeyUpdate::All),
            RawDuplicateKeyUpdate::Marker(m) => Err(format!("无法识别的 on_duplicate_key_update: {}", m)),
            RawDuplicateKeyUpdate::Columns(cols) => Ok(DuplicateKeyUpdate::Columns(cols)),
            RawDuplicateKeyUpdate::Spec(spec) => Ok(DuplicateKeyUpdate::Spec(spec)),
        }
    }
}

impl From<DuplicateKeyUpdate> for RawDuplicateKeyUpdate {
    fn from(update: DuplicateKeyUpdate) -> Self {
        match update {
            DuplicateKeyUpdate::All => RawDuplicateKeyUpdate::Marker(ALL_COLUMNS_MARKER.to_string()),
            DuplicateKeyUpdate::Columns(cols) => RawDuplicateKeyUpdate::Columns(cols),
            DuplicateKeyUpdate::Spec(spec) => RawDuplicateKeyUpdate::Spec(spec),
        }
    }
}

// ==========================================
// StringOrArray - 单个或多个 SQL 片段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum StringOrArray {
    Single(String),
    Multiple(Vec<String>),
}

fn deserialize_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<StringOrArray>::deserialize(deserializer)?;
    Ok(match raw {
        None => Vec::new(),
        Some(StringOrArray::Single(s)) => vec![s],
        Some(StringOrArray::Multiple(v)) => v,
    })
}

// ==========================================
// ImportOptions - 导入选项
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    // ===== 校验 =====
    pub validate: bool,
    pub validate_with_context: Option<String>,
    pub raise_error: bool, // 校验失败时中止整个调用
    pub all_or_none: bool, // 任一行失败则整批不写入

    // ===== 时间戳 =====
    pub timestamps: bool,

    // ===== 主键与锁 =====
    pub primary_key: Vec<String>, // 入口处以模型主键覆盖
    pub locking_column: Option<String>,

    // ===== 冲突处理 =====
    pub on_duplicate_key_update: Option<DuplicateKeyUpdate>,
    pub on_duplicate_key_ignore: bool,

    // ===== 回写与同步 =====
    pub synchronize: bool,
    pub synchronize_keys: Option<Vec<String>>,
    pub returning: Vec<String>,
    pub recursive: bool,

    // ===== SQL 片段注入点 =====
    pub pre_sql: Option<String>,
    pub post_sql: Option<String>,
    pub command: Option<String>,
    #[serde(deserialize_with = "deserialize_keywords")]
    pub keywords: Vec<String>,

    // ===== 调用方分块 =====
    pub batch_size: Option<usize>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            validate: true,
            validate_with_context: None,
            raise_error: false,
            all_or_none: false,
            timestamps: true,
            primary_key: Vec::new(),
            locking_column: None,
            on_duplicate_key_update: None,
            on_duplicate_key_ignore: false,
            synchronize: false,
            synchronize_keys: None,
            returning: Vec::new(),
            recursive: false,
            pre_sql: None,
            post_sql: None,
            command: None,
            keywords: Vec::new(),
            batch_size: None,
        }
    }
}

impl ImportOptions {
    /// 从 JSON 文本解析（未识别的键被忽略）
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        serde_json::from_str(raw).map_err(|e| ConfigError::ParseError {
            key: "import_options".to_string(),
            message: e.to_string(),
        })
    }

    /// 是否执行校验（指定校验上下文即视为开启）
    pub fn is_validating(&self) -> bool {
        self.validate_with_context.is_some() || self.validate
    }

    /// 是否需要回传主键或 returning 列
    pub fn wants_returned_values(&self) -> bool {
        !self.primary_key.is_empty() || !self.returning.is_empty()
    }

    /// 回传行与输入行的对齐键: 优先 synchronize_keys,其次 upsert 冲突目标
    pub fn row_match_keys(&self) -> Vec<String> {
        if let Some(keys) = self.synchronize_keys.as_ref().filter(|keys| !keys.is_empty()) {
            return keys.clone();
        }
        self.on_duplicate_key_update
            .as_ref()
            .map(|update| update.conflict_target().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ImportOptions::default();
        assert!(options.validate);
        assert!(options.timestamps);
        assert!(!options.raise_error);
        assert!(options.on_duplicate_key_update.is_none());
        assert!(options.is_validating());
    }

    #[test]
    fn test_row_match_keys_prefer_synchronize_keys() {
        let upsert = DuplicateKeyUpdate::Spec(DuplicateKeyUpdateSpec {
            conflict_target: vec!["sku".to_string()],
            ..Default::default()
        });
        let options = ImportOptions {
            on_duplicate_key_update: Some(upsert.clone()),
            ..Default::default()
        };
        assert_eq!(options.row_match_keys(), vec!["sku"]);

        let options = ImportOptions {
            on_duplicate_key_update: Some(upsert),
            synchronize_keys: Some(vec!["name".to_string()]),
            ..Default::default()
        };
        assert_eq!(options.row_match_keys(), vec!["name"]);

        assert!(ImportOptions::default().row_match_keys().is_empty());
    }

    #[test]
    fn test_context_forces_validation() {
        let options = ImportOptions {
            validate: false,
            validate_with_context: Some("import".to_string()),
            ..Default::default()
        };
        assert!(options.is_validating());
    }

    #[test]
    fn test_parse_duplicate_key_update_shapes() {
        let all = ImportOptions::from_json_str(r#"{"on_duplicate_key_update": "all"}"#).unwrap();
        assert_eq!(all.on_duplicate_key_update, Some(DuplicateKeyUpdate::All));

        let cols = ImportOptions::from_json_str(r#"{"on_duplicate_key_update": ["name", "price"]}"#)
            .unwrap();
        assert_eq!(
            cols.on_duplicate_key_update,
            Some(DuplicateKeyUpdate::Columns(vec!["name".to_string(), "price".to_string()]))
        );

        let spec = ImportOptions::from_json_str(
            r#"{"on_duplicate_key_update": {"columns": "all", "conflict_target": ["sku"], "condition": "widgets.price < excluded.price"}}"#,
        )
        .unwrap();
        match spec.on_duplicate_key_update {
            Some(DuplicateKeyUpdate::Spec(s)) => {
                assert_eq!(s.columns, UpdateColumns::All);
                assert_eq!(s.conflict_target, vec!["sku"]);
                assert!(s.condition.is_some());
            }
            other => panic!("期望 Spec, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_add_update_column_per_shape() {
        let mut cols = DuplicateKeyUpdate::Columns(vec!["name".to_string()]);
        cols.add_update_column("updated_at");
        cols.add_update_column("updated_at");
        assert_eq!(
            cols,
            DuplicateKeyUpdate::Columns(vec!["name".to_string(), "updated_at".to_string()])
        );

        let mut spec = DuplicateKeyUpdate::Spec(DuplicateKeyUpdateSpec::default());
        spec.add_update_column("updated_at");
        assert_eq!(spec.update_columns(), UpdateColumns::List(vec!["updated_at".to_string()]));

        let mut mapping = IndexMap::new();
        mapping.insert("price".to_string(), "new_price".to_string());
        let mut mapped = DuplicateKeyUpdate::Spec(DuplicateKeyUpdateSpec {
            columns: UpdateColumns::Mapping(mapping),
            ..Default::default()
        });
        mapped.add_update_column("updated_at");
        match mapped.update_columns() {
            UpdateColumns::Mapping(map) => assert_eq!(map.get("updated_at").map(String::as_str), Some("updated_at")),
            other => panic!("期望 Mapping, 实际 {:?}", other),
        }

        let mut all = DuplicateKeyUpdate::All;
        all.add_update_column("updated_at");
        assert_eq!(all, DuplicateKeyUpdate::All);
    }

    #[test]
    fn test_unknown_marker_rejected() {
        assert!(ImportOptions::from_json_str(r#"{"on_duplicate_key_update": "most"}"#).is_err());
    }

    #[test]
    fn test_keywords_single_or_array_and_unknown_keys() {
        let single = ImportOptions::from_json_str(r#"{"keywords": "IGNORE", "bogus": 1}"#).unwrap();
        assert_eq!(single.keywords, vec!["IGNORE"]);

        let many = ImportOptions::from_json_str(r#"{"keywords": ["LOW_PRIORITY", "IGNORE"]}"#).unwrap();
        assert_eq!(many.keywords.len(), 2);
        assert!(many.validate);
    }
}
