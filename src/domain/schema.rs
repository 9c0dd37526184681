// ==========================================
// 批量导入引擎 - 模型结构元数据
// ==========================================
// 职责: 描述映射层提供的表级元数据（列、主键、序列、时间戳）
// 红线: 只读元数据,导入过程中不修改
// ==========================================

use serde::{Deserialize, Serialize};

/// 默认创建时间戳候选列
pub const CREATE_TIMESTAMP_CANDIDATES: [&str; 2] = ["created_at", "created_on"];

/// 默认更新时间戳候选列
pub const UPDATE_TIMESTAMP_CANDIDATES: [&str; 2] = ["updated_at", "updated_on"];

// ==========================================
// ColumnType - 列的底层类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
    Timestamp,
    Uuid,
    Blob,
}

impl ColumnType {
    /// 从 SQL 声明类型推断（SQLite 类型亲和规则的简化版）
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("UUID") {
            ColumnType::Uuid
        } else if upper.contains("BOOL") {
            ColumnType::Boolean
        } else if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("TIMESTAMP") || upper.contains("DATETIME") {
            ColumnType::Timestamp
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else if upper.contains("BLOB") {
            ColumnType::Blob
        } else {
            ColumnType::Text
        }
    }
}

// ==========================================
// ColumnDef - 列定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub is_virtual: bool, // 计算列（生成列），不参与插入
    #[serde(default = "default_null")]
    pub null: bool, // 是否允许 NULL
    #[serde(default)]
    pub has_default: bool, // 存储层有默认值
}

fn default_null() -> bool {
    true
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_virtual: false,
            null: true,
            has_default: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.null = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn virtual_column(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_virtual: true,
            null: true,
            has_default: false,
        }
    }
}

// ==========================================
// ModelSchema - 模型表级元数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub sequence_name: Option<String>,
    pub locking_column: Option<String>,
    pub record_timestamps: bool, // 全局时间戳开关
}

impl ModelSchema {
    /// 创建默认结构（主键 id、记录时间戳）
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
            primary_key: vec!["id".to_string()],
            sequence_name: None,
            locking_column: None,
            record_timestamps: true,
        }
    }

    pub fn with_primary_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sequence(mut self, sequence_name: impl Into<String>) -> Self {
        self.sequence_name = Some(sequence_name.into());
        self
    }

    pub fn with_locking_column(mut self, column: impl Into<String>) -> Self {
        self.locking_column = Some(column.into());
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.record_timestamps = false;
        self
    }

    /// 全部列名（含计算列）
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// 可插入列名（剔除计算列）
    pub fn insertable_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.is_virtual)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k == name)
    }

    /// 模型实际拥有的创建时间戳列
    pub fn timestamp_attributes_for_create(&self) -> Vec<String> {
        self.existing_candidates(&CREATE_TIMESTAMP_CANDIDATES)
    }

    /// 模型实际拥有的更新时间戳列
    pub fn timestamp_attributes_for_update(&self) -> Vec<String> {
        self.existing_candidates(&UPDATE_TIMESTAMP_CANDIDATES)
    }

    fn existing_candidates(&self, candidates: &[&str]) -> Vec<String> {
        candidates
            .iter()
            .filter(|c| self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget_schema() -> ModelSchema {
        ModelSchema::new(
            "widgets",
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::new("name", ColumnType::Text),
                ColumnDef::virtual_column("name_upper", ColumnType::Text),
                ColumnDef::new("created_at", ColumnType::Timestamp),
                ColumnDef::new("updated_on", ColumnType::Timestamp),
            ],
        )
    }

    #[test]
    fn test_insertable_columns_skip_virtual() {
        let schema = widget_schema();
        assert_eq!(
            schema.insertable_column_names(),
            vec!["id", "name", "created_at", "updated_on"]
        );
        assert_eq!(schema.column_names().len(), 5);
    }

    #[test]
    fn test_timestamp_attributes_filtered_by_columns() {
        let schema = widget_schema();
        assert_eq!(schema.timestamp_attributes_for_create(), vec!["created_at"]);
        assert_eq!(schema.timestamp_attributes_for_update(), vec!["updated_on"]);
    }

    #[test]
    fn test_column_type_from_declared() {
        assert_eq!(ColumnType::from_declared("INTEGER"), ColumnType::Integer);
        assert_eq!(ColumnType::from_declared("varchar(20)"), ColumnType::Text);
        assert_eq!(ColumnType::from_declared("uuid"), ColumnType::Uuid);
        assert_eq!(ColumnType::from_declared("DATETIME"), ColumnType::Timestamp);
        assert_eq!(ColumnType::from_declared("double precision"), ColumnType::Real);
    }
}
