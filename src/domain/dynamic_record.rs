// ==========================================
// 批量导入引擎 - 动态记录
// ==========================================
// 职责: 无类型表的通用模型实现（属性由 ModelSchema 驱动）
// 用途: CLI 导入、映射行/原始矩阵的临时校验实例
// ==========================================

use crate::domain::model::{Model, ValidationErrors};
use crate::domain::schema::ModelSchema;
use crate::domain::value::Value;
use indexmap::IndexMap;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct DynamicRecord {
    schema: ModelSchema,
    attributes: IndexMap<String, Value>,
    changed: HashSet<String>,
    persisted: bool,
    errors: ValidationErrors,
}

impl DynamicRecord {
    /// 创建新的空记录（未持久化）
    pub fn new(schema: &ModelSchema) -> Self {
        Self {
            schema: schema.clone(),
            attributes: IndexMap::new(),
            changed: HashSet::new(),
            persisted: false,
            errors: ValidationErrors::new(),
        }
    }

    /// 由属性列表创建新记录,所有给定属性视为已修改
    pub fn with_attributes<I, K, V>(schema: &ModelSchema, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Self::new(schema);
        for (name, value) in attributes {
            let name: String = name.into();
            record.write_attribute(&name, value.into());
        }
        record
    }

    /// 标记为已持久化的记录（如从存储加载）
    pub fn persisted(mut self) -> Self {
        self.mark_clean();
        self
    }

    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }
}

impl Model for DynamicRecord {
    fn build(schema: &ModelSchema, attributes: &[(String, Value)]) -> Self {
        Self::with_attributes(schema, attributes.iter().cloned())
    }

    fn read_attribute(&self, name: &str) -> Value {
        self.attributes.get(name).cloned().unwrap_or(Value::Null)
    }

    fn write_attribute(&mut self, name: &str, value: Value) {
        self.changed.insert(name.to_string());
        self.attributes.insert(name.to_string(), value);
    }

    fn is_persisted(&self) -> bool {
        self.persisted
    }

    fn attribute_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    fn mark_clean(&mut self) {
        self.changed.clear();
        self.persisted = true;
    }

    /// 校验 NOT NULL 列（主键、计算列、有默认值的列除外）
    fn validate(&mut self, _context: Option<&str>) -> bool {
        self.errors.clear();
        for column in &self.schema.columns {
            if column.null
                || column.is_virtual
                || column.has_default
                || self.schema.is_primary_key(&column.name)
            {
                continue;
            }
            let missing = self
                .attributes
                .get(&column.name)
                .map(Value::is_null)
                .unwrap_or(true);
            if missing {
                self.errors.add(column.name.clone(), "不能为空");
            }
        }
        self.errors.is_empty()
    }

    fn errors(&self) -> &ValidationErrors {
        &self.errors
    }
}
