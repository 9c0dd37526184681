// ==========================================
// 批量导入引擎 - 映射层模型接口
// ==========================================
// 职责: 定义导入引擎对映射层（ORM）的全部依赖
// 红线: 引擎只通过此 Trait 读写模型,不感知具体模型结构
// ==========================================

use crate::domain::schema::ModelSchema;
use crate::domain::value::Value;
use crate::importer::association_cascade::AssociationCollector;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ValidationError - 校验错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub attribute: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

/// 单个模型实例的校验错误集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::new(attribute, message));
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// 指定属性上的错误信息
    pub fn on(&self, attribute: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.attribute == attribute)
            .map(|e| e.message.as_str())
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{} {}", e.attribute, e.message))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

// ==========================================
// Model Trait
// ==========================================
// 用途: 映射层模型实例的最小契约
// 实现者: 业务模型 / DynamicRecord
pub trait Model: Clone {
    /// 由列值构造临时实例（用于映射行/原始矩阵的校验）
    fn build(schema: &ModelSchema, attributes: &[(String, Value)]) -> Self
    where
        Self: Sized;

    /// 读取属性值,未知属性返回 Null
    fn read_attribute(&self, name: &str) -> Value;

    /// 写入属性值
    fn write_attribute(&mut self, name: &str, value: Value);

    /// 是否已持久化
    fn is_persisted(&self) -> bool;

    /// 属性是否被调用方修改过（变更追踪）
    fn attribute_changed(&self, name: &str) -> bool;

    /// 清空变更追踪并标记为已持久化（等同于刚从存储加载）
    fn mark_clean(&mut self);

    /// 执行校验,结果保存在实例上
    ///
    /// # 参数
    /// - context: 校验上下文（如 "import"）
    ///
    /// # 返回
    /// - true: 校验通过
    fn validate(&mut self, context: Option<&str>) -> bool;

    /// 最近一次校验的错误
    fn errors(&self) -> &ValidationErrors;

    /// 主键值（复合主键时为首列）
    fn id(&self, schema: &ModelSchema) -> Value {
        schema
            .primary_key
            .first()
            .map(|pk| self.read_attribute(pk))
            .unwrap_or(Value::Null)
    }

    /// 写入前刷新 belongs-to 外键（关联对象已持久化时）
    fn load_association_ids(&mut self) {}

    /// 收集新建的关联对象,按关系分组交给收集器
    ///
    /// 只会在主批次成功导入且主键已回写后调用；实现方负责给子对象写入外键。
    fn collect_associations<'a>(parents: Vec<&'a mut Self>, collector: &mut AssociationCollector<'a>)
    where
        Self: Sized + 'a,
    {
        let _ = (parents, collector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_on_attribute() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "不能为空");
        errors.add("price", "必须大于 0");
        errors.add("name", "长度不足");

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.on("name"), vec!["不能为空", "长度不足"]);
        assert!(errors.on("sku").is_empty());
        assert_eq!(errors.to_string(), "name 不能为空, price 必须大于 0, name 长度不足");
    }
}
