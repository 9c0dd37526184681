// ==========================================
// 批量导入引擎 - 值类型
// ==========================================
// 职责: 定义行数据中单元格的统一表示
// 红线: 不含方言相关的字面量格式化（由 Adapter 负责）
// ==========================================

use crate::domain::schema::ColumnType;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==========================================
// Value - 单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// 按列类型转换（文本解析失败时保留原值）
    ///
    /// # 用途
    /// - SQLite 回读: TEXT 存储的时间戳/UUID 还原为强类型
    /// - CSV 导入: 文本单元格转换为列类型
    pub fn coerce_to(self, column_type: ColumnType) -> Value {
        match (column_type, self) {
            (ColumnType::Integer, Value::Text(s)) => match s.trim().parse::<i64>() {
                Ok(v) => Value::Integer(v),
                Err(_) => Value::Text(s),
            },
            (ColumnType::Real, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(v) => Value::Real(v),
                Err(_) => Value::Text(s),
            },
            (ColumnType::Real, Value::Integer(v)) => Value::Real(v as f64),
            (ColumnType::Boolean, Value::Integer(v)) => Value::Bool(v != 0),
            (ColumnType::Boolean, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Value::Bool(true),
                "false" | "f" | "0" => Value::Bool(false),
                _ => Value::Text(s),
            },
            (ColumnType::Timestamp, Value::Text(s)) => match parse_timestamp(&s) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Text(s),
            },
            (ColumnType::Uuid, Value::Text(s)) => match Uuid::parse_str(s.trim()) {
                Ok(v) => Value::Uuid(v),
                Err(_) => Value::Text(s),
            },
            (_, other) => other,
        }
    }
}

/// 解析 RFC3339 或 "YYYY-MM-DD HH:MM:SS[.f]"（按 UTC）
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

// ==========================================
// Projection - 回传列投影
// ==========================================
// 单列主键/单列 returning 时解包为 Single
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Projection {
    Single(Value),
    Tuple(Vec<Value>),
}

impl Projection {
    /// 按列展开为值列表
    pub fn values(&self) -> Vec<Value> {
        match self {
            Projection::Single(v) => vec![v.clone()],
            Projection::Tuple(vs) => vs.clone(),
        }
    }
}
