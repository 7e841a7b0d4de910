//! 输入记录

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::fmt;

use crate::error::ConfigError;

/// 记录唯一标识，字符串或整数
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// 从 JSON 值解析，只接受整数和字符串
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64().map(RecordId::Int),
            JsonValue::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    /// 匹配用的文本形式（整数 42 与字符串 "42" 视为同一个 ID）
    pub fn match_key(&self) -> String {
        self.to_string()
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            RecordId::Int(n) => JsonValue::from(*n),
            RecordId::Text(s) => JsonValue::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<i32> for RecordId {
    fn from(n: i32) -> Self {
        RecordId::Int(i64::from(n))
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Text(s)
    }
}

/// 一条输入记录
///
/// 除 ID 外的字段原样保留，核心逻辑不解读它们。
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    id_field: String,
    fields: Map<String, JsonValue>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, fields: Map<String, JsonValue>) -> Self {
        Self {
            id: id.into(),
            id_field: "ID".to_string(),
            fields,
        }
    }

    /// 从 JSON 对象构造记录
    ///
    /// # 参数
    /// - `index`: 记录在输入中的位置（用于错误信息）
    /// - `value`: JSON 对象
    /// - `id_field`: ID 字段名
    pub fn from_json(index: usize, value: JsonValue, id_field: &str) -> Result<Self, ConfigError> {
        let JsonValue::Object(mut fields) = value else {
            return Err(ConfigError::RecordNotObject { index });
        };

        let raw_id = fields
            .remove(id_field)
            .ok_or_else(|| ConfigError::MissingRecordId {
                index,
                field: id_field.to_string(),
            })?;

        let id = RecordId::from_json(&raw_id).ok_or_else(|| ConfigError::InvalidRecordId {
            index,
            value: raw_id.to_string(),
        })?;

        Ok(Self {
            id,
            id_field: id_field.to_string(),
            fields,
        })
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.fields
    }

    /// 序列化为单行 JSON，ID 字段在最前
    pub fn to_prompt_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.fields.len() + 1);
        parts.push(format!(
            "{}:{}",
            JsonValue::from(self.id_field.as_str()),
            self.id.to_json()
        ));
        for (key, value) in &self.fields {
            parts.push(format!("{}:{}", JsonValue::from(key.as_str()), value));
        }
        format!("{{{}}}", parts.join(","))
    }
}

/// 检查记录 ID 是否唯一
///
/// 按 `match_key` 比较：服务回答中的 `42` 和 `"42"` 无法区分，
/// 所以整数 42 与字符串 "42" 也视为重复。
pub fn ensure_unique_ids(records: &[Record]) -> Result<(), ConfigError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id().match_key()) {
            return Err(ConfigError::DuplicateRecordId {
                id: record.id().clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_extracts_id() {
        let record = Record::from_json(0, json!({"ID": 7, "name": "Acme"}), "ID").unwrap();
        assert_eq!(record.id(), &RecordId::Int(7));
        assert_eq!(record.fields().get("name"), Some(&json!("Acme")));
        assert!(record.fields().get("ID").is_none());
    }

    #[test]
    fn test_from_json_missing_id() {
        let err = Record::from_json(3, json!({"name": "Acme"}), "ID").unwrap_err();
        assert!(matches!(err, ConfigError::MissingRecordId { index: 3, .. }));
    }

    #[test]
    fn test_from_json_rejects_float_id() {
        let err = Record::from_json(0, json!({"ID": 1.5}), "ID").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRecordId { .. }));
    }

    #[test]
    fn test_custom_id_field() {
        let record = Record::from_json(0, json!({"nit": "900-1", "x": 1}), "nit").unwrap();
        assert_eq!(record.id(), &RecordId::from("900-1"));
        assert_eq!(record.to_prompt_line(), r#"{"nit":"900-1","x":1}"#);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let records = vec![
            Record::new(1, Map::new()),
            Record::new(2, Map::new()),
            Record::new(1, Map::new()),
        ];
        let err = ensure_unique_ids(&records).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRecordId { id } if id == RecordId::Int(1)));
    }

    #[test]
    fn test_int_and_text_with_same_form_rejected() {
        let records = vec![
            Record::new(42, Map::new()),
            Record::new("7", Map::new()),
            Record::new("42", Map::new()),
        ];
        let err = ensure_unique_ids(&records).unwrap_err();
        assert!(
            matches!(err, ConfigError::DuplicateRecordId { id } if id == RecordId::from("42"))
        );
    }

    #[test]
    fn test_distinct_text_forms_accepted() {
        let records = vec![
            Record::new(42, Map::new()),
            Record::new("042", Map::new()),
            Record::new("42a", Map::new()),
        ];
        assert!(ensure_unique_ids(&records).is_ok());
    }

    #[test]
    fn test_match_key_unifies_int_and_text() {
        assert_eq!(RecordId::Int(42).match_key(), RecordId::from("42").match_key());
        assert_ne!(RecordId::Int(42), RecordId::from("42"));
    }
}
