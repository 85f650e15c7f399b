//! 原始答案形态
//!
//! 答题端提交的是任意 JSON。这里把它归类为有限的几种形态，后续校验与落库都只面对这些形态。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::ids::{OptionId, QuestionId};

/// 选中的一个选项（可带补充文字）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChoice {
    pub option_id: OptionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
}

impl From<OptionId> for OptionChoice {
    fn from(option_id: OptionId) -> Self {
        Self {
            option_id,
            custom_text: None,
        }
    }
}

/// 上传协作方返回的文件引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    pub file_url: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl FileReference {
    /// 写入文本列的展示字符串
    pub fn display_text(&self) -> String {
        match self.file_size {
            Some(size) => format!("{} ({} bytes)", self.file_name, size),
            None => self.file_name.clone(),
        }
    }
}

/// 归类后的答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "JsonValue", untagged)]
pub enum AnswerPayload {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Options(Vec<OptionChoice>),
    File(FileReference),
    /// 无法归类的形态，保留原始 JSON
    Other(JsonValue),
}

impl AnswerPayload {
    /// 是否为"未作答"
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerPayload::Null => true,
            AnswerPayload::Text(s) => s.trim().is_empty(),
            AnswerPayload::Options(list) => list.is_empty(),
            AnswerPayload::File(f) => f.file_url.trim().is_empty() && f.file_name.trim().is_empty(),
            AnswerPayload::Other(JsonValue::Object(map)) => map.is_empty(),
            AnswerPayload::Other(JsonValue::Array(items)) => items.is_empty(),
            _ => false,
        }
    }

    /// 形态名（用于日志）
    pub fn shape(&self) -> &'static str {
        match self {
            AnswerPayload::Null => "null",
            AnswerPayload::Bool(_) => "boolean",
            AnswerPayload::Number(_) => "number",
            AnswerPayload::Text(_) => "string",
            AnswerPayload::Date(_) => "date",
            AnswerPayload::Options(_) => "option-ids",
            AnswerPayload::File(_) => "file",
            AnswerPayload::Other(_) => "unrecognized",
        }
    }

    /// 转为字符串（兜底路径）
    pub fn stringify(&self) -> String {
        match self {
            AnswerPayload::Null => String::new(),
            AnswerPayload::Bool(b) => b.to_string(),
            AnswerPayload::Number(n) => n.to_string(),
            AnswerPayload::Text(s) => s.clone(),
            AnswerPayload::Date(d) => d.format("%Y-%m-%d").to_string(),
            AnswerPayload::Options(list) => list
                .iter()
                .map(|c| c.option_id.to_string())
                .collect::<Vec<_>>()
                .join(","),
            AnswerPayload::File(f) => f.display_text(),
            AnswerPayload::Other(v) => v.to_string(),
        }
    }

    /// 由选项 ID 列表构造
    pub fn options(ids: impl IntoIterator<Item = OptionId>) -> Self {
        AnswerPayload::Options(ids.into_iter().map(OptionChoice::from).collect())
    }

    pub fn text(value: impl Into<String>) -> Self {
        AnswerPayload::Text(value.into())
    }
}

impl From<JsonValue> for AnswerPayload {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => AnswerPayload::Null,
            JsonValue::Bool(b) => AnswerPayload::Bool(b),
            JsonValue::Number(n) => match n.as_f64() {
                Some(f) => AnswerPayload::Number(f),
                None => AnswerPayload::Other(JsonValue::Number(n)),
            },
            JsonValue::String(s) => AnswerPayload::Text(s),
            JsonValue::Array(items) => classify_array(items),
            JsonValue::Object(map) => {
                let object = JsonValue::Object(map);
                if object.get("fileUrl").is_some() || object.get("fileName").is_some() {
                    match serde_json::from_value::<FileReference>(object.clone()) {
                        Ok(file) => AnswerPayload::File(file),
                        Err(_) => AnswerPayload::Other(object),
                    }
                } else {
                    AnswerPayload::Other(object)
                }
            }
        }
    }
}

/// 数组：元素全部是选项 ID（字符串或 `{optionId, customText}`）时才算选项列表
fn classify_array(items: Vec<JsonValue>) -> AnswerPayload {
    let choices: Option<Vec<OptionChoice>> = items
        .iter()
        .map(|item| match item {
            JsonValue::String(s) => s.parse::<OptionId>().ok().map(OptionChoice::from),
            JsonValue::Object(_) => serde_json::from_value::<OptionChoice>(item.clone()).ok(),
            _ => None,
        })
        .collect();
    match choices {
        Some(choices) => AnswerPayload::Options(choices),
        None => AnswerPayload::Other(JsonValue::Array(items)),
    }
}

/// 一道题的答案（入站格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    pub value: AnswerPayload,
}

impl AnswerEntry {
    pub fn new(question_id: QuestionId, value: AnswerPayload) -> Self {
        Self { question_id, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_shapes() {
        assert_eq!(AnswerPayload::from(json!(null)), AnswerPayload::Null);
        assert_eq!(AnswerPayload::from(json!(true)), AnswerPayload::Bool(true));
        assert_eq!(AnswerPayload::from(json!(4.5)), AnswerPayload::Number(4.5));
        assert_eq!(AnswerPayload::from(json!("hi")), AnswerPayload::text("hi"));
    }

    #[test]
    fn test_array_of_ids_becomes_options() {
        let a = OptionId::new();
        let b = OptionId::new();
        let payload = AnswerPayload::from(json!([a.to_string(), {"optionId": b, "customText": "x"}]));
        match payload {
            AnswerPayload::Options(choices) => {
                assert_eq!(choices.len(), 2);
                assert_eq!(choices[0].option_id, a);
                assert_eq!(choices[1].custom_text.as_deref(), Some("x"));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_array_with_foreign_element_is_other() {
        let payload = AnswerPayload::from(json!(["not-an-id", 3]));
        assert_eq!(payload.shape(), "unrecognized");
    }

    #[test]
    fn test_file_object() {
        let payload = AnswerPayload::from(json!({
            "fileUrl": "/uploads/a.pdf",
            "fileName": "a.pdf",
            "fileSize": 12
        }));
        assert_eq!(
            payload,
            AnswerPayload::File(FileReference {
                file_url: "/uploads/a.pdf".to_string(),
                file_name: "a.pdf".to_string(),
                file_size: Some(12),
                file_type: None,
            })
        );
    }

    #[test]
    fn test_deserialize_entry_from_json() {
        let id = QuestionId::new();
        let entry: AnswerEntry =
            serde_json::from_value(json!({"questionId": id, "value": {"score": 3}})).unwrap();
        assert_eq!(entry.question_id, id);
        assert_eq!(entry.value.shape(), "unrecognized");
        assert!(!entry.value.is_empty());
    }

    #[test]
    fn test_empty_detection() {
        assert!(AnswerPayload::text("   ").is_empty());
        assert!(AnswerPayload::options(Vec::new()).is_empty());
        assert!(AnswerPayload::from(json!({})).is_empty());
        assert!(!AnswerPayload::Bool(false).is_empty());
    }
}
