//! 答卷与答案的固定存储形态

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::answer::FileReference;
use crate::models::ids::{EnvelopeId, OptionId, QuestionId, QuestionnaireId, ResponseId};

/// 选项作答记录（答案 ↔ 选项 的关联行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOptionResponse {
    pub response_id: ResponseId,
    pub option_id: OptionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
}

/// 单题答案：标量列至多一个有值，选项题另有关联行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub id: ResponseId,
    pub question_id: QuestionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_response: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_response: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_response: Option<bool>,
    /// 文件题保留的原始引用（供导出使用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileReference>,
    #[serde(default)]
    pub option_responses: Vec<QuestionOptionResponse>,
}

impl QuestionResponse {
    /// 空答案行
    pub fn empty(question_id: QuestionId) -> Self {
        Self {
            id: ResponseId::new(),
            question_id,
            text_response: None,
            number_response: None,
            date_response: None,
            boolean_response: None,
            file: None,
            option_responses: Vec::new(),
        }
    }

    /// 已填写的标量列数量
    pub fn populated_scalars(&self) -> usize {
        [
            self.text_response.is_some(),
            self.number_response.is_some(),
            self.date_response.is_some(),
            self.boolean_response.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// 读回选中的选项集合（与顺序无关）
    pub fn selected_option_ids(&self) -> BTreeSet<OptionId> {
        self.option_responses.iter().map(|o| o.option_id).collect()
    }
}

/// 答卷（一次作答的提交信封）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEnvelope {
    pub id: EnvelopeId,
    pub questionnaire_id: QuestionnaireId,
    pub respondent_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub is_draft: bool,
    pub responses: Vec<QuestionResponse>,
}

impl SubmissionEnvelope {
    /// 某题的答案
    pub fn response_for(&self, question_id: QuestionId) -> Option<&QuestionResponse> {
        self.responses.iter().find(|r| r.question_id == question_id)
    }

    /// 是否引用了某个选项
    pub fn references_option(&self, option_id: OptionId) -> bool {
        self.responses
            .iter()
            .any(|r| r.option_responses.iter().any(|o| o.option_id == option_id))
    }
}

/// 导出用的选中选项明细
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOptionDetail {
    pub option_id: OptionId,
    pub option_text: String,
    pub option_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    pub option_deleted: bool,
}

/// 导出协作方消费的答案明细（每行一题）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDetail {
    pub envelope_id: EnvelopeId,
    pub respondent_id: String,
    pub is_completed: bool,
    pub is_draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub question_id: QuestionId,
    pub question_text: String,
    pub question_type: String,
    pub question_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_response: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_response: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_response: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileReference>,
    pub selected_options: Vec<SelectedOptionDetail>,
}
