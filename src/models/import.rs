//! 导入文件格式
//!
//! - 问卷定义（TOML）：分类 → 问卷 → 题目 → 选项
//! - 答卷文件（JSON）：按问卷标题、题目文本引用，选项可写选项值

use serde::Deserialize;
use std::collections::BTreeMap;

/// 问卷定义文件
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
}

impl SeedFile {
    /// 题目总数
    pub fn question_count(&self) -> usize {
        self.categories
            .iter()
            .filter_map(|c| c.questionnaire.as_ref())
            .map(|q| q.questions.len())
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub questionnaire: Option<SeedQuestionnaire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedQuestionnaire {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub questions: Vec<SeedQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedQuestion {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub options: Vec<SeedOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedOption {
    pub text: String,
    pub value: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub allows_custom_text: bool,
}

/// 答卷文件
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionFile {
    /// 问卷标题
    pub questionnaire: String,
    pub respondent: String,
    #[serde(default)]
    pub draft: bool,
    /// 题目文本 → 答案
    #[serde(default)]
    pub answers: BTreeMap<String, serde_json::Value>,
    /// 题目文本 → 待上传的本地文件（相对答卷文件所在目录）
    #[serde(default)]
    pub uploads: BTreeMap<String, String>,
    #[serde(skip)]
    pub file_path: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}
