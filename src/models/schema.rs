//! 问卷结构实体：分类 → 问卷模板 → 题目 → 选项

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

use crate::models::ids::{CategoryId, OptionId, QuestionId, QuestionnaireId};

/// 分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub display_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 问卷模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireTemplate {
    pub id: QuestionnaireId,
    pub category_id: CategoryId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: u32,
    pub is_mandatory: bool,
    pub is_active: bool,
    pub display_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 题目的作答约束
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionConstraints {
    #[serde(default)]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

/// 题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub questionnaire_id: QuestionnaireId,
    pub question_text: String,
    /// 题型键，对应题型目录中的登记项
    pub question_type: String,
    #[serde(flatten)]
    pub constraints: QuestionConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// 条件逻辑，原样保存，核心不解释
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<serde_json::Value>,
    pub display_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    pub option_text: String,
    pub option_value: String,
    #[serde(default)]
    pub is_correct: bool,
    /// 是否允许答题人补充文字（如"其他：____"）
    #[serde(default)]
    pub allows_custom_text: bool,
    pub display_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QuestionOption {
    /// 选项值的规范化形式（用于唯一性比较）
    pub fn normalized_value(&self) -> String {
        normalize_key(&self.option_value)
    }
}

/// 唯一键的规范化：去除首尾空白并转小写
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// 同级集合的标识（以父节点区分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiblingScope {
    /// 全部分类
    Categories,
    /// 某分类下的问卷模板
    Questionnaires(CategoryId),
    /// 某问卷下的题目
    Questions(QuestionnaireId),
    /// 某题目下的选项
    Options(QuestionId),
}

impl fmt::Display for SiblingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiblingScope::Categories => write!(f, "categories"),
            SiblingScope::Questionnaires(id) => write!(f, "category/{}/questionnaires", id),
            SiblingScope::Questions(id) => write!(f, "questionnaire/{}/questions", id),
            SiblingScope::Options(id) => write!(f, "question/{}/options", id),
        }
    }
}

/// 存储层写入单元
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    Category(Category),
    Questionnaire(QuestionnaireTemplate),
    Question(Question),
    Option(QuestionOption),
}

impl EntityRecord {
    /// 记录所属的同级集合
    pub fn scope(&self) -> SiblingScope {
        match self {
            EntityRecord::Category(c) => c.scope(),
            EntityRecord::Questionnaire(q) => q.scope(),
            EntityRecord::Question(q) => q.scope(),
            EntityRecord::Option(o) => o.scope(),
        }
    }
}

/// 参与稠密排序与软删除的同级实体
pub trait Sibling: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync;

    /// 实体类型名（用于错误信息）
    const KIND: &'static str;

    fn id(&self) -> Self::Id;
    fn scope(&self) -> SiblingScope;
    fn display_order(&self) -> u32;
    fn set_display_order(&mut self, order: u32);
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);
    fn into_record(self) -> EntityRecord;
    fn from_record(record: EntityRecord) -> Option<Self>;

    /// 在活动同级中必须唯一的键
    fn uniqueness_key(&self) -> Option<String> {
        None
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

macro_rules! impl_sibling {
    (
        $ty:ty, $id:ty, $kind:expr, $variant:ident,
        scope: |$s:ident| $scope:expr,
        key: |$k:ident| $key:expr $(,)?
    ) => {
        impl Sibling for $ty {
            type Id = $id;
            const KIND: &'static str = $kind;

            fn id(&self) -> Self::Id {
                self.id
            }

            fn scope(&self) -> SiblingScope {
                let $s = self;
                $scope
            }

            fn display_order(&self) -> u32 {
                self.display_order
            }

            fn set_display_order(&mut self, order: u32) {
                self.display_order = order;
            }

            fn deleted_at(&self) -> Option<DateTime<Utc>> {
                self.deleted_at
            }

            fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
                self.deleted_at = at;
            }

            fn into_record(self) -> EntityRecord {
                EntityRecord::$variant(self)
            }

            fn from_record(record: EntityRecord) -> Option<Self> {
                match record {
                    EntityRecord::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn uniqueness_key(&self) -> Option<String> {
                let $k = self;
                $key
            }
        }
    };
}

impl_sibling!(
    Category, CategoryId, "分类", Category,
    scope: |_c| SiblingScope::Categories,
    key: |c| Some(normalize_key(&c.name)),
);
// 一个分类最多一个活动问卷模板
impl_sibling!(
    QuestionnaireTemplate, QuestionnaireId, "问卷模板", Questionnaire,
    scope: |q| SiblingScope::Questionnaires(q.category_id),
    key: |q| Some(q.category_id.to_string()),
);
impl_sibling!(
    Question, QuestionId, "题目", Question,
    scope: |q| SiblingScope::Questions(q.questionnaire_id),
    key: |_q| None,
);
impl_sibling!(
    QuestionOption, OptionId, "选项", Option,
    scope: |o| SiblingScope::Options(o.question_id),
    key: |o| Some(o.normalized_value()),
);

/// 只保留未删除的实体，按排序值升序
pub fn active_sorted<T: Sibling>(items: &[T]) -> Vec<T> {
    let mut active: Vec<T> = items.iter().filter(|i| !i.is_deleted()).cloned().collect();
    active.sort_by_key(|i| i.display_order());
    active
}
