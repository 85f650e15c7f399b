//! 存储协作方 - 基础设施层
//!
//! 只暴露"按父节点加载同级 / 原子提交 / 原子落答卷"的能力，不认识校验与排序规则

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::models::ids::{CategoryId, EnvelopeId, OptionId, QuestionId, QuestionnaireId};
use crate::models::response::SubmissionEnvelope;
use crate::models::schema::{
    Category, EntityRecord, Question, QuestionOption, QuestionnaireTemplate, Sibling, SiblingScope,
};

/// 存储层错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// 提交时同级集合的版本已变化（乐观并发冲突）
    #[error("集合 {scope} 版本已变化: 期望 {expected}, 实际 {actual}")]
    StaleVersion {
        scope: SiblingScope,
        expected: u64,
        actual: u64,
    },

    /// 提交要求目标未被答案引用，但提交时已有引用
    #[error("{target} 已被 {count} 条答案引用")]
    Referenced { target: ResponseTarget, count: usize },

    /// 已完成的答卷不可覆盖
    #[error("答卷 {envelope} 已完成")]
    Sealed { envelope: EnvelopeId },

    #[error("存储后端不可用: {reason}")]
    Unavailable { reason: String },
}

/// 带版本号的读取结果
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// 统计答案引用的目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTarget {
    Question(QuestionId),
    Option(OptionId),
}

impl ResponseTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseTarget::Question(_) => Question::KIND,
            ResponseTarget::Option(_) => QuestionOption::KIND,
        }
    }

    /// 被答案引用后不可再修改的字段
    pub fn locked_field(&self) -> &'static str {
        match self {
            ResponseTarget::Question(_) => "questionType",
            ResponseTarget::Option(_) => "optionValue",
        }
    }

    pub fn id(&self) -> String {
        match self {
            ResponseTarget::Question(id) => id.to_string(),
            ResponseTarget::Option(id) => id.to_string(),
        }
    }
}

impl fmt::Display for ResponseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// 一次原子提交：先核对全部版本与引用前提，再写入全部记录
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub expected: Vec<(SiblingScope, u64)>,
    /// 提交时必须没有任何答案引用的目标
    pub unreferenced: Vec<ResponseTarget>,
    pub records: Vec<EntityRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 要求提交时该集合仍是读取时的版本
    pub fn expect(mut self, scope: SiblingScope, version: u64) -> Self {
        self.expected.push((scope, version));
        self
    }

    /// 要求提交时该目标仍未被任何答案引用
    pub fn expect_unreferenced(mut self, target: ResponseTarget) -> Self {
        self.unreferenced.push(target);
        self
    }

    pub fn push<T: Sibling>(&mut self, entity: T) {
        self.records.push(entity.into_record());
    }

    pub fn extend<T: Sibling>(&mut self, entities: impl IntoIterator<Item = T>) {
        self.records.extend(entities.into_iter().map(Sibling::into_record));
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 存储协作方
#[async_trait]
pub trait Store: Send + Sync {
    /// 加载某父节点下的全部同级（含已删除），按排序值升序
    async fn load_siblings(&self, scope: SiblingScope) -> Result<Versioned<Vec<EntityRecord>>, StoreError>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    async fn get_questionnaire(&self, id: QuestionnaireId) -> Result<Option<QuestionnaireTemplate>, StoreError>;

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StoreError>;

    async fn get_option(&self, id: OptionId) -> Result<Option<QuestionOption>, StoreError>;

    /// 引用某题目/选项的答案行数量
    async fn count_responses(&self, target: ResponseTarget) -> Result<usize, StoreError>;

    /// 原子提交：任一版本不符或引用前提不成立则整体拒绝
    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError>;

    /// 原子写入整份答卷（同 ID 的草稿被整体替换）
    ///
    /// `expected` 是校验时读取的题目/选项集合版本；任一集合已变化则整体拒绝，
    /// 保证答卷只引用校验时仍然有效的题目与选项
    async fn persist_submission(
        &self,
        envelope: SubmissionEnvelope,
        expected: &[(SiblingScope, u64)],
    ) -> Result<(), StoreError>;

    async fn get_envelope(&self, id: EnvelopeId) -> Result<Option<SubmissionEnvelope>, StoreError>;

    /// 某问卷的全部答卷，按开始时间升序
    async fn load_envelopes(&self, questionnaire_id: QuestionnaireId) -> Result<Vec<SubmissionEnvelope>, StoreError>;
}

/// 加载并转换为具体实体类型
pub async fn load_typed<T: Sibling>(store: &dyn Store, scope: SiblingScope) -> Result<Versioned<Vec<T>>, StoreError> {
    let loaded = store.load_siblings(scope).await?;
    Ok(Versioned {
        version: loaded.version,
        value: loaded.value.into_iter().filter_map(T::from_record).collect(),
    })
}
