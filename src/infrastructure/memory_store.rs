//! 内存存储 - 基础设施层
//!
//! 单把读写锁保护全部状态，提交在锁内"先核对、后写入"，因此天然原子

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::infrastructure::store::{ChangeSet, ResponseTarget, Store, StoreError, Versioned};
use crate::models::ids::{CategoryId, EnvelopeId, OptionId, QuestionId, QuestionnaireId};
use crate::models::response::SubmissionEnvelope;
use crate::models::schema::{
    Category, EntityRecord, Question, QuestionOption, QuestionnaireTemplate, SiblingScope,
};

#[derive(Default)]
struct State {
    categories: HashMap<CategoryId, Category>,
    questionnaires: HashMap<QuestionnaireId, QuestionnaireTemplate>,
    questions: HashMap<QuestionId, Question>,
    options: HashMap<OptionId, QuestionOption>,
    versions: HashMap<SiblingScope, u64>,
    /// 按写入顺序保存
    envelopes: Vec<SubmissionEnvelope>,
}

impl State {
    fn version(&self, scope: SiblingScope) -> u64 {
        self.versions.get(&scope).copied().unwrap_or(0)
    }

    fn records_in(&self, scope: SiblingScope) -> Vec<EntityRecord> {
        let mut records: Vec<(u32, EntityRecord)> = match scope {
            SiblingScope::Categories => self
                .categories
                .values()
                .map(|c| (c.display_order, EntityRecord::Category(c.clone())))
                .collect(),
            SiblingScope::Questionnaires(category) => self
                .questionnaires
                .values()
                .filter(|q| q.category_id == category)
                .map(|q| (q.display_order, EntityRecord::Questionnaire(q.clone())))
                .collect(),
            SiblingScope::Questions(questionnaire) => self
                .questions
                .values()
                .filter(|q| q.questionnaire_id == questionnaire)
                .map(|q| (q.display_order, EntityRecord::Question(q.clone())))
                .collect(),
            SiblingScope::Options(question) => self
                .options
                .values()
                .filter(|o| o.question_id == question)
                .map(|o| (o.display_order, EntityRecord::Option(o.clone())))
                .collect(),
        };
        records.sort_by_key(|(order, _)| *order);
        records.into_iter().map(|(_, record)| record).collect()
    }

    fn count_responses(&self, target: ResponseTarget) -> usize {
        let responses = self.envelopes.iter().flat_map(|e| e.responses.iter());
        match target {
            ResponseTarget::Question(id) => responses.filter(|r| r.question_id == id).count(),
            ResponseTarget::Option(id) => responses
                .filter(|r| r.option_responses.iter().any(|o| o.option_id == id))
                .count(),
        }
    }

    fn check_versions(&self, expected: &[(SiblingScope, u64)]) -> Result<(), StoreError> {
        for (scope, expected) in expected {
            let actual = self.version(*scope);
            if actual != *expected {
                return Err(StoreError::StaleVersion {
                    scope: *scope,
                    expected: *expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn write(&mut self, record: EntityRecord) {
        match record {
            EntityRecord::Category(c) => {
                self.categories.insert(c.id, c);
            }
            EntityRecord::Questionnaire(q) => {
                self.questionnaires.insert(q.id, q);
            }
            EntityRecord::Question(q) => {
                self.questions.insert(q.id, q);
            }
            EntityRecord::Option(o) => {
                self.options.insert(o.id, o);
            }
        }
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟后端不可用：之后的所有读写都返回 `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable {
                reason: "内存存储已被设置为离线".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_siblings(&self, scope: SiblingScope) -> Result<Versioned<Vec<EntityRecord>>, StoreError> {
        self.ensure_online()?;
        let state = self.state.read().await;
        Ok(Versioned {
            version: state.version(scope),
            value: state.records_in(scope),
        })
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        self.ensure_online()?;
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn get_questionnaire(&self, id: QuestionnaireId) -> Result<Option<QuestionnaireTemplate>, StoreError> {
        self.ensure_online()?;
        Ok(self.state.read().await.questionnaires.get(&id).cloned())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StoreError> {
        self.ensure_online()?;
        Ok(self.state.read().await.questions.get(&id).cloned())
    }

    async fn get_option(&self, id: OptionId) -> Result<Option<QuestionOption>, StoreError> {
        self.ensure_online()?;
        Ok(self.state.read().await.options.get(&id).cloned())
    }

    async fn count_responses(&self, target: ResponseTarget) -> Result<usize, StoreError> {
        self.ensure_online()?;
        Ok(self.state.read().await.count_responses(target))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut state = self.state.write().await;

        state.check_versions(&changes.expected)?;
        for target in &changes.unreferenced {
            let count = state.count_responses(*target);
            if count > 0 {
                return Err(StoreError::Referenced { target: *target, count });
            }
        }

        let mut touched: HashSet<SiblingScope> = changes.expected.iter().map(|(scope, _)| *scope).collect();
        for record in changes.records {
            touched.insert(record.scope());
            state.write(record);
        }
        for scope in touched {
            *state.versions.entry(scope).or_insert(0) += 1;
        }
        debug!("提交完成");
        Ok(())
    }

    async fn persist_submission(
        &self,
        envelope: SubmissionEnvelope,
        expected: &[(SiblingScope, u64)],
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        state.check_versions(expected)?;
        match state.envelopes.iter().position(|e| e.id == envelope.id) {
            Some(index) if state.envelopes[index].is_completed => {
                Err(StoreError::Sealed { envelope: envelope.id })
            }
            Some(index) => {
                state.envelopes[index] = envelope;
                Ok(())
            }
            None => {
                state.envelopes.push(envelope);
                Ok(())
            }
        }
    }

    async fn get_envelope(&self, id: EnvelopeId) -> Result<Option<SubmissionEnvelope>, StoreError> {
        self.ensure_online()?;
        let state = self.state.read().await;
        Ok(state.envelopes.iter().find(|e| e.id == id).cloned())
    }

    async fn load_envelopes(&self, questionnaire_id: QuestionnaireId) -> Result<Vec<SubmissionEnvelope>, StoreError> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut envelopes: Vec<SubmissionEnvelope> = state
            .envelopes
            .iter()
            .filter(|e| e.questionnaire_id == questionnaire_id)
            .cloned()
            .collect();
        envelopes.sort_by_key(|e| e.started_at);
        Ok(envelopes)
    }
}
