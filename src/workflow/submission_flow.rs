//! 答卷提交流程 - 流程层
//!
//! 核心职责：定义"一份答卷"的完整处理流程
//!
//! 流程顺序：
//! 1. 确认问卷可作答、草稿答卷归属正确
//! 2. 上传文件并把引用代入答案
//! 3. 逐题校验，收集全部失败项（不在第一个失败处停止）
//! 4. 有失败则直接返回，不产生任何写入
//! 5. 归一化为固定存储形态，整份答卷一次性落库
//!
//! 答卷最终没有入库时（未通过校验或中途出错），本次已上传的文件会被删除。

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, BusinessError, ConflictError};
use crate::infrastructure::store::Store;
use crate::infrastructure::uploader::{PendingUpload, Uploader};
use crate::models::answer::{AnswerEntry, AnswerPayload, FileReference};
use crate::models::ids::{EnvelopeId, QuestionId, QuestionnaireId};
use crate::models::response::SubmissionEnvelope;
use crate::services::catalog_query::{CatalogQuery, DescriptorSet};
use crate::services::normalization::normalize_for;
use crate::services::validation::{CheckedAnswer, Dispatcher, FailureCode, QuestionDescriptor, ValidationFailure};
use crate::utils::truncate_text;
use crate::workflow::request_ctx::RequestContext;

/// 提交请求
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    pub questionnaire_id: QuestionnaireId,
    pub respondent_id: String,
    pub answers: Vec<AnswerEntry>,
    /// 文件题的待上传文件，上传后的引用覆盖同题答案
    pub uploads: Vec<PendingUpload>,
    /// 草稿：不检查必答题是否齐全，答卷保持未完成
    pub draft: bool,
    /// 续写已有草稿时传入其 ID
    pub envelope_id: Option<EnvelopeId>,
}

/// 提交结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SubmissionResult {
    #[serde(rename_all = "camelCase")]
    Accepted {
        envelope_id: EnvelopeId,
        is_completed: bool,
        is_draft: bool,
        response_count: usize,
        /// 被转为字符串保存的答案数量
        fallback_count: usize,
    },
    Rejected { failures: Vec<ValidationFailure> },
}

impl SubmissionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionResult::Accepted { .. })
    }
}

/// 答卷提交流程
///
/// - 编排完整的提交流程
/// - 决定何时上传、何时校验、何时落库
/// - 只依赖业务能力（services）与协作方接口
pub struct SubmissionFlow {
    store: Arc<dyn Store>,
    uploader: Arc<dyn Uploader>,
    catalog: CatalogQuery,
    dispatcher: Dispatcher,
    verbose_logging: bool,
}

impl SubmissionFlow {
    pub fn new(store: Arc<dyn Store>, uploader: Arc<dyn Uploader>, config: &Config) -> Self {
        Self {
            catalog: CatalogQuery::new(store.clone()),
            store,
            uploader,
            dispatcher: Dispatcher::new(config.strict_answer_shapes),
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn submit(&self, ctx: &RequestContext, request: SubmissionRequest) -> AppResult<SubmissionResult> {
        let SubmissionRequest {
            questionnaire_id,
            respondent_id,
            mut answers,
            uploads,
            draft,
            envelope_id,
        } = request;

        if !ctx.is_admin() && ctx.actor != respondent_id {
            return Err(BusinessError::Forbidden {
                actor: ctx.actor.clone(),
                action: "代他人提交答卷",
            }
            .into());
        }
        self.catalog.ensure_answerable(questionnaire_id).await?;

        // ========== 草稿续写 ==========
        let previous = match envelope_id {
            Some(id) => Some(self.resumable_envelope(id, questionnaire_id, &respondent_id).await?),
            None => None,
        };

        // ========== 上传前置 ==========
        let mut uploaded = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            let reference = match self.uploader.upload(upload).await {
                Ok(reference) => reference,
                Err(e) => {
                    self.discard_uploads(ctx, &uploaded).await;
                    return Err(e);
                }
            };
            info!("{} 📎 已上传 {} → {}", ctx, reference.file_name, reference.file_url);
            answers.push(AnswerEntry::new(upload.question_id, AnswerPayload::File(reference.clone())));
            uploaded.push(reference);
        }

        let outcome = self
            .check_and_persist(ctx, questionnaire_id, respondent_id, answers, draft, previous)
            .await;
        // 未入库的答卷不应留下孤立文件
        if !matches!(outcome, Ok(SubmissionResult::Accepted { .. })) {
            self.discard_uploads(ctx, &uploaded).await;
        }
        outcome
    }

    async fn check_and_persist(
        &self,
        ctx: &RequestContext,
        questionnaire_id: QuestionnaireId,
        respondent_id: String,
        answers: Vec<AnswerEntry>,
        draft: bool,
        previous: Option<SubmissionEnvelope>,
    ) -> AppResult<SubmissionResult> {
        let answers = collapse_duplicates(ctx, answers);

        // ========== 批量校验 ==========
        let DescriptorSet { descriptors, versions } = self.catalog.load_descriptor_set(questionnaire_id).await?;
        let mut failures: Vec<ValidationFailure> = answers
            .keys()
            .filter(|id| !descriptors.iter().any(|d| d.id() == **id))
            .map(|id| ValidationFailure::new(id.to_string(), FailureCode::UnknownQuestion))
            .collect();
        failures.sort_by(|a, b| a.field.cmp(&b.field));

        let unanswered = AnswerPayload::Null;
        let mut checked: Vec<(&QuestionDescriptor, CheckedAnswer)> = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let payload = answers.get(&descriptor.id()).unwrap_or(&unanswered);
            if draft && payload.is_empty() {
                continue;
            }
            if self.verbose_logging {
                info!(
                    "{} 题目 #{} [{}] {} = {}",
                    ctx,
                    descriptor.question.display_order,
                    descriptor.descriptor.label,
                    truncate_text(&descriptor.question.question_text, 20),
                    truncate_text(&payload.stringify(), 40)
                );
            }
            match self.dispatcher.validate(descriptor, payload) {
                Ok(answer) => checked.push((descriptor, answer)),
                Err(found) => failures.extend(found),
            }
        }

        if !failures.is_empty() {
            info!("{} ⚠️ 答卷未通过校验，共 {} 处问题，未写入任何数据", ctx, failures.len());
            return Ok(SubmissionResult::Rejected { failures });
        }

        // ========== 归一化 & 落库 ==========
        let fallback_count = checked
            .iter()
            .filter(|(_, answer)| matches!(answer, CheckedAnswer::Fallback(_)))
            .count();
        let mut responses = Vec::with_capacity(checked.len());
        for (descriptor, answer) in checked {
            if let Some(response) = normalize_for(descriptor, answer)? {
                responses.push(response);
            }
        }

        let now = Utc::now();
        let envelope = SubmissionEnvelope {
            id: previous.as_ref().map_or_else(EnvelopeId::new, |e| e.id),
            questionnaire_id,
            respondent_id,
            started_at: previous.as_ref().map_or(now, |e| e.started_at),
            completed_at: (!draft).then_some(now),
            is_completed: !draft,
            is_draft: draft,
            responses,
        };
        let result = SubmissionResult::Accepted {
            envelope_id: envelope.id,
            is_completed: envelope.is_completed,
            is_draft: envelope.is_draft,
            response_count: envelope.responses.len(),
            fallback_count,
        };

        // 校验期间题目或选项若被改动，落库会以版本冲突拒绝
        self.store.persist_submission(envelope, &versions).await?;
        if fallback_count > 0 {
            warn!("{} ⚠️ 有 {} 道题的答案被转为字符串保存", ctx, fallback_count);
        }
        info!(
            "{} ✓ 答卷已入库 ({})",
            ctx,
            if draft { "草稿" } else { "已完成" }
        );
        Ok(result)
    }

    async fn discard_uploads(&self, ctx: &RequestContext, uploaded: &[FileReference]) {
        for file in uploaded {
            if let Err(e) = self.uploader.discard(file).await {
                warn!("{} ⚠️ 清理上传文件 {} 失败: {}", ctx, file.file_url, e);
            }
        }
    }

    async fn resumable_envelope(
        &self,
        id: EnvelopeId,
        questionnaire_id: QuestionnaireId,
        respondent_id: &str,
    ) -> AppResult<SubmissionEnvelope> {
        let envelope = self
            .store
            .get_envelope(id)
            .await?
            .ok_or_else(|| AppError::not_found("答卷", id))?;
        if envelope.questionnaire_id != questionnaire_id || envelope.respondent_id != respondent_id {
            return Err(BusinessError::EnvelopeMismatch {
                envelope: id.to_string(),
            }
            .into());
        }
        if envelope.is_completed {
            return Err(ConflictError::EnvelopeSealed {
                envelope: id.to_string(),
            }
            .into());
        }
        Ok(envelope)
    }
}

/// 同一题出现多次时，以最后一次为准
fn collapse_duplicates(ctx: &RequestContext, answers: Vec<AnswerEntry>) -> HashMap<QuestionId, AnswerPayload> {
    let mut collapsed = HashMap::with_capacity(answers.len());
    for entry in answers {
        if collapsed.insert(entry.question_id, entry.value).is_some() {
            warn!("{} 题目 {} 收到多个答案，以最后一个为准", ctx, entry.question_id);
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{LocalUploader, MemoryStore};
    use crate::services::authoring::{AuthoringService, CategoryInput, OptionInput, QuestionInput, QuestionnaireInput};
    use crate::models::schema::{Question, QuestionConstraints, QuestionOption};
    use tokio_test::assert_ok;

    struct Fixture {
        store: Arc<MemoryStore>,
        flow: SubmissionFlow,
        upload_dir: std::path::PathBuf,
        questionnaire: QuestionnaireId,
        q1: Question,
        q2: Question,
        options: Vec<QuestionOption>,
    }

    /// q1: 必答文本（最长 10），q2: 必答单选（o1="yes", o2="no"）
    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let authoring = AuthoringService::new(store.clone());
        let ctx = RequestContext::implicit_admin("admin");

        let category = authoring
            .create_category(&ctx, CategoryInput { name: "C".to_string(), description: None, is_active: true })
            .await
            .unwrap();
        let template = authoring
            .create_questionnaire(
                &ctx,
                category.id,
                QuestionnaireInput {
                    title: "Q".to_string(),
                    description: None,
                    version: 1,
                    is_mandatory: true,
                    is_active: true,
                },
            )
            .await
            .unwrap();
        let q1 = authoring
            .create_question(
                &ctx,
                template.id,
                QuestionInput {
                    question_text: "Name".to_string(),
                    question_type: "text".to_string(),
                    constraints: QuestionConstraints {
                        is_required: true,
                        max_length: Some(10),
                        ..Default::default()
                    },
                    help_text: None,
                    conditional_logic: None,
                },
            )
            .await
            .unwrap();
        let (q2, options) = authoring
            .create_question_with_options(
                &ctx,
                template.id,
                QuestionInput {
                    question_text: "Agree?".to_string(),
                    question_type: "radio".to_string(),
                    constraints: QuestionConstraints {
                        is_required: true,
                        ..Default::default()
                    },
                    help_text: None,
                    conditional_logic: None,
                },
                ["yes", "no"]
                    .iter()
                    .map(|v| OptionInput {
                        option_text: v.to_string(),
                        option_value: v.to_string(),
                        is_correct: false,
                        allows_custom_text: false,
                    })
                    .collect(),
            )
            .await
            .unwrap();

        let upload_dir = std::env::temp_dir().join(format!("flow-test-{}", uuid::Uuid::new_v4()));
        let flow = SubmissionFlow::new(
            store.clone(),
            Arc::new(LocalUploader::new(&upload_dir, "/uploads")),
            &Config::default(),
        );
        Fixture {
            store,
            flow,
            upload_dir,
            questionnaire: template.id,
            q1,
            q2,
            options,
        }
    }

    fn request(f: &Fixture, answers: Vec<AnswerEntry>, draft: bool) -> SubmissionRequest {
        SubmissionRequest {
            questionnaire_id: f.questionnaire,
            respondent_id: "alice".to_string(),
            answers,
            draft,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_valid_submission_creates_completed_envelope() {
        let f = fixture().await;
        let ctx = RequestContext::respondent("alice");
        let answers = vec![
            AnswerEntry::new(f.q1.id, AnswerPayload::text("hello")),
            AnswerEntry::new(f.q2.id, AnswerPayload::options([f.options[0].id])),
        ];
        let result = assert_ok!(f.flow.submit(&ctx, request(&f, answers, false)).await);
        let SubmissionResult::Accepted { envelope_id, is_completed, response_count, .. } = result else {
            panic!("expected acceptance");
        };
        assert!(is_completed);
        assert_eq!(response_count, 2);

        let envelope = f.store.get_envelope(envelope_id).await.unwrap().unwrap();
        assert!(envelope.completed_at.is_some());
        assert_eq!(envelope.response_for(f.q1.id).unwrap().text_response.as_deref(), Some("hello"));
        assert!(envelope.references_option(f.options[0].id));
    }

    #[tokio::test]
    async fn test_all_failures_reported_and_nothing_written() {
        let f = fixture().await;
        let ctx = RequestContext::respondent("alice");
        let answers = vec![
            AnswerEntry::new(f.q1.id, AnswerPayload::text("this text is too long")),
            AnswerEntry::new(f.q2.id, AnswerPayload::options([])),
        ];
        let result = f.flow.submit(&ctx, request(&f, answers, false)).await.unwrap();
        let SubmissionResult::Rejected { failures } = result else {
            panic!("expected rejection");
        };
        let codes: Vec<_> = failures.iter().map(|x| (x.field.clone(), x.code)).collect();
        assert_eq!(
            codes,
            vec![
                (f.q1.id.to_string(), FailureCode::TooLong),
                (f.q2.id.to_string(), FailureCode::Required)
            ]
        );
        assert!(f.store.load_envelopes(f.questionnaire).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draft_then_complete_replaces_envelope() {
        let f = fixture().await;
        let ctx = RequestContext::respondent("alice");
        let draft = f
            .flow
            .submit(&ctx, request(&f, vec![AnswerEntry::new(f.q1.id, AnswerPayload::text("hi"))], true))
            .await
            .unwrap();
        let SubmissionResult::Accepted { envelope_id, is_completed, is_draft, .. } = draft else {
            panic!("draft rejected");
        };
        assert!(!is_completed && is_draft);

        let mut finish = request(
            &f,
            vec![
                AnswerEntry::new(f.q1.id, AnswerPayload::text("hi")),
                AnswerEntry::new(f.q2.id, AnswerPayload::options([f.options[1].id])),
            ],
            false,
        );
        finish.envelope_id = Some(envelope_id);
        assert!(f.flow.submit(&ctx, finish.clone()).await.unwrap().is_accepted());
        let envelopes = f.store.load_envelopes(f.questionnaire).await.unwrap();
        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].is_completed);

        let err = f.flow.submit(&ctx, finish).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ConflictError::EnvelopeSealed { .. })));
    }

    #[tokio::test]
    async fn test_unknown_question_and_duplicate_answers() {
        let f = fixture().await;
        let ctx = RequestContext::respondent("alice");
        let stray = QuestionId::new();
        let answers = vec![
            AnswerEntry::new(f.q1.id, AnswerPayload::text("first")),
            AnswerEntry::new(f.q1.id, AnswerPayload::text("second")),
            AnswerEntry::new(f.q2.id, AnswerPayload::options([f.options[0].id])),
            AnswerEntry::new(stray, AnswerPayload::text("?")),
        ];
        let result = f.flow.submit(&ctx, request(&f, answers, false)).await.unwrap();
        assert_eq!(
            result,
            SubmissionResult::Rejected {
                failures: vec![ValidationFailure::new(stray.to_string(), FailureCode::UnknownQuestion)]
            }
        );
    }

    #[tokio::test]
    async fn test_cannot_submit_for_someone_else() {
        let f = fixture().await;
        let err = f
            .flow
            .submit(&RequestContext::respondent("mallory"), request(&f, Vec::new(), true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Business(BusinessError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_rejected_submission_removes_its_uploads() {
        let f = fixture().await;
        let ctx = RequestContext::respondent("alice");
        let mut req = request(&f, vec![AnswerEntry::new(f.q2.id, AnswerPayload::options([]))], false);
        req.uploads = vec![PendingUpload {
            question_id: f.q1.id,
            file_name: "cv.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: vec![1, 2, 3],
        }];

        let result = f.flow.submit(&ctx, req).await.unwrap();
        assert!(!result.is_accepted());

        let mut leftover = 0;
        if let Ok(mut entries) = tokio::fs::read_dir(&f.upload_dir).await {
            while let Some(_entry) = entries.next_entry().await.unwrap() {
                leftover += 1;
            }
        }
        assert_eq!(leftover, 0);
        let _ = tokio::fs::remove_dir_all(&f.upload_dir).await;
    }
}
