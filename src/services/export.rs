//! 答案导出 - 业务能力层
//!
//! 只负责产出 `ResponseDetail` 记录；表格 / CSV 渲染由外部完成。
//! 已软删除的题目与选项仍然出现在导出中，并带有删除标记。

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::infrastructure::store::{load_typed, Store};
use crate::models::ids::{OptionId, QuestionId, QuestionnaireId};
use crate::models::response::{ResponseDetail, SelectedOptionDetail};
use crate::models::schema::{Question, QuestionOption, SiblingScope};
use crate::workflow::request_ctx::RequestContext;

/// 答案导出服务
#[derive(Clone)]
pub struct ExportService {
    store: Arc<dyn Store>,
}

impl ExportService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 某问卷的全部答案明细（每份答卷每题一行）
    pub async fn response_details(
        &self,
        ctx: &RequestContext,
        questionnaire_id: QuestionnaireId,
    ) -> AppResult<Vec<ResponseDetail>> {
        ctx.require_admin("导出答案")?;

        let questions = load_typed::<Question>(self.store.as_ref(), SiblingScope::Questions(questionnaire_id))
            .await?
            .value;
        let mut options: HashMap<OptionId, QuestionOption> = HashMap::new();
        for question in &questions {
            let loaded = load_typed::<QuestionOption>(self.store.as_ref(), SiblingScope::Options(question.id)).await?;
            options.extend(loaded.value.into_iter().map(|o| (o.id, o)));
        }
        let questions: HashMap<QuestionId, Question> = questions.into_iter().map(|q| (q.id, q)).collect();

        let envelopes = self.store.load_envelopes(questionnaire_id).await?;
        let mut details = Vec::new();
        for envelope in &envelopes {
            for response in &envelope.responses {
                let Some(question) = questions.get(&response.question_id) else {
                    warn!("答卷 {} 引用了不存在的题目 {}，跳过", envelope.id, response.question_id);
                    continue;
                };
                let selected_options = response
                    .option_responses
                    .iter()
                    .filter_map(|link| {
                        let option = options.get(&link.option_id)?;
                        Some(SelectedOptionDetail {
                            option_id: option.id,
                            option_text: option.option_text.clone(),
                            option_value: option.option_value.clone(),
                            custom_text: link.custom_text.clone(),
                            option_deleted: option.deleted_at.is_some(),
                        })
                    })
                    .collect();

                details.push(ResponseDetail {
                    envelope_id: envelope.id,
                    respondent_id: envelope.respondent_id.clone(),
                    is_completed: envelope.is_completed,
                    is_draft: envelope.is_draft,
                    completed_at: envelope.completed_at,
                    question_id: question.id,
                    question_text: question.question_text.clone(),
                    question_type: question.question_type.clone(),
                    question_deleted: question.deleted_at.is_some(),
                    text_response: response.text_response.clone(),
                    number_response: response.number_response,
                    date_response: response.date_response,
                    boolean_response: response.boolean_response,
                    file: response.file.clone(),
                    selected_options,
                });
            }
        }

        info!(
            "{} 📤 导出问卷 {}: {} 份答卷, {} 条明细",
            ctx,
            questionnaire_id,
            envelopes.len(),
            details.len()
        );
        Ok(details)
    }
}
