//! 问卷目录查询 - 业务能力层

use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, AppResult, BusinessError};
use crate::infrastructure::store::{load_typed, Store};
use crate::models::ids::QuestionnaireId;
use crate::models::schema::{
    active_sorted, Category, Question, QuestionOption, QuestionnaireTemplate, SiblingScope,
};
use crate::services::validation::QuestionDescriptor;
use crate::workflow::request_ctx::RequestContext;

/// 一次读取得到的题目描述及其所在集合的版本
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    pub descriptors: Vec<QuestionDescriptor>,
    pub versions: Vec<(SiblingScope, u64)>,
}

/// 问卷目录查询
///
/// 分类被软删除或停用后，其下的问卷模板不再可达，但模板本身的标记不变
#[derive(Clone)]
pub struct CatalogQuery {
    store: Arc<dyn Store>,
}

impl CatalogQuery {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 可作答的问卷：分类与模板都未删除且启用，按分类顺序、模板顺序排列
    pub async fn active_questionnaires(&self, ctx: &RequestContext) -> AppResult<Vec<QuestionnaireTemplate>> {
        let categories = load_typed::<Category>(self.store.as_ref(), SiblingScope::Categories).await?;
        let mut result = Vec::new();
        for category in active_sorted(&categories.value).into_iter().filter(|c| c.is_active) {
            let templates =
                load_typed::<QuestionnaireTemplate>(self.store.as_ref(), SiblingScope::Questionnaires(category.id))
                    .await?;
            result.extend(active_sorted(&templates.value).into_iter().filter(|t| t.is_active));
        }
        debug!("{} 可作答问卷 {} 份", ctx, result.len());
        Ok(result)
    }

    /// 按标题查找可作答问卷（忽略大小写与首尾空白）
    pub async fn find_by_title(&self, ctx: &RequestContext, title: &str) -> AppResult<Option<QuestionnaireTemplate>> {
        let wanted = title.trim().to_lowercase();
        Ok(self
            .active_questionnaires(ctx)
            .await?
            .into_iter()
            .find(|t| t.title.trim().to_lowercase() == wanted))
    }

    /// 确认问卷当前可作答
    pub async fn ensure_answerable(&self, questionnaire_id: QuestionnaireId) -> AppResult<QuestionnaireTemplate> {
        let unavailable = || {
            AppError::Business(BusinessError::QuestionnaireUnavailable {
                questionnaire: questionnaire_id.to_string(),
            })
        };

        let template = self
            .store
            .get_questionnaire(questionnaire_id)
            .await?
            .ok_or_else(|| AppError::not_found("问卷模板", questionnaire_id))?;
        if template.deleted_at.is_some() || !template.is_active {
            return Err(unavailable());
        }
        match self.store.get_category(template.category_id).await? {
            Some(category) if category.deleted_at.is_none() && category.is_active => Ok(template),
            _ => Err(unavailable()),
        }
    }

    /// 问卷的活动题目（带题型与活动选项），按排序值排列
    pub async fn load_descriptors(&self, questionnaire_id: QuestionnaireId) -> AppResult<Vec<QuestionDescriptor>> {
        Ok(self.load_descriptor_set(questionnaire_id).await?.descriptors)
    }

    /// 同 `load_descriptors`，并记下每个被读取集合的版本，供落库时核对
    pub async fn load_descriptor_set(&self, questionnaire_id: QuestionnaireId) -> AppResult<DescriptorSet> {
        let scope = SiblingScope::Questions(questionnaire_id);
        let questions = load_typed::<Question>(self.store.as_ref(), scope).await?;
        let mut versions = vec![(scope, questions.version)];
        let mut descriptors = Vec::new();
        for question in active_sorted(&questions.value) {
            let option_scope = SiblingScope::Options(question.id);
            let options = load_typed::<QuestionOption>(self.store.as_ref(), option_scope).await?;
            versions.push((option_scope, options.version));
            descriptors.push(QuestionDescriptor::resolve(question, options.value)?);
        }
        Ok(DescriptorSet { descriptors, versions })
    }
}
