//! 问卷定义导入 - 编排层
//!
//! 把 TOML 定义逐级交给 `AuthoringService` 创建，和管理端手工创建走同一套校验

use tracing::info;

use crate::error::AppResult;
use crate::models::import::{SeedFile, SeedQuestion};
use crate::models::schema::QuestionConstraints;
use crate::services::authoring::{AuthoringService, CategoryInput, OptionInput, QuestionInput, QuestionnaireInput};
use crate::workflow::request_ctx::RequestContext;

/// 导入统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedStats {
    pub categories: usize,
    pub questionnaires: usize,
    pub questions: usize,
    pub options: usize,
}

/// 导入问卷定义
///
/// # 参数
/// - `authoring`: 结构编辑服务
/// - `ctx`: 管理员上下文
/// - `seed`: 已解析的定义文件
///
/// # 返回
/// 导入统计；任一实体创建失败即返回错误（已创建的部分保留）
pub async fn import_seed(authoring: &AuthoringService, ctx: &RequestContext, seed: SeedFile) -> AppResult<SeedStats> {
    let mut stats = SeedStats::default();

    for category in seed.categories {
        let created = authoring
            .create_category(
                ctx,
                CategoryInput {
                    name: category.name,
                    description: category.description,
                    is_active: category.is_active,
                },
            )
            .await?;
        stats.categories += 1;

        let Some(questionnaire) = category.questionnaire else {
            continue;
        };
        let template = authoring
            .create_questionnaire(
                ctx,
                created.id,
                QuestionnaireInput {
                    title: questionnaire.title,
                    description: questionnaire.description,
                    version: questionnaire.version,
                    is_mandatory: questionnaire.is_mandatory,
                    is_active: questionnaire.is_active,
                },
            )
            .await?;
        stats.questionnaires += 1;

        for question in questionnaire.questions {
            let (input, options) = split_question(question);
            let (_, created_options) = authoring
                .create_question_with_options(ctx, template.id, input, options)
                .await?;
            stats.questions += 1;
            stats.options += created_options.len();
        }
        info!("{} 📥 已导入分类 '{}'", ctx, created.name);
    }

    Ok(stats)
}

fn split_question(question: SeedQuestion) -> (QuestionInput, Vec<OptionInput>) {
    let input = QuestionInput {
        question_text: question.text,
        question_type: question.question_type,
        constraints: QuestionConstraints {
            is_required: question.required,
            min_length: question.min_length,
            max_length: question.max_length,
            min_value: question.min_value,
            max_value: question.max_value,
        },
        help_text: question.help_text,
        conditional_logic: None,
    };
    let options = question
        .options
        .into_iter()
        .map(|o| OptionInput {
            option_text: o.text,
            option_value: o.value,
            is_correct: o.is_correct,
            allows_custom_text: o.allows_custom_text,
        })
        .collect();
    (input, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryStore;
    use crate::models::loaders::toml_loader::parse_seed;
    use crate::services::catalog_query::CatalogQuery;
    use std::sync::Arc;

    const SEED: &str = r#"
[[categories]]
name = "Health"

[categories.questionnaire]
title = "Daily check"

[[categories.questionnaire.questions]]
text = "Name"
type = "text"
required = true
max_length = 10

[[categories.questionnaire.questions]]
text = "Feeling well?"
type = "radio"
required = true
options = [
  { text = "Yes", value = "yes" },
  { text = "No", value = "no" },
]

[[categories]]
name = "Empty"
"#;

    #[tokio::test]
    async fn test_import_creates_full_tree() {
        let store = Arc::new(MemoryStore::new());
        let authoring = AuthoringService::new(store.clone());
        let ctx = RequestContext::implicit_admin("admin");

        let stats = import_seed(&authoring, &ctx, parse_seed(SEED).unwrap()).await.unwrap();
        assert_eq!(
            stats,
            SeedStats {
                categories: 2,
                questionnaires: 1,
                questions: 2,
                options: 2
            }
        );

        let catalog = CatalogQuery::new(store);
        let active = catalog.active_questionnaires(&ctx).await.unwrap();
        assert_eq!(active.len(), 1);
        let descriptors = catalog.load_descriptors(active[0].id).await.unwrap();
        assert_eq!(descriptors[1].options.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_definition_is_rejected() {
        let seed = parse_seed(
            r#"
[[categories]]
name = "Bad"
[categories.questionnaire]
title = "Broken"
[[categories.questionnaire.questions]]
text = "Pick"
type = "radio"
options = [
  { text = "A", value = "a", is_correct = true },
  { text = "B", value = "b", is_correct = true },
]
"#,
        )
        .unwrap();
        let authoring = AuthoringService::new(Arc::new(MemoryStore::new()));
        let err = import_seed(&authoring, &RequestContext::implicit_admin("admin"), seed)
            .await
            .unwrap_err();
        assert!(err.validation_failures().is_some());
    }
}
