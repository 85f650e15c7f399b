//! 问卷结构编辑 - 业务能力层
//!
//! 分类 / 问卷模板 / 题目 / 选项的增删改、软删除、恢复与排序。
//!
//! 每个操作的形态相同：
//! 1. 校验管理员身份
//! 2. 读取同级集合（带版本号）
//! 3. 用纯函数计算要写回的实体
//! 4. 以读取时的版本号做一次原子提交，期间集合被他人修改则整体失败

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult, BusinessError, ConcurrencyError};
use crate::infrastructure::store::{load_typed, ChangeSet, ResponseTarget, Store, Versioned};
use crate::models::ids::{CategoryId, OptionId, QuestionId, QuestionnaireId};
use crate::models::question_type::{lookup, TypeDescriptor};
use crate::models::schema::{
    active_sorted, normalize_key, Category, Question, QuestionConstraints, QuestionOption, QuestionnaireTemplate,
    Sibling, SiblingScope,
};
use crate::services::lifecycle::{ensure_mutable, plan_restore, plan_soft_delete};
use crate::services::ordering::{
    active_orders, apply_assignments, plan_explicit, plan_insert, plan_reorder, OrderAssignment,
};
use crate::services::validation::{
    validate_option_set, validate_question_definition, FailureCode, ValidationFailure,
};
use crate::workflow::request_ctx::RequestContext;

/// 分类输入
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// 问卷模板输入
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionnaireInput {
    pub title: String,
    pub description: Option<String>,
    pub version: u32,
    pub is_mandatory: bool,
    pub is_active: bool,
}

/// 题目输入
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionInput {
    pub question_text: String,
    pub question_type: String,
    pub constraints: QuestionConstraints,
    pub help_text: Option<String>,
    pub conditional_logic: Option<serde_json::Value>,
}

/// 选项输入
#[derive(Debug, Clone, PartialEq)]
pub struct OptionInput {
    pub option_text: String,
    pub option_value: String,
    pub is_correct: bool,
    pub allows_custom_text: bool,
}

/// 排序请求
#[derive(Debug, Clone, PartialEq)]
pub enum ReorderRequest<Id> {
    /// 完整的新顺序（当前活动集合的一个排列）
    Sequence(Vec<Id>),
    /// 每个实体的目标排序值
    Explicit(Vec<(Id, u32)>),
}

/// 问卷结构编辑服务
#[derive(Clone)]
pub struct AuthoringService {
    store: Arc<dyn Store>,
}

fn reject(failures: Vec<ValidationFailure>) -> AppResult<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(failures))
    }
}

fn require_text(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::Validation(vec![ValidationFailure::new(field, FailureCode::Required)]))
    } else {
        Ok(trimmed.to_string())
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// 把计划中的实体替换进集合，得到提交后的样子
fn merged<T: Sibling>(all: &[T], changed: &[T]) -> Vec<T> {
    let mut after = all.to_vec();
    for c in changed {
        match after.iter_mut().find(|s| s.id() == c.id()) {
            Some(slot) => *slot = c.clone(),
            None => after.push(c.clone()),
        }
    }
    after
}

fn build_option(question_id: QuestionId, input: OptionInput, display_order: u32) -> QuestionOption {
    QuestionOption {
        id: OptionId::new(),
        question_id,
        option_text: input.option_text.trim().to_string(),
        option_value: input.option_value.trim().to_string(),
        is_correct: input.is_correct,
        allows_custom_text: input.allows_custom_text,
        display_order,
        deleted_at: None,
        created_at: Utc::now(),
    }
}

impl AuthoringService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 管理视图：某父节点下的全部实体（含已删除）及其版本号
    pub async fn siblings<T: Sibling>(&self, ctx: &RequestContext, scope: SiblingScope) -> AppResult<Versioned<Vec<T>>> {
        ctx.require_admin("查看结构")?;
        self.load(scope).await
    }

    // ========== 分类 ==========

    pub async fn create_category(&self, ctx: &RequestContext, input: CategoryInput) -> AppResult<Category> {
        ctx.require_admin("创建分类")?;
        let name = require_text("name", &input.name)?;
        let siblings = self.load::<Category>(SiblingScope::Categories).await?;
        ensure_unique(&siblings.value, None, &normalize_key(&name))?;

        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(),
            name,
            description: trimmed(input.description),
            is_active: input.is_active,
            display_order: next_order(&siblings.value),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.commit(SiblingScope::Categories, siblings.version, vec![category.clone()]).await?;
        info!("{} ✓ 创建分类 '{}' (排序 {})", ctx, category.name, category.display_order);
        Ok(category)
    }

    pub async fn update_category(&self, ctx: &RequestContext, id: CategoryId, input: CategoryInput) -> AppResult<Category> {
        ctx.require_admin("修改分类")?;
        let name = require_text("name", &input.name)?;
        let siblings = self.load::<Category>(SiblingScope::Categories).await?;
        let mut category = find_active(&siblings.value, id)?;
        ensure_unique(&siblings.value, Some(id), &normalize_key(&name))?;

        category.name = name;
        category.description = trimmed(input.description);
        category.is_active = input.is_active;
        category.updated_at = Utc::now();
        self.commit(SiblingScope::Categories, siblings.version, vec![category.clone()]).await?;
        info!("{} ✓ 修改分类 '{}'", ctx, category.name);
        Ok(category)
    }

    /// 软删除分类；其下问卷模板随之不可达，但不单独打删除标记
    pub async fn delete_category(&self, ctx: &RequestContext, id: CategoryId) -> AppResult<bool> {
        ctx.require_admin("删除分类")?;
        self.soft_delete_in::<Category>(ctx, SiblingScope::Categories, id).await
    }

    pub async fn restore_category(&self, ctx: &RequestContext, id: CategoryId) -> AppResult<bool> {
        ctx.require_admin("恢复分类")?;
        self.restore_in::<Category, _>(ctx, SiblingScope::Categories, id, |_| Vec::new()).await
    }

    pub async fn reorder_categories(
        &self,
        ctx: &RequestContext,
        request: ReorderRequest<CategoryId>,
        based_on_version: Option<u64>,
    ) -> AppResult<Vec<OrderAssignment<CategoryId>>> {
        ctx.require_admin("调整分类顺序")?;
        self.reorder_in::<Category>(ctx, SiblingScope::Categories, request, based_on_version).await
    }

    // ========== 问卷模板 ==========

    /// 创建问卷模板（每个分类最多一个活动模板）
    pub async fn create_questionnaire(
        &self,
        ctx: &RequestContext,
        category_id: CategoryId,
        input: QuestionnaireInput,
    ) -> AppResult<QuestionnaireTemplate> {
        ctx.require_admin("创建问卷")?;
        let title = require_text("title", &input.title)?;
        check_version(input.version)?;
        match self.store.get_category(category_id).await? {
            Some(category) if category.deleted_at.is_none() => {}
            _ => return Err(AppError::not_found(Category::KIND, category_id)),
        }

        let scope = SiblingScope::Questionnaires(category_id);
        let siblings = self.load::<QuestionnaireTemplate>(scope).await?;
        ensure_unique(&siblings.value, None, &category_id.to_string())?;

        let now = Utc::now();
        let template = QuestionnaireTemplate {
            id: QuestionnaireId::new(),
            category_id,
            title,
            description: trimmed(input.description),
            version: input.version,
            is_mandatory: input.is_mandatory,
            is_active: input.is_active,
            display_order: next_order(&siblings.value),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.commit(scope, siblings.version, vec![template.clone()]).await?;
        info!("{} ✓ 创建问卷 '{}' v{}", ctx, template.title, template.version);
        Ok(template)
    }

    pub async fn update_questionnaire(
        &self,
        ctx: &RequestContext,
        id: QuestionnaireId,
        input: QuestionnaireInput,
    ) -> AppResult<QuestionnaireTemplate> {
        ctx.require_admin("修改问卷")?;
        let title = require_text("title", &input.title)?;
        check_version(input.version)?;
        let scope = self.questionnaire_scope(id).await?;
        let siblings = self.load::<QuestionnaireTemplate>(scope).await?;
        let mut template = find_active(&siblings.value, id)?;

        template.title = title;
        template.description = trimmed(input.description);
        template.version = input.version;
        template.is_mandatory = input.is_mandatory;
        template.is_active = input.is_active;
        template.updated_at = Utc::now();
        self.commit(scope, siblings.version, vec![template.clone()]).await?;
        info!("{} ✓ 修改问卷 '{}'", ctx, template.title);
        Ok(template)
    }

    pub async fn delete_questionnaire(&self, ctx: &RequestContext, id: QuestionnaireId) -> AppResult<bool> {
        ctx.require_admin("删除问卷")?;
        let scope = self.questionnaire_scope(id).await?;
        self.soft_delete_in::<QuestionnaireTemplate>(ctx, scope, id).await
    }

    pub async fn restore_questionnaire(&self, ctx: &RequestContext, id: QuestionnaireId) -> AppResult<bool> {
        ctx.require_admin("恢复问卷")?;
        let scope = self.questionnaire_scope(id).await?;
        self.restore_in::<QuestionnaireTemplate, _>(ctx, scope, id, |_| Vec::new()).await
    }

    pub async fn reorder_questionnaires(
        &self,
        ctx: &RequestContext,
        category_id: CategoryId,
        request: ReorderRequest<QuestionnaireId>,
        based_on_version: Option<u64>,
    ) -> AppResult<Vec<OrderAssignment<QuestionnaireId>>> {
        ctx.require_admin("调整问卷顺序")?;
        self.reorder_in::<QuestionnaireTemplate>(ctx, SiblingScope::Questionnaires(category_id), request, based_on_version)
            .await
    }

    // ========== 题目 ==========

    pub async fn create_question(
        &self,
        ctx: &RequestContext,
        questionnaire_id: QuestionnaireId,
        input: QuestionInput,
    ) -> AppResult<Question> {
        let (question, _) = self
            .create_question_with_options(ctx, questionnaire_id, input, Vec::new())
            .await?;
        Ok(question)
    }

    /// 一次性创建题目及其选项（同一次提交）
    pub async fn create_question_with_options(
        &self,
        ctx: &RequestContext,
        questionnaire_id: QuestionnaireId,
        input: QuestionInput,
        options: Vec<OptionInput>,
    ) -> AppResult<(Question, Vec<QuestionOption>)> {
        ctx.require_admin("创建题目")?;
        match self.store.get_questionnaire(questionnaire_id).await? {
            Some(template) if template.deleted_at.is_none() => {}
            _ => return Err(AppError::not_found(QuestionnaireTemplate::KIND, questionnaire_id)),
        }

        let scope = SiblingScope::Questions(questionnaire_id);
        let siblings = self.load::<Question>(scope).await?;
        let now = Utc::now();
        let question = Question {
            id: QuestionId::new(),
            questionnaire_id,
            question_text: input.question_text.trim().to_string(),
            question_type: normalize_key(&input.question_type),
            constraints: input.constraints,
            help_text: trimmed(input.help_text),
            conditional_logic: input.conditional_logic,
            display_order: next_order(&siblings.value),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        let descriptor = lookup(&question.question_type)?;
        reject(validate_question_definition(&question, descriptor, options.len()))?;

        let options: Vec<QuestionOption> = options
            .into_iter()
            .zip(1u32..)
            .map(|(input, order)| build_option(question.id, input, order))
            .collect();
        reject(validate_option_set(descriptor, &options))?;

        let mut changes = ChangeSet::new()
            .expect(scope, siblings.version)
            .expect(SiblingScope::Options(question.id), 0);
        changes.push(question.clone());
        changes.extend(options.clone());
        self.store.commit(changes).await?;

        info!(
            "{} ✓ 创建题目 #{} [{}] 选项 {} 个",
            ctx,
            question.display_order,
            descriptor.key,
            options.len()
        );
        Ok((question, options))
    }

    /// 修改题目；已有答案引用时题型不可再变
    pub async fn update_question(&self, ctx: &RequestContext, id: QuestionId, input: QuestionInput) -> AppResult<Question> {
        ctx.require_admin("修改题目")?;
        let current = self.active_question(id).await?;
        let new_type = normalize_key(&input.question_type);
        let type_changed = new_type != current.question_type;
        if type_changed {
            let used = self.store.count_responses(ResponseTarget::Question(id)).await?;
            ensure_mutable(Question::KIND, id, "questionType", used)?;
        }

        let scope = current.scope();
        let siblings = self.load::<Question>(scope).await?;
        let mut question = find_active(&siblings.value, id)?;
        let options = self.load::<QuestionOption>(SiblingScope::Options(id)).await?;
        let active_options = active_sorted(&options.value);

        question.question_text = input.question_text.trim().to_string();
        question.question_type = new_type;
        question.constraints = input.constraints;
        question.help_text = trimmed(input.help_text);
        question.conditional_logic = input.conditional_logic;
        question.updated_at = Utc::now();

        let descriptor = lookup(&question.question_type)?;
        let mut failures = validate_question_definition(&question, descriptor, active_options.len());
        failures.extend(validate_option_set(descriptor, &active_options));
        reject(failures)?;

        let mut changes = ChangeSet::new()
            .expect(scope, siblings.version)
            .expect(SiblingScope::Options(id), options.version);
        if type_changed {
            // 检查之后才落库的答卷也必须挡住
            changes = changes.expect_unreferenced(ResponseTarget::Question(id));
        }
        changes.push(question.clone());
        self.store.commit(changes).await?;
        info!("{} ✓ 修改题目 #{}", ctx, question.display_order);
        Ok(question)
    }

    pub async fn delete_question(&self, ctx: &RequestContext, id: QuestionId) -> AppResult<bool> {
        ctx.require_admin("删除题目")?;
        let scope = self.question_scope(id).await?;
        self.soft_delete_in::<Question>(ctx, scope, id).await
    }

    pub async fn restore_question(&self, ctx: &RequestContext, id: QuestionId) -> AppResult<bool> {
        ctx.require_admin("恢复题目")?;
        let scope = self.question_scope(id).await?;
        self.restore_in::<Question, _>(ctx, scope, id, |_| Vec::new()).await
    }

    pub async fn reorder_questions(
        &self,
        ctx: &RequestContext,
        questionnaire_id: QuestionnaireId,
        request: ReorderRequest<QuestionId>,
        based_on_version: Option<u64>,
    ) -> AppResult<Vec<OrderAssignment<QuestionId>>> {
        ctx.require_admin("调整题目顺序")?;
        self.reorder_in::<Question>(ctx, SiblingScope::Questions(questionnaire_id), request, based_on_version)
            .await
    }

    // ========== 选项 ==========

    pub async fn create_option(&self, ctx: &RequestContext, question_id: QuestionId, input: OptionInput) -> AppResult<QuestionOption> {
        ctx.require_admin("创建选项")?;
        let question = self.active_question(question_id).await?;
        let descriptor = options_descriptor(&question)?;

        let scope = SiblingScope::Options(question_id);
        let siblings = self.load::<QuestionOption>(scope).await?;
        let option = build_option(question_id, input, next_order(&siblings.value));
        reject(validate_option_set(descriptor, &merged(&siblings.value, &[option.clone()])))?;

        self.commit(scope, siblings.version, vec![option.clone()]).await?;
        info!("{} ✓ 创建选项 '{}' (排序 {})", ctx, option.option_value, option.display_order);
        Ok(option)
    }

    /// 修改选项；已有答案引用时选项值不可再变
    pub async fn update_option(&self, ctx: &RequestContext, id: OptionId, input: OptionInput) -> AppResult<QuestionOption> {
        ctx.require_admin("修改选项")?;
        let current = self.store.get_option(id).await?.ok_or_else(|| AppError::not_found(QuestionOption::KIND, id))?;
        let question = self.active_question(current.question_id).await?;
        let descriptor = options_descriptor(&question)?;

        let new_value = input.option_value.trim().to_string();
        let value_changed = new_value != current.option_value;
        if value_changed {
            let used = self.store.count_responses(ResponseTarget::Option(id)).await?;
            ensure_mutable(QuestionOption::KIND, id, "optionValue", used)?;
        }

        let scope = current.scope();
        let siblings = self.load::<QuestionOption>(scope).await?;
        let mut option = find_active(&siblings.value, id)?;
        option.option_text = input.option_text.trim().to_string();
        option.option_value = new_value;
        option.is_correct = input.is_correct;
        option.allows_custom_text = input.allows_custom_text;
        reject(validate_option_set(descriptor, &merged(&siblings.value, &[option.clone()])))?;

        let mut changes = ChangeSet::new().expect(scope, siblings.version);
        if value_changed {
            changes = changes.expect_unreferenced(ResponseTarget::Option(id));
        }
        changes.push(option.clone());
        self.store.commit(changes).await?;
        info!("{} ✓ 修改选项 '{}'", ctx, option.option_value);
        Ok(option)
    }

    pub async fn delete_option(&self, ctx: &RequestContext, id: OptionId) -> AppResult<bool> {
        ctx.require_admin("删除选项")?;
        let scope = self.option_scope(id).await?;
        self.soft_delete_in::<QuestionOption>(ctx, scope, id).await
    }

    /// 恢复选项：重新校验选项集合（例如不能出现第二个正确答案）
    pub async fn restore_option(&self, ctx: &RequestContext, id: OptionId) -> AppResult<bool> {
        ctx.require_admin("恢复选项")?;
        let scope = self.option_scope(id).await?;
        let question = match scope {
            SiblingScope::Options(question_id) => self.active_question(question_id).await?,
            _ => return Err(AppError::not_found(QuestionOption::KIND, id)),
        };
        let descriptor = options_descriptor(&question)?;
        self.restore_in::<QuestionOption, _>(ctx, scope, id, |after| validate_option_set(descriptor, after))
            .await
    }

    pub async fn reorder_options(
        &self,
        ctx: &RequestContext,
        question_id: QuestionId,
        request: ReorderRequest<OptionId>,
        based_on_version: Option<u64>,
    ) -> AppResult<Vec<OrderAssignment<OptionId>>> {
        ctx.require_admin("调整选项顺序")?;
        self.reorder_in::<QuestionOption>(ctx, SiblingScope::Options(question_id), request, based_on_version)
            .await
    }

    // ========== 通用实现 ==========

    async fn load<T: Sibling>(&self, scope: SiblingScope) -> AppResult<Versioned<Vec<T>>> {
        Ok(load_typed::<T>(self.store.as_ref(), scope).await?)
    }

    async fn commit<T: Sibling>(&self, scope: SiblingScope, version: u64, changed: Vec<T>) -> AppResult<()> {
        if changed.is_empty() {
            return Ok(());
        }
        let mut changes = ChangeSet::new().expect(scope, version);
        changes.extend(changed);
        self.store.commit(changes).await?;
        Ok(())
    }

    async fn soft_delete_in<T: Sibling>(&self, ctx: &RequestContext, scope: SiblingScope, id: T::Id) -> AppResult<bool> {
        let siblings = self.load::<T>(scope).await?;
        let changed = plan_soft_delete(&siblings.value, id, Utc::now())?;
        let applied = !changed.is_empty();
        let renumbered = changed.len().saturating_sub(1);
        self.commit(scope, siblings.version, changed).await?;
        if applied {
            info!("{} 🗑️ 软删除{} {}，重排 {} 个同级", ctx, T::KIND, id, renumbered);
        }
        Ok(applied)
    }

    async fn restore_in<T, F>(&self, ctx: &RequestContext, scope: SiblingScope, id: T::Id, check: F) -> AppResult<bool>
    where
        T: Sibling,
        F: FnOnce(&[T]) -> Vec<ValidationFailure>,
    {
        let siblings = self.load::<T>(scope).await?;
        let changed = plan_restore(&siblings.value, id)?;
        if changed.is_empty() {
            return Ok(false);
        }
        reject(check(&merged(&siblings.value, &changed)))?;

        let order = changed[0].display_order();
        self.commit(scope, siblings.version, changed).await?;
        info!("{} ♻️ 恢复{} {}，排到第 {} 位", ctx, T::KIND, id, order);
        Ok(true)
    }

    async fn reorder_in<T: Sibling>(
        &self,
        ctx: &RequestContext,
        scope: SiblingScope,
        request: ReorderRequest<T::Id>,
        based_on_version: Option<u64>,
    ) -> AppResult<Vec<OrderAssignment<T::Id>>> {
        let siblings = self.load::<T>(scope).await?;
        if let Some(expected) = based_on_version {
            if expected != siblings.version {
                return Err(ConcurrencyError::StaleSiblings {
                    scope: scope.to_string(),
                    expected,
                    actual: siblings.version,
                }
                .into());
            }
        }

        let active = active_orders(&siblings.value);
        let assignments = match &request {
            ReorderRequest::Sequence(ids) => plan_reorder(&active, ids)?,
            ReorderRequest::Explicit(requested) => plan_explicit(&active, requested)?,
        };
        let changed = apply_assignments(&siblings.value, &assignments);
        let moved = changed.len();
        self.commit(scope, siblings.version, changed).await?;
        info!("{} 🔀 调整{}顺序，{} 个实体位置变化", ctx, T::KIND, moved);
        Ok(assignments)
    }

    async fn active_question(&self, id: QuestionId) -> AppResult<Question> {
        match self.store.get_question(id).await? {
            Some(question) if question.deleted_at.is_none() => Ok(question),
            _ => Err(AppError::not_found(Question::KIND, id)),
        }
    }

    async fn questionnaire_scope(&self, id: QuestionnaireId) -> AppResult<SiblingScope> {
        self.store
            .get_questionnaire(id)
            .await?
            .map(|t| t.scope())
            .ok_or_else(|| AppError::not_found(QuestionnaireTemplate::KIND, id))
    }

    async fn question_scope(&self, id: QuestionId) -> AppResult<SiblingScope> {
        self.store
            .get_question(id)
            .await?
            .map(|q| q.scope())
            .ok_or_else(|| AppError::not_found(Question::KIND, id))
    }

    async fn option_scope(&self, id: OptionId) -> AppResult<SiblingScope> {
        self.store
            .get_option(id)
            .await?
            .map(|o| o.scope())
            .ok_or_else(|| AppError::not_found(QuestionOption::KIND, id))
    }
}

fn next_order<T: Sibling>(siblings: &[T]) -> u32 {
    plan_insert(active_orders(siblings).into_iter().map(|(_, order)| order))
}

fn find_active<T: Sibling>(siblings: &[T], id: T::Id) -> AppResult<T> {
    siblings
        .iter()
        .find(|s| s.id() == id && !s.is_deleted())
        .cloned()
        .ok_or_else(|| AppError::not_found(T::KIND, id))
}

/// 唯一键在活动同级中不可重复（`except` 为正在修改的实体自身）
fn ensure_unique<T: Sibling>(siblings: &[T], except: Option<T::Id>, key: &str) -> AppResult<()> {
    let taken = siblings.iter().any(|s| {
        !s.is_deleted() && Some(s.id()) != except && s.uniqueness_key().as_deref() == Some(key)
    });
    if taken {
        Err(AppError::duplicate_key(T::KIND, key))
    } else {
        Ok(())
    }
}

fn check_version(version: u32) -> AppResult<()> {
    if version == 0 {
        Err(AppError::Validation(vec![ValidationFailure::new("version", FailureCode::InvalidBounds)]))
    } else {
        Ok(())
    }
}

fn options_descriptor(question: &Question) -> AppResult<&'static TypeDescriptor> {
    let descriptor = lookup(&question.question_type)?;
    if descriptor.has_options {
        Ok(descriptor)
    } else {
        Err(BusinessError::OptionsNotSupported {
            question: question.id.to_string(),
            type_key: question.question_type.clone(),
        }
        .into())
    }
}
