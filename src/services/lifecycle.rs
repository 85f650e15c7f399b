//! 软删除生命周期 - 业务能力层
//!
//! 软删除只打时间戳，不删除历史；删除后剩余同级补齐排序，恢复后排到末尾。
//! 这里只计算需要写回的实体，由调用方在一次提交里落库。

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult, ConflictError};
use crate::models::schema::Sibling;
use crate::services::ordering::{active_orders, apply_assignments, plan_insert, plan_remove};

/// 软删除计划
///
/// # 参数
/// - `siblings`: 同一父节点下的全部实体（含已删除）
/// - `id`: 目标实体
///
/// # 返回
/// 需要写回的实体（目标本身 + 重新编号的同级）；已删除的实体返回空列表
pub fn plan_soft_delete<T: Sibling>(siblings: &[T], id: T::Id, now: DateTime<Utc>) -> AppResult<Vec<T>> {
    let target = find(siblings, id)?;
    if target.is_deleted() {
        return Ok(Vec::new());
    }

    let assignments = plan_remove(&active_orders(siblings), id)?;
    let mut changed = vec![{
        let mut deleted = target.clone();
        deleted.set_deleted_at(Some(now));
        deleted
    }];
    changed.extend(apply_assignments(siblings, &assignments));
    Ok(changed)
}

/// 恢复计划：清除删除标记，排到当前活动序列末尾
///
/// 若已有活动同级占用相同唯一键，则拒绝恢复。
pub fn plan_restore<T: Sibling>(siblings: &[T], id: T::Id) -> AppResult<Vec<T>> {
    let target = find(siblings, id)?;
    if !target.is_deleted() {
        return Ok(Vec::new());
    }

    if let Some(key) = target.uniqueness_key() {
        let taken = siblings
            .iter()
            .any(|s| !s.is_deleted() && s.id() != id && s.uniqueness_key().as_deref() == Some(key.as_str()));
        if taken {
            return Err(AppError::duplicate_key(T::KIND, key));
        }
    }

    let mut restored = target.clone();
    restored.set_deleted_at(None);
    restored.set_display_order(plan_insert(active_orders(siblings).into_iter().map(|(_, order)| order)));
    Ok(vec![restored])
}

/// 已有答卷引用的实体，结构性字段不可再修改
pub fn ensure_mutable(
    kind: &'static str,
    id: impl ToString,
    field: &'static str,
    response_count: usize,
) -> Result<(), ConflictError> {
    if response_count > 0 {
        return Err(ConflictError::ImmutableAfterResponses {
            kind,
            id: id.to_string(),
            field,
        });
    }
    Ok(())
}

fn find<T: Sibling>(siblings: &[T], id: T::Id) -> AppResult<&T> {
    siblings
        .iter()
        .find(|s| s.id() == id)
        .ok_or_else(|| AppError::not_found(T::KIND, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::{CategoryId, OptionId, QuestionId};
    use crate::models::schema::{active_sorted, Category, QuestionOption};
    use crate::services::ordering::check_density;

    fn option(question_id: QuestionId, value: &str, order: u32) -> QuestionOption {
        QuestionOption {
            id: OptionId::new(),
            question_id,
            option_text: value.to_string(),
            option_value: value.to_string(),
            is_correct: false,
            allows_custom_text: false,
            display_order: order,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    /// 把计划写回集合（模拟存储层提交）
    fn apply(siblings: &mut [QuestionOption], changed: Vec<QuestionOption>) {
        for c in changed {
            if let Some(slot) = siblings.iter_mut().find(|s| s.id == c.id) {
                *slot = c;
            }
        }
    }

    #[test]
    fn test_delete_then_restore_moves_to_end() {
        let q = QuestionId::new();
        let mut options = vec![option(q, "o1", 1), option(q, "o2", 2), option(q, "o3", 3)];
        let (o1, o2, o3) = (options[0].id, options[1].id, options[2].id);

        let changed = plan_soft_delete(&options, o2, Utc::now()).unwrap();
        assert_eq!(changed.len(), 2);
        apply(&mut options, changed);
        let active: Vec<_> = active_sorted(&options).iter().map(|o| (o.id, o.display_order)).collect();
        assert_eq!(active, vec![(o1, 1), (o3, 2)]);

        let changed = plan_restore(&options, o2).unwrap();
        apply(&mut options, changed);
        let active: Vec<_> = active_sorted(&options).iter().map(|o| (o.id, o.display_order)).collect();
        assert_eq!(active, vec![(o1, 1), (o3, 2), (o2, 3)]);
        let orders: Vec<u32> = active.iter().map(|(_, order)| *order).collect();
        assert!(check_density(&orders).is_empty());
    }

    #[test]
    fn test_repeated_calls_are_no_ops() {
        let q = QuestionId::new();
        let mut options = vec![option(q, "a", 1)];
        let id = options[0].id;
        assert!(plan_restore(&options, id).unwrap().is_empty());

        let changed = plan_soft_delete(&options, id, Utc::now()).unwrap();
        apply(&mut options, changed);
        assert!(plan_soft_delete(&options, id, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_restore_blocked_by_active_duplicate() {
        let q = QuestionId::new();
        let mut options = vec![option(q, "Yes", 1)];
        let old = options[0].id;
        let deleted = plan_soft_delete(&options, old, Utc::now()).unwrap();
        apply(&mut options, deleted);
        options.push(option(q, "yes", 1));

        let err = plan_restore(&options, old).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ConflictError::DuplicateKey { .. })));
    }

    #[test]
    fn test_unknown_entity_is_not_found() {
        let categories: Vec<Category> = Vec::new();
        assert!(plan_soft_delete(&categories, CategoryId::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_immutable_after_responses() {
        assert!(ensure_mutable("选项", OptionId::new(), "optionValue", 0).is_ok());
        assert!(matches!(
            ensure_mutable("选项", OptionId::new(), "optionValue", 2),
            Err(ConflictError::ImmutableAfterResponses { field: "optionValue", .. })
        ));
    }
}
