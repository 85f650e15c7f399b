//! 稠密排序 - 业务能力层
//!
//! 维护同级集合的不变量：活动实体的 `display_order` 恰好是 `1..=N`。
//!
//! 这里只计算目标分配，不做任何持久化；调用方负责把分配结果在一个事务里写回。

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::ops::RangeInclusive;
use thiserror::Error;

use crate::models::schema::{active_sorted, Sibling};

/// 一条排序分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderAssignment<Id> {
    pub id: Id,
    pub display_order: u32,
}

/// 单项排序违规
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderViolation {
    #[error("排序值 {0} 重复")]
    DuplicateOrder(u32),
    #[error("排序值 {order} 超出有效范围 {valid:?}")]
    OutOfRange {
        order: u32,
        valid: RangeInclusive<u32>,
    },
    #[error("缺少排序值 {0}")]
    MissingOrder(u32),
    #[error("{0} 不属于当前集合")]
    UnknownEntity(String),
    #[error("{0} 重复出现")]
    DuplicateEntity(String),
    #[error("{0} 未出现在新顺序中")]
    MissingEntity(String),
}

/// 排序错误（包含全部违规项）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.violations))]
pub struct OrderError {
    pub violations: Vec<OrderViolation>,
}

impl OrderError {
    fn check(violations: Vec<OrderViolation>) -> Result<(), OrderError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(OrderError { violations })
        }
    }
}

fn describe(violations: &[OrderViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 新实体的排序值：现有最大值 + 1（空集合为 1），不重排已有实体
pub fn plan_insert(active_orders: impl IntoIterator<Item = u32>) -> u32 {
    active_orders.into_iter().max().map_or(1, |max| max + 1)
}

/// 按原有顺序重新编号为 `1..=N`（稳定排序，排序值相同时保持输入顺序）
pub fn plan_compact<Id: Copy>(active: &[(Id, u32)]) -> Vec<OrderAssignment<Id>> {
    let mut sorted: Vec<(Id, u32)> = active.to_vec();
    sorted.sort_by_key(|(_, order)| *order);
    sorted
        .into_iter()
        .zip(1u32..)
        .map(|((id, _), display_order)| OrderAssignment { id, display_order })
        .collect()
}

/// 移除一个实体后，剩余实体顺延补齐空位
pub fn plan_remove<Id>(active: &[(Id, u32)], removed: Id) -> Result<Vec<OrderAssignment<Id>>, OrderError>
where
    Id: Copy + Eq + fmt::Display,
{
    if !active.iter().any(|(id, _)| *id == removed) {
        return Err(OrderError {
            violations: vec![OrderViolation::UnknownEntity(removed.to_string())],
        });
    }
    let survivors: Vec<(Id, u32)> = active
        .iter()
        .copied()
        .filter(|(id, _)| *id != removed)
        .collect();
    Ok(plan_compact(&survivors))
}

/// 按调用方给出的完整顺序重新编号
///
/// `sequence` 必须恰好是当前活动集合的一个排列，否则拒绝且不产生任何分配。
pub fn plan_reorder<Id>(active: &[(Id, u32)], sequence: &[Id]) -> Result<Vec<OrderAssignment<Id>>, OrderError>
where
    Id: Copy + Eq + Hash + fmt::Display,
{
    OrderError::check(permutation_violations(active, sequence))?;
    Ok(sequence
        .iter()
        .zip(1u32..)
        .map(|(id, display_order)| OrderAssignment {
            id: *id,
            display_order,
        })
        .collect())
}

/// 管理端表单提交的"每个实体带目标排序值"形式
///
/// 先校验排序值（重复 / 越界 / 缺失），再校验实体集合，全部违规一并返回。
pub fn plan_explicit<Id>(
    active: &[(Id, u32)],
    requested: &[(Id, u32)],
) -> Result<Vec<OrderAssignment<Id>>, OrderError>
where
    Id: Copy + Eq + Hash + fmt::Display,
{
    let orders: Vec<u32> = requested.iter().map(|(_, order)| *order).collect();
    let ids: Vec<Id> = requested.iter().map(|(id, _)| *id).collect();

    let mut violations = check_density_against(&orders, active.len());
    violations.extend(permutation_violations(active, &ids));
    OrderError::check(violations)?;

    let mut sequence: Vec<(Id, u32)> = requested.to_vec();
    sequence.sort_by_key(|(_, order)| *order);
    let ids: Vec<Id> = sequence.into_iter().map(|(id, _)| id).collect();
    plan_reorder(active, &ids)
}

/// 检查一组排序值是否恰好为 `1..=N`，返回全部违规
pub fn check_density(orders: &[u32]) -> Vec<OrderViolation> {
    check_density_against(orders, orders.len())
}

fn check_density_against(orders: &[u32], expected_len: usize) -> Vec<OrderViolation> {
    let max = u32::try_from(expected_len).unwrap_or(u32::MAX);
    let valid = 1..=max;
    let mut seen: HashMap<u32, usize> = HashMap::new();
    let mut violations = Vec::new();

    for order in orders {
        let count = seen.entry(*order).or_insert(0);
        *count += 1;
        if *count == 2 {
            violations.push(OrderViolation::DuplicateOrder(*order));
        }
        if *count == 1 && !valid.contains(order) {
            violations.push(OrderViolation::OutOfRange {
                order: *order,
                valid: valid.clone(),
            });
        }
    }
    for order in valid.clone() {
        if !seen.contains_key(&order) {
            violations.push(OrderViolation::MissingOrder(order));
        }
    }
    violations
}

fn permutation_violations<Id>(active: &[(Id, u32)], sequence: &[Id]) -> Vec<OrderViolation>
where
    Id: Copy + Eq + Hash + fmt::Display,
{
    let known: HashSet<Id> = active.iter().map(|(id, _)| *id).collect();
    let mut seen: HashSet<Id> = HashSet::with_capacity(sequence.len());
    let mut violations = Vec::new();

    for id in sequence {
        if !known.contains(id) {
            violations.push(OrderViolation::UnknownEntity(id.to_string()));
        } else if !seen.insert(*id) {
            violations.push(OrderViolation::DuplicateEntity(id.to_string()));
        }
    }
    let mut current: Vec<(Id, u32)> = active.to_vec();
    current.sort_by_key(|(_, order)| *order);
    for (id, _) in current {
        if !seen.contains(&id) {
            violations.push(OrderViolation::MissingEntity(id.to_string()));
        }
    }
    violations
}

// ========== 与实体的衔接 ==========

/// 提取活动实体的 (id, 排序值)，按排序值升序
pub fn active_orders<T: Sibling>(items: &[T]) -> Vec<(T::Id, u32)> {
    active_sorted(items)
        .iter()
        .map(|item| (item.id(), item.display_order()))
        .collect()
}

/// 把分配结果应用到实体上，只返回排序值实际变化的实体
pub fn apply_assignments<T: Sibling>(items: &[T], assignments: &[OrderAssignment<T::Id>]) -> Vec<T> {
    let targets: HashMap<T::Id, u32> = assignments
        .iter()
        .map(|a| (a.id, a.display_order))
        .collect();
    items
        .iter()
        .filter_map(|item| match targets.get(&item.id()) {
            Some(order) if *order != item.display_order() => {
                let mut changed = item.clone();
                changed.set_display_order(*order);
                Some(changed)
            }
            _ => None,
        })
        .collect()
}
