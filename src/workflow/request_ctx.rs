//! 请求上下文
//!
//! 封装"谁在以什么身份发起这次操作"这一信息，每个核心操作都显式接收它

use std::fmt::Display;
use uuid::Uuid;

use crate::error::{AppResult, BusinessError};

/// 请求方角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Respondent,
}

/// 请求上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// 操作者标识
    pub actor: String,

    pub role: Role,

    /// 请求ID（仅用于日志关联）
    pub request_id: Uuid,
}

impl RequestContext {
    pub fn new(actor: impl Into<String>, role: Role) -> Self {
        Self {
            actor: actor.into(),
            role,
            request_id: Uuid::new_v4(),
        }
    }

    /// 未启用认证时使用的隐式管理员身份
    pub fn implicit_admin(name: impl Into<String>) -> Self {
        Self::new(name, Role::Admin)
    }

    pub fn respondent(id: impl Into<String>) -> Self {
        Self::new(id, Role::Respondent)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 要求管理员身份
    pub fn require_admin(&self, action: &'static str) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(BusinessError::Forbidden {
                actor: self.actor.clone(),
                action,
            }
            .into())
        }
    }
}

impl Display for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self.role {
            Role::Admin => "管理员",
            Role::Respondent => "答题人",
        };
        write!(f, "[{}#{} 请求#{}]", role, self.actor, &self.request_id.simple().to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_respondent_cannot_author() {
        let ctx = RequestContext::respondent("alice");
        assert!(matches!(
            ctx.require_admin("创建分类"),
            Err(AppError::Business(BusinessError::Forbidden { .. }))
        ));
        assert!(RequestContext::implicit_admin("admin").require_admin("创建分类").is_ok());
    }

    #[test]
    fn test_display_is_short() {
        let ctx = RequestContext::implicit_admin("admin");
        let shown = ctx.to_string();
        assert!(shown.starts_with("[管理员#admin 请求#"));
    }
}
