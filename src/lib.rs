//! # Questionnaire Core
//!
//! 问卷动态结构引擎：管理员用题型目录组装问卷，答题人提交的异构答案被校验并归一化为固定的存储形态
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 存储与上传协作方的边界，只暴露能力
//! - `Store` / `MemoryStore` - 带版本号的同级加载、原子提交、原子落答卷
//! - `Uploader` / `LocalUploader` - 保存文件并返回引用
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，多为纯函数
//! - `ordering` - 稠密排序（插入 / 移除 / 重排）
//! - `validation` - 按题型分派的答案校验
//! - `normalization` - 答案 → 固定存储形态
//! - `lifecycle` - 软删除与恢复
//! - `AuthoringService` / `CatalogQuery` / `ExportService`
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份答卷"的完整处理流程
//! - `RequestContext` - 请求上下文（操作者 + 角色）
//! - `SubmissionFlow` - 流程编排（上传 → 校验 → 归一化 → 落库）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量答卷处理器，管理资源和并发
//! - `orchestrator/submission_processor` - 单份答卷处理器
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{MemoryStore, Store, Uploader};
pub use models::{AnswerEntry, AnswerPayload, SubmissionEnvelope};
pub use orchestrator::App;
pub use services::{AuthoringService, CatalogQuery, ExportService};
pub use workflow::{RequestContext, SubmissionFlow, SubmissionRequest, SubmissionResult};
