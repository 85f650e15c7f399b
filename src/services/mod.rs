//! 业务能力层
//!
//! - `ordering`: 同级集合的稠密排序
//! - `validation`: 按题型分派的答案校验与设计期校验
//! - `normalization`: 已校验答案 → 固定存储形态
//! - `lifecycle`: 软删除与恢复
//! - `authoring` / `catalog_query` / `export`: 面向管理端与导出方的服务

pub mod authoring;
pub mod catalog_query;
pub mod export;
pub mod lifecycle;
pub mod normalization;
pub mod ordering;
pub mod validation;

pub use authoring::{AuthoringService, CategoryInput, OptionInput, QuestionInput, QuestionnaireInput, ReorderRequest};
pub use catalog_query::{CatalogQuery, DescriptorSet};
pub use export::ExportService;
pub use normalization::{normalize, normalize_for};
pub use ordering::{OrderAssignment, OrderError, OrderViolation};
pub use validation::{CheckedAnswer, Dispatcher, FailureCode, QuestionDescriptor, ValidationFailure};
