//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量答卷处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载答卷文件（Vec<SubmissionFile>）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息并导出答案明细
//!
//! ### `seed_importer` - 问卷定义导入
//! - 把 TOML 定义逐级交给 AuthoringService
//!
//! ### `submission_processor` - 单份答卷处理器
//! - 按标题 / 题目文本 / 选项值定位实体
//! - 读取待上传文件
//! - 调用 SubmissionFlow 并记录结果
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<SubmissionFile>)
//!     ↓
//! submission_processor (处理单份答卷文件)
//!     ↓
//! workflow::SubmissionFlow (校验 → 归一化 → 落库)
//!     ↓
//! services (能力层：ordering / validation / normalization / lifecycle)
//!     ↓
//! infrastructure (基础设施：Store / Uploader)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，submission_processor 管单个
//! 2. **资源隔离**：只有编排层装配存储与上传实现
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做校验判断

pub mod batch_processor;
pub mod seed_importer;
pub mod submission_processor;

// 重新导出主要类型
pub use batch_processor::{App, ProcessingStats};
pub use seed_importer::{import_seed, SeedStats};
pub use submission_processor::{process_submission, FileOutcome};
