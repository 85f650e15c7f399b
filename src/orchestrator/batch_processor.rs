//! 批量答卷处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源装配、问卷定义导入和批量答卷处理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：装配存储与上传协作方，导入问卷定义
//! 2. **批量加载**：扫描并加载所有待处理的答卷文件
//! 3. **并发控制**：使用 Semaphore 限制同时处理的答卷数量
//! 4. **全局统计**：汇总所有答卷的处理结果
//! 5. **结果导出**：把全部答案明细写入 JSON 文件
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单份答卷的细节
//! - **资源所有者**：唯一持有存储与上传实现的模块
//! - **向下委托**：委托 submission_processor 处理单份答卷

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{LocalUploader, MemoryStore, Store, Uploader};
use crate::models::import::SubmissionFile;
use crate::models::loaders::{load_all_submission_files, load_seed_file};
use crate::models::response::ResponseDetail;
use crate::orchestrator::seed_importer::import_seed;
use crate::orchestrator::submission_processor::{process_submission, FileOutcome};
use crate::services::{AuthoringService, CatalogQuery, ExportService};
use crate::utils::logging;
use crate::workflow::{RequestContext, SubmissionFlow};

/// 应用主结构
pub struct App {
    config: Config,
    admin: RequestContext,
    authoring: AuthoringService,
    catalog: CatalogQuery,
    export: ExportService,
    flow: Arc<SubmissionFlow>,
}

/// 导出文件中的一份问卷
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedQuestionnaire {
    title: String,
    version: u32,
    responses: Vec<ResponseDetail>,
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl ProcessingStats {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected + self.failed
    }
}

impl App {
    /// 初始化应用（使用内存存储与本地上传目录）
    pub async fn initialize(config: Config) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let uploader: Arc<dyn Uploader> =
            Arc::new(LocalUploader::new(&config.upload_dir, config.upload_base_url.clone()));
        Self::with_collaborators(config, store, uploader).await
    }

    /// 使用给定的存储与上传实现初始化
    pub async fn with_collaborators(config: Config, store: Arc<dyn Store>, uploader: Arc<dyn Uploader>) -> Result<Self> {
        logging::log_startup(config.max_concurrent_submissions, &config.admin_identity);

        let app = Self {
            admin: RequestContext::implicit_admin(config.admin_identity.clone()),
            authoring: AuthoringService::new(store.clone()),
            catalog: CatalogQuery::new(store.clone()),
            export: ExportService::new(store.clone()),
            flow: Arc::new(SubmissionFlow::new(store, uploader, &config)),
            config,
        };
        app.import_definitions().await?;
        Ok(app)
    }

    pub fn authoring(&self) -> &AuthoringService {
        &self.authoring
    }

    pub fn catalog(&self) -> &CatalogQuery {
        &self.catalog
    }

    pub fn flow(&self) -> &SubmissionFlow {
        &self.flow
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ProcessingStats> {
        info!("\n📁 正在扫描待处理的答卷...");
        let files = load_all_submission_files(&self.config.submissions_folder).await?;

        if files.is_empty() {
            warn!("⚠️ 没有找到待处理的答卷文件，程序结束");
            return Ok(ProcessingStats::default());
        }
        logging::log_files_loaded(files.len(), self.config.max_concurrent_submissions);

        let stats = self.process_all(files).await?;
        self.export_all().await?;

        logging::print_final_stats(stats.accepted, stats.rejected, stats.failed, &self.config.export_file);
        Ok(stats)
    }

    /// 导入问卷定义（文件不存在时跳过）
    async fn import_definitions(&self) -> Result<()> {
        let path = Path::new(&self.config.seed_file);
        if !path.exists() {
            warn!("⚠️ 问卷定义文件 {} 不存在，跳过导入", self.config.seed_file);
            return Ok(());
        }
        let seed = load_seed_file(path).await?;
        let stats = import_seed(&self.authoring, &self.admin, seed)
            .await
            .with_context(|| format!("导入问卷定义失败: {}", self.config.seed_file))?;
        logging::log_seed_loaded(stats.categories, stats.questions);
        Ok(())
    }

    /// 并发处理所有答卷
    async fn process_all(&self, files: Vec<SubmissionFile>) -> Result<ProcessingStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_submissions.max(1)));
        let mut handles = Vec::with_capacity(files.len());

        for (idx, file) in files.into_iter().enumerate() {
            let file_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let flow = self.flow.clone();
            let catalog = self.catalog.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match process_submission(&flow, &catalog, file, file_index).await {
                    Ok(outcome) => Ok(outcome),
                    Err(e) => {
                        error!("[答卷 {}] ❌ 处理过程中发生错误: {:#}", file_index, e);
                        Err(e)
                    }
                }
            });
            handles.push((file_index, handle));
        }

        let mut stats = ProcessingStats::default();
        for (file_index, handle) in handles {
            match handle.await {
                Ok(Ok(FileOutcome::Accepted)) => stats.accepted += 1,
                Ok(Ok(FileOutcome::Rejected)) => stats.rejected += 1,
                Ok(Err(_)) => stats.failed += 1,
                Err(e) => {
                    error!("[答卷 {}] 任务执行失败: {}", file_index, e);
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }

    /// 导出全部可作答问卷的答案明细
    async fn export_all(&self) -> Result<()> {
        let mut exported = Vec::new();
        for template in self.catalog.active_questionnaires(&self.admin).await? {
            let responses = self.export.response_details(&self.admin, template.id).await?;
            exported.push(ExportedQuestionnaire {
                title: template.title,
                version: template.version,
                responses,
            });
        }

        let json = serde_json::to_string_pretty(&exported).context("序列化导出结果失败")?;
        tokio::fs::write(&self.config.export_file, json)
            .await
            .with_context(|| format!("写入导出文件失败: {}", self.config.export_file))?;
        Ok(())
    }
}
