use crate::error::{AppError, AppResult, FileError};
use crate::models::import::SeedFile;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载问卷定义
pub async fn load_seed_file(path: &Path) -> AppResult<SeedFile> {
    let shown = path.display().to_string();
    if !path.exists() {
        return Err(AppError::File(FileError::NotFound { path: shown }));
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(&shown, e))?;

    let seed = parse_seed(&content).map_err(|source| {
        AppError::File(FileError::TomlParseFailed {
            path: shown.clone(),
            source,
        })
    })?;

    tracing::info!(
        "成功加载问卷定义 {}: {} 个分类, {} 道题目",
        shown,
        seed.categories.len(),
        seed.question_count()
    );

    Ok(seed)
}

/// 解析问卷定义文本
pub fn parse_seed(content: &str) -> Result<SeedFile, toml::de::Error> {
    toml::from_str(content)
}
