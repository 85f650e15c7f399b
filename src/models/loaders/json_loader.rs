use crate::error::{AppError, AppResult, FileError};
use crate::models::import::SubmissionFile;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 JSON 文件加载一份答卷
pub async fn load_submission_file(path: &Path) -> AppResult<SubmissionFile> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(&display, e))?;

    let mut submission: SubmissionFile = serde_json::from_str(&content).map_err(|source| {
        AppError::File(FileError::JsonParseFailed {
            path: display.clone(),
            source,
        })
    })?;

    submission.file_path = Some(display);
    Ok(submission)
}

/// 从文件夹中加载所有 JSON 答卷文件（按文件名排序）
///
/// 单个文件解析失败只记录警告，不影响其余文件
pub async fn load_all_submission_files(folder_path: &str) -> AppResult<Vec<SubmissionFile>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }));
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut submissions = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::debug!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_submission_file(&path).await {
            Ok(submission) => submissions.push(submission),
            Err(e) => tracing::warn!("加载文件失败 {}: {}", path.display(), e),
        }
    }

    Ok(submissions)
}
