//! 上传协作方 - 基础设施层
//!
//! 只负责"保存文件并返回引用"，大小与类型策略不在这里判断

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::answer::FileReference;
use crate::models::ids::QuestionId;

/// 待上传的文件（作为某道文件题的答案）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub question_id: QuestionId,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// 上传协作方
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: &PendingUpload) -> AppResult<FileReference>;

    /// 删除本次提交已上传、但最终没有入库的文件
    async fn discard(&self, file: &FileReference) -> AppResult<()>;
}

/// 写入本地目录的上传实现
pub struct LocalUploader {
    dir: PathBuf,
    base_url: String,
}

impl LocalUploader {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// 去掉路径部分，只保留安全的文件名字符
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload(&self, file: &PendingUpload) -> AppResult<FileReference> {
        let dir_display = self.dir.display().to_string();
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::file_write_failed(&dir_display, e))?;

        let stored_name = format!("{}-{}", Uuid::new_v4().simple(), sanitize_file_name(&file.file_name));
        let path = self.dir.join(&stored_name);
        fs::write(&path, &file.bytes)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        debug!("已保存上传文件: {}", path.display());
        Ok(FileReference {
            file_url: format!("{}/{}", self.base_url, stored_name),
            file_name: file.file_name.clone(),
            file_size: Some(file.bytes.len() as u64),
            file_type: file.content_type.clone(),
        })
    }

    async fn discard(&self, file: &FileReference) -> AppResult<()> {
        // 只删除本上传器生成的文件名
        let Some(stored_name) = file
            .file_url
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && sanitize_file_name(name) == *name)
        else {
            debug!("跳过非本地上传的文件: {}", file.file_url);
            return Ok(());
        };

        let path = self.dir.join(stored_name);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("已删除未入库的上传文件: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::file_write_failed(path.display().to_string(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\my report.pdf"), "my_report.pdf");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[tokio::test]
    async fn test_local_upload_writes_file() {
        let dir = std::env::temp_dir().join(format!("uploader-test-{}", Uuid::new_v4()));
        let uploader = LocalUploader::new(&dir, "/uploads/");
        let reference = uploader
            .upload(&PendingUpload {
                question_id: QuestionId::new(),
                file_name: "photo.png".to_string(),
                content_type: Some("image/png".to_string()),
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();

        assert!(reference.file_url.starts_with("/uploads/"));
        assert!(reference.file_url.ends_with("-photo.png"));
        assert_eq!(reference.file_size, Some(3));
        let stored = reference.file_url.trim_start_matches("/uploads/");
        assert_eq!(fs::read(dir.join(stored)).await.unwrap(), vec![1, 2, 3]);
        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_discard_removes_only_own_files() {
        let dir = std::env::temp_dir().join(format!("uploader-discard-{}", Uuid::new_v4()));
        let uploader = LocalUploader::new(&dir, "/uploads");
        let reference = uploader
            .upload(&PendingUpload {
                question_id: QuestionId::new(),
                file_name: "scan.pdf".to_string(),
                content_type: None,
                bytes: vec![9],
            })
            .await
            .unwrap();

        tokio_test::assert_ok!(uploader.discard(&reference).await);
        let stored = reference.file_url.trim_start_matches("/uploads/");
        assert!(!dir.join(stored).exists());
        // 再次删除与外部引用都不报错
        tokio_test::assert_ok!(uploader.discard(&reference).await);
        let foreign = FileReference {
            file_url: "https://cdn.example.com/../etc/passwd".to_string(),
            ..reference
        };
        tokio_test::assert_ok!(uploader.discard(&foreign).await);
        let _ = fs::remove_dir_all(&dir).await;
    }
}
