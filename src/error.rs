use thiserror::Error;

use crate::infrastructure::store::StoreError;
use crate::models::question_type::CatalogError;
use crate::services::ordering::OrderError;
use crate::services::validation::ValidationFailure;

/// 应用程序错误类型
///
/// 分类与处理方式：
/// - `Validation`：用户输入问题，完整收集后返回，不按异常记录
/// - `Order` / `Conflict`：约束冲突，调用方修正输入后可重试
/// - `Concurrency`：同级集合已被并发修改，重新加载后重试
/// - `Storage`：存储故障，保证无部分写入，可直接重试
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入校验失败（包含全部失败项）
    #[error("输入校验失败: {}", summarize(.0))]
    Validation(Vec<ValidationFailure>),
    /// 排序约束错误
    #[error("排序错误: {0}")]
    Order(#[from] OrderError),
    /// 唯一性或不可变约束冲突
    #[error("约束冲突: {0}")]
    Conflict(#[from] ConflictError),
    /// 并发冲突
    #[error("并发冲突: {0}")]
    Concurrency(#[from] ConcurrencyError),
    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 题型目录错误（编程错误）
    #[error("题型目录错误: {0}")]
    Catalog(#[from] CatalogError),
    /// 业务逻辑错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 内部不变量被破坏（编程错误，不应由输入触发）
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 约束冲突
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// 同级集合中已存在相同的唯一键（分类名称、选项值等）
    #[error("{kind} 的键 '{key}' 已被占用")]
    DuplicateKey { kind: &'static str, key: String },
    /// 已有答卷引用，字段不可再修改
    #[error("{kind} {id} 已有答卷引用，字段 {field} 不可修改")]
    ImmutableAfterResponses {
        kind: &'static str,
        id: String,
        field: &'static str,
    },
    /// 答卷已完成，不可再修改
    #[error("答卷 {envelope} 已完成，不可修改")]
    EnvelopeSealed { envelope: String },
}

/// 并发冲突
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConcurrencyError {
    /// 同级集合版本已变化
    #[error("集合 {scope} 已被修改 (期望版本 {expected}, 实际版本 {actual})，请重新加载后重试")]
    StaleSiblings {
        scope: String,
        expected: u64,
        actual: u64,
    },
}

/// 存储错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 后端不可用
    #[error("存储后端不可用: {reason}")]
    Unavailable { reason: String },
}

/// 业务逻辑错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusinessError {
    /// 实体不存在（或已被软删除）
    #[error("{kind} {id} 不存在")]
    NotFound { kind: &'static str, id: String },
    /// 权限不足
    #[error("用户 {actor} 无权执行 {action}")]
    Forbidden { actor: String, action: &'static str },
    /// 问卷不可作答（未启用、已删除或所属分类不可用）
    #[error("问卷 {questionnaire} 当前不可作答")]
    QuestionnaireUnavailable { questionnaire: String },
    /// 草稿答卷与请求不匹配
    #[error("答卷 {envelope} 不属于该答题人或问卷")]
    EnvelopeMismatch { envelope: String },
    /// 该题型不支持选项
    #[error("题目 {question} 的题型 {type_key} 不支持选项")]
    OptionsNotSupported { question: String, type_key: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置项取值不合法
    #[error("配置项 {field} 的值 '{value}' 不合法: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    /// 配置文件解析失败
    #[error("配置文件 {path} 解析失败: {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

// ========== 从常见错误类型转换 ==========

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleVersion {
                scope,
                expected,
                actual,
            } => AppError::Concurrency(ConcurrencyError::StaleSiblings {
                scope: scope.to_string(),
                expected,
                actual,
            }),
            StoreError::Referenced { target, .. } => AppError::Conflict(ConflictError::ImmutableAfterResponses {
                kind: target.kind(),
                id: target.id(),
                field: target.locked_field(),
            }),
            StoreError::Sealed { envelope } => AppError::Conflict(ConflictError::EnvelopeSealed {
                envelope: envelope.to_string(),
            }),
            StoreError::Unavailable { reason } => {
                AppError::Storage(StorageError::Unavailable { reason })
            }
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建实体不存在错误
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        AppError::Business(BusinessError::NotFound {
            kind,
            id: id.to_string(),
        })
    }

    /// 创建唯一键冲突错误
    pub fn duplicate_key(kind: &'static str, key: impl Into<String>) -> Self {
        AppError::Conflict(ConflictError::DuplicateKey {
            kind,
            key: key.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 调用方是否可以不修改输入直接重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Concurrency(_) | AppError::Storage(_))
    }

    /// 取出校验失败项（如果是校验错误）
    pub fn validation_failures(&self) -> Option<&[ValidationFailure]> {
        match self {
            AppError::Validation(failures) => Some(failures),
            _ => None,
        }
    }
}

fn summarize(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::validation::FailureCode;

    #[test]
    fn test_retryable_classification() {
        let stale = AppError::Concurrency(ConcurrencyError::StaleSiblings {
            scope: "categories".to_string(),
            expected: 1,
            actual: 2,
        });
        assert!(stale.is_retryable());

        let duplicate = AppError::duplicate_key("分类", "Health");
        assert!(!duplicate.is_retryable());

        let invalid = AppError::Validation(vec![ValidationFailure::new("q1", FailureCode::TooLong)]);
        assert!(!invalid.is_retryable());
        assert_eq!(invalid.validation_failures().map(|f| f.len()), Some(1));
    }

    #[test]
    fn test_validation_display_lists_every_failure() {
        let err = AppError::Validation(vec![
            ValidationFailure::new("q1", FailureCode::TooLong),
            ValidationFailure::new("q2", FailureCode::Required),
        ]);
        let message = err.to_string();
        assert!(message.contains("q1"));
        assert!(message.contains("q2"));
    }
}
