use serde::Deserialize;
use std::path::Path;

use crate::error::{AppError, AppResult, ConfigError, FileError};

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的答卷文件数量
    pub max_concurrent_submissions: usize,
    /// 问卷定义（TOML）路径
    pub seed_file: String,
    /// 待处理答卷（JSON）存放目录
    pub submissions_folder: String,
    /// 上传文件落盘目录
    pub upload_dir: String,
    /// 上传文件对外访问前缀
    pub upload_base_url: String,
    /// 导出结果文件
    pub export_file: String,
    /// 未启用认证时使用的管理员身份
    pub admin_identity: String,
    /// 无法识别的答案形态是否直接拒绝（否则转为字符串并记录警告）
    pub strict_answer_shapes: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 日志过滤规则（RUST_LOG 未设置时生效）
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_submissions: 8,
            seed_file: "questionnaires.toml".to_string(),
            submissions_folder: "submissions".to_string(),
            upload_dir: "uploads".to_string(),
            upload_base_url: "/uploads".to_string(),
            export_file: "responses.json".to_string(),
            admin_identity: "admin".to_string(),
            strict_answer_shapes: false,
            verbose_logging: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// 以默认值为基础，用环境变量覆盖
    ///
    /// 数值或布尔类型的环境变量无法解析时返回错误，而不是静默使用默认值
    pub fn from_env() -> AppResult<Self> {
        let default = Self::default();
        let config = Self {
            max_concurrent_submissions: env_parse("MAX_CONCURRENT_SUBMISSIONS", default.max_concurrent_submissions, "usize")?,
            seed_file: std::env::var("SEED_FILE").unwrap_or(default.seed_file),
            submissions_folder: std::env::var("SUBMISSIONS_FOLDER").unwrap_or(default.submissions_folder),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or(default.upload_dir),
            upload_base_url: std::env::var("UPLOAD_BASE_URL").unwrap_or(default.upload_base_url),
            export_file: std::env::var("EXPORT_FILE").unwrap_or(default.export_file),
            admin_identity: std::env::var("ADMIN_IDENTITY").unwrap_or(default.admin_identity),
            strict_answer_shapes: env_parse("STRICT_ANSWER_SHAPES", default.strict_answer_shapes, "bool")?,
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging, "bool")?,
            log_filter: std::env::var("LOG_FILTER").unwrap_or(default.log_filter),
        };
        config.check()?;
        Ok(config)
    }

    /// 从 TOML 配置文件加载，缺省字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        if !path.exists() {
            return Err(AppError::File(FileError::NotFound { path: display }));
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| AppError::file_read_failed(&display, e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AppError::Config(ConfigError::FileParseFailed { source, .. }) => {
                AppError::Config(ConfigError::FileParseFailed {
                    path: display,
                    source,
                })
            }
            other => other,
        })
    }

    /// 解析 TOML 文本
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(content).map_err(|source| {
            AppError::Config(ConfigError::FileParseFailed {
                path: String::new(),
                source,
            })
        })?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> AppResult<()> {
        if self.max_concurrent_submissions == 0 {
            return Err(AppError::Config(ConfigError::InvalidValue {
                field: "max_concurrent_submissions",
                value: self.max_concurrent_submissions.to_string(),
                reason: "必须为正整数",
            }));
        }
        Ok(())
    }
}

/// 读取并解析环境变量，未设置时使用默认值
fn env_parse<T: std::str::FromStr>(var_name: &str, default: T, expected_type: &str) -> AppResult<T> {
    let Ok(value) = std::env::var(var_name) else {
        return Ok(default);
    };
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|_| {
        AppError::Config(ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value,
            expected_type: expected_type.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            strict_answer_shapes = true
            admin_identity = "root"
            "#,
        )
        .unwrap();

        assert!(config.strict_answer_shapes);
        assert_eq!(config.admin_identity, "root");
        assert_eq!(config.max_concurrent_submissions, 8);
        assert_eq!(config.export_file, "responses.json");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = Config::from_toml_str("max_concurrent_submissions = 0").unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::InvalidValue {
                field: "max_concurrent_submissions",
                ..
            })
        ));
    }

    #[test]
    fn test_unparsable_env_value_rejected() {
        std::env::set_var("QUESTIONNAIRE_TEST_CONCURRENCY", "many");
        let err = env_parse("QUESTIONNAIRE_TEST_CONCURRENCY", 8usize, "usize").unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::EnvVarParseFailed { ref value, .. }) if value == "many"
        ));
        assert_eq!(env_parse("QUESTIONNAIRE_TEST_UNSET", 8usize, "usize").unwrap(), 8);
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = Config::from_toml_str("strict_answer_shapes = ").unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::FileParseFailed { .. })
        ));
    }
}
