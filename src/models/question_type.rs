//! 题型目录
//!
//! 静态注册表：题型键 → 题型描述（取值形态、是否有选项、校验策略、存储列）。
//! 新增题型只需要在这里登记一次。

use phf::phf_map;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 题型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// 单行文本
    Text,
    /// 多行文本
    Textarea,
    /// 邮箱
    Email,
    /// 电话
    Phone,
    /// 数字
    Number,
    /// 评分
    Rating,
    /// 滑块
    Slider,
    /// 日期
    Date,
    /// 单选
    Radio,
    /// 下拉单选
    Select,
    /// 是/否
    YesNo,
    /// 多选
    Checkbox,
    /// 下拉多选
    Multiselect,
    /// 文件
    File,
}

/// 校验策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationStrategy {
    /// 字符串长度
    TextLength,
    /// 字符串长度 + 邮箱格式
    Email,
    /// 数值范围
    NumericRange,
    /// 日期
    Date,
    /// 恰好一个选项
    SingleChoice,
    /// 布尔值或一个是/否选项
    YesNo,
    /// 一个或多个选项
    MultiChoice,
    /// 文件引用
    FileReference,
}

/// 答案落库的目标列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageSlot {
    Text,
    Number,
    Date,
    Boolean,
    Options,
    File,
}

/// 题型描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub kind: QuestionKind,
    pub key: &'static str,
    pub label: &'static str,
    pub has_options: bool,
    pub supports_file_upload: bool,
    pub supports_image: bool,
    /// 单选互斥题型：最多一个正确选项
    pub exclusive_choice: bool,
    pub strategy: ValidationStrategy,
    pub slot: StorageSlot,
}

impl TypeDescriptor {
    /// 是否为字符串题型（长度约束只对这些题型有意义）
    pub fn is_textual(&self) -> bool {
        matches!(
            self.strategy,
            ValidationStrategy::TextLength | ValidationStrategy::Email
        )
    }

    /// 是否为数值题型
    pub fn is_numeric(&self) -> bool {
        self.strategy == ValidationStrategy::NumericRange
    }
}

/// 题型目录错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// 未登记的题型键
    #[error("未知题型: '{key}'")]
    UnknownType { key: String },
}

const fn scalar(
    kind: QuestionKind,
    key: &'static str,
    label: &'static str,
    strategy: ValidationStrategy,
    slot: StorageSlot,
) -> TypeDescriptor {
    TypeDescriptor {
        kind,
        key,
        label,
        has_options: false,
        supports_file_upload: false,
        supports_image: false,
        exclusive_choice: false,
        strategy,
        slot,
    }
}

const fn choice(
    kind: QuestionKind,
    key: &'static str,
    label: &'static str,
    exclusive: bool,
    strategy: ValidationStrategy,
    slot: StorageSlot,
) -> TypeDescriptor {
    TypeDescriptor {
        kind,
        key,
        label,
        has_options: true,
        supports_file_upload: false,
        supports_image: false,
        exclusive_choice: exclusive,
        strategy,
        slot,
    }
}

const TEXT: TypeDescriptor = scalar(QuestionKind::Text, "text", "单行文本", ValidationStrategy::TextLength, StorageSlot::Text);
const TEXTAREA: TypeDescriptor = scalar(QuestionKind::Textarea, "textarea", "多行文本", ValidationStrategy::TextLength, StorageSlot::Text);
const EMAIL: TypeDescriptor = scalar(QuestionKind::Email, "email", "邮箱", ValidationStrategy::Email, StorageSlot::Text);
const PHONE: TypeDescriptor = scalar(QuestionKind::Phone, "phone", "电话", ValidationStrategy::TextLength, StorageSlot::Text);
const NUMBER: TypeDescriptor = scalar(QuestionKind::Number, "number", "数字", ValidationStrategy::NumericRange, StorageSlot::Number);
const RATING: TypeDescriptor = scalar(QuestionKind::Rating, "rating", "评分", ValidationStrategy::NumericRange, StorageSlot::Number);
const SLIDER: TypeDescriptor = scalar(QuestionKind::Slider, "slider", "滑块", ValidationStrategy::NumericRange, StorageSlot::Number);
const DATE: TypeDescriptor = scalar(QuestionKind::Date, "date", "日期", ValidationStrategy::Date, StorageSlot::Date);
const RADIO: TypeDescriptor = choice(QuestionKind::Radio, "radio", "单选", true, ValidationStrategy::SingleChoice, StorageSlot::Options);
const SELECT: TypeDescriptor = choice(QuestionKind::Select, "select", "下拉单选", true, ValidationStrategy::SingleChoice, StorageSlot::Options);
const YES_NO: TypeDescriptor = choice(QuestionKind::YesNo, "yes_no", "是/否", true, ValidationStrategy::YesNo, StorageSlot::Boolean);
const CHECKBOX: TypeDescriptor = choice(QuestionKind::Checkbox, "checkbox", "多选", false, ValidationStrategy::MultiChoice, StorageSlot::Options);
const MULTISELECT: TypeDescriptor = choice(QuestionKind::Multiselect, "multiselect", "下拉多选", false, ValidationStrategy::MultiChoice, StorageSlot::Options);
const FILE: TypeDescriptor = TypeDescriptor {
    kind: QuestionKind::File,
    key: "file",
    label: "文件",
    has_options: false,
    supports_file_upload: true,
    supports_image: true,
    exclusive_choice: false,
    strategy: ValidationStrategy::FileReference,
    slot: StorageSlot::File,
};

static CATALOG: phf::Map<&'static str, TypeDescriptor> = phf_map! {
    "text" => TEXT,
    "textarea" => TEXTAREA,
    "email" => EMAIL,
    "phone" => PHONE,
    "number" => NUMBER,
    "rating" => RATING,
    "slider" => SLIDER,
    "date" => DATE,
    "radio" => RADIO,
    "select" => SELECT,
    "yes_no" => YES_NO,
    "checkbox" => CHECKBOX,
    "multiselect" => MULTISELECT,
    "file" => FILE,
};

/// 按题型键查找描述（忽略大小写与首尾空白）
pub fn lookup(key: &str) -> Result<&'static TypeDescriptor, CatalogError> {
    let normalized = key.trim().to_ascii_lowercase();
    CATALOG
        .get(normalized.as_str())
        .ok_or(CatalogError::UnknownType {
            key: key.to_string(),
        })
}

/// 全部已登记题型
pub fn all() -> impl Iterator<Item = &'static TypeDescriptor> {
    CATALOG.values()
}

impl QuestionKind {
    /// 获取题型描述
    pub fn descriptor(self) -> &'static TypeDescriptor {
        match self {
            QuestionKind::Text => &TEXT,
            QuestionKind::Textarea => &TEXTAREA,
            QuestionKind::Email => &EMAIL,
            QuestionKind::Phone => &PHONE,
            QuestionKind::Number => &NUMBER,
            QuestionKind::Rating => &RATING,
            QuestionKind::Slider => &SLIDER,
            QuestionKind::Date => &DATE,
            QuestionKind::Radio => &RADIO,
            QuestionKind::Select => &SELECT,
            QuestionKind::YesNo => &YES_NO,
            QuestionKind::Checkbox => &CHECKBOX,
            QuestionKind::Multiselect => &MULTISELECT,
            QuestionKind::File => &FILE,
        }
    }

    /// 获取题型键
    pub fn key(self) -> &'static str {
        self.descriptor().key
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_matches_its_kind() {
        let mut count = 0;
        for descriptor in all() {
            assert_eq!(descriptor.kind.descriptor(), descriptor);
            assert_eq!(lookup(descriptor.key).unwrap(), descriptor);
            count += 1;
        }
        assert_eq!(count, 14);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup(" Radio ").unwrap().kind, QuestionKind::Radio);
        assert_eq!(lookup("YES_NO").unwrap().kind, QuestionKind::YesNo);
    }

    #[test]
    fn test_unknown_key_is_hard_error() {
        assert_eq!(
            lookup("matrix"),
            Err(CatalogError::UnknownType {
                key: "matrix".to_string()
            })
        );
    }

    #[test]
    fn test_option_bearing_types() {
        let with_options: Vec<_> = all()
            .filter(|d| d.has_options)
            .map(|d| d.kind)
            .collect();
        for kind in [
            QuestionKind::Radio,
            QuestionKind::Select,
            QuestionKind::YesNo,
            QuestionKind::Checkbox,
            QuestionKind::Multiselect,
        ] {
            assert!(with_options.contains(&kind));
        }
        assert_eq!(with_options.len(), 5);
        assert!(QuestionKind::Radio.descriptor().exclusive_choice);
        assert!(!QuestionKind::Checkbox.descriptor().exclusive_choice);
    }

    #[test]
    fn test_labels_are_distinct() {
        let mut labels: Vec<_> = all().map(|d| d.label).collect();
        assert!(labels.iter().all(|l| !l.trim().is_empty()));
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 14);
    }
}
