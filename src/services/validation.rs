//! 题目校验 - 业务能力层
//!
//! 按题型的校验策略分派，把原始答案解释为 [`CheckedAnswer`]，或者返回全部失败项。
//! 用户输入问题永远不会以错误抛出，只有未知题型（编程错误）才是硬错误。

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

use crate::models::answer::{AnswerPayload, FileReference, OptionChoice};
use crate::models::ids::{OptionId, QuestionId};
use crate::models::question_type::{lookup, CatalogError, TypeDescriptor, ValidationStrategy};
use crate::models::schema::{active_sorted, normalize_key, Question, QuestionOption};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("邮箱正则表达式无效")
});

/// 失败代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    Required,
    TooShort,
    TooLong,
    BelowMin,
    AboveMax,
    InvalidFormat,
    UnknownOption,
    DuplicateOptionValue,
    MultipleCorrectAnswers,
    UnknownQuestion,
    InvalidBounds,
}

/// 一条校验失败
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub field: String,
    pub code: FailureCode,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, code: FailureCode) -> Self {
        Self {
            field: field.into(),
            code,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.field, self.code)
    }
}

/// 选中的选项（已确认属于该题的活动选项）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSelection {
    pub option_id: OptionId,
    pub custom_text: Option<String>,
}

/// 通过校验的答案（已按题型解释）
#[derive(Debug, Clone, PartialEq)]
pub enum CheckedAnswer {
    /// 非必答题未作答
    Unanswered,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    /// 是/否题；若题目配置了是/否选项则同时记录对应选项
    Boolean {
        value: bool,
        option: Option<OptionId>,
    },
    Options(Vec<OptionSelection>),
    File(FileReference),
    /// 无法识别的形态被转为字符串
    Fallback(String),
}

/// 题目描述：题目本身 + 题型 + 活动选项（按排序）
#[derive(Debug, Clone)]
pub struct QuestionDescriptor {
    pub question: Question,
    pub descriptor: &'static TypeDescriptor,
    pub options: Vec<QuestionOption>,
}

impl QuestionDescriptor {
    /// 解析题型并过滤掉已删除的选项
    pub fn resolve(question: Question, options: Vec<QuestionOption>) -> Result<Self, CatalogError> {
        let descriptor = lookup(&question.question_type)?;
        let options = active_sorted(&options)
            .into_iter()
            .filter(|o| o.question_id == question.id)
            .collect();
        Ok(Self {
            question,
            descriptor,
            options,
        })
    }

    pub fn id(&self) -> QuestionId {
        self.question.id
    }

    pub fn is_required(&self) -> bool {
        self.question.constraints.is_required
    }

    /// 失败项中使用的字段名
    pub fn field(&self) -> String {
        self.question.id.to_string()
    }

    fn option(&self, id: OptionId) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// 校验结果
pub type ValidationResult = Result<CheckedAnswer, Vec<ValidationFailure>>;

/// 题型校验分派器
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    /// 无法识别的答案形态直接判为格式错误，而不是转为字符串
    pub strict_shapes: bool,
}

impl Dispatcher {
    pub fn new(strict_shapes: bool) -> Self {
        Self { strict_shapes }
    }

    /// 校验一道题的答案
    pub fn validate(&self, question: &QuestionDescriptor, payload: &AnswerPayload) -> ValidationResult {
        let field = question.field();

        if payload.is_empty() {
            return if question.is_required() {
                Err(vec![ValidationFailure::new(field, FailureCode::Required)])
            } else {
                Ok(CheckedAnswer::Unanswered)
            };
        }

        match question.descriptor.strategy {
            ValidationStrategy::TextLength => self.check_text(question, payload, false),
            ValidationStrategy::Email => self.check_text(question, payload, true),
            ValidationStrategy::NumericRange => check_number(question, payload),
            ValidationStrategy::Date => check_date(question, payload),
            ValidationStrategy::SingleChoice => check_single(question, payload),
            ValidationStrategy::YesNo => check_yes_no(question, payload),
            ValidationStrategy::MultiChoice => check_multi(question, payload),
            ValidationStrategy::FileReference => check_file(question, payload),
        }
    }

    fn check_text(&self, question: &QuestionDescriptor, payload: &AnswerPayload, email: bool) -> ValidationResult {
        let field = question.field();
        let (text, fallback) = match payload {
            AnswerPayload::Text(s) => (s.trim().to_string(), false),
            AnswerPayload::Number(_) | AnswerPayload::Bool(_) | AnswerPayload::Other(_)
                if !self.strict_shapes =>
            {
                warn!(
                    "题目 {} 收到无法识别的答案形态 {}，已转为字符串保存",
                    field,
                    payload.shape()
                );
                (payload.stringify(), true)
            }
            _ => return Err(vec![ValidationFailure::new(field, FailureCode::InvalidFormat)]),
        };

        let constraints = &question.question.constraints;
        let length = text.chars().count();
        let mut failures = Vec::new();
        if let Some(min) = constraints.min_length {
            if length < min as usize {
                failures.push(ValidationFailure::new(&field, FailureCode::TooShort));
            }
        }
        if let Some(max) = constraints.max_length {
            if length > max as usize {
                failures.push(ValidationFailure::new(&field, FailureCode::TooLong));
            }
        }
        if email && !EMAIL_PATTERN.is_match(&text) {
            failures.push(ValidationFailure::new(&field, FailureCode::InvalidFormat));
        }

        if !failures.is_empty() {
            Err(failures)
        } else if fallback {
            Ok(CheckedAnswer::Fallback(text))
        } else {
            Ok(CheckedAnswer::Text(text))
        }
    }
}

/// 使用默认（宽松）分派器校验
pub fn validate(question: &QuestionDescriptor, payload: &AnswerPayload) -> ValidationResult {
    Dispatcher::default().validate(question, payload)
}

fn check_number(question: &QuestionDescriptor, payload: &AnswerPayload) -> ValidationResult {
    let field = question.field();
    let value = match payload {
        AnswerPayload::Number(n) => Some(*n),
        AnswerPayload::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let value = match value {
        Some(v) if v.is_finite() => v,
        _ => return Err(vec![ValidationFailure::new(field, FailureCode::InvalidFormat)]),
    };

    let constraints = &question.question.constraints;
    let mut failures = Vec::new();
    if constraints.min_value.is_some_and(|min| value < min) {
        failures.push(ValidationFailure::new(&field, FailureCode::BelowMin));
    }
    if constraints.max_value.is_some_and(|max| value > max) {
        failures.push(ValidationFailure::new(&field, FailureCode::AboveMax));
    }
    if failures.is_empty() {
        Ok(CheckedAnswer::Number(value))
    } else {
        Err(failures)
    }
}

/// 接受 `YYYY-MM-DD` 或 RFC 3339 时间戳（取日期部分）
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn check_date(question: &QuestionDescriptor, payload: &AnswerPayload) -> ValidationResult {
    let date = match payload {
        AnswerPayload::Date(d) => Some(*d),
        AnswerPayload::Text(s) => parse_date(s),
        _ => None,
    };
    date.map(CheckedAnswer::Date)
        .ok_or_else(|| vec![ValidationFailure::new(question.field(), FailureCode::InvalidFormat)])
}

/// 解析为选项列表：数组形态，或单个选项 ID 字符串
fn choices_of(payload: &AnswerPayload) -> Option<Vec<OptionChoice>> {
    match payload {
        AnswerPayload::Options(list) => Some(list.clone()),
        AnswerPayload::Text(s) => s.parse::<OptionId>().ok().map(|id| vec![OptionChoice::from(id)]),
        _ => None,
    }
}

/// 逐个核对选项归属与补充文字，并折叠重复选项
fn check_selections(question: &QuestionDescriptor, choices: &[OptionChoice]) -> Result<Vec<OptionSelection>, Vec<ValidationFailure>> {
    let field = question.field();
    let mut failures = Vec::new();
    let mut seen = HashSet::new();
    let mut selections = Vec::new();

    for (index, choice) in choices.iter().enumerate() {
        let Some(option) = question.option(choice.option_id) else {
            failures.push(ValidationFailure::new(
                format!("{}[{}]", field, index),
                FailureCode::UnknownOption,
            ));
            continue;
        };
        let custom_text = choice
            .custom_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if custom_text.is_some() && !option.allows_custom_text {
            failures.push(ValidationFailure::new(
                format!("{}[{}].customText", field, index),
                FailureCode::InvalidFormat,
            ));
            continue;
        }
        if seen.insert(choice.option_id) {
            selections.push(OptionSelection {
                option_id: choice.option_id,
                custom_text,
            });
        }
    }

    if failures.is_empty() {
        Ok(selections)
    } else {
        Err(failures)
    }
}

fn check_single(question: &QuestionDescriptor, payload: &AnswerPayload) -> ValidationResult {
    let field = question.field();
    let choices = choices_of(payload)
        .ok_or_else(|| vec![ValidationFailure::new(&field, FailureCode::InvalidFormat)])?;
    let selections = check_selections(question, &choices)?;
    match selections.len() {
        0 if question.is_required() => Err(vec![ValidationFailure::new(field, FailureCode::Required)]),
        0 => Ok(CheckedAnswer::Unanswered),
        1 => Ok(CheckedAnswer::Options(selections)),
        _ => Err(vec![ValidationFailure::new(field, FailureCode::InvalidFormat)]),
    }
}

fn check_multi(question: &QuestionDescriptor, payload: &AnswerPayload) -> ValidationResult {
    let field = question.field();
    let choices = choices_of(payload)
        .ok_or_else(|| vec![ValidationFailure::new(&field, FailureCode::InvalidFormat)])?;
    let selections = check_selections(question, &choices)?;
    if selections.is_empty() {
        return if question.is_required() {
            Err(vec![ValidationFailure::new(field, FailureCode::Required)])
        } else {
            Ok(CheckedAnswer::Unanswered)
        };
    }
    Ok(CheckedAnswer::Options(selections))
}

/// 是/否的文字形式
pub fn parse_yes_no(raw: &str) -> Option<bool> {
    match normalize_key(raw).as_str() {
        "yes" | "y" | "true" | "1" | "是" => Some(true),
        "no" | "n" | "false" | "0" | "否" => Some(false),
        _ => None,
    }
}

fn check_yes_no(question: &QuestionDescriptor, payload: &AnswerPayload) -> ValidationResult {
    let field = question.field();

    let value = match payload {
        AnswerPayload::Bool(b) => Some(*b),
        AnswerPayload::Text(s) => parse_yes_no(s),
        _ => None,
    };

    if let Some(value) = value {
        if question.options.is_empty() {
            return Ok(CheckedAnswer::Boolean {
                value,
                option: None,
            });
        }
        // 题目配置了选项行时，布尔答案必须能映射到某个选项
        return question
            .options
            .iter()
            .find(|o| parse_yes_no(&o.option_value) == Some(value))
            .map(|o| CheckedAnswer::Boolean {
                value,
                option: Some(o.id),
            })
            .ok_or_else(|| vec![ValidationFailure::new(field, FailureCode::UnknownOption)]);
    }

    match check_single(question, payload)? {
        CheckedAnswer::Options(selections) => {
            let selected = &selections[0];
            let derived = question
                .option(selected.option_id)
                .and_then(|o| parse_yes_no(&o.option_value));
            Ok(match derived {
                Some(value) => CheckedAnswer::Boolean {
                    value,
                    option: Some(selected.option_id),
                },
                None => CheckedAnswer::Options(selections),
            })
        }
        other => Ok(other),
    }
}

fn check_file(question: &QuestionDescriptor, payload: &AnswerPayload) -> ValidationResult {
    match payload {
        AnswerPayload::File(file)
            if !file.file_url.trim().is_empty() && !file.file_name.trim().is_empty() =>
        {
            Ok(CheckedAnswer::File(file.clone()))
        }
        _ => Err(vec![ValidationFailure::new(question.field(), FailureCode::InvalidFormat)]),
    }
}

// ========== 设计期校验 ==========

/// 校验题目定义本身（题干、约束范围、选项是否适用）
pub fn validate_question_definition(
    question: &Question,
    descriptor: &TypeDescriptor,
    option_count: usize,
) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    let c = &question.constraints;

    if question.question_text.trim().is_empty() {
        failures.push(ValidationFailure::new("questionText", FailureCode::Required));
    }
    if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
        if min > max {
            failures.push(ValidationFailure::new("maxLength", FailureCode::InvalidBounds));
        }
    }
    if let (Some(min), Some(max)) = (c.min_value, c.max_value) {
        if min > max {
            failures.push(ValidationFailure::new("maxValue", FailureCode::InvalidBounds));
        }
    }
    if !descriptor.is_textual() && (c.min_length.is_some() || c.max_length.is_some()) {
        failures.push(ValidationFailure::new("minLength", FailureCode::InvalidFormat));
    }
    if !descriptor.is_numeric() && (c.min_value.is_some() || c.max_value.is_some()) {
        failures.push(ValidationFailure::new("minValue", FailureCode::InvalidFormat));
    }
    if !descriptor.has_options && option_count > 0 {
        failures.push(ValidationFailure::new("options", FailureCode::InvalidFormat));
    }
    failures
}

/// 校验一道题的活动选项集合：标签与值非空、值唯一（忽略大小写）、互斥题型最多一个正确答案
pub fn validate_option_set(descriptor: &TypeDescriptor, options: &[QuestionOption]) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    let mut values = HashSet::new();
    let active = active_sorted(options);

    for (index, option) in active.iter().enumerate() {
        if option.option_text.trim().is_empty() {
            failures.push(ValidationFailure::new(
                format!("options[{}].optionText", index),
                FailureCode::Required,
            ));
        }
        let value = option.normalized_value();
        if value.is_empty() {
            failures.push(ValidationFailure::new(
                format!("options[{}].optionValue", index),
                FailureCode::Required,
            ));
        } else if !values.insert(value) {
            failures.push(ValidationFailure::new(
                format!("options[{}].optionValue", index),
                FailureCode::DuplicateOptionValue,
            ));
        }
    }

    if descriptor.exclusive_choice && active.iter().filter(|o| o.is_correct).count() > 1 {
        failures.push(ValidationFailure::new("options", FailureCode::MultipleCorrectAnswers));
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::QuestionnaireId;
    use crate::models::schema::QuestionConstraints;
    use chrono::Utc;
    use serde_json::json;

    fn question(kind: &str, constraints: QuestionConstraints) -> Question {
        let now = Utc::now();
        Question {
            id: QuestionId::new(),
            questionnaire_id: QuestionnaireId::new(),
            question_text: "Q".to_string(),
            question_type: kind.to_string(),
            constraints,
            help_text: None,
            conditional_logic: None,
            display_order: 1,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn option(question: &Question, value: &str, order: u32) -> QuestionOption {
        QuestionOption {
            id: OptionId::new(),
            question_id: question.id,
            option_text: value.to_uppercase(),
            option_value: value.to_string(),
            is_correct: false,
            allows_custom_text: false,
            display_order: order,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    fn required() -> QuestionConstraints {
        QuestionConstraints {
            is_required: true,
            ..Default::default()
        }
    }

    fn codes(result: ValidationResult) -> Vec<FailureCode> {
        result.unwrap_err().into_iter().map(|f| f.code).collect()
    }

    #[test]
    fn test_text_length_bounds() {
        let q = QuestionDescriptor::resolve(
            question(
                "text",
                QuestionConstraints {
                    is_required: true,
                    min_length: Some(2),
                    max_length: Some(10),
                    ..Default::default()
                },
            ),
            vec![],
        )
        .unwrap();

        assert_eq!(validate(&q, &AnswerPayload::text("  hello ")), Ok(CheckedAnswer::Text("hello".to_string())));
        assert_eq!(codes(validate(&q, &AnswerPayload::text("this text is too long"))), vec![FailureCode::TooLong]);
        assert_eq!(codes(validate(&q, &AnswerPayload::text("a"))), vec![FailureCode::TooShort]);
        assert_eq!(codes(validate(&q, &AnswerPayload::text("   "))), vec![FailureCode::Required]);
    }

    #[test]
    fn test_optional_empty_is_unanswered() {
        let q = QuestionDescriptor::resolve(question("number", QuestionConstraints::default()), vec![]).unwrap();
        assert_eq!(validate(&q, &AnswerPayload::Null), Ok(CheckedAnswer::Unanswered));
    }

    #[test]
    fn test_email_format() {
        let q = QuestionDescriptor::resolve(question("email", required()), vec![]).unwrap();
        assert!(validate(&q, &AnswerPayload::text("a@b.co")).is_ok());
        assert_eq!(codes(validate(&q, &AnswerPayload::text("not-an-email"))), vec![FailureCode::InvalidFormat]);
    }

    #[test]
    fn test_number_bounds_and_coercion() {
        let q = QuestionDescriptor::resolve(
            question(
                "rating",
                QuestionConstraints {
                    min_value: Some(1.0),
                    max_value: Some(5.0),
                    ..Default::default()
                },
            ),
            vec![],
        )
        .unwrap();
        assert_eq!(validate(&q, &AnswerPayload::text("4")), Ok(CheckedAnswer::Number(4.0)));
        assert_eq!(codes(validate(&q, &AnswerPayload::Number(0.0))), vec![FailureCode::BelowMin]);
        assert_eq!(codes(validate(&q, &AnswerPayload::Number(6.0))), vec![FailureCode::AboveMax]);
        assert_eq!(codes(validate(&q, &AnswerPayload::text("four"))), vec![FailureCode::InvalidFormat]);
    }

    #[test]
    fn test_date_formats() {
        let q = QuestionDescriptor::resolve(question("date", required()), vec![]).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(validate(&q, &AnswerPayload::text("2024-03-01")), Ok(CheckedAnswer::Date(expected)));
        assert_eq!(
            validate(&q, &AnswerPayload::text("2024-03-01T10:00:00+00:00")),
            Ok(CheckedAnswer::Date(expected))
        );
        assert_eq!(codes(validate(&q, &AnswerPayload::Bool(true))), vec![FailureCode::InvalidFormat]);
    }

    #[test]
    fn test_radio_requires_exactly_one_known_option() {
        let base = question("radio", required());
        let yes = option(&base, "yes", 1);
        let no = option(&base, "no", 2);
        let q = QuestionDescriptor::resolve(base, vec![yes.clone(), no.clone()]).unwrap();

        assert!(matches!(validate(&q, &AnswerPayload::options([yes.id])), Ok(CheckedAnswer::Options(s)) if s.len() == 1));
        assert!(validate(&q, &AnswerPayload::text(yes.id.to_string())).is_ok());
        assert_eq!(codes(validate(&q, &AnswerPayload::options([yes.id, no.id]))), vec![FailureCode::InvalidFormat]);
        assert_eq!(codes(validate(&q, &AnswerPayload::options([OptionId::new()]))), vec![FailureCode::UnknownOption]);
        assert_eq!(codes(validate(&q, &AnswerPayload::options([]))), vec![FailureCode::Required]);
    }

    #[test]
    fn test_deleted_option_is_unknown() {
        let base = question("radio", required());
        let mut gone = option(&base, "gone", 1);
        gone.deleted_at = Some(Utc::now());
        let q = QuestionDescriptor::resolve(base, vec![gone.clone()]).unwrap();
        assert_eq!(codes(validate(&q, &AnswerPayload::options([gone.id]))), vec![FailureCode::UnknownOption]);
    }

    #[test]
    fn test_checkbox_collapses_duplicates_and_reports_each_unknown() {
        let base = question("checkbox", required());
        let a = option(&base, "a", 1);
        let q = QuestionDescriptor::resolve(base, vec![a.clone()]).unwrap();

        match validate(&q, &AnswerPayload::options([a.id, a.id])) {
            Ok(CheckedAnswer::Options(selections)) => assert_eq!(selections.len(), 1),
            other => panic!("unexpected: {:?}", other),
        }
        let failures = validate(&q, &AnswerPayload::options([OptionId::new(), a.id, OptionId::new()])).unwrap_err();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].field.ends_with("[0]"));
        assert!(failures[1].field.ends_with("[2]"));
    }

    #[test]
    fn test_custom_text_only_on_flagged_options() {
        let base = question("checkbox", QuestionConstraints::default());
        let mut other = option(&base, "other", 1);
        other.allows_custom_text = true;
        let plain = option(&base, "plain", 2);
        let q = QuestionDescriptor::resolve(base, vec![other.clone(), plain.clone()]).unwrap();

        let ok = AnswerPayload::from(json!([{"optionId": other.id, "customText": " cats "}]));
        match validate(&q, &ok) {
            Ok(CheckedAnswer::Options(s)) => assert_eq!(s[0].custom_text.as_deref(), Some("cats")),
            other => panic!("unexpected: {:?}", other),
        }
        let bad = AnswerPayload::from(json!([{"optionId": plain.id, "customText": "x"}]));
        assert_eq!(codes(validate(&q, &bad)), vec![FailureCode::InvalidFormat]);
    }

    #[test]
    fn test_yes_no_maps_boolean_to_option_rows() {
        let base = question("yes_no", required());
        let yes = option(&base, "yes", 1);
        let no = option(&base, "no", 2);
        let q = QuestionDescriptor::resolve(base, vec![yes.clone(), no.clone()]).unwrap();

        assert_eq!(
            validate(&q, &AnswerPayload::Bool(false)),
            Ok(CheckedAnswer::Boolean { value: false, option: Some(no.id) })
        );
        assert_eq!(
            validate(&q, &AnswerPayload::options([yes.id])),
            Ok(CheckedAnswer::Boolean { value: true, option: Some(yes.id) })
        );

        let bare = QuestionDescriptor::resolve(question("yes_no", required()), vec![]).unwrap();
        assert_eq!(
            validate(&bare, &AnswerPayload::text("Yes")),
            Ok(CheckedAnswer::Boolean { value: true, option: None })
        );
    }

    #[test]
    fn test_file_reference_required_fields() {
        let q = QuestionDescriptor::resolve(question("file", required()), vec![]).unwrap();
        let ok = AnswerPayload::from(json!({"fileUrl": "/u/a.pdf", "fileName": "a.pdf", "fileSize": 3}));
        assert!(matches!(validate(&q, &ok), Ok(CheckedAnswer::File(_))));
        let nameless = AnswerPayload::from(json!({"fileUrl": "/u/a.pdf", "fileName": ""}));
        assert_eq!(codes(validate(&q, &nameless)), vec![FailureCode::InvalidFormat]);
    }

    #[test]
    fn test_fallback_is_lenient_unless_strict() {
        let q = QuestionDescriptor::resolve(question("textarea", QuestionConstraints::default()), vec![]).unwrap();
        let odd = AnswerPayload::from(json!({"score": 3}));
        assert_eq!(validate(&q, &odd), Ok(CheckedAnswer::Fallback("{\"score\":3}".to_string())));
        assert_eq!(codes(Dispatcher::new(true).validate(&q, &odd)), vec![FailureCode::InvalidFormat]);
    }

    #[test]
    fn test_unknown_type_is_hard_error() {
        let err = QuestionDescriptor::resolve(question("matrix", required()), vec![]).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownType { .. }));
    }

    #[test]
    fn test_option_set_authoring_rules() {
        let base = question("radio", required());
        let mut a = option(&base, "Yes", 1);
        let mut b = option(&base, "yes ", 2);
        a.is_correct = true;
        b.is_correct = true;
        let failures = validate_option_set(lookup("radio").unwrap(), &[a.clone(), b.clone()]);
        let found: Vec<_> = failures.iter().map(|f| f.code).collect();
        assert_eq!(found, vec![FailureCode::DuplicateOptionValue, FailureCode::MultipleCorrectAnswers]);

        // 多选题允许多个正确答案；已删除的选项不参与比较
        b.deleted_at = Some(Utc::now());
        assert!(validate_option_set(lookup("checkbox").unwrap(), &[a, b]).is_empty());
    }

    #[test]
    fn test_question_definition_rules() {
        let q = question(
            "number",
            QuestionConstraints {
                min_value: Some(5.0),
                max_value: Some(1.0),
                max_length: Some(3),
                ..Default::default()
            },
        );
        let found: Vec<_> = validate_question_definition(&q, lookup("number").unwrap(), 2)
            .into_iter()
            .map(|f| f.code)
            .collect();
        assert_eq!(
            found,
            vec![FailureCode::InvalidBounds, FailureCode::InvalidFormat, FailureCode::InvalidFormat]
        );
    }
}
