//! 单份答卷处理器 - 编排层
//!
//! ## 职责
//!
//! 把答卷文件（按问卷标题、题目文本、选项值引用）翻译为 `SubmissionRequest`，
//! 交给 `SubmissionFlow` 处理，并输出单份答卷的处理结果。
//!
//! ## 核心功能
//!
//! 1. **问卷定位**：按标题查找可作答问卷
//! 2. **题目定位**：按题目文本匹配活动题目
//! 3. **选项翻译**：选项值 / 选项文字 → 选项 ID
//! 4. **文件上传**：读取答卷旁的本地文件作为待上传文件
//! 5. **结果记录**：入库 / 未通过校验

use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::infrastructure::uploader::PendingUpload;
use crate::models::answer::{AnswerEntry, AnswerPayload};
use crate::models::import::SubmissionFile;
use crate::models::schema::normalize_key;
use crate::services::catalog_query::CatalogQuery;
use crate::services::validation::{FailureCode, QuestionDescriptor};
use crate::workflow::request_ctx::RequestContext;
use crate::workflow::submission_flow::{SubmissionFlow, SubmissionRequest, SubmissionResult};

/// 单份答卷的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Accepted,
    Rejected,
}

/// 处理单份答卷文件
///
/// # 参数
/// - `flow`: 提交流程
/// - `catalog`: 问卷目录查询
/// - `file`: 答卷文件内容
/// - `file_index`: 文件序号（仅用于日志）
///
/// # 返回
/// 返回入库或未通过校验；文件本身无法处理时返回错误
pub async fn process_submission(
    flow: &SubmissionFlow,
    catalog: &CatalogQuery,
    file: SubmissionFile,
    file_index: usize,
) -> Result<FileOutcome> {
    let ctx = RequestContext::respondent(file.respondent.clone());
    info!(
        "[答卷 {}] 📝 {} → '{}' ({} 个答案)",
        file_index,
        file.respondent,
        file.questionnaire,
        file.answers.len()
    );

    let template = catalog
        .find_by_title(&ctx, &file.questionnaire)
        .await?
        .with_context(|| format!("找不到可作答的问卷: '{}'", file.questionnaire))?;
    let descriptors = catalog.load_descriptors(template.id).await?;

    let mut unresolved = Vec::new();
    let mut answers = Vec::with_capacity(file.answers.len());
    for (text, value) in &file.answers {
        match find_question(&descriptors, text) {
            Some(descriptor) => answers.push(AnswerEntry::new(
                descriptor.id(),
                AnswerPayload::from(resolve_option_refs(descriptor, value.clone())),
            )),
            None => unresolved.push(text.clone()),
        }
    }

    let base_dir = file
        .file_path
        .as_deref()
        .and_then(|p| Path::new(p).parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut uploads = Vec::with_capacity(file.uploads.len());
    for (text, relative) in &file.uploads {
        match find_question(&descriptors, text) {
            Some(descriptor) => uploads.push(read_upload(descriptor, base_dir.join(relative)).await?),
            None => unresolved.push(text.clone()),
        }
    }

    if !unresolved.is_empty() {
        for text in &unresolved {
            warn!("[答卷 {}] ⚠️ 问卷中没有题目 '{}' ({:?})", file_index, text, FailureCode::UnknownQuestion);
        }
        return Ok(FileOutcome::Rejected);
    }

    let request = SubmissionRequest {
        questionnaire_id: template.id,
        respondent_id: file.respondent.clone(),
        answers,
        uploads,
        draft: file.draft,
        envelope_id: None,
    };
    let result = flow
        .submit(&ctx, request)
        .await
        .with_context(|| format!("答卷 {} 提交失败", file_index))?;

    match result {
        SubmissionResult::Accepted {
            envelope_id,
            response_count,
            ..
        } => {
            info!("[答卷 {}] ✓ 已入库 {} ({} 条答案)", file_index, envelope_id, response_count);
            Ok(FileOutcome::Accepted)
        }
        SubmissionResult::Rejected { failures } => {
            for failure in &failures {
                let label = descriptors
                    .iter()
                    .find(|d| failure.field.starts_with(&d.field()))
                    .map(|d| d.question.question_text.as_str())
                    .unwrap_or("?");
                warn!("[答卷 {}] ⚠️ {} ({}): {:?}", file_index, label, failure.field, failure.code);
            }
            Ok(FileOutcome::Rejected)
        }
    }
}

fn find_question<'a>(descriptors: &'a [QuestionDescriptor], text: &str) -> Option<&'a QuestionDescriptor> {
    let wanted = normalize_key(text);
    descriptors
        .iter()
        .find(|d| normalize_key(&d.question.question_text) == wanted)
}

/// 把选项值 / 选项文字翻译为选项 ID；无法翻译的部分保持原样交给校验
fn resolve_option_refs(descriptor: &QuestionDescriptor, value: JsonValue) -> JsonValue {
    if !descriptor.descriptor.has_options {
        return value;
    }
    let lookup = |raw: &str| {
        let key = normalize_key(raw);
        descriptor
            .options
            .iter()
            .find(|o| o.normalized_value() == key || normalize_key(&o.option_text) == key)
            .map(|o| o.id.to_string())
    };
    let resolve_one = |item: JsonValue| match item {
        JsonValue::String(s) => lookup(&s).map(JsonValue::String).unwrap_or(JsonValue::String(s)),
        JsonValue::Object(map) if map.contains_key("value") => {
            let raw = map.get("value").and_then(JsonValue::as_str).unwrap_or_default();
            match lookup(raw) {
                Some(id) => json!({ "optionId": id, "customText": map.get("customText") }),
                None => JsonValue::Object(map),
            }
        }
        other => other,
    };

    match value {
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(resolve_one).collect()),
        // 无法对应选项的文字（例如是/否题的 "是"）交给校验直接解析
        JsonValue::String(s) if lookup(&s).is_none() => JsonValue::String(s),
        // 单个选项值在单选与多选题上都视为只选了这一项
        JsonValue::String(s) => JsonValue::Array(vec![resolve_one(JsonValue::String(s))]),
        JsonValue::Object(map) if map.contains_key("value") => JsonValue::Array(vec![resolve_one(JsonValue::Object(map))]),
        other => other,
    }
}

async fn read_upload(descriptor: &QuestionDescriptor, path: PathBuf) -> Result<PendingUpload> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("读取待上传文件失败: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    Ok(PendingUpload {
        question_id: descriptor.id(),
        content_type: guess_content_type(&file_name).map(str::to_string),
        file_name,
        bytes,
    })
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_lowercase();
    Some(match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => return None,
    })
}
