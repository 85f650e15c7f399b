//! 答案归一化 - 业务能力层
//!
//! 把通过校验的答案映射到固定的存储形态：四个标量列至多填一个，选项题另写关联行。

use crate::error::{AppError, AppResult};
use crate::models::ids::QuestionId;
use crate::models::question_type::{StorageSlot, TypeDescriptor};
use crate::models::response::{QuestionOptionResponse, QuestionResponse};
use crate::services::validation::{CheckedAnswer, OptionSelection, QuestionDescriptor};

/// 将一条已校验答案转为答案行
///
/// # 返回
/// 未作答时返回 `None`，不产生答案行
pub fn normalize(question_id: QuestionId, answer: CheckedAnswer) -> Option<QuestionResponse> {
    let mut response = QuestionResponse::empty(question_id);

    match answer {
        CheckedAnswer::Unanswered => return None,
        CheckedAnswer::Text(text) | CheckedAnswer::Fallback(text) => {
            response.text_response = Some(text);
        }
        CheckedAnswer::Number(n) => response.number_response = Some(n),
        CheckedAnswer::Date(d) => response.date_response = Some(d),
        CheckedAnswer::Boolean { value, option } => {
            response.boolean_response = Some(value);
            if let Some(option_id) = option {
                link_options(
                    &mut response,
                    vec![OptionSelection {
                        option_id,
                        custom_text: None,
                    }],
                );
            }
        }
        CheckedAnswer::Options(selections) => link_options(&mut response, selections),
        CheckedAnswer::File(file) => {
            response.text_response = Some(file.display_text());
            response.file = Some(file);
        }
    }

    Some(response)
}

/// 归一化并核对落库列与题型的存储槽一致
///
/// 不一致说明校验与归一化之间出现了编程错误，返回内部错误而不是写入错列
pub fn normalize_for(question: &QuestionDescriptor, answer: CheckedAnswer) -> AppResult<Option<QuestionResponse>> {
    let Some(response) = normalize(question.id(), answer) else {
        return Ok(None);
    };
    if !slot_matches(question.descriptor, &response) {
        return Err(AppError::Internal(format!(
            "题目 {} 的答案落入了与题型 {} 不符的列",
            question.id(),
            question.descriptor.key
        )));
    }
    Ok(Some(response))
}

fn link_options(response: &mut QuestionResponse, selections: Vec<OptionSelection>) {
    let response_id = response.id;
    response.option_responses = selections
        .into_iter()
        .map(|s| QuestionOptionResponse {
            response_id,
            option_id: s.option_id,
            custom_text: s.custom_text,
        })
        .collect();
}

/// 答案行的填充列是否与题型的存储槽一致
pub fn slot_matches(descriptor: &TypeDescriptor, response: &QuestionResponse) -> bool {
    if response.populated_scalars() > 1 {
        return false;
    }
    let has_options = !response.option_responses.is_empty();
    match descriptor.slot {
        StorageSlot::Text | StorageSlot::File => {
            response.number_response.is_none()
                && response.date_response.is_none()
                && response.boolean_response.is_none()
                && !has_options
        }
        StorageSlot::Number => response.number_response.is_some() && !has_options,
        StorageSlot::Date => response.date_response.is_some() && !has_options,
        // 是/否题可以同时带一个选项行，也可能只落到选项行（选项值不是是/否文字时）
        StorageSlot::Boolean => {
            response.text_response.is_none()
                && response.number_response.is_none()
                && response.date_response.is_none()
                && response.option_responses.len() <= 1
                && (response.boolean_response.is_some() || has_options)
        }
        StorageSlot::Options => response.populated_scalars() == 0 && has_options,
    }
}
