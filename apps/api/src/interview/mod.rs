//! Interview operations built on a completed analysis: question generation,
//! live follow-ups and transcript feedback.
//!
//! None of these return errors. A live interview must not stall, so each one
//! has a defined fallback payload for when the oracle fails.

pub mod handlers;
pub mod prompts;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract::{extract_list, extract_record, lenient_number, lenient_string, lenient_strings, StructuredResult};
use crate::llm_client::prompts::{fill, JSON_ONLY_SYSTEM, PLAIN_TEXT_SYSTEM};
use crate::llm_client::{CompletionRequest, OracleClient};
use crate::pipeline::FinalReport;

use self::prompts::{FEEDBACK_TEMPLATE, FOLLOWUP_TEMPLATE, QUESTIONS_TEMPLATE};

pub const QUESTIONS_LABEL: &str = "interview_questions";
pub const FOLLOWUP_LABEL: &str = "interview_followup";
pub const FEEDBACK_LABEL: &str = "interview_feedback";

/// Follow-ups are short spoken questions.
pub const FOLLOWUP_MAX_TOKENS: u32 = 150;
/// Only the most recent turns are sent with a follow-up request.
const FOLLOWUP_HISTORY_TURNS: usize = 20;

pub const FALLBACK_QUESTIONS: [&str; 5] = [
    "Can you describe a challenging project you worked on?",
    "How do you handle technical debt?",
    "Explain a complex technical concept to a non-technical person.",
    "What are your strategies for debugging complex issues?",
    "Where do you see yourself in 5 years?",
];

/// Returned when the session is unknown, expired or belongs to someone else.
pub const UNKNOWN_SESSION_FOLLOWUP: &str =
    "Could you tell me more about your experience with that technology?";

/// Returned when the oracle fails or answers with nothing.
pub const FAILED_FOLLOWUP: &str = "That's interesting. Can you elaborate on that?";

/// Session context stored when questions are generated and read by
/// follow-up and feedback calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewContext {
    pub interview_id: Uuid,
    pub user_id: String,
    pub analysis_id: Uuid,
    pub report: FinalReport,
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackReport {
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
    /// 0–100 as given by the oracle.
    #[serde(deserialize_with = "lenient_number")]
    pub overall_score: f64,
    #[serde(deserialize_with = "lenient_strings")]
    pub strong_points: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub areas_to_improve: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub detailed_analysis: String,
}

impl FeedbackReport {
    /// The oracle answered but not in the expected shape. Its text is kept.
    pub fn partial(raw_text: String) -> Self {
        Self {
            summary: "Feedback generation partially failed".to_string(),
            detailed_analysis: raw_text,
            ..Self::default()
        }
    }

    /// The oracle did not answer at all.
    pub fn failed() -> Self {
        Self {
            summary: "Error generating feedback".to_string(),
            detailed_analysis: "An error occurred while analyzing the interview.".to_string(),
            ..Self::default()
        }
    }
}

/// Generates interview questions targeting the report's gaps. Falls back to
/// a fixed generic set when the oracle fails or returns no usable question.
pub async fn generate_questions(oracle: &OracleClient, report: &FinalReport) -> Vec<String> {
    let skill_gaps = report.skill_gaps.join(", ");
    let focus_areas = report.interview_focus_areas.join(", ");
    let prompt = fill(
        QUESTIONS_TEMPLATE,
        &[
            ("skill_gaps", skill_gaps.as_str()),
            ("focus_areas", focus_areas.as_str()),
        ],
    );
    let request = CompletionRequest::new(QUESTIONS_LABEL, JSON_ONLY_SYSTEM, prompt);

    let text = match oracle.generate(request).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Question generation failed, using fallback questions: {e}");
            return fallback_questions();
        }
    };

    let questions: Vec<String> = match extract_list(&text, "question list was not valid JSON") {
        StructuredResult::Success(items) => items.into_iter().filter_map(question_text).collect(),
        StructuredResult::Degraded { reason, .. } => {
            warn!("Question generation degraded, using fallback questions: {reason}");
            return fallback_questions();
        }
    };

    if questions.is_empty() {
        warn!("Question generation returned no questions, using fallback questions");
        return fallback_questions();
    }
    info!("Generated {} interview questions", questions.len());
    questions
}

pub fn fallback_questions() -> Vec<String> {
    FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// Accepts `"question"` or `{"question": "..."}` items.
fn question_text(item: Value) -> Option<String> {
    let text = match item {
        Value::String(s) => s,
        Value::Object(mut obj) => match obj.remove("question") {
            Some(Value::String(s)) => s,
            _ => return None,
        },
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Asks one follow-up question for a live session. Never empty.
pub async fn generate_followup(
    oracle: &OracleClient,
    context: &InterviewContext,
    history: &[ConversationTurn],
) -> String {
    let context_view = serde_json::json!({
        "skill_gaps": context.report.skill_gaps,
        "interview_focus_areas": context.report.interview_focus_areas,
        "planned_questions": context.questions,
    });
    let recent = &history[history.len().saturating_sub(FOLLOWUP_HISTORY_TURNS)..];
    let rendered_history = recent
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    let context_text = context_view.to_string();
    let prompt = fill(
        FOLLOWUP_TEMPLATE,
        &[
            ("context", context_text.as_str()),
            ("history", rendered_history.as_str()),
        ],
    );
    let request = CompletionRequest::new(FOLLOWUP_LABEL, PLAIN_TEXT_SYSTEM, prompt)
        .with_max_tokens(FOLLOWUP_MAX_TOKENS);

    match oracle.generate(request).await {
        Ok(text) => {
            let question = text.trim().trim_matches('"').trim();
            if question.is_empty() {
                warn!("Follow-up generation returned empty text");
                FAILED_FOLLOWUP.to_string()
            } else {
                question.to_string()
            }
        }
        Err(e) => {
            warn!("Follow-up generation failed: {e}");
            FAILED_FOLLOWUP.to_string()
        }
    }
}

/// Scores a transcript against the session's skill gaps and questions.
/// Always returns a report; the failure shapes are `partial` and `failed`.
pub async fn generate_feedback(
    oracle: &OracleClient,
    context: &InterviewContext,
    transcript: &str,
) -> FeedbackReport {
    let questions = context
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {q}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    let skill_gaps = context.report.skill_gaps.join(", ");
    let prompt = fill(
        FEEDBACK_TEMPLATE,
        &[
            ("skill_gaps", skill_gaps.as_str()),
            ("questions", questions.as_str()),
            ("transcript", transcript),
        ],
    );
    let request = CompletionRequest::new(FEEDBACK_LABEL, JSON_ONLY_SYSTEM, prompt);

    let text = match oracle.generate(request).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Feedback generation failed: {e}");
            return FeedbackReport::failed();
        }
    };

    match extract_record::<FeedbackReport>(&text, "feedback was not valid JSON") {
        StructuredResult::Success(feedback) => {
            info!("Feedback generated (score {})", feedback.overall_score);
            feedback
        }
        StructuredResult::Degraded { raw_text, reason } => {
            warn!("Feedback degraded: {reason}");
            FeedbackReport::partial(raw_text)
        }
    }
}
