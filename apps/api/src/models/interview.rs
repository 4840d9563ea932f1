use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interview::{ConversationTurn, FeedbackReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    #[default]
    Created,
    Completed,
}

/// A generated interview as persisted in the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub id: Uuid,
    pub user_id: String,
    pub analysis_id: Uuid,
    pub questions: Vec<String>,
    #[serde(default)]
    pub status: InterviewStatus,
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub feedback: Option<FeedbackReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewRecord {
    pub fn new(id: Uuid, user_id: &str, analysis_id: Uuid, questions: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: user_id.to_string(),
            analysis_id,
            questions,
            status: InterviewStatus::Created,
            overall_score: 0.0,
            feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn complete(&mut self, feedback: FeedbackReport) {
        self.status = InterviewStatus::Completed;
        self.overall_score = feedback.overall_score;
        self.feedback = Some(feedback);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize)]
pub struct InterviewRequest {
    pub analysis_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewResponse {
    pub interview_id: Uuid,
    pub initial_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowupRequest {
    pub interview_id: Uuid,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
pub struct FollowupResponse {
    pub followup_question: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub interview_id: Uuid,
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackResponse {
    pub feedback_id: Uuid,
    #[serde(flatten)]
    pub feedback: FeedbackReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_records_feedback_and_score() {
        let mut record = InterviewRecord::new(Uuid::new_v4(), "u", Uuid::new_v4(), vec![]);
        assert_eq!(record.status, InterviewStatus::Created);

        record.complete(FeedbackReport {
            overall_score: 64.0,
            ..FeedbackReport::default()
        });
        assert_eq!(record.status, InterviewStatus::Completed);
        assert_eq!(record.overall_score, 64.0);
        assert!(record.feedback.is_some());
    }

    #[test]
    fn test_feedback_response_is_flat() {
        let response = FeedbackResponse {
            feedback_id: Uuid::nil(),
            feedback: FeedbackReport::failed(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["summary"], "Error generating feedback");
        assert_eq!(value["overall_score"], 0.0);
        assert!(value.get("feedback").is_none());
    }
}
