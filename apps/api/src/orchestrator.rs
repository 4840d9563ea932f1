//! Caller-facing operations. Composes the limiter, the result cache, the
//! pipeline and the interview operations, and enforces record ownership.
//!
//! Collaborators are injected once at startup; nothing here is global.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::{self, ConversationTurn, InterviewContext, UNKNOWN_SESSION_FOLLOWUP};
use crate::llm_client::OracleClient;
use crate::models::analysis::{AnalysisInput, AnalysisRecord, AnalysisResponse};
use crate::models::interview::{FeedbackResponse, InterviewRecord, InterviewResponse};
use crate::pipeline::{Pipeline, PipelineState};
use crate::profiles::ProfileSource;
use crate::rate_limit::RateLimiter;
use crate::store::cache::{fingerprint, keys};
use crate::store::{CacheStore, RecordKind, RecordStore, TtlClass};

pub struct Orchestrator {
    oracle: OracleClient,
    cache: CacheStore,
    limiter: RateLimiter,
    records: Arc<dyn RecordStore>,
    profiles: Arc<dyn ProfileSource>,
}

impl Orchestrator {
    pub fn new(
        oracle: OracleClient,
        cache: CacheStore,
        limiter: RateLimiter,
        records: Arc<dyn RecordStore>,
        profiles: Arc<dyn ProfileSource>,
    ) -> Self {
        Self {
            oracle,
            cache,
            limiter,
            records,
            profiles,
        }
    }

    /// RunAnalysis. Every call consumes quota in both scopes, including calls
    /// answered from the result cache.
    pub async fn run_analysis(
        &self,
        caller: &str,
        input: AnalysisInput,
    ) -> Result<AnalysisResponse, AppError> {
        let input = input.sanitized()?;
        self.limiter.acquire(caller).await?;

        let mut parts = vec![caller];
        parts.extend(input.fingerprint_parts());
        let result_key = keys::analysis_result(&fingerprint(&parts));

        if let Some(cached) = self.cache.get::<AnalysisResponse>(&result_key).await {
            info!("Analysis cache hit for {caller} (analysis {})", cached.analysis_id);
            return Ok(cached);
        }

        let run_id = Uuid::new_v4();
        let state = PipelineState::new(caller, run_id, input.clone());
        let outcome = Pipeline::new(&self.oracle, self.profiles.as_ref())
            .run(state)
            .await;

        let record = AnalysisRecord::from_outcome(run_id, caller, input, outcome);
        self.cache
            .set(&keys::analysis(run_id), &record, TtlClass::Analysis)
            .await;
        self.persist(RecordKind::Analysis, run_id, caller, &record).await;

        let response = AnalysisResponse::from(&record);
        // Degraded runs are cached by id only, so the next call retries.
        if response.degraded_stages.is_empty() {
            self.cache
                .set(&result_key, &response, TtlClass::Analysis)
                .await;
        }

        info!("Analysis {run_id} completed for {caller}");
        Ok(response)
    }

    /// GetAnalysis. Cache first, then the durable store.
    pub async fn get_analysis(&self, caller: &str, id: Uuid) -> Result<AnalysisRecord, AppError> {
        if let Some(record) = self.cache.get::<AnalysisRecord>(&keys::analysis(id)).await {
            return owned_by(record.user_id == caller, record);
        }

        let record: AnalysisRecord = self.load(RecordKind::Analysis, id, caller).await?;
        self.cache
            .set(&keys::analysis(id), &record, TtlClass::Analysis)
            .await;
        Ok(record)
    }

    /// GenerateInterviewQuestions. Always yields at least one question.
    pub async fn generate_interview_questions(
        &self,
        caller: &str,
        analysis_id: Uuid,
    ) -> Result<InterviewResponse, AppError> {
        let analysis = self.get_analysis(caller, analysis_id).await?;
        let questions = interview::generate_questions(&self.oracle, &analysis.final_report).await;

        let interview_id = Uuid::new_v4();
        let record = InterviewRecord::new(interview_id, caller, analysis_id, questions.clone());
        self.persist(RecordKind::Interview, interview_id, caller, &record)
            .await;

        let context = InterviewContext {
            interview_id,
            user_id: caller.to_string(),
            analysis_id,
            report: analysis.final_report,
            questions: questions.clone(),
        };
        if !self
            .cache
            .set(&keys::interview_context(interview_id), &context, TtlClass::Session)
            .await
        {
            warn!("Interview context for {interview_id} held in process memory only");
        }

        info!("Interview {interview_id} created from analysis {analysis_id}");
        Ok(InterviewResponse {
            interview_id,
            initial_questions: questions,
        })
    }

    /// GetInterview (owner only).
    pub async fn get_interview(&self, caller: &str, id: Uuid) -> Result<InterviewRecord, AppError> {
        self.load(RecordKind::Interview, id, caller).await
    }

    /// GenerateFollowup. Never fails and never writes. An unknown, expired or
    /// foreign session gets the fixed generic follow-up.
    pub async fn generate_followup(
        &self,
        caller: &str,
        interview_id: Uuid,
        history: &[ConversationTurn],
    ) -> String {
        match self
            .cache
            .get::<InterviewContext>(&keys::interview_context(interview_id))
            .await
        {
            Some(context) if context.user_id == caller => {
                interview::generate_followup(&self.oracle, &context, history).await
            }
            Some(_) => {
                warn!("Follow-up requested for interview {interview_id} by a non-owner");
                UNKNOWN_SESSION_FOLLOWUP.to_string()
            }
            None => {
                info!("No session context for interview {interview_id}");
                UNKNOWN_SESSION_FOLLOWUP.to_string()
            }
        }
    }

    /// GenerateFeedback. Persists the feedback on the interview record. An
    /// expired session context is rebuilt from the durable records.
    pub async fn generate_feedback(
        &self,
        caller: &str,
        interview_id: Uuid,
        transcript: &str,
    ) -> Result<FeedbackResponse, AppError> {
        let transcript = transcript.replace('\0', "");
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(AppError::Validation("Transcript is required".into()));
        }

        let mut record = self.get_interview(caller, interview_id).await?;
        let context = self.session_context(caller, &record).await?;

        let feedback = interview::generate_feedback(&self.oracle, &context, transcript).await;

        record.complete(feedback.clone());
        self.persist(RecordKind::Interview, interview_id, caller, &record)
            .await;

        Ok(FeedbackResponse {
            feedback_id: interview_id,
            feedback,
        })
    }

    /// GetFeedback. `NotFound` until feedback has been generated.
    pub async fn get_feedback(&self, caller: &str, interview_id: Uuid) -> Result<FeedbackResponse, AppError> {
        let record = self.get_interview(caller, interview_id).await?;
        let feedback = record
            .feedback
            .ok_or_else(|| AppError::NotFound("Feedback not found".into()))?;
        Ok(FeedbackResponse {
            feedback_id: interview_id,
            feedback,
        })
    }

    async fn session_context(
        &self,
        caller: &str,
        record: &InterviewRecord,
    ) -> Result<InterviewContext, AppError> {
        let key = keys::interview_context(record.id);
        if let Some(context) = self.cache.get::<InterviewContext>(&key).await {
            return owned_by(context.user_id == caller, context);
        }

        info!("Rebuilding session context for interview {}", record.id);
        let analysis = self.get_analysis(caller, record.analysis_id).await?;
        let context = InterviewContext {
            interview_id: record.id,
            user_id: caller.to_string(),
            analysis_id: record.analysis_id,
            report: analysis.final_report,
            questions: record.questions.clone(),
        };
        self.cache.set(&key, &context, TtlClass::Session).await;
        Ok(context)
    }

    /// Loads a durable record. Missing and foreign records are both
    /// `Forbidden`, so a caller cannot tell whether a foreign id exists.
    async fn load<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        id: Uuid,
        caller: &str,
    ) -> Result<T, AppError> {
        let stored = self
            .records
            .get(kind, id)
            .await?
            .ok_or(AppError::Forbidden)?;
        if stored.owner != caller {
            warn!("{} {id} requested by a non-owner", kind.as_str());
            return Err(AppError::Forbidden);
        }
        serde_json::from_value(stored.body).map_err(|e| AppError::Store(e.into()))
    }

    /// Durable write failures are logged, not surfaced: the caller still gets
    /// the result, and the cache keeps a copy for the TTL.
    async fn persist<T: Serialize>(&self, kind: RecordKind, id: Uuid, owner: &str, value: &T) {
        let body = match serde_json::to_value(value) {
            Ok(body) => body,
            Err(e) => {
                error!("Cannot serialize {} {id}: {e}", kind.as_str());
                return;
            }
        };
        if let Err(e) = self.records.put(kind, id, owner, &body).await {
            error!("Failed to persist {} {id}: {e}", kind.as_str());
        }
    }
}

fn owned_by<T>(is_owner: bool, value: T) -> Result<T, AppError> {
    if is_owner {
        Ok(value)
    } else {
        Err(AppError::Forbidden)
    }
}
