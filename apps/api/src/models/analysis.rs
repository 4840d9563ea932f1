use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::{
    FinalReport, JobAnalysis, PipelineOutcome, ResumeAnalysis, SocialAnalysis, StageName,
    StageOutput,
};

/// Longest text input accepted before truncation, in characters.
pub const MAX_INPUT_CHARS: usize = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialProfiles {
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

/// POST /analyze body.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub resume_text: String,
    pub job_description: String,
    #[serde(default)]
    pub social_profiles: SocialProfiles,
}

/// The immutable inputs of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub resume_text: String,
    pub job_description: String,
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
}

impl From<AnalysisRequest> for AnalysisInput {
    fn from(req: AnalysisRequest) -> Self {
        Self {
            resume_text: req.resume_text,
            job_description: req.job_description,
            github_url: req.social_profiles.github,
            linkedin_url: req.social_profiles.linkedin,
        }
    }
}

impl AnalysisInput {
    /// Cleans every field and rejects blank required text.
    pub fn sanitized(self) -> Result<Self, AppError> {
        let resume_text = clean_text(&self.resume_text);
        if resume_text.is_empty() {
            return Err(AppError::Validation("Resume text is required".into()));
        }
        let job_description = clean_text(&self.job_description);
        if job_description.is_empty() {
            return Err(AppError::Validation("Job description is required".into()));
        }

        Ok(Self {
            resume_text,
            job_description,
            github_url: clean_url(self.github_url),
            linkedin_url: clean_url(self.linkedin_url),
        })
    }

    /// Cache fingerprint parts, in a fixed order.
    pub fn fingerprint_parts(&self) -> [&str; 4] {
        [
            self.resume_text.as_str(),
            self.job_description.as_str(),
            self.github_url.as_deref().unwrap_or(""),
            self.linkedin_url.as_deref().unwrap_or(""),
        ]
    }
}

/// Strips NUL bytes and surrounding whitespace, then truncates on a char
/// boundary with a trailing ellipsis.
pub fn clean_text(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| *c != '\0').collect();
    let trimmed = cleaned.trim();
    match trimmed.char_indices().nth(MAX_INPUT_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

fn clean_url(raw: Option<String>) -> Option<String> {
    raw.map(|url| clean_text(&url)).filter(|url| !url.is_empty())
}

/// A completed analysis as persisted (cache and durable store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub user_id: String,
    pub input: AnalysisInput,
    pub final_report: FinalReport,
    #[serde(default)]
    pub degraded_stages: Vec<StageName>,
    pub job_analysis: StageOutput<JobAnalysis>,
    pub resume_analysis: StageOutput<ResumeAnalysis>,
    pub social_analysis: StageOutput<SocialAnalysis>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn from_outcome(id: Uuid, user_id: &str, input: AnalysisInput, outcome: PipelineOutcome) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            input,
            final_report: outcome.report,
            degraded_stages: outcome.degraded_stages,
            job_analysis: outcome.job_analysis,
            resume_analysis: outcome.resume_analysis,
            social_analysis: outcome.social_analysis,
            created_at: Utc::now(),
        }
    }
}

/// Caller-facing result of `RunAnalysis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub analysis_id: Uuid,
    #[serde(flatten)]
    pub report: FinalReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_stages: Vec<StageName>,
}

impl From<&AnalysisRecord> for AnalysisResponse {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            analysis_id: record.id,
            report: record.final_report.clone(),
            degraded_stages: record.degraded_stages.clone(),
        }
    }
}
