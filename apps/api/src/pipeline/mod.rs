//! The analysis pipeline: Job → Resume → Social → Synthesis, strictly in
//! that order.
//!
//! Every stage is the same shape: build a prompt from already-populated
//! state, call the oracle, extract a typed record. A failed stage yields a
//! `Degraded` output and the pipeline advances anyway; downstream prompts see
//! the failed stage's all-default record. The worst case is a complete but
//! sparse report, never no report.

pub mod handlers;
pub mod prompts;
pub mod records;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract::{extract_record, StructuredResult};
use crate::llm_client::prompts::{fill, JSON_ONLY_SYSTEM, JSON_SUFFIX};
use crate::llm_client::{CompletionRequest, OracleClient};
use crate::models::analysis::AnalysisInput;
use crate::profiles::ProfileSource;

use self::prompts::{
    JOB_ANALYSIS_TEMPLATE, RESUME_ANALYSIS_TEMPLATE, SOCIAL_ANALYSIS_TEMPLATE, SYNTHESIS_TEMPLATE,
};
pub use self::records::{FinalReport, JobAnalysis, ResumeAnalysis, SocialAnalysis};

/// Output of one stage: its typed record, or the raw text and why it failed.
pub type StageOutput<T> = StructuredResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    JobAnalysis,
    ResumeAnalysis,
    SocialAnalysis,
    Synthesis,
}

impl StageName {
    /// Oracle request label for this stage.
    pub fn label(&self) -> &'static str {
        match self {
            StageName::JobAnalysis => "job_analysis",
            StageName::ResumeAnalysis => "resume_analysis",
            StageName::SocialAnalysis => "social_analysis",
            StageName::Synthesis => "synthesis",
        }
    }
}

/// A record produced by exactly one stage.
pub trait StageRecord: DeserializeOwned + Serialize + Clone + Default + Send + Sync {
    const STAGE: StageName;
}

impl StageRecord for JobAnalysis {
    const STAGE: StageName = StageName::JobAnalysis;
}

impl StageRecord for ResumeAnalysis {
    const STAGE: StageName = StageName::ResumeAnalysis;
}

impl StageRecord for SocialAnalysis {
    const STAGE: StageName = StageName::SocialAnalysis;
}

impl StageRecord for FinalReport {
    const STAGE: StageName = StageName::Synthesis;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Init,
    JobAnalysis,
    ResumeAnalysis,
    SocialAnalysis,
    Synthesis,
    Done,
}

impl PipelineStep {
    /// Transitions are unconditional.
    pub fn next(self) -> Self {
        match self {
            PipelineStep::Init => PipelineStep::JobAnalysis,
            PipelineStep::JobAnalysis => PipelineStep::ResumeAnalysis,
            PipelineStep::ResumeAnalysis => PipelineStep::SocialAnalysis,
            PipelineStep::SocialAnalysis => PipelineStep::Synthesis,
            PipelineStep::Synthesis | PipelineStep::Done => PipelineStep::Done,
        }
    }
}

/// State threaded through one run. Exclusively owned by that run.
///
/// Each output slot is written by the step of the same name, and each step
/// runs once, so every slot is written at most once. A step only reads slots
/// of steps before it.
#[derive(Debug)]
pub struct PipelineState {
    pub user_id: String,
    pub run_id: Uuid,
    pub input: AnalysisInput,
    step: PipelineStep,
    job_analysis: Option<StageOutput<JobAnalysis>>,
    resume_analysis: Option<StageOutput<ResumeAnalysis>>,
    social_analysis: Option<StageOutput<SocialAnalysis>>,
    final_report: Option<StageOutput<FinalReport>>,
}

impl PipelineState {
    pub fn new(user_id: &str, run_id: Uuid, input: AnalysisInput) -> Self {
        Self {
            user_id: user_id.to_string(),
            run_id,
            input,
            step: PipelineStep::Init,
            job_analysis: None,
            resume_analysis: None,
            social_analysis: None,
            final_report: None,
        }
    }

    fn finish(self) -> PipelineOutcome {
        let job_analysis = self.job_analysis.unwrap_or_else(not_run);
        let resume_analysis = self.resume_analysis.unwrap_or_else(not_run);
        let social_analysis = self.social_analysis.unwrap_or_else(not_run);
        let synthesis = self.final_report.unwrap_or_else(not_run);

        let degraded_stages = [
            (StageName::JobAnalysis, job_analysis.is_degraded()),
            (StageName::ResumeAnalysis, resume_analysis.is_degraded()),
            (StageName::SocialAnalysis, social_analysis.is_degraded()),
            (StageName::Synthesis, synthesis.is_degraded()),
        ]
        .into_iter()
        .filter_map(|(stage, degraded)| degraded.then_some(stage))
        .collect();

        PipelineOutcome {
            report: synthesis.record_or_default(),
            degraded_stages,
            job_analysis,
            resume_analysis,
            social_analysis,
        }
    }
}

fn not_run<T>() -> StageOutput<T> {
    StageOutput::degraded("", "stage did not run")
}

/// Everything a completed run produced. The report is the caller-facing
/// part; stage outputs are kept for audit.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub report: FinalReport,
    pub degraded_stages: Vec<StageName>,
    pub job_analysis: StageOutput<JobAnalysis>,
    pub resume_analysis: StageOutput<ResumeAnalysis>,
    pub social_analysis: StageOutput<SocialAnalysis>,
}

pub struct Pipeline<'a> {
    oracle: &'a OracleClient,
    profiles: &'a dyn ProfileSource,
}

impl<'a> Pipeline<'a> {
    pub fn new(oracle: &'a OracleClient, profiles: &'a dyn ProfileSource) -> Self {
        Self { oracle, profiles }
    }

    /// Drives `state` from `Init` to `Done`. Never fails.
    pub async fn run(&self, mut state: PipelineState) -> PipelineOutcome {
        info!("Starting analysis run {} for {}", state.run_id, state.user_id);

        while state.step != PipelineStep::Done {
            self.advance(&mut state).await;
        }

        let outcome = state.finish();
        if outcome.degraded_stages.is_empty() {
            info!("Analysis run completed");
        } else {
            warn!(
                "Analysis run completed with degraded stages: {:?}",
                outcome.degraded_stages
            );
        }
        outcome
    }

    async fn advance(&self, state: &mut PipelineState) {
        let next = state.step.next();
        match next {
            PipelineStep::JobAnalysis => {
                let prompt = fill(
                    JOB_ANALYSIS_TEMPLATE,
                    &[("job_description", state.input.job_description.as_str())],
                );
                state.job_analysis = Some(self.run_stage(prompt).await);
            }
            PipelineStep::ResumeAnalysis => {
                let job = render(&record_of(&state.job_analysis));
                let prompt = fill(
                    RESUME_ANALYSIS_TEMPLATE,
                    &[
                        ("job_analysis", job.as_str()),
                        ("resume_text", state.input.resume_text.as_str()),
                    ],
                );
                state.resume_analysis = Some(self.run_stage(prompt).await);
            }
            PipelineStep::SocialAnalysis => {
                state.social_analysis = Some(self.social_stage(&state.input).await);
            }
            PipelineStep::Synthesis => {
                let job = render(&record_of(&state.job_analysis));
                let resume = render(&record_of(&state.resume_analysis));
                let social = render(&social_record(&state.social_analysis));
                let prompt = fill(
                    SYNTHESIS_TEMPLATE,
                    &[
                        ("job_analysis", job.as_str()),
                        ("resume_analysis", resume.as_str()),
                        ("social_analysis", social.as_str()),
                    ],
                );
                state.final_report = Some(self.run_stage(prompt).await);
            }
            PipelineStep::Init | PipelineStep::Done => {}
        }
        state.step = next;
    }

    /// The one reusable prompted stage: prompt → oracle → extractor.
    async fn run_stage<T: StageRecord>(&self, prompt: String) -> StageOutput<T> {
        let label = T::STAGE.label();
        info!("Running {label} stage");

        let request = CompletionRequest::new(
            label,
            JSON_ONLY_SYSTEM,
            format!("{prompt}\n\n{JSON_SUFFIX}"),
        );

        let output = match self.oracle.generate(request).await {
            Ok(text) => extract_record::<T>(&text, &format!("{label} output was not valid JSON")),
            Err(e) => StageOutput::degraded("", e.to_string()),
        };

        match output.degraded_reason() {
            Some(reason) => warn!("{label} stage degraded: {reason}"),
            None => info!("{label} stage completed"),
        }
        output
    }

    async fn social_stage(&self, input: &AnalysisInput) -> StageOutput<SocialAnalysis> {
        let urls: Vec<&str> = [input.github_url.as_deref(), input.linkedin_url.as_deref()]
            .into_iter()
            .flatten()
            .collect();

        if urls.is_empty() {
            info!("No social profile URLs supplied, skipping social_analysis stage");
            return StageOutput::Success(SocialAnalysis::skipped("No URLs provided"));
        }

        let mut profiles = Vec::with_capacity(urls.len());
        for url in urls {
            match self.profiles.fetch(url).await {
                Ok(facts) => profiles.push(json!({ "url": url, "facts": facts })),
                Err(e) => {
                    warn!("Profile fetch failed: {e}");
                    profiles.push(json!({
                        "url": url,
                        "note": format!("profile could not be fetched: {e}"),
                    }));
                }
            }
        }

        let prompt = fill(SOCIAL_ANALYSIS_TEMPLATE, &[("profiles", render(&profiles).as_str())]);
        self.run_stage(prompt).await
    }
}

fn record_of<T: Clone + Default>(slot: &Option<StageOutput<T>>) -> T {
    slot.as_ref()
        .map(|output| output.record_or_default())
        .unwrap_or_default()
}

/// A degraded social stage reaches synthesis marked `failed`, not as an
/// empty analyzed profile.
fn social_record(slot: &Option<StageOutput<SocialAnalysis>>) -> SocialAnalysis {
    match slot {
        Some(StructuredResult::Success(record)) => record.clone(),
        Some(StructuredResult::Degraded { reason, .. }) => SocialAnalysis::failed(reason),
        None => SocialAnalysis::failed("stage did not run"),
    }
}

fn render<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::llm_client::RetryPolicy;
    use crate::testing::{ScriptedBackend, StaticProfiles};

    const JOB_JSON: &str = r#"{"position_title": "Senior Backend Engineer", "required_skills": ["Python", "Kubernetes"]}"#;
    const RESUME_JSON: &str = r#"{"skills": ["Python"], "skill_gaps": ["Kubernetes"]}"#;
    const SOCIAL_JSON: &str = r#"{"github_presence": "active", "professionalism_score": 80}"#;
    const SYNTHESIS_JSON: &str = r#"Here you go: {"match_score": 0.7, "skill_gaps": ["Kubernetes"], "summary": "Good fit"}"#;

    fn oracle(backend: Arc<ScriptedBackend>) -> OracleClient {
        OracleClient::new(
            backend,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1000),
                call_timeout: Duration::from_secs(30),
                jitter: 0.0,
            },
        )
    }

    fn input(github: Option<&str>) -> AnalysisInput {
        AnalysisInput {
            resume_text: "Jane Doe, 5 years Python".into(),
            job_description: "Senior Backend Engineer".into(),
            github_url: github.map(str::to_string),
            linkedin_url: None,
        }
    }

    fn scripted() -> ScriptedBackend {
        ScriptedBackend::new()
            .respond("job_analysis", JOB_JSON)
            .respond("resume_analysis", RESUME_JSON)
            .respond("social_analysis", SOCIAL_JSON)
            .respond("synthesis", SYNTHESIS_JSON)
    }

    #[test]
    fn test_step_order_is_fixed() {
        let mut step = PipelineStep::Init;
        let mut seen = vec![step];
        while step != PipelineStep::Done {
            step = step.next();
            seen.push(step);
        }
        assert_eq!(
            seen,
            vec![
                PipelineStep::Init,
                PipelineStep::JobAnalysis,
                PipelineStep::ResumeAnalysis,
                PipelineStep::SocialAnalysis,
                PipelineStep::Synthesis,
                PipelineStep::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_stages_run_in_order_and_report_comes_from_synthesis() {
        let backend = Arc::new(scripted());
        let oracle = oracle(backend.clone());
        let profiles = StaticProfiles::github("https://github.com/janedoe", "janedoe");
        let pipeline = Pipeline::new(&oracle, &profiles);

        let state = PipelineState::new("user-1", Uuid::new_v4(), input(Some("https://github.com/janedoe")));
        let outcome = pipeline.run(state).await;

        assert_eq!(
            backend.call_order(),
            vec!["job_analysis", "resume_analysis", "social_analysis", "synthesis"]
        );
        assert!(outcome.degraded_stages.is_empty());
        assert_eq!(outcome.report.match_score, 0.7);
        assert_eq!(outcome.report.skill_gaps, vec!["Kubernetes"]);
        assert_eq!(outcome.report.summary, "Good fit");
    }

    #[tokio::test]
    async fn test_resume_prompt_carries_job_analysis() {
        let backend = Arc::new(scripted());
        let oracle = oracle(backend.clone());
        let profiles = StaticProfiles::default();
        let pipeline = Pipeline::new(&oracle, &profiles);

        pipeline
            .run(PipelineState::new("u", Uuid::new_v4(), input(None)))
            .await;

        let resume_prompt = &backend.prompts("resume_analysis")[0];
        assert!(resume_prompt.contains("Jane Doe, 5 years Python"));
        assert!(resume_prompt.contains("\"Kubernetes\""));
        assert!(resume_prompt.contains("Senior Backend Engineer"));
    }

    #[tokio::test]
    async fn test_placeholder_text_in_resume_stays_literal() {
        let backend = Arc::new(scripted());
        let oracle = oracle(backend.clone());
        let profiles = StaticProfiles::default();
        let pipeline = Pipeline::new(&oracle, &profiles);

        let mut input = input(None);
        input.resume_text = "Built a templating engine that expands {job_analysis}".into();
        pipeline
            .run(PipelineState::new("u", Uuid::new_v4(), input))
            .await;

        let resume_prompt = &backend.prompts("resume_analysis")[0];
        assert!(resume_prompt.contains("templating engine that expands {job_analysis}"));
        assert_eq!(resume_prompt.matches("\"required_skills\"").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_social_stage_reaches_synthesis_as_failed() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .respond("job_analysis", JOB_JSON)
                .respond("resume_analysis", RESUME_JSON)
                .fail_always("social_analysis")
                .respond("synthesis", SYNTHESIS_JSON),
        );
        let oracle = oracle(backend.clone());
        let profiles = StaticProfiles::github("https://github.com/janedoe", "janedoe");
        let pipeline = Pipeline::new(&oracle, &profiles);

        let outcome = pipeline
            .run(PipelineState::new(
                "u",
                Uuid::new_v4(),
                input(Some("https://github.com/janedoe")),
            ))
            .await;

        assert_eq!(outcome.degraded_stages, vec![StageName::SocialAnalysis]);
        let synthesis_prompt = &backend.prompts("synthesis")[0];
        assert!(synthesis_prompt.contains("\"status\": \"failed\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stage_degrades_and_pipeline_completes() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail_always("job_analysis")
                .respond("resume_analysis", RESUME_JSON)
                .respond("synthesis", r#"{"match_score": 0.4, "skill_gaps": []}"#),
        );
        let oracle = oracle(backend.clone());
        let profiles = StaticProfiles::default();
        let pipeline = Pipeline::new(&oracle, &profiles);

        let outcome = pipeline
            .run(PipelineState::new("u", Uuid::new_v4(), input(None)))
            .await;

        assert_eq!(outcome.degraded_stages, vec![StageName::JobAnalysis]);
        assert_eq!(backend.calls("job_analysis"), 3);
        assert_eq!(outcome.report.match_score, 0.4);

        // Downstream saw the empty job record, not an error
        let resume_prompt = &backend.prompts("resume_analysis")[0];
        assert!(resume_prompt.contains("\"required_skills\": []"));
    }

    #[tokio::test]
    async fn test_unparseable_synthesis_yields_default_report() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .respond("job_analysis", JOB_JSON)
                .respond("resume_analysis", RESUME_JSON)
                .respond("synthesis", "I cannot provide structured output"),
        );
        let oracle = oracle(backend.clone());
        let profiles = StaticProfiles::default();
        let pipeline = Pipeline::new(&oracle, &profiles);

        let outcome = pipeline
            .run(PipelineState::new("u", Uuid::new_v4(), input(None)))
            .await;

        assert_eq!(outcome.degraded_stages, vec![StageName::Synthesis]);
        assert_eq!(outcome.report, FinalReport::default());
        assert!(outcome.resume_analysis.as_record().is_some());
    }

    #[tokio::test]
    async fn test_social_stage_skipped_without_urls() {
        let backend = Arc::new(scripted());
        let oracle = oracle(backend.clone());
        let profiles = StaticProfiles::default();
        let pipeline = Pipeline::new(&oracle, &profiles);

        let outcome = pipeline
            .run(PipelineState::new("u", Uuid::new_v4(), input(None)))
            .await;

        assert_eq!(backend.calls("social_analysis"), 0);
        assert_eq!(
            outcome.social_analysis.as_record().map(|s| s.status),
            Some(records::SocialStatus::Skipped)
        );
        assert!(backend.prompts("synthesis")[0].contains("\"skipped\""));
    }

    #[tokio::test]
    async fn test_profile_fetch_failure_becomes_prompt_note() {
        let backend = Arc::new(scripted());
        let oracle = oracle(backend.clone());
        let profiles = StaticProfiles::default();
        let pipeline = Pipeline::new(&oracle, &profiles);

        let outcome = pipeline
            .run(PipelineState::new(
                "u",
                Uuid::new_v4(),
                input(Some("https://github.com/ghost")),
            ))
            .await;

        assert!(outcome.degraded_stages.is_empty());
        let social_prompt = &backend.prompts("social_analysis")[0];
        assert!(social_prompt.contains("profile could not be fetched"));
    }
}
