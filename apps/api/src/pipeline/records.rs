//! Typed stage outputs. Every field has a default so a partially-filled
//! oracle response still decodes, and so a degraded stage can hand its
//! successors an all-empty record instead of an error.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::extract::{lenient_number, lenient_string, lenient_strings, number_of};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobAnalysis {
    #[serde(deserialize_with = "lenient_string")]
    pub position_title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub company_name: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub required_skills: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub preferred_skills: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub technical_requirements: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub interview_patterns: Vec<String>,
    #[serde(deserialize_with = "object_or_empty")]
    pub company_culture: Map<String, Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub difficulty_level: String,
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeAnalysis {
    #[serde(deserialize_with = "lenient_strings")]
    pub skills: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub experience_summary: String,
    #[serde(deserialize_with = "object_or_empty")]
    pub match_details: Map<String, Value>,
    #[serde(deserialize_with = "lenient_strings")]
    pub skill_gaps: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub improvement_areas: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub projects_relevance: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialStatus {
    #[default]
    Analyzed,
    Skipped,
    /// The stage ran but produced nothing usable.
    Failed,
}

/// Unknown or malformed status values read as `Analyzed`.
fn lenient_status<'de, D>(deserializer: D) -> Result<SocialStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value.as_str() {
        Some("skipped") => SocialStatus::Skipped,
        Some("failed") => SocialStatus::Failed,
        _ => SocialStatus::Analyzed,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialAnalysis {
    #[serde(deserialize_with = "lenient_status")]
    pub status: SocialStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub github_presence: String,
    #[serde(deserialize_with = "lenient_string")]
    pub linkedin_presence: String,
    #[serde(deserialize_with = "lenient_number")]
    pub professionalism_score: f64,
    #[serde(deserialize_with = "lenient_strings")]
    pub inferred_skills: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub red_flags: Vec<String>,
}

impl SocialAnalysis {
    pub fn skipped(reason: &str) -> Self {
        Self {
            status: SocialStatus::Skipped,
            reason: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn failed(reason: &str) -> Self {
        Self {
            status: SocialStatus::Failed,
            reason: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

/// A recommendation is either free text or a structured item. Both shapes
/// occur in oracle output and are kept as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recommendation {
    Text(String),
    Structured(StructuredRecommendation),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredRecommendation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// The caller-facing report produced by the synthesis stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalReport {
    /// Always in [0, 1]. Scores given on a 0–100 scale are divided by 100.
    #[serde(deserialize_with = "unit_score")]
    pub match_score: f64,
    #[serde(deserialize_with = "lenient_strings")]
    pub skill_gaps: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "recommendations")]
    pub recommendations: Vec<Recommendation>,
    #[serde(deserialize_with = "lenient_strings")]
    pub interview_focus_areas: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(deserialize_with = "lenient_string")]
    pub company_insights: String,
    #[serde(deserialize_with = "lenient_string")]
    pub social_rating: String,
}

/// Maps a raw score onto [0, 1]: values above 1 are read as percentages.
pub fn normalize_score(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

fn unit_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_of(&value).map(normalize_score).unwrap_or(0.0))
}

/// Non-object values (a prose string, say) are kept under `"text"`.
fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => Map::from_iter([("text".to_string(), other)]),
    })
}

fn recommendations<'de, D>(deserializer: D) -> Result<Vec<Recommendation>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        single => vec![single],
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(Recommendation::Text(s)),
            Value::Object(_) => serde_json::from_value(item).ok(),
            _ => None,
        })
        .collect())
}
