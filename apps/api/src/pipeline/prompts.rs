// Prompt templates for the analysis pipeline.
// Placeholders are `{name}` and are filled with `str::replace` before sending.

/// Job analysis. Replace `{job_description}`.
pub const JOB_ANALYSIS_TEMPLATE: &str = r#"Analyze the following job description and extract comprehensive information.

Job Description:
{job_description}

Return a JSON object with these keys:
{
  "position_title": "string",
  "company_name": "string",
  "required_skills": ["string"],
  "preferred_skills": ["string"],
  "technical_requirements": ["string"],
  "interview_patterns": ["string"],
  "company_culture": {"values": ["string"], "work_style": "string"},
  "difficulty_level": "junior | mid | senior | staff",
  "summary": "string"
}

Separate required from preferred skills strictly. Leave company fields empty
when the description does not state them."#;

/// Resume analysis in the context of the job analysis.
/// Replace `{resume_text}` and `{job_analysis}`.
pub const RESUME_ANALYSIS_TEMPLATE: &str = r#"Analyze the resume in the context of the job analysis provided.

Resume Text:
{resume_text}

Job Context:
{job_analysis}

Return a JSON object with these keys:
{
  "skills": ["string"],
  "experience_summary": "string",
  "match_details": {"matched_required": ["string"], "missing_required": ["string"]},
  "skill_gaps": ["string"],
  "strengths": ["string"],
  "improvement_areas": ["string"],
  "projects_relevance": "string"
}

Skill gaps are required or preferred skills from the job context that the
resume does not evidence."#;

/// Social profile assessment. Replace `{profiles}`.
pub const SOCIAL_ANALYSIS_TEMPLATE: &str = r#"Assess the candidate's professional online presence from the profile facts below.

Profiles:
{profiles}

Return a JSON object with these keys:
{
  "github_presence": "string",
  "linkedin_presence": "string",
  "professionalism_score": 0,
  "inferred_skills": ["string"],
  "red_flags": ["string"]
}

professionalism_score is an integer from 0 to 100. Only infer skills that the
facts support."#;

/// Synthesis of the three analyses into the final report.
/// Replace `{job_analysis}`, `{resume_analysis}` and `{social_analysis}`.
pub const SYNTHESIS_TEMPLATE: &str = r#"Synthesize a career-fit report from the following analyses.

Job Analysis:
{job_analysis}

Resume Analysis:
{resume_analysis}

Social Analysis:
{social_analysis}

Return a JSON object with these keys:
{
  "match_score": 0.0,
  "summary": "string",
  "strengths": ["string"],
  "skill_gaps": ["string"],
  "recommendations": ["string"],
  "interview_focus_areas": ["string"],
  "company_insights": "string",
  "social_rating": "string"
}

match_score is a number between 0 and 1. Recommendations are concrete,
actionable steps. Interview focus areas are the topics an interviewer should
explore, weighted toward the skill gaps."#;
