// Prompt templates for interview operations.

/// Question generation. Replace `{skill_gaps}` and `{focus_areas}`.
pub const QUESTIONS_TEMPLATE: &str = r#"Generate 5 technical interview questions based on the following.

Skill Gaps: {skill_gaps}
Focus Areas: {focus_areas}

The questions should be challenging but fair, designed to test the candidate's
knowledge in these areas.

Return ONLY a JSON array of strings, e.g. ["Question 1", "Question 2"]"#;

/// Follow-up during a live interview. Replace `{context}` and `{history}`.
pub const FOLLOWUP_TEMPLATE: &str = r#"Based on the interview context and conversation history, ask one relevant follow-up question.
Keep it concise and natural for a voice interview.

Context:
{context}

Conversation so far:
{history}"#;

/// Transcript feedback. Replace `{skill_gaps}`, `{questions}` and `{transcript}`.
pub const FEEDBACK_TEMPLATE: &str = r#"You are an expert interview coach. Analyze the interview transcript and provide constructive feedback.

Original Skill Gaps: {skill_gaps}
Interview Questions:
{questions}

Transcript:
{transcript}

Return a JSON object in this format:
{
  "summary": "Brief summary of the candidate's performance",
  "overall_score": 85,
  "strong_points": ["point 1", "point 2"],
  "areas_to_improve": ["area 1", "area 2"],
  "detailed_analysis": "Detailed feedback"
}

overall_score is an integer from 0 to 100."#;
