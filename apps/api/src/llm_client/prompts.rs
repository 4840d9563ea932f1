// Shared prompt fragments. Each service that calls the oracle keeps its own
// prompts.rs alongside it; this file holds the cross-cutting pieces.

/// System prompt for every call that expects a JSON object or array back.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// System prompt for calls whose answer is plain conversational text.
pub const PLAIN_TEXT_SYSTEM: &str = "You are a professional technical interviewer. \
    Respond with the question only, in plain text, with no preamble.";

/// Appended to stage prompts so the model returns the bare object.
pub const JSON_SUFFIX: &str = "Respond ONLY with the JSON object, no other text.";

/// Substitutes `{name}` placeholders in a single pass. Inserted values are
/// not scanned again, so placeholder-like text inside caller input stays
/// literal. Braces that do not form a known placeholder are copied as-is.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substitution = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match substitution {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_every_occurrence() {
        let prompt = fill("{a} and {b}, again {a}", &[("a", "x"), ("b", "y")]);
        assert_eq!(prompt, "x and y, again x");
    }

    #[test]
    fn test_fill_keeps_json_examples_and_unknown_names() {
        let prompt = fill(r#"Return {"skills": []} for {name} {other}"#, &[("name", "Jane")]);
        assert_eq!(prompt, r#"Return {"skills": []} for Jane {other}"#);
    }

    #[test]
    fn test_fill_does_not_expand_placeholders_inside_values() {
        let prompt = fill(
            "Resume: {resume_text}\nJob: {job_analysis}",
            &[("resume_text", "I wrote {job_analysis} once"), ("job_analysis", "{}")],
        );
        assert_eq!(prompt, "Resume: I wrote {job_analysis} once\nJob: {}");
    }
}
