use anyhow::Result;
use thiserror::Error;

/// A single prompt sent to the text-completion capability. The capability is
/// treated as unreliable: any text or an error may come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub request_id: String,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("model returned empty output")]
    Empty,
    #[error("model returned an empty fenced block")]
    EmptyFenced,
}

pub trait TextCompletion {
    fn complete(&self, req: &CompletionRequest, model: &str) -> Result<String>;
}

/// Strips markdown fences and surrounding prose-ish whitespace from raw model
/// output. Empty output is an error, not a valid completion.
pub fn normalize_completion(raw: &str) -> Result<String, CompletionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CompletionError::Empty);
    }

    if let Some(block) = extract_fenced_code(trimmed) {
        if block.trim().is_empty() {
            return Err(CompletionError::EmptyFenced);
        }
        return Ok(block.trim().to_string());
    }

    Ok(trimmed.to_string())
}

fn extract_fenced_code(input: &str) -> Option<String> {
    let start = input.find("```")?;
    let remainder = &input[start + 3..];
    let body_start = remainder.find('\n')? + 1;
    let body = &remainder[body_start..];
    let end = body.find("```")?;
    Some(body[..end].to_string())
}
