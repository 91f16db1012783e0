use pantheon_models::AgentOpinion;

use crate::error::AgentError;

/// Strip a surrounding markdown code fence, if the reply is wrapped in one.
///
/// Handles:
/// - Bare replies: `BUY|80|Breakout confirmed`
/// - Fenced replies: ```\nBUY|80|Breakout confirmed\n```
/// - Fences with an info string: ```text\nBUY|80|...\n```
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };

    // Drop the info string on the opening line, keep the body.
    match inner.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => inner.trim(),
    }
}

/// Parse one persona reply into an opinion.
///
/// Only surrounding whitespace and a code fence are forgiven; everything else
/// must match `DECISION|CONFIDENCE|REASONING` exactly.
pub fn parse_opinion(raw: &str) -> Result<AgentOpinion, AgentError> {
    let body = strip_code_fence(raw);
    Ok(body.parse::<AgentOpinion>()?)
}
