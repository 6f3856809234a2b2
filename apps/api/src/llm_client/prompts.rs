// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Closing instruction that enforces JSON-only output.
pub const JSON_ONLY_INSTRUCTION: &str = "\
IMPORTANT: Your response MUST contain ONLY the JSON object above, filled in. \
Do NOT include any text outside the JSON object. \
Do NOT use markdown code fences. \
Do NOT include explanations or apologies.";

/// Minimal prompt used by the connectivity health check.
pub const CONNECTION_CHECK_PROMPT: &str =
    "Reply with the single word 'connected' if you received this message.";
