//! Response Parser: turns raw model text into a normalized `ScoreResult`.
//!
//! Stages, in order:
//! 1. fence extraction (first ``` pair, optionally tagged `json`)
//! 2. brace-bounding (first `{` to last `}`)
//! 3. strict `serde_json` parse
//! 4. repair pass (`screening::repair`) and a second strict parse, only if 3 failed
//!
//! Any parsed object goes through `normalize` before it is returned.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::screening::error::ParseFailure;
use crate::screening::models::ScoreResult;
use crate::screening::normalize::normalize;
use crate::screening::repair::repair_json;

/// Which parse attempt produced the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Strict,
    Repaired,
}

pub fn parse_score(raw: &str) -> Result<(ScoreResult, ParseStage), ParseFailure> {
    let bounded = bound_braces(extract_fenced(raw));

    match serde_json::from_str::<Value>(bounded) {
        Ok(value) => into_result(value, raw).map(|r| (r, ParseStage::Strict)),
        Err(strict_err) => {
            debug!("Strict parse failed ({strict_err}); attempting repair");
            let repaired = repair_json(bounded);
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) => {
                    debug!("Repaired model JSON parsed successfully");
                    into_result(value, raw).map(|r| (r, ParseStage::Repaired))
                }
                Err(source) => {
                    warn!("Model output could not be repaired: {source}");
                    Err(ParseFailure::Malformed {
                        raw: raw.to_string(),
                        source,
                    })
                }
            }
        }
    }
}

fn into_result(value: Value, raw: &str) -> Result<ScoreResult, ParseFailure> {
    match value {
        Value::Object(object) => Ok(normalize(&object)),
        _ => Err(ParseFailure::NotAnObject {
            raw: raw.to_string(),
        }),
    }
}

/// Content of the first markdown code fence, or the whole text if there is
/// no complete, non-empty fence.
pub fn extract_fenced(text: &str) -> &str {
    static RE: OnceLock<Regex> = OnceLock::new();
    if !text.contains("```") {
        return text;
    }
    let re = RE.get_or_init(|| Regex::new(r"```(?i:json)?\n?([\s\S]*?)```").expect("valid regex"));
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|inner| !inner.is_empty())
        .unwrap_or(text)
}

/// Slice from the first `{` to the last `}`; unchanged if that span is empty.
pub fn bound_braces(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}
