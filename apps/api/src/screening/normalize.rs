//! Normalization: coerces any JSON object into a complete `ScoreResult`.
//!
//! Missing or malformed fields fall back to safe defaults (0, false, empty
//! list, placeholder text). Numbers are rounded and clamped to their range;
//! numeric strings ("85", "5+") are accepted. Top-level keys are read in
//! camelCase or snake_case.

use serde_json::{Map, Value};

use crate::screening::models::{
    Education, Experience, ExperienceLevel, FitScore, Ranking, ScoreResult, SkillMatch,
    NO_RECOMMENDATION, UNDETERMINED_DEGREE, UNKNOWN_SKILL,
};

const MAX_YEARS: f64 = 80.0;

pub fn normalize(object: &Map<String, Value>) -> ScoreResult {
    let experience = field(object, &["experience"])
        .and_then(Value::as_object)
        .map(normalize_experience)
        .unwrap_or_default();

    let education = field(object, &["education"])
        .and_then(Value::as_object)
        .map(normalize_education)
        .unwrap_or_default();

    let fit_score = field(object, &["fitScore", "fit_score"])
        .and_then(Value::as_object)
        .map(|fit| FitScore {
            overall: score(fit.get("overall")),
            skills: score(fit.get("skills")),
            experience: score(fit.get("experience")),
            education: score(fit.get("education")),
        })
        .unwrap_or_default();

    let skills = match field(object, &["skills"]) {
        Some(Value::Array(items)) => items.iter().filter_map(normalize_skill).collect(),
        _ => Vec::new(),
    };

    ScoreResult {
        overall_score: score(field(object, &["overallScore", "overall_score"])),
        recommendation: text(field(object, &["recommendation"]))
            .unwrap_or_else(|| NO_RECOMMENDATION.to_string()),
        ranking: text(field(object, &["ranking"]))
            .and_then(|label| Ranking::from_label(&label))
            .unwrap_or_default(),
        strengths: text_list(field(object, &["strengths"])),
        weaknesses: text_list(field(object, &["weaknesses"])),
        skills,
        experience,
        education,
        fit_score,
    }
}

fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key)).filter(|v| !v.is_null())
}

fn normalize_experience(experience: &Map<String, Value>) -> Experience {
    Experience {
        years: number(experience.get("years"))
            .map(|y| y.clamp(0.0, MAX_YEARS).round() as u32)
            .unwrap_or(0),
        level: text(experience.get("level"))
            .and_then(|label| ExperienceLevel::from_label(&label))
            .unwrap_or_default(),
        relevant: flag(experience.get("relevant")),
    }
}

fn normalize_education(education: &Map<String, Value>) -> Education {
    Education {
        degree: text(education.get("degree")).unwrap_or_else(|| UNDETERMINED_DEGREE.to_string()),
        relevant: flag(education.get("relevant")),
        score: score(education.get("score")),
    }
}

/// Skill objects keep their fields; a bare string is taken as the skill name.
fn normalize_skill(skill: &Value) -> Option<SkillMatch> {
    match skill {
        Value::Object(obj) => Some(SkillMatch {
            name: text(obj.get("name")).unwrap_or_else(|| UNKNOWN_SKILL.to_string()),
            match_score: score(obj.get("match")),
            required: flag(obj.get("required")),
        }),
        Value::String(name) if !name.trim().is_empty() => Some(SkillMatch {
            name: name.trim().to_string(),
            match_score: 0,
            required: false,
        }),
        _ => None,
    }
}

/// 0–100 integer score.
fn score(value: Option<&Value>) -> u8 {
    number(value)
        .map(|n| n.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(0)
}

/// A JSON number, or the leading number of a string ("85", "85/100", "5+ years").
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (c == '.' && i > 0)))
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            s[..end].trim_end_matches('.').parse::<f64>().ok()
        }
        _ => None,
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "1" | "có"
        ),
        _ => false,
    }
}

/// Non-blank string, trimmed.
fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
