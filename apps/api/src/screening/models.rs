//! Screening data model: job requirements in, `ScoreResult` out.
//!
//! `ScoreResult` keeps the camelCase wire shape the admin console reads
//! (`overallScore`, `fitScore`, ...).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::screening::error::ScreeningError;

/// Placeholder recommendation when the model omits one.
pub const NO_RECOMMENDATION: &str = "No recommendation";
/// Placeholder degree when none could be determined.
pub const UNDETERMINED_DEGREE: &str = "Undetermined";
/// Placeholder skill name for nameless skill entries.
pub const UNKNOWN_SKILL: &str = "Unknown skill";

// ────────────────────────────────────────────────────────────────────────────
// Job requirements
// ────────────────────────────────────────────────────────────────────────────

/// Free-form job requirements (title, description, skills_required, ...).
/// Read-only to the pipeline; an empty object is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobRequirements(Map<String, Value>);

impl JobRequirements {
    /// Accepts any JSON object. `null` and non-object values are input errors.
    pub fn from_value(value: Value) -> Result<Self, ScreeningError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(ScreeningError::Input(
                "job requirements are missing".to_string(),
            )),
            other => Err(ScreeningError::Input(format!(
                "job requirements must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Required skills from `skills_required` (or `skills`), given either as a
    /// comma-delimited string or a list of strings. Blank entries are dropped.
    pub fn required_skills(&self) -> Vec<String> {
        let field = self.get("skills_required").or_else(|| self.get("skills"));
        let raw: Vec<String> = match field {
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Pretty JSON for prompt embedding.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Score result
// ────────────────────────────────────────────────────────────────────────────

/// Tier label attached to every score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ranking {
    #[serde(rename = "Top 10%")]
    Top10,
    #[serde(rename = "Top 25%")]
    Top25,
    #[default]
    #[serde(rename = "Top 50%")]
    Top50,
    #[serde(rename = "Needs improvement")]
    NeedsImprovement,
}

impl Ranking {
    /// Wire labels, best tier first. Listed verbatim in the screening prompt.
    pub const LABELS: [&'static str; 4] = ["Top 10%", "Top 25%", "Top 50%", "Needs improvement"];

    /// Maps a model-supplied label onto a tier. Accepts the canonical labels
    /// and the descriptive Vietnamese/English tier names; `None` if unknown.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        let tier = match label.as_str() {
            "top 10%" | "rất phù hợp" | "highly suitable" | "excellent" => Ranking::Top10,
            "top 25%" | "phù hợp" | "suitable" | "good" => Ranking::Top25,
            "top 50%" | "cần cân nhắc" | "needs consideration" | "fair" => Ranking::Top50,
            "needs improvement" | "cần cải thiện" | "không phù hợp" | "not suitable" => {
                Ranking::NeedsImprovement
            }
            _ => return None,
        };
        Some(tier)
    }

    /// Bucket for a 0–100 skill score.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Ranking::Top10
        } else if score >= 70.0 {
            Ranking::Top25
        } else if score >= 50.0 {
            Ranking::Top50
        } else {
            Ranking::NeedsImprovement
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Junior,
    Mid,
    Senior,
}

impl ExperienceLevel {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "junior" | "entry" | "entry-level" | "intern" | "fresher" => Some(Self::Junior),
            "mid" | "mid-level" | "middle" | "intermediate" => Some(Self::Mid),
            "senior" | "lead" | "principal" => Some(Self::Senior),
            _ => None,
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Senior
        } else if score >= 60.0 {
            Self::Mid
        } else {
            Self::Junior
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub name: String,
    #[serde(rename = "match")]
    pub match_score: u8, // 0 – 100
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub years: u32,
    pub level: ExperienceLevel,
    pub relevant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub relevant: bool,
    pub score: u8,
}

impl Default for Education {
    fn default() -> Self {
        Self {
            degree: UNDETERMINED_DEGREE.to_string(),
            relevant: false,
            score: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitScore {
    pub overall: u8,
    pub skills: u8,
    pub experience: u8,
    pub education: u8,
}

/// Canonical screening output. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub overall_score: u8,
    pub recommendation: String,
    pub ranking: Ranking,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub skills: Vec<SkillMatch>,
    pub experience: Experience,
    pub education: Education,
    pub fit_score: FitScore,
}

impl Default for ScoreResult {
    fn default() -> Self {
        Self {
            overall_score: 0,
            recommendation: NO_RECOMMENDATION.to_string(),
            ranking: Ranking::default(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            skills: Vec::new(),
            experience: Experience::default(),
            education: Education::default(),
            fit_score: FitScore::default(),
        }
    }
}

/// Which path produced a `ScoreResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Model output parsed as-is.
    Model,
    /// Model output parsed after the repair pass.
    Repaired,
    /// Heuristic scorer; the model path failed.
    Fallback,
}

impl ScoreSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreSource::Model => "model",
            ScoreSource::Repaired => "repaired",
            ScoreSource::Fallback => "fallback",
        }
    }
}

/// A score plus the path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Screening {
    pub result: ScoreResult,
    pub source: ScoreSource,
}
