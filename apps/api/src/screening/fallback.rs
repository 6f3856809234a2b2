//! Fallback Heuristic Scorer: keyword matching used when the model path fails.
//!
//! Algorithm:
//! 1. Required skills come from the job requirements (`skills_required`).
//! 2. Each skill is found/not found by case-insensitive substring match.
//!    - found     → match 80 + jitter in [0, 15)
//!    - not found → match 20 + jitter in [0, 30)
//! 3. A skill counts as matched when its score exceeds 60.
//! 4. skill_score = matched / required × 100 (70 when nothing is required)
//! 5. overall = round(skill_score × 0.7 + 30)
//!
//! The jitter keeps heuristic scores from looking falsely precise. It is
//! derived from an FNV-1a hash of the skill name, so identical input always
//! yields an identical result.

use std::sync::OnceLock;

use regex::Regex;

use crate::screening::models::{
    Education, Experience, ExperienceLevel, FitScore, JobRequirements, Ranking, ScoreResult,
    SkillMatch, UNDETERMINED_DEGREE,
};

const FOUND_BASE: u8 = 80;
const FOUND_SPREAD: u8 = 15;
const MISSING_BASE: u8 = 20;
const MISSING_SPREAD: u8 = 30;
const MATCHED_THRESHOLD: u8 = 60;
const NEUTRAL_SKILL_SCORE: f64 = 70.0;
/// Stand-in score for experience and education, which are not evaluated here.
const UNEVALUATED_SCORE: u8 = 75;
const DEFAULT_YEARS: u32 = 2;
const BACHELOR_DEGREE: &str = "Bachelor's";
/// Degree keywords, English and Vietnamese.
const DEGREE_KEYWORDS: &[&str] = &["university", "đại học"];

pub fn fallback_score(cv_text: &str, requirements: &JobRequirements) -> ScoreResult {
    let cv_lower = cv_text.to_lowercase();
    let required = requirements.required_skills();

    let skills: Vec<SkillMatch> = required
        .iter()
        .map(|skill| {
            let skill_lower = skill.to_lowercase();
            let match_score = if cv_lower.contains(&skill_lower) {
                FOUND_BASE + jitter(&skill_lower, FOUND_SPREAD)
            } else {
                MISSING_BASE + jitter(&skill_lower, MISSING_SPREAD)
            };
            SkillMatch {
                name: skill.clone(),
                match_score,
                required: true,
            }
        })
        .collect();

    let matched = skills
        .iter()
        .filter(|s| s.match_score > MATCHED_THRESHOLD)
        .count();
    let total = skills.len();

    let skill_score = if total > 0 {
        matched as f64 / total as f64 * 100.0
    } else {
        NEUTRAL_SKILL_SCORE
    };

    let unevaluated = f64::from(UNEVALUATED_SCORE);

    ScoreResult {
        overall_score: (skill_score * 0.7 + 30.0).round() as u8,
        recommendation: recommendation(matched, total),
        ranking: Ranking::from_score(skill_score),
        strengths: strengths(matched),
        weaknesses: weaknesses(matched, total),
        skills,
        experience: Experience {
            years: years_of_experience(cv_text).unwrap_or(DEFAULT_YEARS),
            level: ExperienceLevel::from_score(skill_score),
            relevant: true,
        },
        education: Education {
            degree: if DEGREE_KEYWORDS.iter().any(|k| cv_lower.contains(k)) {
                BACHELOR_DEGREE.to_string()
            } else {
                UNDETERMINED_DEGREE.to_string()
            },
            relevant: true,
            score: UNEVALUATED_SCORE,
        },
        fit_score: FitScore {
            overall: ((skill_score + unevaluated + unevaluated) / 3.0).round() as u8,
            skills: skill_score.round() as u8,
            experience: UNEVALUATED_SCORE,
            education: UNEVALUATED_SCORE,
        },
    }
}

/// Deterministic offset in `[0, spread)`.
fn jitter(seed: &str, spread: u8) -> u8 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = seed
        .bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    (hash % u64::from(spread.max(1))) as u8
}

/// First number written next to a year token: "5 years", "3+ years", "2 năm".
fn years_of_experience(cv_text: &str) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})\s*\+?\s*(?:years?|yrs?|năm)\b").expect("valid regex")
    });
    re.captures(cv_text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn recommendation(matched: usize, total: usize) -> String {
    if matched as f64 >= total as f64 * 0.7 {
        "Promising candidate; invite to an interview for a closer assessment.".to_string()
    } else {
        "Candidate needs further training in the missing skills; consider for a junior position."
            .to_string()
    }
}

fn strengths(matched: usize) -> Vec<String> {
    let headline = if matched > 0 {
        format!("Has {matched} skill(s) matching the job requirements")
    } else {
        "CV is clearly presented".to_string()
    };
    vec![
        headline,
        "Personal information is complete".to_string(),
        "Professional CV layout".to_string(),
    ]
}

fn weaknesses(matched: usize, total: usize) -> Vec<String> {
    let headline = if matched < total {
        "Missing some required skills".to_string()
    } else {
        "Needs a more detailed assessment in an interview".to_string()
    };
    vec![
        headline,
        "Experience details could be more specific".to_string(),
    ]
}
