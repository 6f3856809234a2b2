// Screening LLM prompt templates.
// All prompts for the screening module are defined here.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::screening::models::{JobRequirements, Ranking};

/// Screening prompt template.
/// Replace: {cv_text}, {requirements_json}, {ranking_labels}, {json_only_instruction}
pub const SCREENING_PROMPT_TEMPLATE: &str = r#"You are an expert recruiter screening CVs. Analyse the CV below and assess how well it fits the job description.

### CV:
{cv_text}

### Job description:
{requirements_json}

### Tasks:
1. Analyse the CV in detail.
2. Rate how well the candidate fits the position, judged against the requirements and job description above.
3. List strengths and weaknesses against those requirements, most relevant first.
4. Rate each skill the job asks for and say whether the CV shows it.
5. Return the result in EXACTLY this JSON format:

{
  "overallScore": <integer 0-100>,
  "recommendation": "<short recommendation>",
  "ranking": "<one of: {ranking_labels}>",
  "strengths": ["<strength 1>", "<strength 2>"],
  "weaknesses": ["<weakness 1>", "<weakness 2>"],
  "skills": [
    {"name": "<skill name>", "match": <integer 0-100>, "required": <true|false>}
  ],
  "experience": {
    "years": <integer years of experience>,
    "level": "<one of: junior | mid | senior>",
    "relevant": <true|false>
  },
  "education": {
    "degree": "<highest degree>",
    "relevant": <true|false>,
    "score": <integer 0-100>
  },
  "fitScore": {
    "overall": <integer 0-100>,
    "skills": <integer 0-100>,
    "experience": <integer 0-100>,
    "education": <integer 0-100>
  }
}

{json_only_instruction}"#;

/// Renders the screening prompt. Pure; the CV text is embedded verbatim.
///
/// Placeholders are substituted in one pass, so placeholder-like text inside
/// the CV or the requirements is never expanded.
pub fn build_prompt(cv_text: &str, requirements: &JobRequirements) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\{(cv_text|requirements_json|ranking_labels|json_only_instruction)\}")
            .expect("valid regex")
    });

    let requirements_json = requirements.to_prompt_json();
    let ranking_labels = Ranking::LABELS.join(" | ");

    re.replace_all(SCREENING_PROMPT_TEMPLATE, |caps: &Captures| match &caps[1] {
        "cv_text" => cv_text,
        "requirements_json" => requirements_json.as_str(),
        "ranking_labels" => ranking_labels.as_str(),
        _ => JSON_ONLY_INSTRUCTION,
    })
    .into_owned()
}
