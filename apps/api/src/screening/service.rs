//! Screening Orchestrator.
//!
//! Flow: extract text → length gate → build prompt → invoke model (with
//! retries) → parse/repair → result. Model exhaustion, unparseable output and
//! an expired deadline all end in the fallback scorer, so the only errors a
//! caller sees are extraction and input errors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::llm_client::{GenerationConfig, TextGenerator};
use crate::screening::error::ScreeningError;
use crate::screening::extractor::{extract_text, media_type_for_path};
use crate::screening::fallback::fallback_score;
use crate::screening::models::{JobRequirements, ScoreResult, ScoreSource, Screening};
use crate::screening::parser::{parse_score, ParseStage};
use crate::screening::prompts::build_prompt;
use crate::screening::retry::{invoke_model, RetryPolicy};

/// CVs with less trimmed text than this are rejected before any model call.
pub const MIN_CV_CHARS: usize = 50;

/// A stored résumé file and its declared media type.
#[derive(Debug, Clone)]
pub struct CvSource {
    pub path: PathBuf,
    pub media_type: String,
}

impl CvSource {
    pub fn new(path: impl Into<PathBuf>, media_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            media_type: media_type.into(),
        }
    }

    /// Media type inferred from the file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let media_type = media_type_for_path(&path).to_string();
        Self { path, media_type }
    }
}

/// Runs the screening pipeline. Holds no per-call state; share it via `Arc`.
pub struct Screener {
    generator: Arc<dyn TextGenerator>,
    generation: GenerationConfig,
    retry: RetryPolicy,
    deadline: Option<Duration>,
}

impl Screener {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            generation: GenerationConfig::default(),
            retry: RetryPolicy::default(),
            deadline: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bounds the whole call; once it passes, the fallback result is returned.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    /// Scores a CV against job requirements.
    pub async fn screen_resume(
        &self,
        cv: &CvSource,
        requirements: &JobRequirements,
    ) -> Result<ScoreResult, ScreeningError> {
        self.screen(cv, requirements).await.map(|s| s.result)
    }

    /// Like `screen_resume`, also reporting which path produced the score.
    pub async fn screen(
        &self,
        cv: &CvSource,
        requirements: &JobRequirements,
    ) -> Result<Screening, ScreeningError> {
        let started = Instant::now();

        let cv_text = extract_text(&cv.path, &cv.media_type).await?;
        let length = cv_text.trim().chars().count();
        if length < MIN_CV_CHARS {
            return Err(ScreeningError::Input(format!(
                "CV text is unreadable or too short ({length} characters, minimum {MIN_CV_CHARS})"
            )));
        }
        info!("Extracted {length} characters from {}", cv.path.display());

        let prompt = build_prompt(&cv_text, requirements);
        let model_path = self.score_with_model(&prompt);

        let scored = match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(started.elapsed());
                match tokio::time::timeout(remaining, model_path).await {
                    Ok(scored) => scored,
                    Err(_) => {
                        warn!(
                            "Screening deadline of {}s expired during the model call",
                            deadline.as_secs_f32()
                        );
                        None
                    }
                }
            }
            None => model_path.await,
        };

        let screening = scored.unwrap_or_else(|| {
            info!("Using fallback scorer");
            Screening {
                result: fallback_score(&cv_text, requirements),
                source: ScoreSource::Fallback,
            }
        });

        info!(
            "Screening finished: score={}/100 source={} in {}ms",
            screening.result.overall_score,
            screening.source.as_str(),
            started.elapsed().as_millis()
        );
        Ok(screening)
    }

    /// `None` means the model path failed and the caller should fall back.
    async fn score_with_model(&self, prompt: &str) -> Option<Screening> {
        let raw = match invoke_model(
            self.generator.as_ref(),
            prompt,
            &self.generation,
            &self.retry,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{e}");
                return None;
            }
        };

        match parse_score(&raw) {
            Ok((result, stage)) => Some(Screening {
                result,
                source: match stage {
                    ParseStage::Strict => ScoreSource::Model,
                    ParseStage::Repaired => ScoreSource::Repaired,
                },
            }),
            Err(e) => {
                warn!("Unusable model output: {e}");
                debug!("Raw model output: {}", e.raw());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::error::ExtractionError;
    use crate::screening::extractor::PLAIN_TEXT;
    use crate::screening::retry::tests::ScriptedGenerator;
    use serde_json::json;
    use std::io::Write;

    const CV: &str = "Nguyen Van A, Backend Engineer. 5 years building Python services \
                      on MongoDB. BSc, Hanoi University of Science and Technology.";

    const MODEL_JSON: &str = r#"{
        "overallScore": 81,
        "recommendation": "Invite to interview",
        "ranking": "Top 25%",
        "strengths": ["Python"],
        "weaknesses": ["No SQL tuning"],
        "skills": [{"name": "Python", "match": 90, "required": true}],
        "experience": {"years": 5, "level": "senior", "relevant": true},
        "education": {"degree": "BSc", "relevant": true, "score": 80},
        "fitScore": {"overall": 81, "skills": 85, "experience": 80, "education": 80}
    }"#;

    fn cv_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn reqs() -> JobRequirements {
        JobRequirements::from_value(json!({
            "title": "Backend Engineer",
            "skills_required": "Python, SQL"
        }))
        .unwrap()
    }

    fn screener(generator: Arc<ScriptedGenerator>) -> Screener {
        Screener::new(generator)
    }

    #[tokio::test]
    async fn test_model_answer_is_returned() {
        let file = cv_file(CV);
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]));
        let screening = screener(generator.clone())
            .screen(&CvSource::new(file.path(), PLAIN_TEXT), &reqs())
            .await
            .unwrap();

        assert_eq!(screening.source, ScoreSource::Model);
        assert_eq!(screening.result.overall_score, 81);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_sloppy_model_answer_is_repaired() {
        let file = cv_file(CV);
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            "```json\n{overallScore: 55, ranking: 'Phù hợp',}\n```",
        )]));
        let screening = screener(generator)
            .screen(&CvSource::new(file.path(), PLAIN_TEXT), &reqs())
            .await
            .unwrap();

        assert_eq!(screening.source, ScoreSource::Repaired);
        assert_eq!(screening.result.overall_score, 55);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_model_falls_back_to_full_result() {
        let file = cv_file(CV);
        let generator = Arc::new(ScriptedGenerator::always_failing());
        let screening = screener(generator.clone())
            .screen(&CvSource::new(file.path(), PLAIN_TEXT), &reqs())
            .await
            .unwrap();

        assert_eq!(generator.calls(), 3);
        assert_eq!(screening.source, ScoreSource::Fallback);
        let result = screening.result;
        assert_eq!(result.skills.len(), 2);
        assert!(result.skills[0].match_score >= 80);
        assert!(result.skills[1].match_score < 50);
        assert_eq!(result.strengths.len(), 3);
        assert_eq!(result.weaknesses.len(), 2);
        assert_eq!(result.experience.years, 5);
        assert_eq!(result.fit_score.experience, 75);
    }

    #[tokio::test]
    async fn test_unparseable_answer_falls_back_without_retrying() {
        let file = cv_file(CV);
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            "Sorry, I can't help with that.",
        )]));
        let result = screener(generator.clone())
            .screen_resume(&CvSource::new(file.path(), PLAIN_TEXT), &reqs())
            .await
            .unwrap();

        assert_eq!(generator.calls(), 1);
        assert_eq!(result.skills.len(), 2);
        assert_eq!(result.overall_score, 65);
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_model_call() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]));
        let err = screener(generator.clone())
            .screen_resume(&CvSource::from_path("/no/such/dir/cv.pdf"), &reqs())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScreeningError::Extraction(ExtractionError::NotFound(_))
        ));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_short_cv_is_rejected_before_model_call() {
        let file = cv_file("Short CV");
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]));
        let err = screener(generator.clone())
            .screen_resume(&CvSource::new(file.path(), PLAIN_TEXT), &reqs())
            .await
            .unwrap_err();

        assert!(matches!(err, ScreeningError::Input(_)));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_format_is_rejected_as_too_short() {
        let file = cv_file(CV);
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]));
        let err = screener(generator.clone())
            .screen_resume(&CvSource::new(file.path(), "application/msword"), &reqs())
            .await
            .unwrap_err();

        assert!(matches!(err, ScreeningError::Input(_)));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_retries_short_and_falls_back() {
        let file = cv_file(CV);
        let generator = Arc::new(ScriptedGenerator::always_failing());
        let start = Instant::now();
        let screening = screener(generator.clone())
            .with_deadline(Some(Duration::from_secs(1)))
            .screen(&CvSource::new(file.path(), PLAIN_TEXT), &reqs())
            .await
            .unwrap();

        assert_eq!(screening.source, ScoreSource::Fallback);
        assert_eq!(generator.calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_cv_source_infers_media_type() {
        assert_eq!(CvSource::from_path("a/b/cv.PDF").media_type, "application/pdf");
        assert_eq!(CvSource::from_path("cv.odt").media_type, "");
    }
}
