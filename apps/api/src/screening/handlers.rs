use std::path::{Component, Path, PathBuf};

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::PROVIDER;
use crate::screening::extractor::{is_supported, media_type_for_path, normalize_media_type, PDF};
use crate::screening::models::{JobRequirements, ScoreResult, Screening};
use crate::screening::CvSource;
use crate::state::AppState;

/// Media types browsers send when they don't know better; the extension decides instead.
const GENERIC_MEDIA_TYPES: &[&str] = &["", "application/octet-stream"];

#[derive(Debug, Serialize)]
pub struct ScreeningResponse {
    pub success: bool,
    pub screening_id: Uuid,
    pub analysis: ScoreResult,
    pub filename: String,
    /// `model`, `repaired` or `fallback`.
    pub scorer_backend: &'static str,
    pub ai_provider: &'static str,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<i64>,
}

impl ScreeningResponse {
    fn new(screening: Screening, filename: String) -> Self {
        Self {
            success: true,
            screening_id: Uuid::new_v4(),
            analysis: screening.result,
            filename,
            scorer_backend: screening.source.as_str(),
            ai_provider: PROVIDER,
            timestamp: Utc::now(),
            job_id: None,
            application_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeExistingRequest {
    #[serde(alias = "cvPath")]
    pub cv_path: String,
    /// Absent reads as `null`, which `JobRequirements::from_value` rejects.
    #[serde(rename = "jobRequirements", alias = "job_requirements", default)]
    pub job_requirements: Value,
    #[serde(rename = "applicationId", alias = "application_id", default)]
    pub application_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ModelHealthResponse {
    pub status: &'static str,
    pub provider: &'static str,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

struct Upload {
    filename: String,
    media_type: String,
    bytes: Bytes,
}

/// POST /api/v1/ai-screening/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ScreeningResponse>, AppError> {
    let mut upload: Option<Upload> = None;
    let mut requirements = Value::Object(Map::new());
    let mut job_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("cv") => {
                let filename = field.file_name().unwrap_or("cv").to_string();
                let declared = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                upload = Some(Upload {
                    media_type: upload_media_type(&declared, &filename),
                    filename,
                    bytes,
                });
            }
            Some("jobRequirements") => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    requirements = serde_json::from_str(&text).map_err(|e| {
                        AppError::Validation(format!("jobRequirements is not valid JSON: {e}"))
                    })?;
                }
            }
            Some("jobId") => {
                let text = field.text().await?;
                job_id = Some(text.trim().to_string()).filter(|id| !id.is_empty());
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| AppError::Validation("Please upload a CV file".into()))?;
    if !is_supported(&upload.media_type) {
        return Err(AppError::Validation(format!(
            "Unsupported CV type '{}'; upload a PDF or plain-text file",
            upload.media_type
        )));
    }
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("Uploaded CV file is empty".into()));
    }
    let requirements = JobRequirements::from_value(requirements)?;

    info!(
        "Analyzing uploaded CV '{}' ({} bytes, job {:?})",
        upload.filename,
        upload.bytes.len(),
        job_id
    );

    // Removed when `temp` drops, whatever the outcome.
    let suffix = if upload.media_type == PDF { ".pdf" } else { ".txt" };
    let temp = tempfile::Builder::new()
        .prefix("cv-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| AppError::Internal(e.into()))?;
    tokio::fs::write(temp.path(), &upload.bytes)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let screening = state
        .screener
        .screen(&CvSource::new(temp.path(), upload.media_type), &requirements)
        .await?;

    let mut response = ScreeningResponse::new(screening, upload.filename);
    response.job_id = job_id;
    Ok(Json(response))
}

/// POST /api/v1/ai-screening/analyze-existing
pub async fn handle_analyze_existing(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeExistingRequest>,
) -> Result<Json<ScreeningResponse>, AppError> {
    let path = resolve_cv_path(&state.config.cv_storage_dir, &req.cv_path)?;
    let requirements = JobRequirements::from_value(req.job_requirements)?;

    info!(
        "Analyzing stored CV {} (application {:?})",
        path.display(),
        req.application_id
    );

    let screening = state
        .screener
        .screen(&CvSource::from_path(&path), &requirements)
        .await?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut response = ScreeningResponse::new(screening, filename);
    response.application_id = req.application_id;
    Ok(Json(response))
}

/// GET /api/v1/ai-screening/health
pub async fn handle_model_health(State(state): State<AppState>) -> Json<ModelHealthResponse> {
    let generator = state.screener.generator();
    let reachable = generator.check_connection().await;
    Json(ModelHealthResponse {
        status: if reachable { "healthy" } else { "unhealthy" },
        provider: PROVIDER,
        model: generator.model().to_string(),
        timestamp: Utc::now(),
    })
}

/// Declared type, or the one implied by the filename when the client sent a generic one.
fn upload_media_type(declared: &str, filename: &str) -> String {
    let declared = normalize_media_type(declared);
    if GENERIC_MEDIA_TYPES.contains(&declared.as_str()) {
        media_type_for_path(Path::new(filename)).to_string()
    } else {
        declared
    }
}

/// Relative paths are joined onto `root`; absolute paths must already lie under it.
fn resolve_cv_path(root: &Path, requested: &str) -> Result<PathBuf, AppError> {
    let requested = Path::new(requested.trim());
    if requested.as_os_str().is_empty() {
        return Err(AppError::Validation("cv_path is required".into()));
    }
    if requested.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(AppError::Validation(
            "cv_path must not contain '..' components".into(),
        ));
    }
    if requested.is_absolute() {
        if requested.starts_with(root) {
            return Ok(requested.to_path_buf());
        }
        return Err(AppError::Validation(format!(
            "cv_path must be inside the CV storage directory {}",
            root.display()
        )));
    }
    Ok(root.join(requested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::routes::build_router;
    use crate::screening::retry::tests::ScriptedGenerator;
    use crate::screening::retry::RetryPolicy;
    use crate::screening::Screener;

    const BOUNDARY: &str = "screening-test-boundary";

    const CV: &str = "Tran Thi B, Frontend Engineer. 3 years with React and TypeScript, \
                      graduated from Da Nang University of Technology.";

    const MODEL_JSON: &str = r#"{"overallScore": 72, "ranking": "Top 25%",
        "skills": [{"name": "React", "match": 88, "required": true}]}"#;

    fn app(generator: ScriptedGenerator, storage: &Path) -> Router {
        app_with(Arc::new(generator), storage)
    }

    fn app_with(generator: Arc<ScriptedGenerator>, storage: &Path) -> Router {
        let screener = Screener::new(generator).with_retry_policy(RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        });
        let config = Config {
            gemini_api_key: "test-key".into(),
            gemini_model: "scripted".into(),
            port: 0,
            rust_log: "info".into(),
            cv_storage_dir: storage.to_path_buf(),
            screening_deadline: None,
            max_upload_bytes: 1024 * 1024,
        };
        build_router(AppState {
            screener: Arc::new(screener),
            config,
        })
    }

    /// (name, filename + content type for file parts, body)
    fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &str)]) -> String {
        let mut body = String::new();
        for (name, file, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file {
                Some((filename, content_type)) => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                    ));
                    body.push_str(&format!("Content-Type: {content_type}\r\n\r\n"));
                }
                None => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                    ));
                }
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn multipart_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/ai-screening/analyze")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_upload_returns_model_analysis() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]), storage.path());
        let body = multipart_body(&[
            ("cv", Some(("tran-thi-b.txt", "text/plain")), CV),
            ("jobRequirements", None, r#"{"skills_required": "React"}"#),
            ("jobId", None, "42"),
        ]);

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["filename"], "tran-thi-b.txt");
        assert_eq!(json["scorer_backend"], "model");
        assert_eq!(json["ai_provider"], "Google Gemini");
        assert_eq!(json["job_id"], "42");
        assert_eq!(json["analysis"]["overallScore"], 72);
        assert_eq!(json["analysis"]["skills"][0]["match"], 88);
        assert!(Uuid::parse_str(json["screening_id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_analyze_upload_falls_back_when_model_is_down() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::always_failing(), storage.path());
        let body = multipart_body(&[
            ("cv", Some(("cv.txt", "application/octet-stream")), CV),
            ("jobRequirements", None, r#"{"skills_required": ["React", "Kotlin"]}"#),
        ]);

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["scorer_backend"], "fallback");
        assert_eq!(json["analysis"]["skills"].as_array().unwrap().len(), 2);
        assert_eq!(json["analysis"]["overallScore"], 65);
    }

    #[tokio::test]
    async fn test_analyze_without_cv_part_is_rejected() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]), storage.path());
        let body = multipart_body(&[("jobRequirements", None, "{}")]);

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_analyze_rejects_unsupported_upload_type() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]), storage.path());
        let body = multipart_body(&[("cv", Some(("cv.doc", "application/msword")), CV)]);

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_rejects_malformed_requirements() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]), storage.path());
        let body = multipart_body(&[
            ("cv", Some(("cv.txt", "text/plain")), CV),
            ("jobRequirements", None, "{not json"),
        ]);

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_short_cv_is_rejected() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]), storage.path());
        let body = multipart_body(&[("cv", Some(("cv.txt", "text/plain")), "Too short")]);

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_existing_scores_stored_cv() {
        let storage = tempfile::tempdir().unwrap();
        std::fs::write(storage.path().join("applicant-7.txt"), CV).unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]), storage.path());

        let response = app
            .oneshot(json_request(
                "/api/v1/ai-screening/analyze-existing",
                json!({
                    "cv_path": "applicant-7.txt",
                    "jobRequirements": {"skills_required": "React"},
                    "applicationId": 7
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["filename"], "applicant-7.txt");
        assert_eq!(json["application_id"], 7);
        assert_eq!(json["scorer_backend"], "model");
    }

    #[tokio::test]
    async fn test_analyze_existing_missing_file_is_404() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]), storage.path());

        let response = app
            .oneshot(json_request(
                "/api/v1/ai-screening/analyze-existing",
                json!({ "cv_path": "nobody.pdf", "jobRequirements": {} }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_analyze_existing_requires_job_requirements() {
        let storage = tempfile::tempdir().unwrap();
        std::fs::write(storage.path().join("cv.txt"), CV).unwrap();

        for body in [
            json!({ "cv_path": "cv.txt", "jobRequirements": null }),
            json!({ "cv_path": "cv.txt" }),
        ] {
            let generator = Arc::new(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]));
            let response = app_with(generator.clone(), storage.path())
                .oneshot(json_request("/api/v1/ai-screening/analyze-existing", body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(generator.calls(), 0);
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_analyze_existing_rejects_parent_traversal() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok(MODEL_JSON)]), storage.path());

        let response = app
            .oneshot(json_request(
                "/api/v1/ai-screening/analyze-existing",
                json!({ "cv_path": "../etc/passwd" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_model_health_reports_unreachable_model() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::always_failing(), storage.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ai-screening/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["provider"], "Google Gemini");
        assert_eq!(json["model"], "scripted");
    }

    #[tokio::test]
    async fn test_model_health_reports_reachable_model() {
        let storage = tempfile::tempdir().unwrap();
        let app = app(ScriptedGenerator::new(vec![Ok("OK")]), storage.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ai-screening/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }

    #[test]
    fn test_upload_media_type_inference() {
        assert_eq!(upload_media_type("Application/PDF", "cv.bin"), "application/pdf");
        assert_eq!(upload_media_type("application/octet-stream", "cv.pdf"), "application/pdf");
        assert_eq!(upload_media_type("", "notes.TXT"), "text/plain");
        assert_eq!(upload_media_type("image/png", "cv.pdf"), "image/png");
    }

    #[test]
    fn test_resolve_cv_path() {
        let root = Path::new("/srv/cvs");
        assert_eq!(
            resolve_cv_path(root, "2024/cv.pdf").unwrap(),
            PathBuf::from("/srv/cvs/2024/cv.pdf")
        );
        assert_eq!(
            resolve_cv_path(root, "/srv/cvs/cv.pdf").unwrap(),
            PathBuf::from("/srv/cvs/cv.pdf")
        );
        assert!(resolve_cv_path(root, "/etc/passwd").is_err());
        assert!(resolve_cv_path(root, "a/../../b.pdf").is_err());
        assert!(resolve_cv_path(root, "  ").is_err());
    }
}
