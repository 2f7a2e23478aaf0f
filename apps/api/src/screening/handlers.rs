//! Axum route handlers for the Screening API.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        ConnectInfo, Multipart, State,
    },
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, PipelineError};
use crate::models::audit::CallerContext;
use crate::screening::analysis::AnalyzedResume;
use crate::screening::batch::{BatchRequest, FileFailure, MAX_FILES_PER_BATCH};
use crate::screening::upload::UploadedDocument;
use crate::state::AppState;

const UNKNOWN: &str = "Unknown";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub analysis_results: Vec<AnalyzedResume>,
    /// Only populated under the best-effort batch policy.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FileFailure>,
}

#[derive(Default)]
struct UploadForm {
    files: Vec<UploadedDocument>,
    job_description: String,
    email: Option<String>,
    page: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /analyze/upload
///
/// Multipart fields: `resume` (1–5 files, repeated), `jobDescription`,
/// optional `email` and `page`. Scores every resume against the job description.
pub async fn handle_upload(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let mut multipart =
        multipart.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let caller = resolve_caller(&headers, peer);

    let form = read_form(&mut multipart, &state.config.upload_dir).await?;

    let outcome = state
        .orchestrator
        .process_batch(BatchRequest {
            files: form.files,
            job_description: form.job_description,
            caller,
            email: form.email,
            page: form.page,
        })
        .await?;

    let (analysis_results, failures) = outcome.into_parts();
    Ok(Json(AnalyzeResponse {
        analysis_results,
        failures,
    }))
}

async fn read_form(multipart: &mut Multipart, upload_dir: &Path) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                if form.files.len() == MAX_FILES_PER_BATCH {
                    return Err(PipelineError::BatchConstraintViolation(format!(
                        "You can upload a maximum of {MAX_FILES_PER_BATCH} resumes at a time."
                    ))
                    .into());
                }
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data: Bytes = field.bytes().await.map_err(bad_multipart)?;
                debug!("Received {file_name} ({} bytes)", data.len());
                form.files.push(
                    UploadedDocument::spool(upload_dir, &file_name, content_type, &data).await?,
                );
            }
            "jobDescription" => form.job_description = field.text().await.map_err(bad_multipart)?,
            "email" => form.email = non_empty(field.text().await.map_err(bad_multipart)?),
            "page" => form.page = non_empty(field.text().await.map_err(bad_multipart)?),
            other => debug!("Ignoring multipart field '{other}'"),
        }
    }

    Ok(form)
}

fn bad_multipart(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Client address: first `X-Forwarded-For` hop, else the socket peer.
fn resolve_caller(headers: &HeaderMap, peer: Option<IpAddr>) -> CallerContext {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let ip_address = match forwarded.or_else(|| peer.map(|ip| ip.to_string())) {
        Some(ip) if ip == "::1" => "127.0.0.1".to_string(),
        Some(ip) => ip,
        None => UNKNOWN.to_string(),
    };

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();

    CallerContext::new(ip_address, user_agent)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, HeaderValue, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::build_router;
    use crate::screening::analysis::tests::valid_payload;
    use crate::screening::audit::memory::MemoryAuditSink;
    use crate::screening::extractor::{fixtures, DOCX_MIME};
    use crate::screening::scorer::tests::StubProvider;
    use crate::state::test_state;

    const BOUNDARY: &str = "screener-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, Vec<u8>),
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(file_name, mime, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"resume\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze/upload")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("x-forwarded-for", "203.0.113.5, 10.0.0.1")
            .header(USER_AGENT, "screener-tests/1.0")
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    async fn send(
        parts: &[Part<'_>],
        provider: StubProvider,
    ) -> (StatusCode, Value, Arc<MemoryAuditSink>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemoryAuditSink::default());
        let state = test_state(dir.path(), Arc::new(provider), sink.clone());

        let response = build_router(state)
            .oneshot(upload_request(parts))
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json, sink, dir)
    }

    fn resume(file_name: &'static str) -> Part<'static> {
        Part::File(file_name, DOCX_MIME, fixtures::docx(&["Jane Doe", "Python, SQL"]))
    }

    const JD: &str = "Looking for Python developer, 3+ years";

    #[tokio::test]
    async fn test_upload_returns_analysis_results() {
        let provider = StubProvider::replying(valid_payload().to_string(), 1_000);
        let (status, json, sink, dir) = send(
            &[
                Part::Text("jobDescription", JD),
                Part::Text("email", "recruiter@example.com"),
                resume("jane.docx"),
            ],
            provider,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let results = json["analysisResults"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["fileName"], "jane.docx");
        assert_eq!(results[0]["name"], "Jane Doe");
        assert!(json.get("failures").is_none());

        let costs = sink.costs();
        assert_eq!(costs.len(), 1);
        assert_eq!(costs[0].ip_address, "203.0.113.5");
        assert_eq!(costs[0].user_agent, "screener-tests/1.0");
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].email.as_deref(), Some("recruiter@example.com"));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_no_files_is_bad_request() {
        let (status, json, sink, _dir) =
            send(&[Part::Text("jobDescription", JD)], StubProvider::new(vec![])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No files uploaded");
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn test_missing_job_description_is_bad_request() {
        let (status, json, _, _dir) = send(&[resume("jane.docx")], StubProvider::new(vec![])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Job description is required");
    }

    #[tokio::test]
    async fn test_six_files_is_bad_request() {
        let mut parts = vec![Part::Text("jobDescription", JD)];
        for _ in 0..6 {
            parts.push(resume("cv.docx"));
        }

        let (status, json, sink, dir) = send(&parts, StubProvider::new(vec![])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("maximum of 5"));
        assert!(sink.costs().is_empty());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_type_is_bad_request() {
        let (status, json, _, _dir) = send(
            &[
                Part::Text("jobDescription", JD),
                Part::File("notes.txt", "text/plain", b"Jane Doe".to_vec()),
            ],
            StubProvider::new(vec![]),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("txt"));
    }

    #[tokio::test]
    async fn test_malformed_provider_output_is_bad_gateway() {
        let provider = StubProvider::replying("not json".to_string(), 400);
        let (status, json, sink, _dir) =
            send(&[Part::Text("jobDescription", JD), resume("jane.docx")], provider).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"], "Failed to analyze resume");
        assert_eq!(sink.costs().len(), 1, "spend is logged even when parsing fails");
        assert_eq!(sink.batches()[0].number_of_resumes_assessed, 0);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_json_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(
            dir.path(),
            Arc::new(StubProvider::new(vec![])),
            Arc::new(MemoryAuditSink::default()),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/analyze/upload")
            .body(Body::empty())
            .unwrap();

        let response = build_router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(!json["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_json_payload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(
            dir.path(),
            Arc::new(StubProvider::new(vec![])),
            Arc::new(MemoryAuditSink::default()),
        );
        state.config.max_upload_bytes = 1024;
        let request = upload_request(&[
            Part::Text("jobDescription", JD),
            Part::File("big.pdf", "application/pdf", vec![b'x'; 64 * 1024]),
        ]);

        let response = build_router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["error"].is_string());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_resolve_caller_bounds_oversized_headers() {
        let mut headers = HeaderMap::new();
        let long_agent = "A".repeat(2_000);
        headers.insert(USER_AGENT, HeaderValue::from_str(&long_agent).unwrap());
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_str(&"9".repeat(80)).unwrap(),
        );

        let caller = resolve_caller(&headers, None);

        assert_eq!(caller.user_agent.len(), 1024);
        assert_eq!(caller.ip_address.len(), 45);
    }

    #[test]
    fn test_resolve_caller_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 198.51.100.7 , 10.0.0.2"));
        let caller = resolve_caller(&headers, Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert_eq!(caller.ip_address, "198.51.100.7");
        assert_eq!(caller.user_agent, "Unknown");
    }

    #[test]
    fn test_resolve_caller_maps_ipv6_loopback() {
        let caller = resolve_caller(&HeaderMap::new(), Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert_eq!(caller.ip_address, "127.0.0.1");
    }

    #[test]
    fn test_resolve_caller_without_any_address() {
        let caller = resolve_caller(&HeaderMap::new(), None);
        assert_eq!(caller.ip_address, "Unknown");
    }
}
