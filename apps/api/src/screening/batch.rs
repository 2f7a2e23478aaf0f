//! Batch Orchestrator: drives extraction and scoring for 1..=5 uploads.
//!
//! Flow: validate batch → for each file in submission order: read → extract →
//!       delete temp file → score → collect outcome → write one audit row.
//!
//! Files are processed strictly one after another. File i+1 is not read until
//! file i has been scored or has failed, which bounds provider load per caller
//! and keeps the cost log in submission order.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::audit::{BatchAuditRecord, CallerContext};
use crate::screening::analysis::{AnalyzedResume, FitmentAnalysis};
use crate::screening::audit::AuditLogger;
use crate::screening::extractor::{extract_text, DocumentFormat};
use crate::screening::scorer::FitmentScorer;
use crate::screening::upload::UploadedDocument;

pub const MAX_FILES_PER_BATCH: usize = 5;

/// What to do when one file in a batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Stop at the first failure and return it; no partial results.
    #[default]
    AllOrNothing,
    /// Attempt every file; report failures next to the successful analyses.
    BestEffort,
}

impl FromStr for BatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all_or_nothing" => Ok(BatchPolicy::AllOrNothing),
            "best_effort" => Ok(BatchPolicy::BestEffort),
            other => Err(format!(
                "unknown batch policy '{other}' (expected all_or_nothing or best_effort)"
            )),
        }
    }
}

/// One client-submitted batch.
pub struct BatchRequest {
    pub files: Vec<UploadedDocument>,
    pub job_description: String,
    pub caller: CallerContext,
    pub email: Option<String>,
    pub page: Option<String>,
}

/// Why a single file produced no analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub file_name: String,
    pub kind: &'static str,
    pub error: String,
}

impl FileFailure {
    fn new(file_name: String, err: &PipelineError) -> Self {
        Self {
            file_name,
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Analyzed(AnalyzedResume),
    Failed(FileFailure),
}

/// Per-file outcomes in submission order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchOutcome {
    pub fn analyzed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Analyzed(_)))
            .count()
    }

    /// Splits into (analyses, failures), each still in submission order.
    pub fn into_parts(self) -> (Vec<AnalyzedResume>, Vec<FileFailure>) {
        let mut analyses = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                FileOutcome::Analyzed(a) => analyses.push(a),
                FileOutcome::Failed(f) => failures.push(f),
            }
        }
        (analyses, failures)
    }
}

pub struct BatchOrchestrator {
    scorer: Arc<dyn FitmentScorer>,
    audit: AuditLogger,
    policy: BatchPolicy,
}

impl BatchOrchestrator {
    pub fn new(scorer: Arc<dyn FitmentScorer>, audit: AuditLogger, policy: BatchPolicy) -> Self {
        Self {
            scorer,
            audit,
            policy,
        }
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Runs a batch end to end.
    ///
    /// Constraint and format violations are rejected before any file is read,
    /// and nothing is logged for them. Every batch that passes validation gets
    /// exactly one audit row, including batches aborted by `AllOrNothing`.
    pub async fn process_batch(&self, request: BatchRequest) -> Result<BatchOutcome, PipelineError> {
        validate_batch(&request)?;

        let span = info_span!(
            "batch",
            batch_id = %Uuid::new_v4(),
            files = request.files.len(),
            ip = %request.caller.ip_address,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: BatchRequest) -> Result<BatchOutcome, PipelineError> {
        let BatchRequest {
            files,
            job_description,
            caller,
            email,
            page,
        } = request;

        let mut outcome = BatchOutcome::default();
        let mut aborted: Option<PipelineError> = None;
        let mut pending = files.into_iter();

        for document in pending.by_ref() {
            let file_name = document.file_name().to_string();
            match self.process_file(document, &job_description, &caller).await {
                Ok(analysis) => outcome
                    .outcomes
                    .push(FileOutcome::Analyzed(AnalyzedResume { file_name, analysis })),
                Err(err) => {
                    warn!(file = %file_name, kind = err.kind(), "Resume failed: {err}");
                    match self.policy {
                        BatchPolicy::AllOrNothing => {
                            aborted = Some(err);
                            break;
                        }
                        BatchPolicy::BestEffort => outcome
                            .outcomes
                            .push(FileOutcome::Failed(FileFailure::new(file_name, &err))),
                    }
                }
            }
        }
        // Unprocessed uploads are deleted here, before the audit write
        drop(pending);

        let assessed = outcome.analyzed_count();
        self.audit
            .record_batch(&BatchAuditRecord::new(
                &caller,
                assessed as u32,
                email,
                page,
            ))
            .await;

        match aborted {
            Some(err) => Err(err),
            None => {
                info!(
                    "Batch complete: {} analyzed, {} failed",
                    assessed,
                    outcome.outcomes.len() - assessed
                );
                Ok(outcome)
            }
        }
    }

    async fn process_file(
        &self,
        document: UploadedDocument,
        job_description: &str,
        caller: &CallerContext,
    ) -> Result<FitmentAnalysis, PipelineError> {
        let file_name = document.file_name().to_string();
        let content_type = document.content_type().map(str::to_string);

        let extracted = match document.read_bytes().await {
            Ok(bytes) => {
                let name = file_name.clone();
                tokio::task::spawn_blocking(move || {
                    extract_text(&bytes, &name, content_type.as_deref())
                })
                .await
                .unwrap_or_else(|e| {
                    Err(PipelineError::ExtractionFailed {
                        filename: file_name.clone(),
                        source: anyhow!("extraction task failed: {e}"),
                    })
                })
            }
            Err(e) => Err(PipelineError::ExtractionFailed {
                filename: file_name.clone(),
                source: anyhow::Error::new(e).context("failed to read spooled upload"),
            }),
        };
        // The upload is gone before the provider is called, whatever happened above
        document.discard();

        let extracted = extracted?;
        info!(
            file = %file_name,
            chars = extracted.text.len(),
            "Extracted resume text"
        );

        let scored = self
            .scorer
            .score(&extracted.text, job_description, caller)
            .await?;
        info!(
            file = %file_name,
            tokens = scored.cost.token_size,
            cost_usd = scored.cost.cost_usd,
            "Scored resume"
        );
        Ok(scored.analysis)
    }
}

fn validate_batch(request: &BatchRequest) -> Result<(), PipelineError> {
    if request.files.is_empty() {
        return Err(PipelineError::BatchConstraintViolation(
            "No files uploaded".to_string(),
        ));
    }
    if request.files.len() > MAX_FILES_PER_BATCH {
        return Err(PipelineError::BatchConstraintViolation(format!(
            "You can upload a maximum of {MAX_FILES_PER_BATCH} resumes at a time."
        )));
    }
    if request.job_description.trim().is_empty() {
        return Err(PipelineError::BatchConstraintViolation(
            "Job description is required".to_string(),
        ));
    }
    for document in &request.files {
        DocumentFormat::resolve(document.file_name(), document.content_type())?;
    }
    Ok(())
}
