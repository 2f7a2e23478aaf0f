//! Fitment Scorer: pluggable, trait-based scorer for one resume against one JD.
//!
//! `LlmFitmentScorer` builds the prompt, makes one provider call, logs the
//! spend, then validates the completion. The cost row is written as soon as the
//! provider answers, so a response that later fails validation is still billed
//! in the audit log.
//!
//! The orchestrator holds an `Arc<dyn FitmentScorer>`.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::llm_client::{CompletionProvider, LlmError};
use crate::models::audit::{CallerContext, CostRecord};
use crate::screening::analysis::{parse_analysis, unsupported_matched_skills, FitmentAnalysis};
use crate::screening::audit::AuditLogger;
use crate::screening::pricing::Pricing;
use crate::screening::prompts::{build_fitment_prompt, FITMENT_SYSTEM};

/// Result of one successful scoring call.
#[derive(Debug, Clone)]
pub struct ScoredResume {
    pub analysis: FitmentAnalysis,
    pub cost: CostRecord,
}

#[async_trait]
pub trait FitmentScorer: Send + Sync {
    async fn score(
        &self,
        resume_text: &str,
        job_description: &str,
        caller: &CallerContext,
    ) -> Result<ScoredResume, PipelineError>;
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(limit) => PipelineError::ScoringUnavailable {
                message: format!("Request timed out after {}s", limit.as_secs()),
                timed_out: true,
            },
            LlmError::Api { message, .. } => PipelineError::unavailable(message),
            LlmError::Http(e) => PipelineError::unavailable(e.to_string()),
        }
    }
}

pub struct LlmFitmentScorer {
    provider: Arc<dyn CompletionProvider>,
    pricing: Pricing,
    audit: AuditLogger,
}

impl LlmFitmentScorer {
    pub fn new(provider: Arc<dyn CompletionProvider>, pricing: Pricing, audit: AuditLogger) -> Self {
        Self {
            provider,
            pricing,
            audit,
        }
    }
}

#[async_trait]
impl FitmentScorer for LlmFitmentScorer {
    async fn score(
        &self,
        resume_text: &str,
        job_description: &str,
        caller: &CallerContext,
    ) -> Result<ScoredResume, PipelineError> {
        if resume_text.trim().is_empty() {
            return Err(PipelineError::ExtractionFailed {
                filename: "resume".to_string(),
                source: anyhow!("resume text is empty"),
            });
        }

        let prompt = build_fitment_prompt(resume_text, job_description);
        let completion = self.provider.complete(&prompt, FITMENT_SYSTEM).await?;

        let cost = self.pricing.cost_record(completion.total_tokens, caller);
        self.audit.record_cost(&cost).await;
        info!(
            tokens = cost.token_size,
            cost_usd = cost.cost_usd,
            "Scoring call completed"
        );

        let analysis = parse_analysis(&completion.text)?;

        let drift = unsupported_matched_skills(&analysis, resume_text);
        if !drift.is_empty() {
            warn!("Matched skills not found verbatim in resume: {drift:?}");
        }

        Ok(ScoredResume { analysis, cost })
    }
}
