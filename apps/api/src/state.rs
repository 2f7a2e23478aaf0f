use std::sync::Arc;

use crate::config::Config;
use crate::screening::audit::AuditLogger;
use crate::screening::batch::BatchOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<BatchOrchestrator>,
    /// Same logger the scorer and orchestrator write through; read by /health.
    pub audit: AuditLogger,
}

/// State wired to an in-process provider and audit sink.
#[cfg(test)]
pub(crate) fn test_state(
    upload_dir: &std::path::Path,
    provider: Arc<dyn crate::llm_client::CompletionProvider>,
    sink: Arc<dyn crate::screening::audit::AuditSink>,
) -> AppState {
    use std::time::Duration;

    use crate::screening::batch::BatchPolicy;
    use crate::screening::scorer::LlmFitmentScorer;

    let config = Config {
        database_url: "postgres://localhost/screener_test".to_string(),
        llm_api_key: "test-key".to_string(),
        llm_api_url: "http://localhost/v1/chat/completions".to_string(),
        llm_model: "gpt-4".to_string(),
        llm_timeout: Duration::from_secs(5),
        llm_temperature: 0.3,
        cost_usd_per_token: 0.000002,
        usd_to_inr_rate: 90.0,
        batch_policy: BatchPolicy::AllOrNothing,
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes: 10 * 1024 * 1024,
        port: 0,
        rust_log: "debug".to_string(),
    };

    let audit = AuditLogger::new(sink);
    let scorer = Arc::new(LlmFitmentScorer::new(provider, config.pricing(), audit.clone()));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        scorer,
        audit.clone(),
        config.batch_policy,
    ));

    AppState {
        config,
        orchestrator,
        audit,
    }
}
