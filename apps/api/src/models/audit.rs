use chrono::{DateTime, Utc};
use serde::Serialize;

/// Feature tag written on every cost row produced by resume screening.
pub const RESUME_ANALYSIS_FEATURE: &str = "resume-analysis";

// Column widths of `resume_analysis_log`, in characters.
pub const IP_ADDRESS_MAX_CHARS: usize = 45;
pub const EMAIL_MAX_CHARS: usize = 255;
pub const PAGE_MAX_CHARS: usize = 255;
pub const USER_AGENT_MAX_CHARS: usize = 1024;

/// Who triggered a pipeline run, as seen by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerContext {
    pub ip_address: String,
    pub user_agent: String,
}

impl CallerContext {
    /// Cuts client-supplied values to the audit column widths.
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: truncate_chars(ip_address.into(), IP_ADDRESS_MAX_CHARS),
            user_agent: truncate_chars(user_agent.into(), USER_AGENT_MAX_CHARS),
        }
    }
}

/// One row of `ai_cost_log`: the spend of a single provider call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    pub feature: String,
    pub token_size: u64,
    pub cost_usd: f64,
    pub cost_inr: f64,
    pub ip_address: String,
    pub user_agent: String,
    pub date: DateTime<Utc>,
}

/// One row of `resume_analysis_log`: usage summary for a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAuditRecord {
    pub ip_address: String,
    pub user_agent: String,
    pub date: DateTime<Utc>,
    pub number_of_resumes_assessed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

impl BatchAuditRecord {
    /// Stamps the row with the current time and bounds every free-text column.
    pub fn new(
        caller: &CallerContext,
        number_of_resumes_assessed: u32,
        email: Option<String>,
        page: Option<String>,
    ) -> Self {
        Self {
            ip_address: truncate_chars(caller.ip_address.clone(), IP_ADDRESS_MAX_CHARS),
            user_agent: truncate_chars(caller.user_agent.clone(), USER_AGENT_MAX_CHARS),
            date: Utc::now(),
            number_of_resumes_assessed,
            email: email.map(|e| truncate_chars(e, EMAIL_MAX_CHARS)),
            page: page.map(|p| truncate_chars(p, PAGE_MAX_CHARS)),
        }
    }
}

/// Cuts `value` to at most `max` characters, never inside a UTF-8 sequence.
fn truncate_chars(mut value: String, max: usize) -> String {
    if let Some((end, _)) = value.char_indices().nth(max) {
        value.truncate(end);
    }
    value
}
