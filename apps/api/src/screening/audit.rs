//! Audit/Cost Logger: append-only sink for cost rows and batch usage rows.
//!
//! `AuditLogger` is what the pipeline calls. It never returns an error: a
//! failed write is logged and counted, and the pipeline carries on with its
//! own result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error};

use crate::models::audit::{BatchAuditRecord, CostRecord};

/// Storage backend for audit rows. Insert-only.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn insert_cost(&self, record: &CostRecord) -> Result<()>;
    async fn insert_batch(&self, record: &BatchAuditRecord) -> Result<()>;
}

/// Writes audit rows to PostgreSQL.
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn insert_cost(&self, record: &CostRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_cost_log
                (feature, token_size, cost_usd, cost_inr, ip_address, user_agent, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.feature)
        .bind(i64::try_from(record.token_size).unwrap_or(i64::MAX))
        .bind(record.cost_usd)
        .bind(record.cost_inr)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(record.date)
        .execute(&self.pool)
        .await
        .context("INSERT into ai_cost_log failed")?;
        Ok(())
    }

    async fn insert_batch(&self, record: &BatchAuditRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resume_analysis_log
                (ip_address, user_agent, date, number_of_resumes_assessed, email, page)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(record.date)
        .bind(i32::try_from(record.number_of_resumes_assessed).unwrap_or(i32::MAX))
        .bind(&record.email)
        .bind(&record.page)
        .execute(&self.pool)
        .await
        .context("INSERT into resume_analysis_log failed")?;
        Ok(())
    }
}

/// Failure-swallowing front for an `AuditSink`. Cheap to clone.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    failures: Arc<AtomicU64>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn record_cost(&self, record: &CostRecord) {
        match self.sink.insert_cost(record).await {
            Ok(()) => debug!(
                "Recorded cost: {} tokens, ${:.6}",
                record.token_size, record.cost_usd
            ),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    tokens = record.token_size,
                    cost_usd = record.cost_usd,
                    "Failed to write cost log: {e:#}"
                );
            }
        }
    }

    pub async fn record_batch(&self, record: &BatchAuditRecord) {
        match self.sink.insert_batch(record).await {
            Ok(()) => debug!(
                "Recorded batch audit: {} resumes assessed",
                record.number_of_resumes_assessed
            ),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    resumes = record.number_of_resumes_assessed,
                    ip = %record.ip_address,
                    "Failed to write batch audit log: {e:#}"
                );
            }
        }
    }

    /// Number of audit writes lost since startup.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}


#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::memory::MemoryAuditSink;
    use super::*;

    fn batch_record() -> BatchAuditRecord {
        BatchAuditRecord {
            ip_address: "127.0.0.1".to_string(),
            user_agent: "Unknown".to_string(),
            date: Utc::now(),
            number_of_resumes_assessed: 2,
            email: Some("recruiter@example.com".to_string()),
            page: None,
        }
    }

    #[tokio::test]
    async fn test_successful_write_reaches_sink() {
        let sink = Arc::new(MemoryAuditSink::default());
        let logger = AuditLogger::new(sink.clone());

        logger.record_batch(&batch_record()).await;

        assert_eq!(sink.batches().len(), 1);
        assert_eq!(logger.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_writes_are_counted_not_raised() {
        let logger = AuditLogger::new(Arc::new(MemoryAuditSink::failing()));

        logger.record_batch(&batch_record()).await;
        logger
            .record_cost(&CostRecord {
                feature: "resume-analysis".to_string(),
                token_size: 10,
                cost_usd: 0.0,
                cost_inr: 0.0,
                ip_address: "127.0.0.1".to_string(),
                user_agent: "Unknown".to_string(),
                date: Utc::now(),
            })
            .await;

        assert_eq!(logger.failure_count(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_the_failure_counter() {
        let logger = AuditLogger::new(Arc::new(MemoryAuditSink::failing()));
        let clone = logger.clone();

        clone.record_batch(&batch_record()).await;

        assert_eq!(logger.failure_count(), 1);
    }
}
