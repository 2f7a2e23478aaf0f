use chrono::Utc;

use crate::models::audit::{CallerContext, CostRecord, RESUME_ANALYSIS_FEATURE};

/// Fixed-rate pricing for provider calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub usd_per_token: f64,
    pub usd_to_inr: f64,
}

impl Pricing {
    /// Returns `(cost_usd, cost_inr)` for a token count.
    pub fn cost_for(&self, tokens: u64) -> (f64, f64) {
        let usd = tokens as f64 * self.usd_per_token;
        (usd, usd * self.usd_to_inr)
    }

    /// Builds the cost row for one resume-analysis call.
    pub fn cost_record(&self, tokens: u64, caller: &CallerContext) -> CostRecord {
        let (cost_usd, cost_inr) = self.cost_for(tokens);
        CostRecord {
            feature: RESUME_ANALYSIS_FEATURE.to_string(),
            token_size: tokens,
            cost_usd,
            cost_inr,
            ip_address: caller.ip_address.clone(),
            user_agent: caller.user_agent.clone(),
            date: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICING: Pricing = Pricing {
        usd_per_token: 0.000001,
        usd_to_inr: 90.0,
    };

    fn caller() -> CallerContext {
        CallerContext {
            ip_address: "10.0.0.7".to_string(),
            user_agent: "curl/8.5".to_string(),
        }
    }

    #[test]
    fn test_cost_is_linear_in_tokens() {
        let (usd, inr) = PRICING.cost_for(2_000);
        assert!((usd - 0.002).abs() < 1e-12);
        assert!((inr - 0.18).abs() < 1e-9);
    }

    #[test]
    fn test_zero_tokens_cost_nothing() {
        assert_eq!(PRICING.cost_for(0), (0.0, 0.0));
    }

    #[test]
    fn test_recomputing_cost_is_stable() {
        let first = PRICING.cost_for(1_234);
        let second = PRICING.cost_for(1_234);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cost_record_carries_caller_and_feature() {
        let record = PRICING.cost_record(500, &caller());
        assert_eq!(record.feature, "resume-analysis");
        assert_eq!(record.token_size, 500);
        assert_eq!(record.ip_address, "10.0.0.7");
        assert_eq!(record.user_agent, "curl/8.5");
        assert_eq!(record.cost_usd, 500.0 * PRICING.usd_per_token);
    }
}
