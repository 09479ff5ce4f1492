//! Customer insight heuristics.
//!
//! Every function in this module is a pure, deterministic formula over numbers
//! already fetched from the database: fixed coefficients, threshold-based
//! labels, outputs clamped to their declared bounds. Identical inputs always
//! produce identical outputs - the insights endpoint relies on that to cache
//! reports safely.

pub mod narrative;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Spender tier labels, from heaviest to lightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpenderTier {
    Whale,
    BigSpender,
    Regular,
    Occasional,
    Dormant,
}

/// Churn risk labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChurnRisk {
    Low,
    Medium,
    High,
    Critical,
}

/// Inputs for the engagement score, aggregated over a 30-day window.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementInputs {
    pub profile_views: i64,
    pub interactions: i64,
    pub followers: i64,
    pub posts: i64,
}

/// Weighted engagement score in `0..=100`.
///
/// Interaction rate carries half the weight, posting cadence 30%, and the
/// view-to-follower ratio the remaining 20%. An account with no followers
/// scores only on cadence.
pub fn engagement_score(inputs: &EngagementInputs) -> f64 {
    let (interaction_rate, view_ratio) = if inputs.followers > 0 {
        let followers = inputs.followers as f64;
        (
            (inputs.interactions as f64 / followers / 0.10).min(1.0),
            (inputs.profile_views as f64 / followers).min(1.0),
        )
    } else {
        (0.0, 0.0)
    };
    let cadence = (inputs.posts as f64 / 20.0).min(1.0);

    let score = 50.0 * interaction_rate + 30.0 * cadence + 20.0 * view_ratio;
    score.clamp(0.0, 100.0)
}

/// Estimated monthly earnings for a creator account.
///
/// Subscribers x price, scaled by an engagement bucket multiplier. Bucketed
/// rather than continuous so the money math stays in `Decimal`.
pub fn estimated_earnings(subscriber_count: i64, subscription_price: Decimal, engagement: f64) -> Decimal {
    let multiplier = if engagement >= 75.0 {
        Decimal::new(125, 2) // 1.25
    } else if engagement >= 50.0 {
        Decimal::ONE
    } else if engagement >= 25.0 {
        Decimal::new(80, 2) // 0.80
    } else {
        Decimal::new(60, 2) // 0.60
    };

    (Decimal::from(subscriber_count) * subscription_price * multiplier).round_dp(2)
}

/// A traffic source with its share of total visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrafficSource {
    pub source: String,
    pub visits: i64,
    /// Share of total visits, `0..=100` with one decimal place.
    pub share_pct: f64,
}

/// Per-source percentage breakdown of visit counts.
///
/// Sources with zero or negative counts are dropped; an empty or all-zero
/// input yields an empty breakdown.
pub fn traffic_insights(sources: &[(String, i64)]) -> Vec<TrafficSource> {
    let total: i64 = sources.iter().map(|(_, visits)| (*visits).max(0)).sum();
    if total == 0 {
        return Vec::new();
    }

    sources
        .iter()
        .filter(|(_, visits)| *visits > 0)
        .map(|(source, visits)| TrafficSource {
            source: source.clone(),
            visits: *visits,
            share_pct: ((*visits as f64 / total as f64) * 1000.0).round() / 10.0,
        })
        .collect()
}

/// Inputs for the spender score.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpendingInputs {
    pub total_spent: Decimal,
    pub purchase_count: i64,
    /// Days since the most recent purchase; `None` when there is none.
    pub days_since_last_purchase: Option<i64>,
}

/// Recency/frequency/monetary spender score in `0..=100`.
///
/// Monetary value carries half the weight (saturating at 1000 credits spent),
/// purchase frequency 30% (saturating at 20 purchases), recency the rest.
pub fn spender_score(inputs: &SpendingInputs) -> f64 {
    let monetary = (inputs.total_spent.to_f64().unwrap_or(0.0).max(0.0) / 1000.0).min(1.0);
    let frequency = (inputs.purchase_count.max(0) as f64 / 20.0).min(1.0);
    let recency = match inputs.days_since_last_purchase {
        Some(days) => 1.0 - (days.max(0) as f64 / 90.0).min(1.0),
        None => 0.0,
    };

    let score = 50.0 * monetary + 30.0 * frequency + 20.0 * recency;
    score.clamp(0.0, 100.0)
}

/// Tier label for a spender score.
pub fn spender_tier(score: f64) -> SpenderTier {
    if score >= 80.0 {
        SpenderTier::Whale
    } else if score >= 60.0 {
        SpenderTier::BigSpender
    } else if score >= 35.0 {
        SpenderTier::Regular
    } else if score >= 15.0 {
        SpenderTier::Occasional
    } else {
        SpenderTier::Dormant
    }
}

/// Inputs for the churn risk score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChurnInputs {
    /// Days since last login; `None` when the customer never logged in.
    pub days_since_login: Option<i64>,
    /// Days since last purchase; `None` when there is none.
    pub days_since_purchase: Option<i64>,
    pub balance: Decimal,
}

/// Churn risk score in `0..=100`. Higher is worse.
pub fn churn_score(inputs: &ChurnInputs) -> f64 {
    let login = match inputs.days_since_login {
        Some(days) => (days.max(0) as f64 / 90.0).min(1.0),
        None => 1.0,
    };
    let purchase = match inputs.days_since_purchase {
        Some(days) => (days.max(0) as f64 / 120.0).min(1.0),
        None => 1.0,
    };
    // An empty wallet is one less reason to come back
    let balance = if inputs.balance <= Decimal::ZERO { 1.0 } else { 0.0 };

    let score = 60.0 * login + 30.0 * purchase + 10.0 * balance;
    score.clamp(0.0, 100.0)
}

/// Risk label for a churn score.
///
/// More than 90 days without a login (or no login at all) is always Critical,
/// whatever the composite score says.
pub fn churn_risk(inputs: &ChurnInputs, score: f64) -> ChurnRisk {
    if inputs.days_since_login.is_none_or(|days| days > 90) {
        return ChurnRisk::Critical;
    }

    if score >= 75.0 {
        ChurnRisk::Critical
    } else if score >= 50.0 {
        ChurnRisk::High
    } else if score >= 25.0 {
        ChurnRisk::Medium
    } else {
        ChurnRisk::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_engagement_score_bounds_and_determinism() {
        let cases = [
            EngagementInputs::default(),
            EngagementInputs {
                profile_views: 100_000,
                interactions: 1_000_000,
                followers: 10,
                posts: 500,
            },
            EngagementInputs {
                profile_views: 1200,
                interactions: 450,
                followers: 9000,
                posts: 12,
            },
        ];

        for inputs in &cases {
            let score = engagement_score(inputs);
            assert!((0.0..=100.0).contains(&score), "score {score} out of bounds for {inputs:?}");
            assert_eq!(score, engagement_score(inputs), "score must be deterministic");
        }
    }

    #[test]
    fn test_engagement_score_no_followers_scores_cadence_only() {
        let inputs = EngagementInputs {
            profile_views: 500,
            interactions: 500,
            followers: 0,
            posts: 20,
        };
        // 30% cadence weight, fully saturated
        assert_eq!(engagement_score(&inputs), 30.0);
    }

    #[test]
    fn test_estimated_earnings_buckets() {
        let price = Decimal::new(999, 2); // 9.99

        let high = estimated_earnings(1000, price, 80.0);
        let mid = estimated_earnings(1000, price, 60.0);
        let low = estimated_earnings(1000, price, 10.0);

        assert_eq!(high, Decimal::new(1248750, 2)); // 9990 * 1.25
        assert_eq!(mid, Decimal::new(999000, 2));
        assert_eq!(low, Decimal::new(599400, 2)); // 9990 * 0.60
        assert!(high > mid && mid > low);
    }

    #[test]
    fn test_traffic_insights_shares_sum_to_about_100() {
        let sources = vec![
            ("instagram".to_string(), 700),
            ("tiktok".to_string(), 200),
            ("direct".to_string(), 100),
        ];

        let breakdown = traffic_insights(&sources);
        assert_eq!(breakdown.len(), 3);
        let total: f64 = breakdown.iter().map(|s| s.share_pct).sum();
        assert!((total - 100.0).abs() < 0.5, "shares summed to {total}");
        assert_eq!(breakdown[0].share_pct, 70.0);
    }

    #[test]
    fn test_traffic_insights_empty_and_zero() {
        assert!(traffic_insights(&[]).is_empty());
        assert!(traffic_insights(&[("direct".to_string(), 0)]).is_empty());
    }

    #[test]
    fn test_spender_score_bounds() {
        let cases = [
            SpendingInputs::default(),
            SpendingInputs {
                total_spent: Decimal::from(1_000_000),
                purchase_count: 10_000,
                days_since_last_purchase: Some(0),
            },
            SpendingInputs {
                total_spent: Decimal::from(250),
                purchase_count: 4,
                days_since_last_purchase: Some(30),
            },
        ];

        for inputs in &cases {
            let score = spender_score(inputs);
            assert!((0.0..=100.0).contains(&score));
            assert_eq!(score, spender_score(inputs));
        }
    }

    #[test]
    fn test_spender_tiers() {
        assert_eq!(spender_tier(95.0), SpenderTier::Whale);
        assert_eq!(spender_tier(65.0), SpenderTier::BigSpender);
        assert_eq!(spender_tier(40.0), SpenderTier::Regular);
        assert_eq!(spender_tier(20.0), SpenderTier::Occasional);
        assert_eq!(spender_tier(5.0), SpenderTier::Dormant);
    }

    #[test]
    fn test_max_spender_is_whale() {
        let inputs = SpendingInputs {
            total_spent: Decimal::from(5000),
            purchase_count: 40,
            days_since_last_purchase: Some(1),
        };
        let score = spender_score(&inputs);
        assert_eq!(spender_tier(score), SpenderTier::Whale);
    }

    #[test]
    fn test_churn_score_bounds() {
        let cases = [
            ChurnInputs::default(),
            ChurnInputs {
                days_since_login: Some(5000),
                days_since_purchase: None,
                balance: Decimal::ZERO,
            },
            ChurnInputs {
                days_since_login: Some(3),
                days_since_purchase: Some(10),
                balance: Decimal::from(50),
            },
        ];

        for inputs in &cases {
            let score = churn_score(inputs);
            assert!((0.0..=100.0).contains(&score));
            assert_eq!(score, churn_score(inputs));
        }
    }

    #[test]
    fn test_churn_critical_past_90_days_regardless_of_score() {
        // Fresh purchase and a funded wallet keep the composite score low,
        // but 91 days without a login is Critical no matter what.
        let inputs = ChurnInputs {
            days_since_login: Some(91),
            days_since_purchase: Some(1),
            balance: Decimal::from(500),
        };
        let score = churn_score(&inputs);
        assert!(score < 75.0);
        assert_eq!(churn_risk(&inputs, score), ChurnRisk::Critical);

        // Never logged in at all is also Critical
        let never = ChurnInputs {
            days_since_login: None,
            days_since_purchase: Some(1),
            balance: Decimal::from(500),
        };
        assert_eq!(churn_risk(&never, churn_score(&never)), ChurnRisk::Critical);
    }

    #[test]
    fn test_churn_labels_for_active_customers() {
        let active = ChurnInputs {
            days_since_login: Some(2),
            days_since_purchase: Some(7),
            balance: Decimal::from(100),
        };
        let score = churn_score(&active);
        assert_eq!(churn_risk(&active, score), ChurnRisk::Low);

        let fading = ChurnInputs {
            days_since_login: Some(60),
            days_since_purchase: Some(110),
            balance: Decimal::ZERO,
        };
        let score = churn_score(&fading);
        assert!(matches!(churn_risk(&fading, score), ChurnRisk::High | ChurnRisk::Critical));
    }
}
