//! API key validation and the daily quota state machine.
//!
//! The quota itself is a counter-and-branch: roll the counter at the day
//! boundary, compare it against the configured limit, and flip the key
//! inactive at the boundary. The decision is factored into [`evaluate_key`]
//! (pure, unit-testable) while the repository performs the matching state
//! transitions with single-statement atomic updates.
//!
//! Note: only the configured global cap is enforced here. The per-key
//! `rate_limit_daily` column that the dashboard writes is intentionally not
//! consulted, matching the observed behavior this service replaces.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use crate::{
    api::models::users::CurrentUser,
    config::Config,
    crypto,
    db::{
        errors::DbError,
        handlers::{ApiKeys, Users, repository::Repository},
        models::api_keys::ApiKeyDBResponse,
    },
    errors::{Error, Result},
    types::abbrev_uuid,
};

/// Outcome of the pure key check, before any state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGate {
    /// Key has been revoked (manually or by a previous quota breach)
    Revoked,
    /// Key is past its expiry timestamp
    Expired,
    /// Administrative key: usage is recorded but never counted against a quota
    AdminBypass,
    /// Non-admin key with quota remaining today
    Allowed,
    /// Non-admin key at or over the daily limit
    Exhausted,
}

/// Evaluate a key record against the clock and the configured daily limit.
///
/// Revocation and expiry are checked before anything else, so a revoked key
/// is rejected even when its counters would otherwise permit the request.
/// A `quota_date` behind `today` means the counter has not been rolled yet
/// and is treated as zero.
pub fn evaluate_key(key: &ApiKeyDBResponse, now: DateTime<Utc>, today: NaiveDate, daily_limit: i32) -> KeyGate {
    if !key.is_active {
        return KeyGate::Revoked;
    }
    if let Some(expires_at) = key.expires_at
        && expires_at <= now
    {
        return KeyGate::Expired;
    }
    if key.is_admin {
        return KeyGate::AdminBypass;
    }

    let requests_today = if key.quota_date < today { 0 } else { key.requests_today };
    if requests_today >= daily_limit {
        KeyGate::Exhausted
    } else {
        KeyGate::Allowed
    }
}

/// Authenticate a presented API key and charge the daily quota.
///
/// The plaintext is hashed and looked up; the resulting record runs through
/// [`evaluate_key`] and the corresponding transition is applied:
/// admin keys record usage only, allowed keys consume one unit of quota, and
/// an exhausted key is flipped inactive before the request is rejected.
#[instrument(skip_all, err)]
pub async fn authenticate_api_key(db: &PgPool, config: &Config, presented_key: &str) -> Result<CurrentUser> {
    let key_hash = crypto::hash_api_key(presented_key);

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut keys = ApiKeys::new(&mut conn);

    let Some(key) = keys.find_by_hash(&key_hash).await? else {
        return Err(Error::Unauthenticated {
            message: Some("Invalid API key".to_string()),
        });
    };

    let now = Utc::now();
    let today = now.date_naive();
    let limit = config.gateway.daily_request_limit;

    match evaluate_key(&key, now, today, limit) {
        KeyGate::Revoked => Err(Error::Unauthenticated {
            message: Some("API key has been revoked".to_string()),
        }),
        KeyGate::Expired => Err(Error::Unauthenticated {
            message: Some("API key has expired".to_string()),
        }),
        KeyGate::AdminBypass => {
            keys.record_usage(key.id).await?;
            resolve_key_owner(&mut conn, &key).await
        }
        KeyGate::Allowed => {
            keys.reset_quota_if_stale(key.id, today).await?;
            // The conditional increment can still lose a race against a
            // concurrent request on the same key; treat that as exhaustion.
            if keys.try_consume_quota(key.id, limit).await? {
                resolve_key_owner(&mut conn, &key).await
            } else {
                keys.deactivate(key.id).await?;
                warn!("API key {} hit the daily limit and was deactivated", abbrev_uuid(&key.id));
                Err(Error::QuotaExceeded { limit })
            }
        }
        KeyGate::Exhausted => {
            keys.deactivate(key.id).await?;
            warn!("API key {} hit the daily limit and was deactivated", abbrev_uuid(&key.id));
            Err(Error::QuotaExceeded { limit })
        }
    }
}

/// Load the key's owning user as the request identity.
async fn resolve_key_owner(conn: &mut sqlx::PgConnection, key: &ApiKeyDBResponse) -> Result<CurrentUser> {
    let mut users = Users::new(conn);
    let user = users
        .get_by_id(key.user_id)
        .await?
        .ok_or(Error::Database(DbError::NotFound))?;

    debug!("API key {} authenticated as user {}", abbrev_uuid(&key.id), abbrev_uuid(&user.id));
    Ok(CurrentUser::from(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn key_record(is_active: bool, is_admin: bool, requests_today: i32, quota_date: NaiveDate) -> ApiKeyDBResponse {
        ApiKeyDBResponse {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "test".to_string(),
            key_prefix: "ozk_testtest".to_string(),
            is_admin,
            scopes: vec![],
            rate_limit_daily: 10000,
            requests_today,
            quota_date,
            requests_total: requests_today as i64,
            last_used_at: None,
            is_active,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_revoked_key_rejected_before_anything_else() {
        let now = Utc::now();
        let today = now.date_naive();

        // Even an admin key with quota to spare is rejected once revoked
        let mut key = key_record(false, true, 0, today);
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::Revoked);

        key.is_admin = false;
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::Revoked);
    }

    #[test]
    fn test_expired_key_rejected_before_role_logic() {
        let now = Utc::now();
        let today = now.date_naive();

        let mut key = key_record(true, true, 0, today);
        key.expires_at = Some(now - Duration::seconds(1));
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::Expired);

        // A future expiry is fine
        key.expires_at = Some(now + Duration::days(30));
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::AdminBypass);
    }

    #[test]
    fn test_admin_key_never_subject_to_quota() {
        let now = Utc::now();
        let today = now.date_naive();

        // Counter far past any limit - admin keys bypass the check entirely
        let key = key_record(true, true, 1_000_000, today);
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::AdminBypass);
    }

    #[test]
    fn test_quota_boundary() {
        let now = Utc::now();
        let today = now.date_naive();

        let key = key_record(true, false, 99, today);
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::Allowed);

        let key = key_record(true, false, 100, today);
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::Exhausted);
    }

    #[test]
    fn test_stale_quota_date_counts_as_zero() {
        let now = Utc::now();
        let today = now.date_naive();
        let yesterday = today - Duration::days(1);

        // Exhausted yesterday, but the day rolled over
        let key = key_record(true, false, 100, yesterday);
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::Allowed);
    }

    #[test]
    fn test_stored_rate_limit_daily_is_ignored() {
        let now = Utc::now();
        let today = now.date_naive();

        // The key row claims a 10000/day allowance, but the gateway enforces
        // the configured cap. This mirrors the dashboard/server discrepancy
        // the service was specified with.
        let mut key = key_record(true, false, 100, today);
        key.rate_limit_daily = 10000;
        assert_eq!(evaluate_key(&key, now, today, 100), KeyGate::Exhausted);
    }
}
