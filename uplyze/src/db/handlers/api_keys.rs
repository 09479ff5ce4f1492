//! Database repository for API keys.
//!
//! Keys are looked up by the SHA-256 hash of the presented plaintext. Usage
//! accounting is a single-statement conditional increment so concurrent
//! requests against the same key cannot push the counter past the limit.

use crate::types::{ApiKeyId, UserId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::api_keys::{ApiKeyCreateDBRequest, ApiKeyDBResponse, ApiKeyUpdateDBRequest},
};
use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing API keys
#[derive(Debug, Clone, Default)]
pub struct ApiKeyFilter {
    pub user_id: Option<UserId>,
    pub skip: i64,
    pub limit: i64,
}

pub struct ApiKeys<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for ApiKeys<'c> {
    type CreateRequest = ApiKeyCreateDBRequest;
    type UpdateRequest = ApiKeyUpdateDBRequest;
    type Response = ApiKeyDBResponse;
    type Id = ApiKeyId;
    type Filter = ApiKeyFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(
            r#"
            INSERT INTO api_keys (id, user_id, name, key_hash, key_prefix, is_admin, scopes, rate_limit_daily, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&request.key_hash)
        .bind(&request.key_prefix)
        .bind(request.is_admin)
        .bind(&request.scopes)
        .bind(request.rate_limit_daily)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(key)
    }

    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>("SELECT * FROM api_keys WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(key)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let keys = sqlx::query_as::<_, ApiKeyDBResponse>(
            r#"
            SELECT * FROM api_keys
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(keys)
    }

    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(key_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(
            r#"
            UPDATE api_keys SET
                name = COALESCE($2, name),
                is_active = COALESCE($3, is_active),
                rate_limit_daily = COALESCE($4, rate_limit_daily)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.is_active)
        .bind(request.rate_limit_daily)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(key)
    }
}

impl<'c> ApiKeys<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a key record by the hash of the presented plaintext.
    ///
    /// Returns the record regardless of its active/expiry state: the gateway
    /// wants to reject a revoked key explicitly rather than treat it as
    /// unknown.
    #[instrument(skip_all, err)]
    pub async fn find_by_hash(&mut self, key_hash: &str) -> Result<Option<ApiKeyDBResponse>> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>("SELECT * FROM api_keys WHERE key_hash = $1")
            .bind(key_hash)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(key)
    }

    /// Reset the daily counter when the stored quota date is behind today.
    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id)), err)]
    pub async fn reset_quota_if_stale(&mut self, id: ApiKeyId, today: NaiveDate) -> Result<()> {
        sqlx::query("UPDATE api_keys SET requests_today = 0, quota_date = $2 WHERE id = $1 AND quota_date < $2")
            .bind(id)
            .bind(today)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Conditionally consume one unit of daily quota.
    ///
    /// The increment only happens while `requests_today` is below `limit`, so
    /// this returns `false` exactly when the key has exhausted its quota.
    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id), limit), err)]
    pub async fn try_consume_quota(&mut self, id: ApiKeyId, limit: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys SET
                requests_today = requests_today + 1,
                requests_total = requests_total + 1,
                last_used_at = NOW()
            WHERE id = $1 AND requests_today < $2
            "#,
        )
        .bind(id)
        .bind(limit)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record usage without a quota check (administrative keys).
    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id)), err)]
    pub async fn record_usage(&mut self, id: ApiKeyId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE api_keys SET
                requests_today = requests_today + 1,
                requests_total = requests_total + 1,
                last_used_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;
        Ok(())
    }

    /// Flip a key inactive. Used by revocation and by the gateway when the
    /// daily quota is breached; reactivation is a manual admin update.
    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id)), err)]
    pub async fn deactivate(&mut self, id: ApiKeyId) -> Result<()> {
        sqlx::query("UPDATE api_keys SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::Users;
    use crate::db::models::users::UserCreateDBRequest;
    use chrono::Utc;
    use sqlx::PgPool;

    async fn create_owner(pool: &PgPool) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);
        users
            .create(&UserCreateDBRequest {
                username: "keyowner".to_string(),
                email: "keyowner@example.com".to_string(),
                display_name: None,
                avatar_url: None,
                is_admin: false,
                roles: vec![Role::Customer],
                auth_source: "native".to_string(),
                password_hash: None,
            })
            .await
            .unwrap()
            .id
    }

    fn create_request(user_id: UserId, hash: &str) -> ApiKeyCreateDBRequest {
        ApiKeyCreateDBRequest {
            user_id,
            name: "test key".to_string(),
            key_hash: hash.to_string(),
            key_prefix: "ozk_abcdefgh".to_string(),
            is_admin: false,
            scopes: vec!["accounts:read".to_string()],
            rate_limit_daily: 10000,
            expires_at: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_create_and_find_by_hash(pool: PgPool) {
        let user_id = create_owner(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiKeys::new(&mut conn);

        let created = repo.create(&create_request(user_id, "hash-1")).await.unwrap();
        assert!(created.is_active);
        assert_eq!(created.requests_today, 0);

        let found = repo.find_by_hash("hash-1").await.unwrap().expect("key should be found by hash");
        assert_eq!(found.id, created.id);

        assert!(repo.find_by_hash("no-such-hash").await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_quota_consumption_stops_at_limit(pool: PgPool) {
        let user_id = create_owner(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo.create(&create_request(user_id, "hash-quota")).await.unwrap();

        // Three units of quota, then a refusal
        for _ in 0..3 {
            assert!(repo.try_consume_quota(key.id, 3).await.unwrap());
        }
        assert!(!repo.try_consume_quota(key.id, 3).await.unwrap());

        let after = repo.get_by_id(key.id).await.unwrap().unwrap();
        assert_eq!(after.requests_today, 3, "refused increment must not bump the counter");
        assert_eq!(after.requests_total, 3);
        assert!(after.last_used_at.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_stale_quota_date_resets_counter(pool: PgPool) {
        let user_id = create_owner(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo.create(&create_request(user_id, "hash-stale")).await.unwrap();

        // Exhaust yesterday's quota
        sqlx::query("UPDATE api_keys SET requests_today = 3, quota_date = CURRENT_DATE - 1 WHERE id = $1")
            .bind(key.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let mut repo = ApiKeys::new(&mut conn);
        let today = Utc::now().date_naive();
        repo.reset_quota_if_stale(key.id, today).await.unwrap();

        let after = repo.get_by_id(key.id).await.unwrap().unwrap();
        assert_eq!(after.requests_today, 0);
        assert_eq!(after.quota_date, today);

        // Resetting again on the same day is a no-op
        assert!(repo.try_consume_quota(key.id, 3).await.unwrap());
        repo.reset_quota_if_stale(key.id, today).await.unwrap();
        let after = repo.get_by_id(key.id).await.unwrap().unwrap();
        assert_eq!(after.requests_today, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_deactivate_and_reactivate(pool: PgPool) {
        let user_id = create_owner(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiKeys::new(&mut conn);

        let key = repo.create(&create_request(user_id, "hash-deact")).await.unwrap();
        repo.deactivate(key.id).await.unwrap();

        let after = repo.get_by_id(key.id).await.unwrap().unwrap();
        assert!(!after.is_active);

        // Manual admin reactivation through the generic update path
        let update = ApiKeyUpdateDBRequest {
            is_active: Some(true),
            ..Default::default()
        };
        let updated = repo.update(key.id, &update).await.unwrap();
        assert!(updated.is_active);
    }
}
