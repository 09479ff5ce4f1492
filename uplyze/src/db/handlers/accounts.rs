//! Database repository for managed accounts.

use crate::types::{AccountId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::accounts::{AccountCreateDBRequest, AccountDBResponse, AccountFilter, AccountStatus, AccountUpdateDBRequest},
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Accounts<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Accounts<'c> {
    type CreateRequest = AccountCreateDBRequest;
    type UpdateRequest = AccountUpdateDBRequest;
    type Response = AccountDBResponse;
    type Id = AccountId;
    type Filter = AccountFilter;

    #[instrument(skip(self, request), fields(handle = %request.handle), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            INSERT INTO managed_accounts
                (id, handle, display_name, bio, status, tier, monthly_revenue, subscriber_count, session_credentials, manager_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.handle)
        .bind(&request.display_name)
        .bind(&request.bio)
        .bind(request.status)
        .bind(request.tier)
        .bind(request.monthly_revenue)
        .bind(request.subscriber_count)
        .bind(&request.session_credentials)
        .bind(request.manager_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let account = sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM managed_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(account)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        // Substring search matches handle or display name, case-insensitive
        let search = filter.search.as_ref().map(|s| format!("%{}%", s.to_lowercase()));

        let accounts = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            SELECT * FROM managed_accounts
            WHERE ($1::account_status IS NULL OR status = $1)
              AND ($2::account_tier IS NULL OR tier = $2)
              AND ($3::text IS NULL OR LOWER(handle) LIKE $3 OR LOWER(display_name) LIKE $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.status)
        .bind(filter.tier)
        .bind(search)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(accounts)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM managed_accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            UPDATE managed_accounts SET
                display_name = COALESCE($2, display_name),
                bio = COALESCE($3, bio),
                status = COALESCE($4, status),
                tier = COALESCE($5, tier),
                monthly_revenue = COALESCE($6, monthly_revenue),
                subscriber_count = COALESCE($7, subscriber_count),
                session_credentials = COALESCE($8, session_credentials),
                manager_id = COALESCE($9, manager_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .bind(&request.bio)
        .bind(request.status)
        .bind(request.tier)
        .bind(request.monthly_revenue)
        .bind(request.subscriber_count)
        .bind(&request.session_credentials)
        .bind(request.manager_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(account)
    }
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Status transition used by the pause/activate admin actions.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id), ?status), err)]
    pub async fn set_status(&mut self, id: AccountId, status: AccountStatus) -> Result<AccountDBResponse> {
        let account =
            sqlx::query_as::<_, AccountDBResponse>("UPDATE managed_accounts SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(status)
                .fetch_optional(&mut *self.db)
                .await?
                .ok_or(DbError::NotFound)?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::db::models::accounts::AccountTier;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    fn create_request(handle: &str) -> AccountCreateDBRequest {
        AccountCreateDBRequest {
            handle: handle.to_string(),
            display_name: format!("Creator {handle}"),
            bio: None,
            status: AccountStatus::Onboarding,
            tier: AccountTier::Standard,
            monthly_revenue: Decimal::ZERO,
            subscriber_count: 0,
            session_credentials: None,
            manager_id: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_create_and_get(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        let created = repo.create(&create_request("luna.creates")).await.unwrap();
        assert_eq!(created.status, AccountStatus::Onboarding);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.handle, "luna.creates");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_duplicate_handle_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        repo.create(&create_request("dupe")).await.unwrap();
        let err = repo.create(&create_request("dupe")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_list_filters_by_status_and_search(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        let a = repo.create(&create_request("alpha.fit")).await.unwrap();
        repo.create(&create_request("beta.food")).await.unwrap();
        repo.set_status(a.id, AccountStatus::Active).await.unwrap();

        let active_only = repo
            .list(&AccountFilter {
                status: Some(AccountStatus::Active),
                skip: 0,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active_only.len(), 1);
        assert_eq!(active_only[0].handle, "alpha.fit");

        let searched = repo
            .list(&AccountFilter {
                search: Some("BETA".to_string()),
                skip: 0,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].handle, "beta.food");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_pause_transition(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Accounts::new(&mut conn);

        let account = repo.create(&create_request("pausable")).await.unwrap();
        let paused = repo.set_status(account.id, AccountStatus::Paused).await.unwrap();
        assert_eq!(paused.status, AccountStatus::Paused);

        let missing = repo.set_status(Uuid::new_v4(), AccountStatus::Paused).await;
        assert!(matches!(missing.unwrap_err(), DbError::NotFound));
    }
}
