//! Database repository for wallets and the transaction ledger.
//!
//! The ledger is append-only: every event records the balance it left behind,
//! and the wallet row is updated in the same transaction under FOR UPDATE so
//! concurrent events serialize on the row.

use crate::types::{TransactionId, UserId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    models::wallets::{
        CustomerActivityDBResponse, TransactionCreateDBRequest, TransactionDBResponse, TransactionKind, WalletDBResponse,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, PgConnection, Row};
use tracing::instrument;

pub struct Wallets<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Wallets<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fetch a wallet, creating an empty one on first touch.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_or_create(&mut self, user_id: UserId) -> Result<WalletDBResponse> {
        let wallet = sqlx::query_as::<_, WalletDBResponse>(
            r#"
            INSERT INTO wallets (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(wallet)
    }

    /// Current balance; zero when the user has no wallet yet.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_balance(&mut self, user_id: UserId) -> Result<Decimal> {
        let balance = sqlx::query_scalar::<_, Decimal>("SELECT balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(balance.unwrap_or(Decimal::ZERO))
    }

    /// Append a ledger event and move the balance.
    ///
    /// Purchases and grants add, deductions subtract. A deduction that would
    /// drive the balance negative is rejected; the ledger never records one.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), kind = ?request.kind), err)]
    pub async fn create_transaction(&mut self, request: &TransactionCreateDBRequest) -> Result<TransactionDBResponse> {
        if request.amount <= Decimal::ZERO {
            return Err(DbError::CheckViolation {
                constraint: None,
                table: Some("wallet_transactions".to_string()),
                message: "transaction amount must be positive".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        // Ensure the wallet exists, then serialize on its row
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(request.user_id)
            .execute(&mut *tx)
            .await?;

        let balance = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
            .bind(request.user_id)
            .fetch_one(&mut *tx)
            .await?
            .try_get::<Decimal, _>("balance")
            ?;

        let balance_after = match request.kind {
            TransactionKind::Purchase | TransactionKind::Grant => balance + request.amount,
            TransactionKind::Deduction => {
                let next = balance - request.amount;
                if next < Decimal::ZERO {
                    return Err(DbError::CheckViolation {
                        constraint: None,
                        table: Some("wallets".to_string()),
                        message: format!("insufficient balance: {balance} available, {} requested", request.amount),
                    });
                }
                next
            }
        };

        sqlx::query("UPDATE wallets SET balance = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(request.user_id)
            .bind(balance_after)
            .execute(&mut *tx)
            .await?;

        let transaction = sqlx::query_as::<_, TransactionDBResponse>(
            r#"
            INSERT INTO wallet_transactions (user_id, kind, amount, balance_after, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(request.kind)
        .bind(request.amount)
        .bind(balance_after)
        .bind(&request.description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    #[instrument(skip(self), fields(transaction_id = id), err)]
    pub async fn get_transaction(&mut self, id: TransactionId) -> Result<Option<TransactionDBResponse>> {
        let transaction = sqlx::query_as::<_, TransactionDBResponse>("SELECT * FROM wallet_transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(transaction)
    }

    /// Ledger events, newest first. `user_id = None` lists across all users.
    #[instrument(skip(self), err)]
    pub async fn list_transactions(&mut self, user_id: Option<UserId>, skip: i64, limit: i64) -> Result<Vec<TransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, TransactionDBResponse>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(transactions)
    }

    /// Aggregated activity backing the insight formulas.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn customer_activity(&mut self, user_id: UserId) -> Result<CustomerActivityDBResponse> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(w.balance, 0) AS balance,
                COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'purchase'), 0) AS total_spent,
                COUNT(t.id) FILTER (WHERE t.kind = 'purchase') AS purchase_count,
                MAX(t.created_at) FILTER (WHERE t.kind = 'purchase') AS last_purchase_at,
                u.last_login
            FROM users u
            LEFT JOIN wallets w ON w.user_id = u.id
            LEFT JOIN wallet_transactions t ON t.user_id = u.id
            WHERE u.id = $1
            GROUP BY w.balance, u.last_login
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(CustomerActivityDBResponse {
            balance: row.try_get("balance")?,
            total_spent: row.try_get("total_spent")?,
            purchase_count: row.try_get("purchase_count")?,
            last_purchase_at: row.try_get::<Option<DateTime<Utc>>, _>("last_purchase_at")?,
            last_login: row.try_get::<Option<DateTime<Utc>>, _>("last_login")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::{Repository, Users};
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn create_customer(pool: &PgPool, name: &str) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);
        users
            .create(&UserCreateDBRequest {
                username: name.to_string(),
                email: format!("{name}@example.com"),
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

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_grant_then_deduct(pool: PgPool) {
        let user_id = create_customer(&pool, "walletuser").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Wallets::new(&mut conn);

        let grant = repo
            .create_transaction(&TransactionCreateDBRequest {
                user_id,
                kind: TransactionKind::Grant,
                amount: Decimal::from(100),
                description: Some("welcome credits".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(grant.balance_after, Decimal::from(100));

        let deduction = repo
            .create_transaction(&TransactionCreateDBRequest {
                user_id,
                kind: TransactionKind::Deduction,
                amount: Decimal::from(30),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(deduction.balance_after, Decimal::from(70));
        assert_eq!(repo.get_balance(user_id).await.unwrap(), Decimal::from(70));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_deduction_never_goes_negative(pool: PgPool) {
        let user_id = create_customer(&pool, "broke").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Wallets::new(&mut conn);

        let err = repo
            .create_transaction(&TransactionCreateDBRequest {
                user_id,
                kind: TransactionKind::Deduction,
                amount: Decimal::from(1),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        // Nothing was recorded
        assert_eq!(repo.get_balance(user_id).await.unwrap(), Decimal::ZERO);
        assert!(repo.list_transactions(Some(user_id), 0, 10).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_non_positive_amount_rejected(pool: PgPool) {
        let user_id = create_customer(&pool, "zero").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Wallets::new(&mut conn);

        let err = repo
            .create_transaction(&TransactionCreateDBRequest {
                user_id,
                kind: TransactionKind::Grant,
                amount: Decimal::ZERO,
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_customer_activity_aggregates_purchases_only(pool: PgPool) {
        let user_id = create_customer(&pool, "active").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Wallets::new(&mut conn);

        for amount in [50, 25] {
            repo.create_transaction(&TransactionCreateDBRequest {
                user_id,
                kind: TransactionKind::Purchase,
                amount: Decimal::from(amount),
                description: None,
            })
            .await
            .unwrap();
        }
        repo.create_transaction(&TransactionCreateDBRequest {
            user_id,
            kind: TransactionKind::Deduction,
            amount: Decimal::from(10),
            description: None,
        })
        .await
        .unwrap();

        let activity = repo.customer_activity(user_id).await.unwrap();
        assert_eq!(activity.total_spent, Decimal::from(75), "deductions are not spend");
        assert_eq!(activity.purchase_count, 2);
        assert!(activity.last_purchase_at.is_some());
        assert_eq!(activity.balance, Decimal::from(65));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_customer_activity_unknown_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Wallets::new(&mut conn);

        let err = repo.customer_activity(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }
}
