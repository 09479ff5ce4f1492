//! Database models for wallets and the transaction ledger.

use crate::types::{TransactionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Customer purchase of credits
    Purchase,
    /// Admin-granted credits
    Grant,
    /// Spend against the balance
    Deduction,
}

/// Database response for a wallet
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WalletDBResponse {
    pub user_id: UserId,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Database request for appending a ledger event
#[derive(Debug, Clone)]
pub struct TransactionCreateDBRequest {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Database response for a ledger event
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionDBResponse {
    pub id: TransactionId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated activity row backing the customer insight formulas.
#[derive(Debug, Clone)]
pub struct CustomerActivityDBResponse {
    pub balance: Decimal,
    pub total_spent: Decimal,
    pub purchase_count: i64,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}
