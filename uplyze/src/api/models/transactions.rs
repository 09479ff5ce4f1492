//! API request/response models for wallets and transactions.

use super::pagination::Pagination;
use crate::db::models::wallets::{TransactionDBResponse, TransactionKind, WalletDBResponse};
use crate::types::{TransactionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionCreate {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: TransactionId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListTransactionsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Restrict to one user's ledger
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
}

impl From<TransactionDBResponse> for TransactionResponse {
    fn from(db: TransactionDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            kind: db.kind,
            amount: db.amount,
            balance_after: db.balance_after,
            description: db.description,
            created_at: db.created_at,
        }
    }
}

impl From<WalletDBResponse> for WalletResponse {
    fn from(db: WalletDBResponse) -> Self {
        Self {
            user_id: db.user_id,
            balance: db.balance,
            updated_at: db.updated_at,
        }
    }
}
