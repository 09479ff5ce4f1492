//! API request/response models.

pub mod accounts;
pub mod api_keys;
pub mod conversations;
pub mod graph;
pub mod insights;
pub mod leads;
pub mod pagination;
pub mod scripts;
pub mod transactions;
pub mod users;

use serde::Serialize;
use utoipa::ToSchema;

/// The `{"data": ...}` success envelope every endpoint responds with.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
