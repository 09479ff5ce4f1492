//! Common type definitions and permission system types.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`UserId`]: User account identifier
//! - [`ApiKeyId`]: API key identifier
//! - [`AccountId`]: Managed account identifier
//! - [`ConversationId`] / [`MessageId`]: DM mirror identifiers
//! - [`ScriptId`] / [`ScriptStepId`]: Automation script identifiers
//!
//! The permission system is deliberately small: [`Resource`] names what is
//! being touched, [`Operation`] names what is being done to it. Both exist so
//! authorization failures can say precisely what was denied.

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type ApiKeyId = Uuid;
pub type AccountId = Uuid;
pub type ConversationId = Uuid;
pub type MessageId = Uuid;
pub type ScriptId = Uuid;
pub type ScriptStepId = Uuid;
pub type LeadId = Uuid;
pub type TransactionId = i64;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be performed on resources
// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    ApiKeys,
    Accounts,
    Wallets,
    Transactions,
    Conversations,
    Scripts,
    Insights,
    Graph,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// User must have been granted access to a specific resource instance
    Granted,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::ApiKeys => "api keys",
            Resource::Accounts => "managed accounts",
            Resource::Wallets => "wallets",
            Resource::Transactions => "transactions",
            Resource::Conversations => "conversations",
            Resource::Scripts => "scripts",
            Resource::Insights => "customer insights",
            Resource::Graph => "graph proxy",
        };
        write!(f, "{name}")
    }
}
