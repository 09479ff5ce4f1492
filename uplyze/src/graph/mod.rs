//! Instagram/Facebook Graph API proxy.
//!
//! A single dispatch surface translates `{action, account_id, params}` into
//! the corresponding Graph API call. There is no local state machine - every
//! action is request/response pass-through, with a bounded pagination loop
//! for list-shaped reads.

pub mod client;

pub use client::GraphClient;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The proxied Graph API actions.
///
/// This is the string-keyed action table realized as a tagged enum: unknown
/// actions fail at deserialization with a 400 instead of reaching dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GraphAction {
    // Profile and media reads
    GetProfile,
    GetMedia,
    GetMediaInsights,
    GetStories,
    // Publishing (container create + publish)
    PublishPhoto,
    PublishVideo,
    // Comments
    GetComments,
    ReplyToComment,
    DeleteComment,
    // Messaging
    SendMessage,
    ListConversations,
    GetConversationMessages,
    // Account insights
    GetAccountInsights,
    GetAudienceInsights,
    // Ads
    ListAdAccounts,
    GetAdInsights,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_are_snake_case() {
        let action: GraphAction = serde_json::from_str("\"publish_photo\"").unwrap();
        assert_eq!(action, GraphAction::PublishPhoto);

        assert_eq!(serde_json::to_string(&GraphAction::ListConversations).unwrap(), "\"list_conversations\"");
    }

    #[test]
    fn test_unknown_action_fails_deserialization() {
        let result: Result<GraphAction, _> = serde_json::from_str("\"launch_rocket\"");
        assert!(result.is_err());
    }
}
