//! Database repository for the Instagram DM mirror.
//!
//! Conversations are upserted on (account_id, thread_id) because the Graph
//! proxy re-syncs threads. Deleting a conversation removes its messages in the
//! same transaction - messages carry no ON DELETE CASCADE on purpose.

use crate::types::{AccountId, ConversationId, abbrev_uuid};
use crate::db::{
    errors::Result,
    models::conversations::{ConversationDBResponse, ConversationUpsertDBRequest, MessageCreateDBRequest, MessageDBResponse},
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct Conversations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Conversations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert or refresh a mirrored thread.
    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&request.account_id), thread = %request.thread_id), err)]
    pub async fn upsert(&mut self, request: &ConversationUpsertDBRequest) -> Result<ConversationDBResponse> {
        let conversation = sqlx::query_as::<_, ConversationDBResponse>(
            r#"
            INSERT INTO conversations (id, account_id, thread_id, participant, last_message_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id, thread_id) DO UPDATE SET
                participant = EXCLUDED.participant,
                last_message_at = COALESCE(EXCLUDED.last_message_at, conversations.last_message_at)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.account_id)
        .bind(&request.thread_id)
        .bind(&request.participant)
        .bind(request.last_message_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(conversation)
    }

    #[instrument(skip(self), fields(conversation_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: ConversationId) -> Result<Option<ConversationDBResponse>> {
        let conversation = sqlx::query_as::<_, ConversationDBResponse>("SELECT * FROM conversations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(conversation)
    }

    /// Threads for an account, most recently active first.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn list_for_account(&mut self, account_id: AccountId, skip: i64, limit: i64) -> Result<Vec<ConversationDBResponse>> {
        let conversations = sqlx::query_as::<_, ConversationDBResponse>(
            r#"
            SELECT * FROM conversations
            WHERE account_id = $1
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(conversations)
    }

    /// Delete a conversation and its mirrored messages.
    #[instrument(skip(self), fields(conversation_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: ConversationId) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        // Children first - messages reference the conversation without cascade
        sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM conversations WHERE id = $1").bind(id).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Append a mirrored message and bump the thread's activity stamp.
    #[instrument(skip(self, request), fields(conversation_id = %abbrev_uuid(&request.conversation_id)), err)]
    pub async fn add_message(&mut self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
        let mut tx = self.db.begin().await?;

        let message = sqlx::query_as::<_, MessageDBResponse>(
            r#"
            INSERT INTO messages (id, conversation_id, sender, body, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.conversation_id)
        .bind(&request.sender)
        .bind(&request.body)
        .bind(request.sent_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET last_message_at = GREATEST(COALESCE(last_message_at, $2), $2) WHERE id = $1")
            .bind(request.conversation_id)
            .bind(request.sent_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Messages in a thread, oldest first.
    #[instrument(skip(self), fields(conversation_id = %abbrev_uuid(&conversation_id)), err)]
    pub async fn list_messages(&mut self, conversation_id: ConversationId, skip: i64, limit: i64) -> Result<Vec<MessageDBResponse>> {
        let messages = sqlx::query_as::<_, MessageDBResponse>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            ORDER BY sent_at ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Accounts, Repository};
    use crate::db::models::accounts::{AccountCreateDBRequest, AccountStatus, AccountTier};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    async fn create_account(pool: &PgPool) -> AccountId {
        let mut conn = pool.acquire().await.unwrap();
        let mut accounts = Accounts::new(&mut conn);
        accounts
            .create(&AccountCreateDBRequest {
                handle: "dm.creator".to_string(),
                display_name: "DM Creator".to_string(),
                bio: None,
                status: AccountStatus::Active,
                tier: AccountTier::Standard,
                monthly_revenue: Decimal::ZERO,
                subscriber_count: 0,
                session_credentials: None,
                manager_id: None,
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_upsert_is_idempotent_per_thread(pool: PgPool) {
        let account_id = create_account(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);

        let request = ConversationUpsertDBRequest {
            account_id,
            thread_id: "t_1001".to_string(),
            participant: "fan_42".to_string(),
            last_message_at: None,
        };

        let first = repo.upsert(&request).await.unwrap();
        let second = repo.upsert(&request).await.unwrap();
        assert_eq!(first.id, second.id, "same thread must not duplicate");

        let listed = repo.list_for_account(account_id, 0, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_add_message_bumps_activity(pool: PgPool) {
        let account_id = create_account(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);

        let conversation = repo
            .upsert(&ConversationUpsertDBRequest {
                account_id,
                thread_id: "t_2".to_string(),
                participant: "fan_7".to_string(),
                last_message_at: None,
            })
            .await
            .unwrap();

        let sent_at = Utc::now();
        repo.add_message(&MessageCreateDBRequest {
            conversation_id: conversation.id,
            sender: "fan_7".to_string(),
            body: "hey!".to_string(),
            sent_at,
        })
        .await
        .unwrap();

        let refreshed = repo.get_by_id(conversation.id).await.unwrap().unwrap();
        assert!(refreshed.last_message_at.is_some());

        let messages = repo.list_messages(conversation.id, 0, 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "hey!");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_delete_conversation_removes_messages(pool: PgPool) {
        let account_id = create_account(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);

        let conversation = repo
            .upsert(&ConversationUpsertDBRequest {
                account_id,
                thread_id: "t_3".to_string(),
                participant: "fan_9".to_string(),
                last_message_at: None,
            })
            .await
            .unwrap();

        for body in ["one", "two"] {
            repo.add_message(&MessageCreateDBRequest {
                conversation_id: conversation.id,
                sender: "fan_9".to_string(),
                body: body.to_string(),
                sent_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        assert!(repo.delete(conversation.id).await.unwrap());
        assert!(repo.get_by_id(conversation.id).await.unwrap().is_none());

        let orphans = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
            .bind(conversation.id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(orphans, 0, "deleting the parent must remove its messages");
    }
}
