//! Database repository for DM automation scripts and their steps.
//!
//! Steps have no ON DELETE CASCADE; the repository removes them explicitly
//! when a script is deleted or its step list is replaced.

use crate::types::{AccountId, ScriptId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    models::scripts::{ScriptCreateDBRequest, ScriptDBResponse, ScriptStepDBResponse, ScriptStepInput, ScriptUpdateDBRequest},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

// Database entity model (steps are fetched separately)
#[derive(Debug, Clone, FromRow)]
struct Script {
    pub id: ScriptId,
    pub account_id: AccountId,
    pub name: String,
    pub trigger_keyword: Option<String>,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<(Script, Vec<ScriptStepDBResponse>)> for ScriptDBResponse {
    fn from((script, steps): (Script, Vec<ScriptStepDBResponse>)) -> Self {
        Self {
            id: script.id,
            account_id: script.account_id,
            name: script.name,
            trigger_keyword: script.trigger_keyword,
            is_enabled: script.is_enabled,
            steps,
            created_at: script.created_at,
            updated_at: script.updated_at,
        }
    }
}

pub struct Scripts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Scripts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn insert_steps(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        script_id: ScriptId,
        steps: &[ScriptStepInput],
    ) -> Result<Vec<ScriptStepDBResponse>> {
        let mut inserted = Vec::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            let row = sqlx::query_as::<_, ScriptStepDBResponse>(
                r#"
                INSERT INTO script_steps (id, script_id, position, action, payload)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(script_id)
            .bind(position as i32)
            .bind(&step.action)
            .bind(&step.payload)
            .fetch_one(&mut **tx)
            .await?;
            inserted.push(row);
        }
        Ok(inserted)
    }

    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&request.account_id), name = %request.name), err)]
    pub async fn create(&mut self, request: &ScriptCreateDBRequest) -> Result<ScriptDBResponse> {
        let mut tx = self.db.begin().await?;

        let script = sqlx::query_as::<_, Script>(
            r#"
            INSERT INTO scripts (id, account_id, name, trigger_keyword, is_enabled)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.account_id)
        .bind(&request.name)
        .bind(&request.trigger_keyword)
        .bind(request.is_enabled)
        .fetch_one(&mut *tx)
        .await?;

        let steps = Self::insert_steps(&mut tx, script.id, &request.steps).await?;

        tx.commit().await?;
        Ok(ScriptDBResponse::from((script, steps)))
    }

    #[instrument(skip(self), fields(script_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: ScriptId) -> Result<Option<ScriptDBResponse>> {
        let script = sqlx::query_as::<_, Script>("SELECT * FROM scripts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match script {
            Some(script) => {
                let steps = self.steps_for(id).await?;
                Ok(Some(ScriptDBResponse::from((script, steps))))
            }
            None => Ok(None),
        }
    }

    async fn steps_for(&mut self, id: ScriptId) -> Result<Vec<ScriptStepDBResponse>> {
        let steps = sqlx::query_as::<_, ScriptStepDBResponse>("SELECT * FROM script_steps WHERE script_id = $1 ORDER BY position ASC")
            .bind(id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(steps)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn list_for_account(&mut self, account_id: AccountId, skip: i64, limit: i64) -> Result<Vec<ScriptDBResponse>> {
        let scripts = sqlx::query_as::<_, Script>(
            "SELECT * FROM scripts WHERE account_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(account_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        let mut result = Vec::with_capacity(scripts.len());
        for script in scripts {
            let steps = self.steps_for(script.id).await?;
            result.push(ScriptDBResponse::from((script, steps)));
        }
        Ok(result)
    }

    /// Update script fields; a present `steps` list replaces all steps.
    #[instrument(skip(self, request), fields(script_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&mut self, id: ScriptId, request: &ScriptUpdateDBRequest) -> Result<ScriptDBResponse> {
        let mut tx = self.db.begin().await?;

        let script = sqlx::query_as::<_, Script>(
            r#"
            UPDATE scripts SET
                name = COALESCE($2, name),
                trigger_keyword = COALESCE($3, trigger_keyword),
                is_enabled = COALESCE($4, is_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.trigger_keyword)
        .bind(request.is_enabled)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        let steps = if let Some(steps) = &request.steps {
            sqlx::query("DELETE FROM script_steps WHERE script_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::insert_steps(&mut tx, id, steps).await?
        } else {
            sqlx::query_as::<_, ScriptStepDBResponse>("SELECT * FROM script_steps WHERE script_id = $1 ORDER BY position ASC")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?
        };

        tx.commit().await?;
        Ok(ScriptDBResponse::from((script, steps)))
    }

    /// Delete a script and its steps.
    #[instrument(skip(self), fields(script_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: ScriptId) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        // Children first - steps reference the script without cascade
        sqlx::query("DELETE FROM script_steps WHERE script_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM scripts WHERE id = $1").bind(id).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Accounts, Repository};
    use crate::db::models::accounts::{AccountCreateDBRequest, AccountStatus, AccountTier};
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    async fn create_account(pool: &PgPool) -> AccountId {
        let mut conn = pool.acquire().await.unwrap();
        let mut accounts = Accounts::new(&mut conn);
        accounts
            .create(&AccountCreateDBRequest {
                handle: "script.creator".to_string(),
                display_name: "Script Creator".to_string(),
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

    fn welcome_script(account_id: AccountId) -> ScriptCreateDBRequest {
        ScriptCreateDBRequest {
            account_id,
            name: "welcome flow".to_string(),
            trigger_keyword: Some("hi".to_string()),
            is_enabled: true,
            steps: vec![
                ScriptStepInput {
                    action: "send_message".to_string(),
                    payload: json!({"text": "Hey! Thanks for reaching out."}),
                },
                ScriptStepInput {
                    action: "wait".to_string(),
                    payload: json!({"seconds": 60}),
                },
            ],
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_create_assigns_step_positions(pool: PgPool) {
        let account_id = create_account(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Scripts::new(&mut conn);

        let script = repo.create(&welcome_script(account_id)).await.unwrap();
        assert_eq!(script.steps.len(), 2);
        assert_eq!(script.steps[0].position, 0);
        assert_eq!(script.steps[1].position, 1);
        assert_eq!(script.steps[0].action, "send_message");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_update_replaces_steps(pool: PgPool) {
        let account_id = create_account(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Scripts::new(&mut conn);

        let script = repo.create(&welcome_script(account_id)).await.unwrap();

        let update = ScriptUpdateDBRequest {
            steps: Some(vec![ScriptStepInput {
                action: "send_message".to_string(),
                payload: json!({"text": "replaced"}),
            }]),
            ..Default::default()
        };
        let updated = repo.update(script.id, &update).await.unwrap();
        assert_eq!(updated.steps.len(), 1);
        assert_eq!(updated.steps[0].payload, json!({"text": "replaced"}));

        // Update without steps leaves the list untouched
        let renamed = repo
            .update(
                script.id,
                &ScriptUpdateDBRequest {
                    name: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "renamed");
        assert_eq!(renamed.steps.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_delete_script_removes_steps(pool: PgPool) {
        let account_id = create_account(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Scripts::new(&mut conn);

        let script = repo.create(&welcome_script(account_id)).await.unwrap();
        assert!(repo.delete(script.id).await.unwrap());
        assert!(repo.get_by_id(script.id).await.unwrap().is_none());

        let orphans = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM script_steps WHERE script_id = $1")
            .bind(script.id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(orphans, 0, "deleting the script must remove its steps");
    }
}
