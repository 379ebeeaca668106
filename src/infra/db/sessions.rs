use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, SessionsRepo},
    domain::entities::{FlashMessage, SessionRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: Option<Uuid>,
    is_logged_in: bool,
    csrf_token: String,
    flash: Json<Vec<FlashMessage>>,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            is_logged_in: row.is_logged_in,
            csrf_token: row.csrf_token,
            flash: row.flash.0,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn find_session(&self, id: &str) -> Result<Option<SessionRecord>, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, is_logged_in, csrf_token, flash, created_at, expires_at \
             FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SessionRecord::from))
    }

    async fn put_session(&self, record: &SessionRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, is_logged_in, csrf_token, flash, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                 user_id = EXCLUDED.user_id, \
                 is_logged_in = EXCLUDED.is_logged_in, \
                 csrf_token = EXCLUDED.csrf_token, \
                 flash = EXCLUDED.flash, \
                 expires_at = EXCLUDED.expires_at",
        )
        .bind(&record.id)
        .bind(record.user_id)
        .bind(record.is_logged_in)
        .bind(&record.csrf_token)
        .bind(Json(&record.flash))
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn destroy_session(&self, id: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}
