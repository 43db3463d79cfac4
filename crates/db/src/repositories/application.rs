use sqlx::Row;

use coverquote_core::ports::{ApplicationStore, QuoteProgress, RepositoryError};
use coverquote_core::{AgencyLocationId, ApplicationId, ApplicationState};

use super::{db_error, decode_error, to_i64};
use crate::DbPool;

pub struct SqlApplicationStore {
    pool: DbPool,
}

impl SqlApplicationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Registers an application row in the `new` state. Existing rows are left untouched.
    pub async fn register(
        &self,
        id: ApplicationId,
        agency_location_id: AgencyLocationId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT OR IGNORE INTO application (id, agency_location_id, state) VALUES (?, ?, ?)",
        )
        .bind(to_i64(id.0))
        .bind(to_i64(agency_location_id.0))
        .bind(ApplicationState::New.code())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn state(&self, id: ApplicationId) -> Result<Option<ApplicationState>, RepositoryError> {
        let row = sqlx::query("SELECT state FROM application WHERE id = ?")
            .bind(to_i64(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let code: i64 = row.try_get("state").map_err(decode_error)?;
        ApplicationState::from_code(code)
            .map(Some)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown application state {code}")))
    }

    pub async fn progress(&self, id: ApplicationId) -> Result<Option<String>, RepositoryError> {
        sqlx::query_scalar::<_, Option<String>>("SELECT quote_progress FROM application WHERE id = ?")
            .bind(to_i64(id.0))
            .fetch_optional(&self.pool)
            .await
            .map(Option::flatten)
            .map_err(db_error)
    }
}

#[async_trait::async_trait]
impl ApplicationStore for SqlApplicationStore {
    async fn update_progress(
        &self,
        id: ApplicationId,
        progress: QuoteProgress,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE application
             SET quote_progress = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?",
        )
        .bind(progress.as_str())
        .bind(to_i64(id.0))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn transition_state(
        &self,
        id: ApplicationId,
        from: ApplicationState,
        to: ApplicationState,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE application
             SET state = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ? AND state = ?",
        )
        .bind(to.code())
        .bind(to_i64(id.0))
        .bind(from.code())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
