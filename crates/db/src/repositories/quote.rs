use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use coverquote_core::ports::{NewQuote, QuoteStore, RepositoryError};
use coverquote_core::{
    AgencyLocationId, AggregatedStatus, ApplicationId, InsurerId, PolicyType, QuoteId, QuoteRecord,
};

use super::{db_error, decode_error, to_i64, to_u64};
use crate::DbPool;

pub struct SqlQuoteStore {
    pool: DbPool,
}

impl SqlQuoteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<QuoteRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, application_id, agency_location_id, insurer_id, policy_type, amount, status, bound
             FROM quote WHERE application_id = ? ORDER BY id",
        )
        .bind(to_i64(application_id.0))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(quote_from_row).collect()
    }
}

fn quote_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuoteRecord, RepositoryError> {
    let policy_type: String = row.try_get("policy_type").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let amount: Option<String> = row.try_get("amount").map_err(decode_error)?;

    Ok(QuoteRecord {
        id: QuoteId(to_u64(row.try_get("id").map_err(decode_error)?, "id")?),
        application_id: ApplicationId(to_u64(
            row.try_get("application_id").map_err(decode_error)?,
            "application_id",
        )?),
        agency_location_id: AgencyLocationId(to_u64(
            row.try_get("agency_location_id").map_err(decode_error)?,
            "agency_location_id",
        )?),
        insurer_id: InsurerId(to_u64(row.try_get("insurer_id").map_err(decode_error)?, "insurer_id")?),
        policy_type: PolicyType::parse(&policy_type)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown policy type '{policy_type}'")))?,
        amount: amount.as_deref().map(Decimal::from_str).transpose().map_err(decode_error)?,
        status: AggregatedStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status '{status}'")))?,
        bound: row.try_get("bound").map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl QuoteStore for SqlQuoteStore {
    async fn record_quote(&self, quote: NewQuote) -> Result<QuoteId, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO quote (application_id, agency_location_id, insurer_id, policy_type, amount,
                                status, letter, bound, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(to_i64(quote.application_id.0))
        .bind(to_i64(quote.agency_location_id.0))
        .bind(to_i64(quote.insurer_id.0))
        .bind(quote.policy_type.as_str())
        .bind(quote.amount.map(|amount| amount.to_string()))
        .bind(quote.status.as_str())
        .bind(&quote.letter)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(QuoteId(to_u64(result.last_insert_rowid(), "id")?))
    }

    async fn find_quote(&self, id: QuoteId) -> Result<Option<QuoteRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, application_id, agency_location_id, insurer_id, policy_type, amount, status, bound
             FROM quote WHERE id = ?",
        )
        .bind(to_i64(id.0))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(quote_from_row).transpose()
    }

    async fn mark_bound(&self, id: QuoteId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE quote SET bound = 1, status = ?, updated_at = ? WHERE id = ? AND bound = 0",
        )
        .bind(AggregatedStatus::Bound.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(to_i64(id.0))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_bind_requested(&self, id: QuoteId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE quote SET status = ?, updated_at = ? WHERE id = ? AND bound = 0")
                .bind(AggregatedStatus::BindRequested.as_str())
                .bind(Utc::now().to_rfc3339())
                .bind(to_i64(id.0))
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use coverquote_core::ports::{NewQuote, QuoteStore};
    use coverquote_core::{
        AgencyLocationId, AggregatedStatus, ApplicationId, InsurerId, PolicyType, QuoteId,
    };

    use super::SqlQuoteStore;
    use crate::{connect_with_settings, migrations::run_pending};

    async fn store() -> SqlQuoteStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        SqlQuoteStore::new(pool)
    }

    fn new_quote(amount: Option<Decimal>, status: AggregatedStatus) -> NewQuote {
        NewQuote {
            application_id: ApplicationId(42),
            agency_location_id: AgencyLocationId(12),
            insurer_id: InsurerId(5),
            policy_type: PolicyType::Gl,
            amount,
            status,
            letter: None,
        }
    }

    #[tokio::test]
    async fn recorded_quote_round_trips_amount_and_status() {
        let store = store().await;
        let id = store
            .record_quote(new_quote(Some(Decimal::new(1_234_56, 2)), AggregatedStatus::Quoted))
            .await
            .expect("record");
        let referred = store
            .record_quote(new_quote(None, AggregatedStatus::Referred))
            .await
            .expect("record");

        let found = store.find_quote(id).await.expect("find").expect("present");
        assert_eq!(found.amount, Some(Decimal::new(1_234_56, 2)));
        assert_eq!(found.status, AggregatedStatus::Quoted);
        assert!(!found.bound);

        assert_eq!(store.find_quote(referred).await.expect("find").expect("present").amount, None);
        assert_eq!(store.list_for_application(ApplicationId(42)).await.expect("list").len(), 2);
        assert!(store.find_quote(QuoteId(9_999)).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn bound_flag_is_one_way() {
        let store = store().await;
        let id = store
            .record_quote(new_quote(Some(Decimal::new(900, 0)), AggregatedStatus::Quoted))
            .await
            .expect("record");

        assert!(store.mark_bound(id).await.expect("bind"));
        assert!(!store.mark_bound(id).await.expect("second bind is a no-op"));
        assert!(!store.mark_bind_requested(id).await.expect("request after bind"));

        let found = store.find_quote(id).await.expect("find").expect("present");
        assert!(found.bound);
        assert_eq!(found.status, AggregatedStatus::Bound);
    }

    #[tokio::test]
    async fn bind_request_updates_status_of_unbound_quote() {
        let store = store().await;
        let id = store
            .record_quote(new_quote(Some(Decimal::new(900, 0)), AggregatedStatus::Referred))
            .await
            .expect("record");

        assert!(store.mark_bind_requested(id).await.expect("request"));
        let found = store.find_quote(id).await.expect("find").expect("present");
        assert_eq!(found.status, AggregatedStatus::BindRequested);
        assert!(!found.bound);
    }
}
