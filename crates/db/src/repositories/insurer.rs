use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use coverquote_core::domain::insurer::{OutageWindow, PackageType, PaymentPlan};
use coverquote_core::ports::{InsurerRecord, InsurerStore, RepositoryError};
use coverquote_core::{InsurerId, PaymentPlanId, PolicyType};

use super::{db_error, decode_error, to_i64, to_u64};
use crate::DbPool;

pub struct SqlInsurerStore {
    pool: DbPool,
}

impl SqlInsurerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, record: &InsurerRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO insurer (id, name, slug, policy_types, live_username, live_password,
                                  test_username, test_password)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 slug = excluded.slug,
                 policy_types = excluded.policy_types,
                 live_username = excluded.live_username,
                 live_password = excluded.live_password,
                 test_username = excluded.test_username,
                 test_password = excluded.test_password",
        )
        .bind(to_i64(record.id.0))
        .bind(&record.name)
        .bind(&record.slug)
        .bind(encode_policy_types(&record.policy_types))
        .bind(&record.live_username)
        .bind(&record.live_password)
        .bind(&record.test_username)
        .bind(&record.test_password)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn save_payment_plan(
        &self,
        insurer_id: InsurerId,
        plan: &PaymentPlan,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO insurer_payment_plan (insurer_id, payment_plan_id, name, premium_threshold)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(insurer_id, payment_plan_id) DO UPDATE SET
                 name = excluded.name,
                 premium_threshold = excluded.premium_threshold",
        )
        .bind(to_i64(insurer_id.0))
        .bind(to_i64(plan.id.0))
        .bind(&plan.name)
        .bind(plan.premium_threshold.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn save_outage(
        &self,
        insurer_id: InsurerId,
        window: &OutageWindow,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO insurer_outage (insurer_id, starts_at, ends_at) VALUES (?, ?, ?)")
            .bind(to_i64(insurer_id.0))
            .bind(window.start.to_rfc3339())
            .bind(window.end.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

fn encode_policy_types(types: &[PolicyType]) -> String {
    types.iter().map(PolicyType::as_str).collect::<Vec<_>>().join(",")
}

fn decode_policy_types(raw: &str) -> Result<Vec<PolicyType>, RepositoryError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            PolicyType::parse(part)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown policy type '{part}'")))
        })
        .collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_error)
}

#[async_trait::async_trait]
impl InsurerStore for SqlInsurerStore {
    async fn load_insurer(&self, id: InsurerId) -> Result<Option<InsurerRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, slug, policy_types, live_username, live_password,
                    test_username, test_password
             FROM insurer WHERE id = ?",
        )
        .bind(to_i64(id.0))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let policy_types: String = row.try_get("policy_types").map_err(decode_error)?;
        Ok(Some(InsurerRecord {
            id: InsurerId(to_u64(row.try_get("id").map_err(decode_error)?, "id")?),
            name: row.try_get("name").map_err(decode_error)?,
            slug: row.try_get("slug").map_err(decode_error)?,
            policy_types: decode_policy_types(&policy_types)?,
            live_username: row.try_get("live_username").map_err(decode_error)?,
            live_password: row.try_get("live_password").map_err(decode_error)?,
            test_username: row.try_get("test_username").map_err(decode_error)?,
            test_password: row.try_get("test_password").map_err(decode_error)?,
        }))
    }

    async fn load_payment_plans(&self, id: InsurerId) -> Result<Vec<PaymentPlan>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT payment_plan_id, name, premium_threshold FROM insurer_payment_plan
             WHERE insurer_id = ? ORDER BY payment_plan_id",
        )
        .bind(to_i64(id.0))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let threshold: String = row.try_get("premium_threshold").map_err(decode_error)?;
                Ok(PaymentPlan {
                    id: PaymentPlanId(to_u64(
                        row.try_get("payment_plan_id").map_err(decode_error)?,
                        "payment_plan_id",
                    )?),
                    name: row.try_get("name").map_err(decode_error)?,
                    premium_threshold: Decimal::from_str(&threshold).map_err(decode_error)?,
                })
            })
            .collect()
    }

    async fn load_package_types(&self, id: InsurerId) -> Result<Vec<PackageType>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT package_type_id, name FROM insurer_package_type
             WHERE insurer_id = ? ORDER BY package_type_id",
        )
        .bind(to_i64(id.0))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                Ok(PackageType {
                    id: to_u64(row.try_get("package_type_id").map_err(decode_error)?, "package_type_id")?,
                    name: row.try_get("name").map_err(decode_error)?,
                })
            })
            .collect()
    }

    async fn load_outages(&self, id: InsurerId) -> Result<Vec<OutageWindow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT starts_at, ends_at FROM insurer_outage WHERE insurer_id = ? ORDER BY starts_at",
        )
        .bind(to_i64(id.0))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let start: String = row.try_get("starts_at").map_err(decode_error)?;
                let end: String = row.try_get("ends_at").map_err(decode_error)?;
                Ok(OutageWindow { start: parse_timestamp(&start)?, end: parse_timestamp(&end)? })
            })
            .collect()
    }
}
