use sqlx::Row;

use coverquote_core::ports::{
    AgencyInsurerRecord, AgencyLocationRecord, AgencyLocationStore, RepositoryError,
};
use coverquote_core::{AgencyLocationId, InsurerId};

use super::{db_error, decode_error, to_i64, to_u64};
use crate::DbPool;

pub struct SqlAgencyLocationStore {
    pool: DbPool,
}

impl SqlAgencyLocationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, record: &AgencyLocationRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agency_location (id, agency_id, agency_name, email, phone, website, wholesale)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 agency_id = excluded.agency_id,
                 agency_name = excluded.agency_name,
                 email = excluded.email,
                 phone = excluded.phone,
                 website = excluded.website,
                 wholesale = excluded.wholesale",
        )
        .bind(to_i64(record.id.0))
        .bind(to_i64(record.agency_id))
        .bind(&record.agency_name)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.website)
        .bind(record.wholesale)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn save_insurer_setting(
        &self,
        id: AgencyLocationId,
        setting: &AgencyInsurerRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agency_location_insurer
                 (agency_location_id, insurer_id, agency_code, agent_code, bop, gl, wc)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(agency_location_id, insurer_id) DO UPDATE SET
                 agency_code = excluded.agency_code,
                 agent_code = excluded.agent_code,
                 bop = excluded.bop,
                 gl = excluded.gl,
                 wc = excluded.wc",
        )
        .bind(to_i64(id.0))
        .bind(to_i64(setting.insurer_id.0))
        .bind(&setting.agency_code)
        .bind(&setting.agent_code)
        .bind(setting.bop)
        .bind(setting.gl)
        .bind(setting.wc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn add_territory(
        &self,
        id: AgencyLocationId,
        territory: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT OR IGNORE INTO agency_location_territory (agency_location_id, territory)
             VALUES (?, ?)",
        )
        .bind(to_i64(id.0))
        .bind(territory.trim().to_uppercase())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AgencyLocationStore for SqlAgencyLocationStore {
    async fn load_core(
        &self,
        id: AgencyLocationId,
    ) -> Result<Option<AgencyLocationRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, agency_id, agency_name, email, phone, website, wholesale
             FROM agency_location WHERE id = ?",
        )
        .bind(to_i64(id.0))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(AgencyLocationRecord {
            id: AgencyLocationId(to_u64(row.try_get("id").map_err(decode_error)?, "id")?),
            agency_id: to_u64(row.try_get("agency_id").map_err(decode_error)?, "agency_id")?,
            agency_name: row.try_get("agency_name").map_err(decode_error)?,
            email: row.try_get("email").map_err(decode_error)?,
            phone: row.try_get("phone").map_err(decode_error)?,
            website: row.try_get("website").map_err(decode_error)?,
            wholesale: row.try_get("wholesale").map_err(decode_error)?,
        }))
    }

    async fn load_insurer_settings(
        &self,
        id: AgencyLocationId,
    ) -> Result<Vec<AgencyInsurerRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT insurer_id, agency_code, agent_code, bop, gl, wc
             FROM agency_location_insurer
             WHERE agency_location_id = ?
             ORDER BY insurer_id",
        )
        .bind(to_i64(id.0))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                Ok(AgencyInsurerRecord {
                    insurer_id: InsurerId(to_u64(
                        row.try_get("insurer_id").map_err(decode_error)?,
                        "insurer_id",
                    )?),
                    agency_code: row.try_get("agency_code").map_err(decode_error)?,
                    agent_code: row.try_get("agent_code").map_err(decode_error)?,
                    bop: row.try_get("bop").map_err(decode_error)?,
                    gl: row.try_get("gl").map_err(decode_error)?,
                    wc: row.try_get("wc").map_err(decode_error)?,
                })
            })
            .collect()
    }

    async fn load_territories(&self, id: AgencyLocationId) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT territory FROM agency_location_territory
             WHERE agency_location_id = ? ORDER BY territory",
        )
        .bind(to_i64(id.0))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(|row| row.try_get("territory").map_err(decode_error)).collect()
    }
}
