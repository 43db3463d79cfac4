use sqlx::Row;

use coverquote_core::ports::{RepositoryError, ZipCode, ZipCodeLookup};

use super::{db_error, decode_error};
use crate::DbPool;

pub struct SqlZipCodeLookup {
    pool: DbPool,
}

impl SqlZipCodeLookup {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, zip: &ZipCode) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO zip_code (zip, city, territory) VALUES (?, ?, ?)
             ON CONFLICT(zip) DO UPDATE SET city = excluded.city, territory = excluded.territory",
        )
        .bind(&zip.zip)
        .bind(&zip.city)
        .bind(zip.territory.to_uppercase())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ZipCodeLookup for SqlZipCodeLookup {
    async fn lookup(&self, zip: &str) -> Result<Option<ZipCode>, RepositoryError> {
        let row = sqlx::query("SELECT zip, city, territory FROM zip_code WHERE zip = ?")
            .bind(zip.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ZipCode {
            zip: row.try_get("zip").map_err(decode_error)?,
            city: row.try_get("city").map_err(decode_error)?,
            territory: row.try_get("territory").map_err(decode_error)?,
        }))
    }
}
