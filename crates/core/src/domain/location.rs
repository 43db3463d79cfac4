use serde::{Deserialize, Serialize};

use crate::domain::activity_code::{self, ActivityCode};
use crate::domain::payload::LocationPayload;
use crate::domain::rules::{digits_only, is_valid_zip, normalize_zip};
use crate::errors::{DomainError, EngineError};
use crate::ports::ZipCodeLookup;

const UNEMPLOYMENT_NUMBER_REQUIRED: [&str; 7] = ["CO", "HI", "ME", "MN", "NJ", "RI", "UT"];
const UNEMPLOYMENT_NUMBER_NUMERIC: &str = "MI";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub address2: Option<String>,
    pub zip: String,
    pub city: Option<String>,
    pub territory: Option<String>,
    pub full_time_employees: u32,
    pub part_time_employees: u32,
    pub square_footage: Option<u32>,
    pub unemployment_number: Option<String>,
    pub activity_codes: Vec<ActivityCode>,
}

impl Location {
    pub fn from_payload(payload: LocationPayload) -> Self {
        Self {
            address: payload.address.trim().to_owned(),
            address2: payload.address2.map(|line| line.trim().to_owned()).filter(|line| !line.is_empty()),
            zip: normalize_zip(&payload.zip),
            city: None,
            territory: None,
            full_time_employees: payload.full_time_employees,
            part_time_employees: payload.part_time_employees,
            square_footage: payload.square_footage,
            unemployment_number: payload
                .unemployment_number
                .map(|number| number.trim().to_owned())
                .filter(|number| !number.is_empty()),
            activity_codes: payload.activity_codes.into_iter().map(ActivityCode::from_payload).collect(),
        }
    }

    pub fn total_employees(&self) -> u64 {
        u64::from(self.full_time_employees) + u64::from(self.part_time_employees)
    }

    /// Resolves city/territory through the zip lookup, then applies the
    /// workers' comp rules when the application carries a WC policy.
    pub async fn validate(
        &mut self,
        has_wc: bool,
        zips: &dyn ZipCodeLookup,
    ) -> Result<(), EngineError> {
        if self.address.is_empty() {
            return Err(DomainError::validation("location address is required").into());
        }
        if self.address.chars().count() > 100 {
            return Err(DomainError::validation("location address exceeds 100 characters").into());
        }
        if !is_valid_zip(&self.zip) {
            return Err(DomainError::validation(format!(
                "location zip '{}' must be 5 digits",
                self.zip
            ))
            .into());
        }
        if self.square_footage == Some(0) {
            return Err(DomainError::validation("location square_footage must be positive").into());
        }

        let zip = zips.lookup(&self.zip).await?.ok_or_else(|| {
            DomainError::validation(format!("location zip '{}' is not a known zip code", self.zip))
        })?;
        self.city = Some(zip.city);
        self.territory = Some(zip.territory.clone());

        if !has_wc {
            self.unemployment_number = None;
            return Ok(());
        }

        if self.total_employees() == 0 {
            return Err(DomainError::validation(
                "locations on a workers' comp application must have at least one employee",
            )
            .into());
        }
        if self.activity_codes.is_empty() {
            return Err(DomainError::validation(format!(
                "location at {} requires at least one activity code for workers' comp",
                self.address
            ))
            .into());
        }
        activity_code::validate_all(&self.activity_codes)?;

        self.check_unemployment_number(&zip.territory)?;
        Ok(())
    }

    fn check_unemployment_number(&mut self, territory: &str) -> Result<(), DomainError> {
        if UNEMPLOYMENT_NUMBER_REQUIRED.contains(&territory) {
            if self.unemployment_number.is_none() {
                return Err(DomainError::validation(format!(
                    "unemployment_number is required for locations in {territory}"
                )));
            }
            return Ok(());
        }

        if territory == UNEMPLOYMENT_NUMBER_NUMERIC {
            if let Some(number) = &self.unemployment_number {
                if digits_only(number).len() != number.len() {
                    return Err(DomainError::validation(format!(
                        "unemployment_number for locations in {territory} must be an integer"
                    )));
                }
            }
            return Ok(());
        }

        self.unemployment_number = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::Location;
    use crate::domain::ids::ActivityCodeId;
    use crate::domain::payload::{ActivityCodePayload, LocationPayload};
    use crate::errors::{DomainError, EngineError};
    use crate::ports::{RepositoryError, ZipCode, ZipCodeLookup};

    struct Zips(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl ZipCodeLookup for Zips {
        async fn lookup(&self, zip: &str) -> Result<Option<ZipCode>, RepositoryError> {
            Ok(self.0.get(zip).map(|territory| ZipCode {
                zip: zip.to_owned(),
                city: "Somewhere".to_owned(),
                territory: (*territory).to_owned(),
            }))
        }
    }

    fn zips() -> Zips {
        Zips(HashMap::from([("80202", "CO"), ("48201", "MI"), ("94105", "CA")]))
    }

    fn location(zip: &str, unemployment_number: Option<&str>) -> Location {
        Location::from_payload(LocationPayload {
            address: "1 Main St".to_owned(),
            zip: zip.to_owned(),
            full_time_employees: 4,
            unemployment_number: unemployment_number.map(str::to_owned),
            activity_codes: vec![ActivityCodePayload {
                id: ActivityCodeId(5183),
                payroll: Decimal::new(120_000, 0),
            }],
            ..LocationPayload::default()
        })
    }

    fn validation_message(error: EngineError) -> String {
        match error {
            EngineError::Domain(DomainError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zip_lookup_populates_city_and_territory() {
        let mut location = location("94105", None);
        location.validate(false, &zips()).await.expect("valid");
        assert_eq!(location.territory.as_deref(), Some("CA"));
        assert_eq!(location.city.as_deref(), Some("Somewhere"));
    }

    #[tokio::test]
    async fn unknown_zip_is_a_validation_error() {
        let error = location("10001", None).validate(false, &zips()).await.expect_err("unknown");
        assert!(validation_message(error).contains("10001"));
    }

    #[tokio::test]
    async fn colorado_requires_unemployment_number_for_workers_comp() {
        let error = location("80202", None).validate(true, &zips()).await.expect_err("missing");
        assert!(validation_message(error).contains("unemployment_number"));

        location("80202", Some("123456")).validate(true, &zips()).await.expect("present");
        location("80202", None).validate(false, &zips()).await.expect("no WC, no requirement");
    }

    #[tokio::test]
    async fn michigan_unemployment_number_is_optional_but_numeric() {
        location("48201", None).validate(true, &zips()).await.expect("optional");
        location("48201", Some("98765")).validate(true, &zips()).await.expect("numeric");
        let error =
            location("48201", Some("98-765")).validate(true, &zips()).await.expect_err("dash");
        assert!(validation_message(error).contains("integer"));
    }

    #[tokio::test]
    async fn unemployment_number_is_dropped_where_it_does_not_apply() {
        let mut location = location("94105", Some("555"));
        location.validate(true, &zips()).await.expect("valid");
        assert_eq!(location.unemployment_number, None);
    }

    #[tokio::test]
    async fn huge_employee_counts_do_not_overflow() {
        let mut location = location("94105", None);
        location.full_time_employees = u32::MAX;
        location.part_time_employees = 1;

        assert_eq!(location.total_employees(), u64::from(u32::MAX) + 1);
        location.validate(true, &zips()).await.expect("employee total is positive");
    }

    #[tokio::test]
    async fn zip_with_trailing_junk_is_rejected() {
        let error = location("94105abc", None).validate(false, &zips()).await.expect_err("junk");
        assert!(validation_message(error).contains("94105abc"));

        let mut plus_four = location("94105-1234", None);
        plus_four.validate(false, &zips()).await.expect("zip+4");
        assert_eq!(plus_four.zip, "94105");
    }

    #[tokio::test]
    async fn workers_comp_needs_activity_codes() {
        let mut location = location("94105", None);
        location.activity_codes.clear();
        let error = location.validate(true, &zips()).await.expect_err("no codes");
        assert!(validation_message(error).contains("activity code"));
    }
}
