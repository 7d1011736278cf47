use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// A genealogical record for one individual (`people` table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub first_name: String,
    /// Family name. Stored as `name` in the hosted schema.
    #[serde(rename = "name")]
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blockchain_hash: Option<String>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// "1850 - 1921", "1850", "- 1921" or empty.
    pub fn lifespan(&self) -> String {
        use chrono::Datelike;
        match (self.birth_date, self.death_date) {
            (Some(b), Some(d)) => format!("{} - {}", b.year(), d.year()),
            (Some(b), None) => b.year().to_string(),
            (None, Some(d)) => format!("- {}", d.year()),
            (None, None) => String::new(),
        }
    }

    pub fn is_certified(&self) -> bool {
        self.blockchain_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// Insert payload for a new person.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPerson {
    pub first_name: String,
    #[serde(rename = "name")]
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_hash: Option<String>,
}

impl NewPerson {
    /// Validates the required names. Records are public unless stated otherwise.
    pub fn new(first_name: &str, last_name: &str) -> Result<Self> {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        if first_name.is_empty() {
            return Err(AppError::validation("Le prénom est obligatoire"));
        }
        if last_name.is_empty() {
            return Err(AppError::validation("Le nom est obligatoire"));
        }

        Ok(Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            birth_date: None,
            death_date: None,
            birth_place: None,
            is_public: true,
            created_by: None,
            blockchain_hash: None,
        })
    }

    pub fn born(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    pub fn died(mut self, date: NaiveDate) -> Self {
        self.death_date = Some(date);
        self
    }

    pub fn born_in(mut self, place: &str) -> Self {
        let place = place.trim();
        self.birth_place = (!place.is_empty()).then(|| place.to_string());
        self
    }

    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    /// Checks cross-field constraints once every field is set.
    pub fn validate(&self) -> Result<()> {
        check_dates(self.birth_date, self.death_date)
    }
}

fn check_dates(birth: Option<NaiveDate>, death: Option<NaiveDate>) -> Result<()> {
    if let (Some(birth), Some(death)) = (birth, death) {
        if death < birth {
            return Err(AppError::validation(
                "La date de décès précède la date de naissance",
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePerson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl UpdatePerson {
    pub fn touches_dates(&self) -> bool {
        self.birth_date.is_some() || self.death_date.is_some()
    }

    /// Checks the dates the record would have once the patch is applied.
    pub fn validate_against(&self, current: &Person) -> Result<()> {
        check_dates(
            self.birth_date.or(current.birth_date),
            self.death_date.or(current.death_date),
        )
    }
}
