//! Patient domain model.
//!
//! # Responsibility
//! - Hold validated patient demographics and contact data.
//! - Provide derived, side-effect-free projections (age, full name, ...).
//!
//! # Invariants
//! - A `Patient` value always passes `validate()`; construction fails with
//!   `InvalidEntityData` otherwise.
//! - Setters re-validate only their field and leave state intact on failure.
//! - Names are stored trimmed; gender is stored trimmed and lowercase.

use super::entity::{required_text, Entity, EntityError, EntityMeta};
use crate::storage::{FieldValue, Record};
use crate::validate::{contact_digits, parse_date, today, FieldSpec, Validator};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Accepted gender values (case-insensitive on input).
pub const GENDERS: &[&str] = &["male", "female", "other"];
/// Minimum age, in whole years, of an adult patient.
pub const ADULT_AGE: u32 = 18;

static PATIENT_FIELDS: [FieldSpec; 5] = [
    FieldSpec::required("first_name", Validator::Name),
    FieldSpec::required("last_name", Validator::Name),
    FieldSpec::required("date_of_birth", Validator::PastDate),
    FieldSpec::required("gender", Validator::Category(GENDERS)),
    FieldSpec::required("contact_number", Validator::Contact),
];

/// Input for constructing a new, unpersisted patient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`, not in the future.
    pub date_of_birth: String,
    pub gender: String,
    pub contact_number: String,
}

impl NewPatient {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: impl Into<String>,
        gender: impl Into<String>,
        contact_number: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: date_of_birth.into(),
            gender: gender.into(),
            contact_number: contact_number.into(),
        }
    }
}

/// Partial patient update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub contact_number: Option<String>,
}

impl PatientChanges {
    pub fn contact_number(value: impl Into<String>) -> Self {
        Self {
            contact_number: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_record().is_empty()
    }

    /// Changed fields only, keyed by column name.
    pub fn to_record(&self) -> Record {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("date_of_birth", &self.date_of_birth),
            ("gender", &self.gender),
            ("contact_number", &self.contact_number),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|value| (name.to_string(), FieldValue::text(value.as_str())))
        })
        .collect()
    }
}

/// Coarse age bracket used by summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Minor,
    YoungAdult,
    Adult,
    MiddleAged,
    Senior,
    Unknown,
}

impl AgeGroup {
    pub fn from_age(age: Option<u32>) -> Self {
        match age {
            None => Self::Unknown,
            Some(age) if age < ADULT_AGE => Self::Minor,
            Some(age) if age < 30 => Self::YoungAdult,
            Some(age) if age < 50 => Self::Adult,
            Some(age) if age < 65 => Self::MiddleAged,
            Some(_) => Self::Senior,
        }
    }
}

impl Display for AgeGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Minor => "Minor",
            Self::YoungAdult => "Young Adult",
            Self::Adult => "Adult",
            Self::MiddleAged => "Middle-aged",
            Self::Senior => "Senior",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Validated patient record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patient {
    #[serde(flatten)]
    meta: EntityMeta,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    gender: String,
    contact_number: String,
}

impl Patient {
    /// Creates an unpersisted patient, validating every field.
    ///
    /// # Errors
    /// - `InvalidEntityData` naming the first field that fails its validator.
    pub fn new(data: NewPatient) -> Result<Self, EntityError> {
        Self::build(EntityMeta::default(), data)
    }

    fn build(meta: EntityMeta, data: NewPatient) -> Result<Self, EntityError> {
        let patient = Self {
            meta,
            first_name: data.first_name.trim().to_string(),
            last_name: data.last_name.trim().to_string(),
            date_of_birth: data.date_of_birth.trim().to_string(),
            gender: data.gender.trim().to_ascii_lowercase(),
            contact_number: data.contact_number.trim().to_string(),
        };
        patient.validate()?;
        Ok(patient)
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn date_of_birth(&self) -> &str {
        &self.date_of_birth
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    pub fn contact_number(&self) -> &str {
        &self.contact_number
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.meta.created_at
    }

    pub fn updated_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.meta.updated_at
    }

    pub fn set_first_name(&mut self, value: impl Into<String>) -> Result<(), EntityError> {
        self.first_name = checked_text("first_name", value.into())?;
        Ok(())
    }

    pub fn set_last_name(&mut self, value: impl Into<String>) -> Result<(), EntityError> {
        self.last_name = checked_text("last_name", value.into())?;
        Ok(())
    }

    pub fn set_date_of_birth(&mut self, value: impl Into<String>) -> Result<(), EntityError> {
        self.date_of_birth = checked_text("date_of_birth", value.into())?;
        Ok(())
    }

    pub fn set_gender(&mut self, value: impl Into<String>) -> Result<(), EntityError> {
        self.gender = checked_text("gender", value.into())?.to_ascii_lowercase();
        Ok(())
    }

    pub fn set_contact_number(&mut self, value: impl Into<String>) -> Result<(), EntityError> {
        self.contact_number = checked_text("contact_number", value.into())?;
        Ok(())
    }

    /// `"{first} {last}"`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whole years since birth as of the local today.
    pub fn age(&self) -> Option<u32> {
        self.age_on(today())
    }

    /// Whole years since birth as of `today`; `None` if undefined.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = parse_date(&self.date_of_birth)?;
        if birth > today {
            return None;
        }
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }

    pub fn is_adult(&self) -> bool {
        self.is_adult_on(today())
    }

    pub fn is_adult_on(&self, today: NaiveDate) -> bool {
        self.age_on(today).is_some_and(|age| age >= ADULT_AGE)
    }

    pub fn age_group(&self) -> AgeGroup {
        AgeGroup::from_age(self.age())
    }

    /// Contact digits only, used for duplicate detection.
    pub fn contact_digits(&self) -> String {
        contact_digits(&self.contact_number)
    }

    /// `(xxx) xxx-xxxx` for exactly ten digits, the raw value otherwise.
    pub fn formatted_contact(&self) -> String {
        let digits = self.contact_digits();
        if digits.len() == 10 {
            format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
        } else {
            self.contact_number.clone()
        }
    }
}

impl Entity for Patient {
    const KIND: &'static str = "patient";
    const TABLE: &'static str = "patients";

    fn fields() -> &'static [FieldSpec] {
        &PATIENT_FIELDS
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn to_record(&self) -> Record {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("date_of_birth", &self.date_of_birth),
            ("gender", &self.gender),
            ("contact_number", &self.contact_number),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), FieldValue::text(value.as_str())))
        .collect()
    }

    fn from_record(meta: EntityMeta, record: &Record) -> Result<Self, EntityError> {
        let data = NewPatient {
            first_name: required_text(record, Self::KIND, "first_name")?,
            last_name: required_text(record, Self::KIND, "last_name")?,
            date_of_birth: required_text(record, Self::KIND, "date_of_birth")?,
            gender: required_text(record, Self::KIND, "gender")?,
            contact_number: required_text(record, Self::KIND, "contact_number")?,
        };
        Self::build(meta, data)
    }
}

fn checked_text(field: &'static str, value: String) -> Result<String, EntityError> {
    let accepted = Patient::field_spec(field)
        .is_some_and(|spec| spec.validator.check_text(&value));
    if !accepted {
        return Err(EntityError::InvalidFieldValue {
            kind: Patient::KIND,
            field,
        });
    }
    Ok(value.trim().to_string())
}
