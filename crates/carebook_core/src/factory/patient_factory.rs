//! Patient construction under age and contact preconditions.

use super::{unsupported, AnyEntity, FactoryError, FactoryResult, ModelFactory};
use crate::model::{Entity, EntityMeta, NewPatient, Patient, ADULT_AGE};
use crate::storage::Record;
use crate::validate::{is_valid_contact, today};
use chrono::NaiveDate;
use log::debug;

const FACTORY_NAME: &str = "patient";
const MODELS: &[&str] = &["patient", "adult_patient", "minor_patient"];

/// Builds patients, optionally enforcing an age bracket.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientFactory;

impl PatientFactory {
    pub fn new() -> Self {
        Self
    }

    /// Field validation only.
    pub fn create_patient(&self, data: NewPatient) -> FactoryResult<Patient> {
        Ok(Patient::new(data)?)
    }

    pub fn create_adult_patient(&self, data: NewPatient) -> FactoryResult<Patient> {
        self.create_adult_patient_on(data, today())
    }

    /// # Errors
    /// - `Precondition` when the patient is younger than 18 on `today`.
    pub fn create_adult_patient_on(
        &self,
        data: NewPatient,
        today: NaiveDate,
    ) -> FactoryResult<Patient> {
        ensure_adult(Patient::new(data)?, today)
    }

    pub fn create_minor_patient(&self, data: NewPatient) -> FactoryResult<Patient> {
        self.create_minor_patient_on(data, today())
    }

    /// # Errors
    /// - `Precondition` when the patient is 18 or older on `today`.
    pub fn create_minor_patient_on(
        &self,
        data: NewPatient,
        today: NaiveDate,
    ) -> FactoryResult<Patient> {
        ensure_minor(Patient::new(data)?, today)
    }

    /// Checks the contact number before any other field.
    pub fn create_with_contact_check(&self, data: NewPatient) -> FactoryResult<Patient> {
        if !is_valid_contact(&data.contact_number) {
            debug!("event=factory_precondition module=factory status=rejected rule=contact");
            return Err(FactoryError::Precondition(
                "contact number must contain 7 to 15 digits".to_string(),
            ));
        }
        self.create_patient(data)
    }
}

impl ModelFactory for PatientFactory {
    fn name(&self) -> &str {
        FACTORY_NAME
    }

    fn supported_models(&self) -> &'static [&'static str] {
        MODELS
    }

    fn create_model(&self, model_type: &str, data: &Record) -> FactoryResult<AnyEntity> {
        let today = today();
        let build = || Patient::from_record(EntityMeta::default(), data);
        let patient = match model_type {
            "patient" => build()?,
            "adult_patient" => ensure_adult(build()?, today)?,
            "minor_patient" => ensure_minor(build()?, today)?,
            other => return Err(unsupported(FACTORY_NAME, other)),
        };
        Ok(AnyEntity::Patient(patient))
    }
}

fn ensure_adult(patient: Patient, today: NaiveDate) -> FactoryResult<Patient> {
    if patient.is_adult_on(today) {
        Ok(patient)
    } else {
        debug!("event=factory_precondition module=factory status=rejected rule=adult");
        Err(FactoryError::Precondition(format!(
            "patient must be at least {ADULT_AGE} years old"
        )))
    }
}

fn ensure_minor(patient: Patient, today: NaiveDate) -> FactoryResult<Patient> {
    if patient.age_on(today).is_some() && !patient.is_adult_on(today) {
        Ok(patient)
    } else {
        debug!("event=factory_precondition module=factory status=rejected rule=minor");
        Err(FactoryError::Precondition(format!(
            "patient must be younger than {ADULT_AGE} years"
        )))
    }
}
