//! Patient use-case service.
//!
//! # Responsibility
//! - Provide patient-specific create/update/query APIs.
//! - Derive statistics and duplicate-contact groupings from snapshots.
//!
//! # Invariants
//! - Name search results are ordered by first name, then last name.
//! - Duplicate groups contain at least two patients and are ordered by the
//!   id of their first member.
//! - Age-based queries use one `today` for the whole snapshot.

use super::entity_service::{BulkCreateReport, EntityService};
use super::{round1, OperationContext, ServiceError, ServiceResult};
use crate::model::{AgeGroup, EntityId, NewPatient, Patient, PatientChanges};
use crate::repo::{EntityRepository, GatewayRepository};
use crate::storage::{now_millis, ListQuery, OrderBy, Predicate, StorageGateway};
use crate::validate::today;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Age figures over patients whose age is defined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeSummary {
    /// Mean age rounded to one decimal.
    pub average: f64,
    pub min: u32,
    pub max: u32,
}

/// Aggregate view over every stored patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientStatistics {
    pub total: u64,
    pub adults: u64,
    pub minors: u64,
    /// Gender value -> patient count.
    pub gender_distribution: BTreeMap<String, u64>,
    /// `None` when no patient has a defined age.
    pub age: Option<AgeSummary>,
}

/// Read-only projection of one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    pub id: EntityId,
    pub full_name: String,
    pub age: Option<u32>,
    pub age_group: AgeGroup,
    pub gender: String,
    pub contact: String,
    pub is_adult: bool,
}

/// Use-case service for patients.
pub struct PatientService<R> {
    inner: EntityService<Patient, R>,
}

impl<G: StorageGateway> PatientService<GatewayRepository<Patient, G>> {
    /// Service over a gateway-backed patient repository.
    pub fn from_gateway(gateway: G) -> Self {
        Self::new(GatewayRepository::new(gateway))
    }
}

impl<R: EntityRepository<Patient>> PatientService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            inner: EntityService::new(repo),
        }
    }

    /// Generic CRUD surface shared with other entity types.
    pub fn entities(&self) -> &EntityService<Patient, R> {
        &self.inner
    }

    /// Validates and persists a new patient.
    pub fn create(&self, data: NewPatient) -> ServiceResult<Patient> {
        let patient = Patient::new(data).context("create_patient")?;
        self.inner
            .repo()
            .create(patient)
            .context("create_patient")
    }

    pub fn get(&self, id: EntityId) -> ServiceResult<Option<Patient>> {
        self.inner.repo().find_by_id(id).context("get_patient")
    }

    /// Every patient, ascending id.
    pub fn all(&self) -> ServiceResult<Vec<Patient>> {
        self.inner
            .repo()
            .find_all(&ListQuery::default())
            .context("list_patients")
    }

    /// Applies a partial update; only the given fields are validated and written.
    pub fn update(&self, id: EntityId, changes: &PatientChanges) -> ServiceResult<Patient> {
        self.inner
            .repo()
            .update(id, &changes.to_record())
            .context("update_patient")
    }

    pub fn delete(&self, id: EntityId) -> ServiceResult<bool> {
        self.inner.repo().delete(id).context("delete_patient")
    }

    pub fn count(&self) -> ServiceResult<u64> {
        self.inner.repo().count(None).context("count_patients")
    }

    pub fn exists(&self, id: EntityId) -> ServiceResult<bool> {
        self.inner.repo().exists(id).context("patient_exists")
    }

    pub fn bulk_create(&self, items: Vec<NewPatient>) -> BulkCreateReport<Patient> {
        self.inner.bulk_create(items, Patient::new)
    }

    pub fn bulk_delete(&self, ids: &[EntityId]) -> ServiceResult<u64> {
        self.inner.bulk_delete(ids)
    }

    /// Case-insensitive substring match on first or last name.
    pub fn search_by_name(&self, term: &str) -> ServiceResult<Vec<Patient>> {
        let query = ListQuery::filtered(Predicate::contains(
            &["first_name", "last_name"],
            term.trim(),
        ))
        .order_by(OrderBy::asc("first_name"))
        .order_by(OrderBy::asc("last_name"));
        self.inner.repo().find_all(&query).context("search_by_name")
    }

    /// Case-insensitive gender match, ordered by first name.
    pub fn by_gender(&self, gender: &str) -> ServiceResult<Vec<Patient>> {
        let query = ListQuery::filtered(Predicate::eq_ignore_case("gender", gender.trim()))
            .order_by(OrderBy::asc("first_name"));
        self.inner.repo().find_all(&query).context("by_gender")
    }

    pub fn adults(&self) -> ServiceResult<Vec<Patient>> {
        self.adults_on(today())
    }

    pub fn adults_on(&self, today: NaiveDate) -> ServiceResult<Vec<Patient>> {
        let mut patients = self.all()?;
        patients.retain(|patient| patient.is_adult_on(today));
        Ok(patients)
    }

    pub fn minors(&self) -> ServiceResult<Vec<Patient>> {
        self.minors_on(today())
    }

    /// Patients with a defined age below the adult threshold.
    pub fn minors_on(&self, today: NaiveDate) -> ServiceResult<Vec<Patient>> {
        let mut patients = self.all()?;
        patients.retain(|patient| {
            patient.age_on(today).is_some() && !patient.is_adult_on(today)
        });
        Ok(patients)
    }

    pub fn by_age_range(&self, min: u32, max: u32) -> ServiceResult<Vec<Patient>> {
        self.by_age_range_on(min, max, today())
    }

    /// Patients whose age lies in `min..=max`.
    ///
    /// # Errors
    /// - `InvalidArgument` when `min > max`.
    pub fn by_age_range_on(
        &self,
        min: u32,
        max: u32,
        today: NaiveDate,
    ) -> ServiceResult<Vec<Patient>> {
        if min > max {
            return Err(ServiceError::invalid_argument(
                "by_age_range",
                format!("min age {min} exceeds max age {max}"),
            ));
        }
        let mut patients = self.all()?;
        patients.retain(|patient| {
            patient
                .age_on(today)
                .is_some_and(|age| (min..=max).contains(&age))
        });
        Ok(patients)
    }

    /// Patients created within the last `days` days, newest first.
    ///
    /// `days == 0` is an empty window. A window reaching past the earliest
    /// representable instant lists every patient.
    pub fn recent(&self, days: u32) -> ServiceResult<Vec<Patient>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let cutoff = Duration::try_days(i64::from(days))
            .and_then(|window| now_millis().checked_sub_signed(window));
        let query = match cutoff {
            Some(cutoff) => ListQuery::filtered(Predicate::at_least(
                "created_at",
                cutoff.timestamp_millis(),
            )),
            None => ListQuery::default(),
        }
        .order_by(OrderBy::desc("created_at"));
        self.inner.repo().find_all(&query).context("recent_patients")
    }

    /// Groups patients whose contact numbers share the same digits.
    pub fn duplicate_contacts(&self) -> ServiceResult<Vec<Vec<Patient>>> {
        let patients = self.all()?;
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<Patient>> = Vec::new();

        for patient in patients {
            let digits = patient.contact_digits();
            match slots.get(&digits) {
                Some(&slot) => groups[slot].push(patient),
                None => {
                    slots.insert(digits, groups.len());
                    groups.push(vec![patient]);
                }
            }
        }

        groups.retain(|group| group.len() > 1);
        Ok(groups)
    }

    pub fn statistics(&self) -> ServiceResult<PatientStatistics> {
        self.statistics_on(today())
    }

    pub fn statistics_on(&self, today: NaiveDate) -> ServiceResult<PatientStatistics> {
        let patients = self.all()?;
        let mut stats = PatientStatistics {
            total: patients.len() as u64,
            adults: 0,
            minors: 0,
            gender_distribution: BTreeMap::new(),
            age: None,
        };

        let mut ages: Vec<u32> = Vec::with_capacity(patients.len());
        for patient in &patients {
            *stats
                .gender_distribution
                .entry(patient.gender().to_string())
                .or_insert(0) += 1;
            if let Some(age) = patient.age_on(today) {
                ages.push(age);
                if patient.is_adult_on(today) {
                    stats.adults += 1;
                } else {
                    stats.minors += 1;
                }
            }
        }

        if let (Some(min), Some(max)) = (ages.iter().min(), ages.iter().max()) {
            let sum: u64 = ages.iter().map(|age| u64::from(*age)).sum();
            stats.age = Some(AgeSummary {
                average: round1(sum as f64 / ages.len() as f64),
                min: *min,
                max: *max,
            });
        }

        Ok(stats)
    }

    /// Summary projection of one patient; `None` for unknown ids.
    pub fn summary(&self, id: EntityId) -> ServiceResult<Option<PatientSummary>> {
        let today = today();
        Ok(self.get(id)?.map(|patient| PatientSummary {
            id,
            full_name: patient.full_name(),
            age: patient.age_on(today),
            age_group: AgeGroup::from_age(patient.age_on(today)),
            gender: patient.gender().to_string(),
            contact: patient.formatted_contact(),
            is_adult: patient.is_adult_on(today),
        }))
    }
}
