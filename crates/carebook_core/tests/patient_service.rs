use carebook_core::db::open_db_in_memory;
use carebook_core::validate::parse_date;
use carebook_core::{
    AgeGroup, Entity, EntityId, GatewayRepository, MemoryGateway, NewPatient, Patient,
    PatientChanges, PatientService, SqliteGateway, StorageGateway,
};

type Service<'g> = PatientService<GatewayRepository<Patient, &'g dyn StorageGateway>>;

fn with_both_services(check: impl Fn(&Service<'_>)) {
    let memory = MemoryGateway::new();
    check(&PatientService::from_gateway(&memory as &dyn StorageGateway));

    let conn = open_db_in_memory().unwrap();
    let sqlite = SqliteGateway::try_new(&conn).unwrap();
    check(&PatientService::from_gateway(&sqlite as &dyn StorageGateway));
}

fn data(first: &str, last: &str, dob: &str, gender: &str, contact: &str) -> NewPatient {
    NewPatient::new(first, last, dob, gender, contact)
}

#[test]
fn duplicate_contacts_group_by_digits_only() {
    with_both_services(|service| {
        let a = service
            .create(data("Jane", "Doe", "1990-01-01", "female", "123-456-7890"))
            .unwrap();
        service
            .create(data("Unique", "Person", "1980-02-02", "male", "555-000-1111"))
            .unwrap();
        let b = service
            .create(data("John", "Doe", "1991-03-03", "male", "1234567890"))
            .unwrap();

        let groups = service.duplicate_contacts().unwrap();
        assert_eq!(groups.len(), 1);
        let ids: Vec<_> = groups[0].iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    });
}

#[test]
fn search_by_name_matches_either_name_and_orders_by_first_then_last() {
    with_both_services(|service| {
        for (first, last) in [
            ("Tom", "Anderson"),
            ("Andy", "Zed"),
            ("andy", "Adams"),
            ("Kim", "Lo"),
        ] {
            service
                .create(data(first, last, "1970-05-05", "other", "5551230000"))
                .unwrap();
        }

        let names: Vec<_> = service
            .search_by_name("and")
            .unwrap()
            .iter()
            .map(|p| p.full_name())
            .collect();
        assert_eq!(names, vec!["andy Adams", "Andy Zed", "Tom Anderson"]);
    });
}

#[test]
fn by_gender_is_case_insensitive_and_ordered_by_first_name() {
    with_both_services(|service| {
        service
            .create(data("Zara", "Ali", "1990-01-01", "FEMALE", "5551230000"))
            .unwrap();
        service
            .create(data("Bo", "Li", "1990-01-01", "male", "5551230001"))
            .unwrap();
        service
            .create(data("Amy", "Ng", "1990-01-01", "female", "5551230002"))
            .unwrap();

        let names: Vec<_> = service
            .by_gender("Female")
            .unwrap()
            .iter()
            .map(|p| p.first_name().to_string())
            .collect();
        assert_eq!(names, vec!["Amy", "Zara"]);
    });
}

#[test]
fn age_queries_use_the_reference_day() {
    with_both_services(|service| {
        let today = parse_date("2024-06-15").unwrap();
        service
            .create(data("Adult", "One", "2006-06-15", "male", "5550000001"))
            .unwrap();
        service
            .create(data("Minor", "One", "2006-06-16", "male", "5550000002"))
            .unwrap();
        service
            .create(data("Senior", "One", "1950-01-01", "female", "5550000003"))
            .unwrap();

        assert_eq!(service.adults_on(today).unwrap().len(), 2);
        let minors = service.minors_on(today).unwrap();
        assert_eq!(minors.len(), 1);
        assert_eq!(minors[0].first_name(), "Minor");

        let range = service.by_age_range_on(17, 18, today).unwrap();
        assert_eq!(range.len(), 2);

        let stats = service.statistics_on(today).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.adults, 2);
        assert_eq!(stats.minors, 1);
        assert_eq!(stats.gender_distribution.get("male"), Some(&2));
        let age = stats.age.unwrap();
        assert_eq!((age.min, age.max), (17, 74));
        assert_eq!(age.average, 36.3);
    });
}

#[test]
fn bulk_create_records_failures_and_keeps_going() {
    with_both_services(|service| {
        let report = service.bulk_create(vec![
            data("Good", "One", "1990-01-01", "male", "5550000001"),
            data("B", "Two", "1990-01-01", "male", "5550000002"),
            data("Good", "Three", "1990-01-01", "male", "5550000003"),
        ]);

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(report.failures[0].error.is_validation());
        assert_eq!(service.count().unwrap(), 2);

        let ids: Vec<EntityId> = report.created.iter().filter_map(|p| p.id()).collect();
        let missing = EntityId::new(99).unwrap();
        let deleted = service
            .bulk_delete(&[ids[0], missing, ids[1]])
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(service.count().unwrap(), 0);
    });
}

#[test]
fn update_of_unknown_patient_is_not_found_with_operation_name() {
    with_both_services(|service| {
        let err = service
            .update(EntityId::new(5).unwrap(), &PatientChanges::contact_number("5551234567"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.operation(), "update_patient");
    });
}

#[test]
fn summary_and_recent_projections() {
    with_both_services(|service| {
        let created = service
            .create(data("Jane", "Doe", "1990-01-01", "female", "555-123-4567"))
            .unwrap();
        let id = created.id().unwrap();

        let summary = service.summary(id).unwrap().unwrap();
        assert_eq!(summary.full_name, "Jane Doe");
        assert_eq!(summary.contact, "(555) 123-4567");
        assert!(summary.is_adult);
        assert_ne!(summary.age_group, AgeGroup::Unknown);
        assert!(service.summary(EntityId::new(404).unwrap()).unwrap().is_none());

        let recent = service.recent(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id(), Some(id));
    });
}

#[test]
fn recent_handles_empty_and_unbounded_windows() {
    with_both_services(|service| {
        let first = service
            .create(data("Ana", "Lima", "1985-03-03", "female", "555-222-3333"))
            .unwrap();
        let second = service
            .create(data("Ben", "Okafor", "1979-07-07", "male", "555-444-5555"))
            .unwrap();

        assert!(service.recent(0).unwrap().is_empty());

        let everyone = service.recent(u32::MAX).unwrap();
        let mut ids: Vec<_> = everyone.iter().filter_map(Patient::id).collect();
        ids.sort();
        assert_eq!(ids, vec![first.id().unwrap(), second.id().unwrap()]);
    });
}
