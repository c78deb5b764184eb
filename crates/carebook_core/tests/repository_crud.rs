use carebook_core::db::open_db_in_memory;
use carebook_core::{
    Entity, EntityId, EntityRepository, FieldValue, GatewayRepository, ListQuery, MemoryGateway,
    NewPatient, NewTask, OrderBy, Patient, Predicate, Record, RepoError, SqliteGateway,
    StorageGateway, Task, TaskStatus,
};

fn patient(first: &str, last: &str, contact: &str) -> Patient {
    Patient::new(NewPatient::new(first, last, "1985-07-04", "male", contact)).unwrap()
}

fn with_both_gateways(check: impl Fn(&dyn StorageGateway)) {
    let memory = MemoryGateway::new();
    check(&memory);

    let conn = open_db_in_memory().unwrap();
    let sqlite = SqliteGateway::try_new(&conn).unwrap();
    check(&sqlite);
}

#[test]
fn create_then_find_returns_equal_entity() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Patient, _>::new(gateway);
        let original = patient("Omar", "Haddad", "555-010-2020");
        let created = repo.create(original.clone()).unwrap();

        let id = created.id().unwrap();
        assert_eq!(id.get(), 1);
        assert!(created.meta().created_at.is_some());

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.to_record(), original.to_record());
    });
}

#[test]
fn find_by_id_of_unknown_id_is_none() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Patient, _>::new(gateway);
        assert!(repo.find_by_id(EntityId::new(7).unwrap()).unwrap().is_none());
        assert!(!repo.exists(EntityId::new(7).unwrap()).unwrap());
    });
}

#[test]
fn find_all_defaults_to_ascending_id_and_honors_explicit_order() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Patient, _>::new(gateway);
        for first in ["zoe", "Adam", "mia"] {
            repo.create(patient(first, "Ng", "5550000000")).unwrap();
        }

        let by_id: Vec<_> = repo
            .find_all(&ListQuery::default())
            .unwrap()
            .iter()
            .map(|p| p.first_name().to_string())
            .collect();
        assert_eq!(by_id, vec!["zoe", "Adam", "mia"]);

        let by_name: Vec<_> = repo
            .find_all(&ListQuery::default().order_by(OrderBy::asc("first_name")))
            .unwrap()
            .iter()
            .map(|p| p.first_name().to_string())
            .collect();
        assert_eq!(by_name, vec!["Adam", "mia", "zoe"]);
    });
}

#[test]
fn update_reflects_change_and_never_moves_updated_at_backwards() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Patient, _>::new(gateway);
        let created = repo.create(patient("Lena", "Berg", "555-123-0000")).unwrap();
        let id = created.id().unwrap();

        let mut changes = Record::new();
        changes.insert("last_name".to_string(), FieldValue::text("Berg-Olsen"));
        let updated = repo.update(id, &changes).unwrap();

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.last_name(), "Berg-Olsen");
        assert_eq!(found.first_name(), "Lena");
        assert_eq!(found.meta().updated_at, updated.meta().updated_at);
        assert!(found.meta().updated_at >= created.meta().updated_at);
        assert_eq!(found.meta().created_at, created.meta().created_at);
    });
}

#[test]
fn invalid_update_is_rejected_before_storage() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Patient, _>::new(gateway);
        let created = repo.create(patient("Lena", "Berg", "555-123-0000")).unwrap();
        let id = created.id().unwrap();

        let mut changes = Record::new();
        changes.insert("date_of_birth".to_string(), FieldValue::text("1985-13-40"));
        let err = repo.update(id, &changes).unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.date_of_birth(), "1985-07-04");
    });
}

#[test]
fn save_inserts_then_rewrites_in_place() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Patient, _>::new(gateway);
        let mut entity = patient("Rui", "Costa", "5559876543");
        repo.save(&mut entity).unwrap();
        let id = entity.id().unwrap();

        entity.set_contact_number("555-111-2222").unwrap();
        repo.save(&mut entity).unwrap();

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.contact_number(), "555-111-2222");
        assert_eq!(repo.count(None).unwrap(), 1);
    });
}

#[test]
fn delete_twice_returns_false_the_second_time() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Patient, _>::new(gateway);
        let created = repo.create(patient("Ivy", "Stone", "5551112222")).unwrap();
        let id = created.id().unwrap();

        assert!(repo.delete(id).unwrap());
        assert!(!repo.delete(id).unwrap());
        assert!(repo.find_by_id(id).unwrap().is_none());
    });
}

#[test]
fn count_and_predicates_agree_across_gateways() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Patient, _>::new(gateway);
        repo.create(patient("Anna", "Lind", "5551112222")).unwrap();
        repo.create(patient("Hanna", "Berg", "5551112223")).unwrap();
        repo.create(patient("Otto", "Anders", "5551112224")).unwrap();

        let contains = Predicate::contains(&["first_name", "last_name"], "ANN");
        assert_eq!(repo.count(Some(&contains)).unwrap(), 2);

        let like_wildcard = Predicate::contains(&["first_name"], "%");
        assert_eq!(repo.count(Some(&like_wildcard)).unwrap(), 0);

        let page = ListQuery {
            limit: Some(1),
            offset: 1,
            ..ListQuery::default()
        };
        let second = repo.find_all(&page).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].first_name(), "Hanna");
    });
}

#[test]
fn task_optional_columns_survive_storage() {
    with_both_gateways(|gateway| {
        let repo = GatewayRepository::<Task, _>::new(gateway);
        let mut data = NewTask::new("Refill prescription", "dr-lee");
        data.description = Some("Two month supply".to_string());
        data.due_date = Some("2031-05-01".to_string());
        let created = repo.create(Task::new(data).unwrap()).unwrap();
        let id = created.id().unwrap();

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.description(), Some("Two month supply"));
        assert_eq!(found.assigned_to(), None);
        assert_eq!(found.status(), TaskStatus::Pending);

        let mut changes = Record::new();
        changes.insert("description".to_string(), FieldValue::Null);
        let cleared = repo.update(id, &changes).unwrap();
        assert_eq!(cleared.description(), None);
        assert_eq!(
            repo.find_by_id(id).unwrap().unwrap().description(),
            None
        );
    });
}
