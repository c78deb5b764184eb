use carebook_core::db::open_db_in_memory;
use carebook_core::{
    Entity, NewTask, SqliteGateway, TaskChanges, TaskFilter, TaskPriority, TaskService,
    TaskStatus,
};

#[test]
fn task_lifecycle_against_sqlite() {
    let conn = open_db_in_memory().unwrap();
    let gateway = SqliteGateway::try_new(&conn).unwrap();
    let service = TaskService::from_gateway(&gateway);

    let mut urgent = NewTask::new("Review labs", "dr-kim");
    urgent.priority = TaskPriority::Urgent;
    let first = service.create_task(urgent).unwrap();
    let second = service
        .create_task(NewTask::new("Order supplies", "admin"))
        .unwrap();
    let first_id = first.id().unwrap();
    let second_id = second.id().unwrap();

    let assigned = service.assign(second_id, Some("dr-kim")).unwrap();
    assert_eq!(assigned.assigned_to(), Some("dr-kim"));

    let completed = service.mark_completed(first_id).unwrap();
    assert_eq!(completed.status(), TaskStatus::Completed);
    let stored = service.get_task(first_id).unwrap().unwrap();
    assert_eq!(stored.completed_at(), completed.completed_at());
    assert!(stored.completed_at().is_some());

    let mine = service.tasks_for_user("dr-kim").unwrap();
    assert_eq!(mine.len(), 2);

    let stats = service.statistics(Some("dr-kim")).unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.completion_rate, 50.0);

    let pending = service
        .list_tasks(&TaskFilter {
            status: Some(TaskStatus::Pending),
            ..TaskFilter::default()
        })
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id(), Some(second_id));

    let reopened = service
        .update_task(first_id, &TaskChanges::status(TaskStatus::InProgress))
        .unwrap();
    assert!(reopened.completed_at().is_none());
    assert!(service
        .get_task(first_id)
        .unwrap()
        .unwrap()
        .completed_at()
        .is_none());

    let distribution = service.status_distribution().unwrap();
    assert_eq!(distribution.get(&TaskStatus::InProgress), Some(&1));
    assert_eq!(distribution.get(&TaskStatus::Completed), Some(&0));

    let unassigned = service.assign(second_id, None).unwrap();
    assert_eq!(unassigned.assigned_to(), None);
    assert!(service.delete_task(second_id).unwrap());
}

#[test]
fn statistics_of_unknown_user_are_zero() {
    let conn = open_db_in_memory().unwrap();
    let gateway = SqliteGateway::try_new(&conn).unwrap();
    let service = TaskService::from_gateway(&gateway);

    let stats = service.statistics(Some("nobody")).unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.completion_rate, 0.0);
}

#[test]
fn mark_completed_of_unknown_task_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let gateway = SqliteGateway::try_new(&conn).unwrap();
    let service = TaskService::from_gateway(&gateway);

    let err = service
        .mark_completed(carebook_core::EntityId::new(3).unwrap())
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.operation(), "mark_completed");
}
