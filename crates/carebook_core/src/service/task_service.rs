//! Task use-case service.
//!
//! # Responsibility
//! - Provide task create/list/assign/complete APIs.
//! - Compute per-user progress figures.
//!
//! # Invariants
//! - Listing is ascending id unless a caller passes explicit ordering.
//! - A user's tasks are those they created or are assigned to.

use super::entity_service::EntityService;
use super::{round1, OperationContext, ServiceResult};
use crate::model::{Entity, EntityId, NewTask, Task, TaskChanges, TaskPriority, TaskStatus};
use crate::repo::{EntityRepository, GatewayRepository, RepoError};
use crate::storage::{now_millis, FieldValue, ListQuery, Predicate, Record, StorageGateway};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

/// Filter and paging options for listing tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl TaskFilter {
    fn to_query(&self) -> ListQuery {
        let mut clauses = Vec::new();
        if let Some(status) = self.status {
            clauses.push(Predicate::equals("status", status.as_str()));
        }
        if let Some(priority) = self.priority {
            clauses.push(Predicate::equals("priority", priority.as_str()));
        }
        ListQuery {
            predicate: (!clauses.is_empty()).then_some(Predicate::All(clauses)),
            limit: self.limit,
            offset: self.offset,
            ..ListQuery::default()
        }
    }
}

/// Progress figures for one user (or for every task).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatistics {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub cancelled: u64,
    /// `completed / total` as a percentage with one decimal; `0.0` when empty.
    pub completion_rate: f64,
}

/// Use-case service for tasks.
pub struct TaskService<R> {
    inner: EntityService<Task, R>,
}

impl<G: StorageGateway> TaskService<GatewayRepository<Task, G>> {
    /// Service over a gateway-backed task repository.
    pub fn from_gateway(gateway: G) -> Self {
        Self::new(GatewayRepository::new(gateway))
    }
}

impl<R: EntityRepository<Task>> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            inner: EntityService::new(repo),
        }
    }

    pub fn entities(&self) -> &EntityService<Task, R> {
        &self.inner
    }

    /// Creates a `pending` task.
    pub fn create_task(&self, data: NewTask) -> ServiceResult<Task> {
        let task = Task::new(data).context("create_task")?;
        self.inner.repo().create(task).context("create_task")
    }

    pub fn get_task(&self, id: EntityId) -> ServiceResult<Option<Task>> {
        self.inner.repo().find_by_id(id).context("get_task")
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> ServiceResult<Vec<Task>> {
        self.inner
            .repo()
            .find_all(&filter.to_query())
            .context("list_tasks")
    }

    pub fn update_task(&self, id: EntityId, changes: &TaskChanges) -> ServiceResult<Task> {
        self.inner
            .repo()
            .update(id, &changes.to_record())
            .context("update_task")
    }

    pub fn delete_task(&self, id: EntityId) -> ServiceResult<bool> {
        self.inner.repo().delete(id).context("delete_task")
    }

    /// Tasks created by or assigned to `user_id`, ascending id.
    pub fn tasks_for_user(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        self.inner
            .repo()
            .find_all(&ListQuery::filtered(involving(user_id)))
            .context("tasks_for_user")
    }

    /// Marks a task completed and stamps `completed_at`.
    pub fn mark_completed(&self, id: EntityId) -> ServiceResult<Task> {
        let mut task = self
            .inner
            .repo()
            .find_by_id(id)
            .and_then(|task| {
                task.ok_or(RepoError::NotFound {
                    kind: Task::KIND,
                    id,
                })
            })
            .context("mark_completed")?;
        task.mark_completed(now_millis());
        self.inner.repo().save(&mut task).context("mark_completed")?;
        info!("event=task_completed module=service status=ok id={id}");
        Ok(task)
    }

    /// Sets or clears the assignee.
    pub fn assign(&self, id: EntityId, user_id: Option<&str>) -> ServiceResult<Task> {
        let mut changes = Record::new();
        changes.insert(
            "assigned_to".to_string(),
            user_id.map(str::trim).filter(|user| !user.is_empty()).into(),
        );
        self.inner.repo().update(id, &changes).context("assign_task")
    }

    /// Progress figures for `user_id`, or for every task when `None`.
    pub fn statistics(&self, user_id: Option<&str>) -> ServiceResult<TaskStatistics> {
        let tasks = match user_id {
            Some(user_id) => self.tasks_for_user(user_id)?,
            None => self
                .inner
                .repo()
                .find_all(&ListQuery::default())
                .context("task_statistics")?,
        };

        let mut stats = TaskStatistics {
            total: tasks.len() as u64,
            completed: 0,
            pending: 0,
            in_progress: 0,
            cancelled: 0,
            completion_rate: 0.0,
        };
        for task in &tasks {
            match task.status() {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        if stats.total > 0 {
            stats.completion_rate = round1(stats.completed as f64 * 100.0 / stats.total as f64);
        }
        Ok(stats)
    }

    /// Count per status, including statuses with no tasks.
    pub fn status_distribution(&self) -> ServiceResult<BTreeMap<TaskStatus, u64>> {
        TaskStatus::ALL
            .into_iter()
            .map(|status| {
                let predicate = Predicate::equals("status", status.as_str());
                self.inner
                    .repo()
                    .count(Some(&predicate))
                    .map(|count| (status, count))
                    .context("status_distribution")
            })
            .collect()
    }
}

fn involving(user_id: &str) -> Predicate {
    let user_id = user_id.trim();
    Predicate::Any(vec![
        Predicate::equals("created_by", user_id),
        Predicate::equals("assigned_to", FieldValue::text(user_id)),
    ])
}

#[cfg(test)]
mod tests {
    use super::{TaskFilter, TaskService};
    use crate::model::{Entity, NewTask, TaskPriority, TaskStatus};
    use crate::storage::MemoryGateway;

    #[test]
    fn filter_without_options_has_no_predicate() {
        assert!(TaskFilter::default().to_query().predicate.is_none());
    }

    #[test]
    fn statistics_count_created_and_assigned_tasks() {
        let gateway = MemoryGateway::new();
        let service = TaskService::from_gateway(&gateway);

        let own = service.create_task(NewTask::new("Own", "alice")).unwrap();
        let mut data = NewTask::new("Delegated", "bob");
        data.assigned_to = Some("alice".to_string());
        data.priority = TaskPriority::High;
        service.create_task(data).unwrap();
        service.create_task(NewTask::new("Other", "bob")).unwrap();

        service.mark_completed(own.id().unwrap()).unwrap();

        let stats = service.statistics(Some("alice")).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completion_rate, 50.0);

        let high = service
            .list_tasks(&TaskFilter {
                priority: Some(TaskPriority::High),
                ..TaskFilter::default()
            })
            .unwrap();
        assert_eq!(high.len(), 1);

        let distribution = service.status_distribution().unwrap();
        assert_eq!(distribution.get(&TaskStatus::Pending), Some(&2));
        assert_eq!(distribution.get(&TaskStatus::Cancelled), Some(&0));
    }
}
