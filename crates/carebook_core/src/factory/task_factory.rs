//! Task construction, including the "must be assigned" preset.

use super::{unsupported, AnyEntity, FactoryError, FactoryResult, ModelFactory};
use crate::model::entity::{optional_text, required_text};
use crate::model::{Entity, EntityError, NewTask, Task, TaskPriority};
use crate::storage::Record;

const FACTORY_NAME: &str = "task";
const MODELS: &[&str] = &["task", "assigned_task"];

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFactory;

impl TaskFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn create_task(&self, data: NewTask) -> FactoryResult<Task> {
        Ok(Task::new(data)?)
    }

    /// # Errors
    /// - `Precondition` when `assignee` is blank.
    pub fn create_assigned_task(&self, mut data: NewTask, assignee: &str) -> FactoryResult<Task> {
        let assignee = assignee.trim();
        if assignee.is_empty() {
            return Err(FactoryError::Precondition(
                "assigned task requires an assignee".to_string(),
            ));
        }
        data.assigned_to = Some(assignee.to_string());
        self.create_task(data)
    }
}

impl ModelFactory for TaskFactory {
    fn name(&self) -> &str {
        FACTORY_NAME
    }

    fn supported_models(&self) -> &'static [&'static str] {
        MODELS
    }

    fn create_model(&self, model_type: &str, data: &Record) -> FactoryResult<AnyEntity> {
        if !MODELS.contains(&model_type) {
            return Err(unsupported(FACTORY_NAME, model_type));
        }

        let mut input = new_task_from_record(data)?;
        let task = if model_type == "assigned_task" {
            let assignee = input.assigned_to.take().unwrap_or_default();
            self.create_assigned_task(input, &assignee)?
        } else {
            self.create_task(input)?
        };
        Ok(AnyEntity::Task(task))
    }
}

fn new_task_from_record(data: &Record) -> Result<NewTask, EntityError> {
    let priority = match optional_text(data, Task::KIND, "priority")? {
        None => TaskPriority::default(),
        Some(value) => TaskPriority::parse(&value).ok_or(EntityError::InvalidEntityData {
            kind: Task::KIND,
            field: "priority",
        })?,
    };

    Ok(NewTask {
        title: required_text(data, Task::KIND, "title")?,
        description: optional_text(data, Task::KIND, "description")?,
        priority,
        created_by: required_text(data, Task::KIND, "created_by")?,
        assigned_to: optional_text(data, Task::KIND, "assigned_to")?,
        due_date: optional_text(data, Task::KIND, "due_date")?,
    })
}
