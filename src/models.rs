use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Entity types ──────────────────────────────────────────────

/// A lifecycle label ("To Do", "In Progress", "Done") shared by tasks
/// and subtasks. Rows are created on demand (get-or-create by name)
/// and never deleted by application logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: Uuid,
    pub name: String,
}

/// A top-level work item. Owns zero or more subtasks; deleting a task
/// cascades to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status_id: Uuid,
    pub deadline: Option<DateTime<Utc>>,
}

/// A child work item. `task_id` always references an existing task at
/// creation time; `created_at` is server-assigned and immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status_id: Uuid,
    pub deadline: Option<DateTime<Utc>>,
    pub task_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An independently managed tag. Names are unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

// ── Task API types ────────────────────────────────────────────

/// Body of POST /api/tasks/create/. Everything is optional at the
/// parse stage; presence checks happen in the service so the response
/// can name the missing field.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Task as rendered by the create and detail endpoints: status is the
/// resolved status name.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRepr {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TaskCreated {
    pub message: &'static str,
    pub task: TaskRepr,
}

/// Task as rendered by the list endpoint: TaskRepr plus the computed
/// overdue flag.
#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
    pub is_overdue: bool,
}

/// Echo of the query params the list was filtered by.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TaskFilters {
    pub status: Option<String>,
    pub overdue: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskListItem>,
    pub count: usize,
    pub filters: TaskFilters,
}

#[derive(Debug, Serialize)]
pub struct TaskDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
    pub subtasks: Vec<SubTaskRepr>,
}

/// Subtask as embedded in a task detail: flat, status by name.
#[derive(Debug, Clone, Serialize)]
pub struct SubTaskRepr {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
}

// ── SubTask API types ─────────────────────────────────────────

/// Body of subtask create (POST) and update (PUT/PATCH). On PUT the
/// required fields are re-checked; on PATCH absent fields are left
/// untouched.
#[derive(Debug, Default, Deserialize)]
pub struct SubTaskPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub task_id: Option<Uuid>,
}

/// Parent task as embedded in a subtask detail.
#[derive(Debug, Clone, Serialize)]
pub struct TaskBrief {
    pub id: Uuid,
    pub title: String,
}

/// Subtask as rendered by the standalone subtask endpoints: nested
/// status `{id, name}` and nested parent task.
#[derive(Debug, Clone, Serialize)]
pub struct SubTaskDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub task: TaskBrief,
}

// ── Category API types ────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPayload {
    pub name: Option<String>,
}
