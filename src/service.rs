//! The validated mutation/query path. Every write — whether it arrives
//! through the public HTTP handlers or through an admin bulk action —
//! goes through these functions, so the validation rules cannot be
//! bypassed by one entry point and enforced by another.

use crate::config::{DEFAULT_STATUS, DONE_STATUS};
use crate::error::{ApiError, FieldErrors};
use crate::models::{
    Category, CategoryPayload, CreateTaskRequest, SubTask, SubTaskDetail, SubTaskPayload,
    SubTaskRepr, Task, TaskBrief, TaskDetail, TaskFilters, TaskListItem, TaskListResponse,
    TaskRepr,
};
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 255;

fn push_error(errors: &mut FieldErrors, field: &str, msg: &str) {
    errors.entry(field.to_string()).or_default().push(msg.to_string());
}

/// Map status id → name for rendering. A dangling status id is a store
/// invariant violation, surfaced as Internal.
fn status_names(store: &Store) -> Result<HashMap<Uuid, String>, ApiError> {
    Ok(store.list_statuses()?.into_iter().map(|s| (s.id, s.name)).collect())
}

fn name_of(names: &HashMap<Uuid, String>, id: Uuid) -> Result<String, ApiError> {
    names
        .get(&id)
        .cloned()
        .ok_or_else(|| ApiError::Internal(format!("dangling status id {id}")))
}

// ── Tasks ─────────────────────────────────────────────────────

pub fn create_task(
    store: &Store,
    req: CreateTaskRequest,
    now: DateTime<Utc>,
) -> Result<TaskRepr, ApiError> {
    let title = match req.title {
        Some(t) if !t.is_empty() => t,
        _ => return Err(ApiError::invalid("Title is required")),
    };
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::invalid("Title must be at most 255 characters"));
    }
    let deadline = req.deadline.ok_or_else(|| ApiError::invalid("Deadline is required"))?;
    if deadline < now {
        return Err(ApiError::invalid("Deadline cannot be in the past"));
    }

    let status = store.get_or_create_status(req.status.as_deref().unwrap_or(DEFAULT_STATUS))?;
    let task = Task {
        id: Uuid::new_v4(),
        title,
        description: req.description.unwrap_or_default(),
        status_id: status.id,
        deadline: Some(deadline),
    };
    store.put_task(&task)?;
    tracing::info!(task_id = %task.id, "task created");

    Ok(TaskRepr {
        id: task.id,
        title: task.title,
        description: task.description,
        status: status.name,
        deadline: task.deadline,
    })
}

/// Filtered, ordered task list. Order: deadline descending, tasks
/// without a deadline last.
pub fn list_tasks(
    store: &Store,
    filters: TaskFilters,
    now: DateTime<Utc>,
) -> Result<TaskListResponse, ApiError> {
    let names = status_names(store)?;
    let mut tasks = store.list_tasks()?;

    if let Some(wanted) = filters.status.as_deref() {
        tasks.retain(|t| names.get(&t.status_id).map(String::as_str) == Some(wanted));
    }
    if filters.overdue.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        tasks.retain(|t| t.deadline.is_some_and(|d| d < now));
    }

    tasks.sort_by(|a, b| match (&a.deadline, &b.deadline) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut items = Vec::with_capacity(tasks.len());
    for task in tasks {
        items.push(TaskListItem {
            id: task.id,
            title: task.title,
            description: task.description,
            status: name_of(&names, task.status_id)?,
            deadline: task.deadline,
            is_overdue: task.deadline.is_some_and(|d| d < now),
        });
    }

    Ok(TaskListResponse { count: items.len(), tasks: items, filters })
}

pub fn task_detail(store: &Store, id: Uuid) -> Result<TaskDetail, ApiError> {
    let task = store.get_task(id)?.ok_or(ApiError::NotFound("Task"))?;
    let names = status_names(store)?;
    let subtasks = task_subtasks_inner(store, id, &names)?;

    Ok(TaskDetail {
        id: task.id,
        title: task.title,
        description: task.description,
        status: name_of(&names, task.status_id)?,
        deadline: task.deadline,
        subtasks,
    })
}

/// Flat subtask list of one task, oldest first.
pub fn task_subtasks(store: &Store, id: Uuid) -> Result<Vec<SubTaskRepr>, ApiError> {
    if store.get_task(id)?.is_none() {
        return Err(ApiError::NotFound("Task"));
    }
    let names = status_names(store)?;
    task_subtasks_inner(store, id, &names)
}

fn task_subtasks_inner(
    store: &Store,
    id: Uuid,
    names: &HashMap<Uuid, String>,
) -> Result<Vec<SubTaskRepr>, ApiError> {
    let mut subs = store.subtasks_of(id)?;
    subs.sort_by_key(|s| s.created_at);

    let mut out = Vec::with_capacity(subs.len());
    for sub in subs {
        out.push(SubTaskRepr {
            id: sub.id,
            title: sub.title,
            description: sub.description,
            status: name_of(names, sub.status_id)?,
            deadline: sub.deadline,
        });
    }
    Ok(out)
}

/// Delete a task and (by design) its subtasks. Returns how many
/// subtasks went with it.
pub fn delete_task(store: &Store, id: Uuid) -> Result<usize, ApiError> {
    match store.delete_task(id)? {
        Some(subtasks_removed) => {
            tracing::info!(task_id = %id, subtasks_removed, "task deleted");
            Ok(subtasks_removed)
        }
        None => Err(ApiError::NotFound("Task")),
    }
}

// ── SubTasks ──────────────────────────────────────────────────

fn render_subtask(store: &Store, sub: SubTask) -> Result<SubTaskDetail, ApiError> {
    let status = store
        .get_status(sub.status_id)?
        .ok_or_else(|| ApiError::Internal(format!("dangling status id {}", sub.status_id)))?;
    let parent = store
        .get_task(sub.task_id)?
        .ok_or_else(|| ApiError::Internal(format!("dangling task id {}", sub.task_id)))?;

    Ok(SubTaskDetail {
        id: sub.id,
        title: sub.title,
        description: sub.description,
        status,
        deadline: sub.deadline,
        created_at: sub.created_at,
        task: TaskBrief { id: parent.id, title: parent.title },
    })
}

/// All subtasks, most recently created first, optionally filtered by
/// parent task. Pagination is applied by the handler.
pub fn list_subtasks(store: &Store, task_id: Option<Uuid>) -> Result<Vec<SubTaskDetail>, ApiError> {
    let mut subs = store.list_subtasks()?;
    if let Some(task_id) = task_id {
        subs.retain(|s| s.task_id == task_id);
    }
    subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    subs.into_iter().map(|s| render_subtask(store, s)).collect()
}

pub fn create_subtask(
    store: &Store,
    payload: SubTaskPayload,
    now: DateTime<Utc>,
) -> Result<SubTaskDetail, ApiError> {
    let mut errors = FieldErrors::new();

    let title = payload.title.unwrap_or_default();
    if title.is_empty() {
        push_error(&mut errors, "title", "Title is required");
    }

    let parent = match payload.task_id {
        None => {
            push_error(&mut errors, "task_id", "This field is required");
            None
        }
        Some(id) => {
            let found = store.get_task(id)?;
            if found.is_none() {
                push_error(&mut errors, "task_id", "Task does not exist");
            }
            found
        }
    };

    if payload.deadline.is_some_and(|d| d < now) {
        push_error(&mut errors, "deadline", "Deadline cannot be in the past");
    }

    let parent = match (parent, errors.is_empty()) {
        (Some(parent), true) => parent,
        _ => return Err(ApiError::Validation(errors)),
    };

    let status = store.get_or_create_status(payload.status.as_deref().unwrap_or(DEFAULT_STATUS))?;
    let sub = SubTask {
        id: Uuid::new_v4(),
        title,
        description: payload.description.unwrap_or_default(),
        status_id: status.id,
        deadline: payload.deadline,
        task_id: parent.id,
        created_at: now, // server-assigned, never client-settable
    };
    store.put_subtask(&sub)?;
    tracing::info!(subtask_id = %sub.id, task_id = %parent.id, "subtask created");

    Ok(SubTaskDetail {
        id: sub.id,
        title: sub.title,
        description: sub.description,
        status,
        deadline: sub.deadline,
        created_at: sub.created_at,
        task: TaskBrief { id: parent.id, title: parent.title },
    })
}

pub fn subtask_detail(store: &Store, id: Uuid) -> Result<SubTaskDetail, ApiError> {
    let sub = store.get_subtask(id)?.ok_or(ApiError::NotFound("SubTask"))?;
    render_subtask(store, sub)
}

/// Full (PUT) or partial (PATCH) update. On PUT the required fields
/// must be present again; either way only supplied fields change, and
/// supplied references are re-resolved. `created_at` is immutable.
pub fn update_subtask(
    store: &Store,
    id: Uuid,
    payload: SubTaskPayload,
    partial: bool,
    now: DateTime<Utc>,
) -> Result<SubTaskDetail, ApiError> {
    let mut sub = store.get_subtask(id)?.ok_or(ApiError::NotFound("SubTask"))?;
    let mut errors = FieldErrors::new();

    if !partial {
        if payload.title.is_none() {
            push_error(&mut errors, "title", "Title is required");
        }
        if payload.task_id.is_none() {
            push_error(&mut errors, "task_id", "This field is required");
        }
    }

    if let Some(title) = &payload.title {
        if title.is_empty() {
            push_error(&mut errors, "title", "Title is required");
        }
    }
    if let Some(task_id) = payload.task_id {
        if store.get_task(task_id)?.is_none() {
            push_error(&mut errors, "task_id", "Task does not exist");
        }
    }
    if payload.deadline.is_some_and(|d| d < now) {
        push_error(&mut errors, "deadline", "Deadline cannot be in the past");
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    if let Some(title) = payload.title {
        sub.title = title;
    }
    if let Some(description) = payload.description {
        sub.description = description;
    }
    if let Some(task_id) = payload.task_id {
        sub.task_id = task_id;
    }
    if let Some(status) = payload.status.as_deref() {
        sub.status_id = store.get_or_create_status(status)?.id;
    }
    if let Some(deadline) = payload.deadline {
        sub.deadline = Some(deadline);
    }

    store.put_subtask(&sub)?;
    render_subtask(store, sub)
}

pub fn delete_subtask(store: &Store, id: Uuid) -> Result<(), ApiError> {
    if store.delete_subtask(id)? {
        tracing::info!(subtask_id = %id, "subtask deleted");
        Ok(())
    } else {
        // a repeated delete must fail, not silently succeed
        Err(ApiError::NotFound("SubTask"))
    }
}

/// Outcome of the bulk "mark as done" action.
pub struct MarkDoneOutcome {
    pub updated: usize,
    pub missing: Vec<Uuid>,
}

/// Set every selected subtask's status to "Done". The status is
/// resolved through the same get-or-create as every other path, so a
/// fresh database cannot make this action fail.
pub fn mark_subtasks_done(store: &Store, ids: &[Uuid]) -> Result<MarkDoneOutcome, ApiError> {
    let done = store.get_or_create_status(DONE_STATUS)?;
    let mut outcome = MarkDoneOutcome { updated: 0, missing: Vec::new() };

    for &id in ids {
        match store.get_subtask(id)? {
            Some(mut sub) => {
                sub.status_id = done.id;
                store.put_subtask(&sub)?;
                outcome.updated += 1;
            }
            None => outcome.missing.push(id),
        }
    }
    Ok(outcome)
}

// ── Categories ────────────────────────────────────────────────

pub fn create_category(store: &Store, payload: CategoryPayload) -> Result<Category, ApiError> {
    let name = match payload.name {
        Some(n) if !n.is_empty() => n,
        _ => return Err(ApiError::field("name", "Name is required")),
    };

    let category = Category { id: Uuid::new_v4(), name };
    if !store.create_category(&category)? {
        return Err(ApiError::field("name", "Category with this name already exists"));
    }
    Ok(category)
}

pub fn category_detail(store: &Store, id: Uuid) -> Result<Category, ApiError> {
    store.get_category(id)?.ok_or(ApiError::NotFound("Category"))
}

pub fn update_category(
    store: &Store,
    id: Uuid,
    payload: CategoryPayload,
    partial: bool,
) -> Result<Category, ApiError> {
    let current = store.get_category(id)?.ok_or(ApiError::NotFound("Category"))?;

    let name = match payload.name {
        Some(n) if !n.is_empty() => n,
        Some(_) => return Err(ApiError::field("name", "Name is required")),
        None if partial => return Ok(current),
        None => return Err(ApiError::field("name", "Name is required")),
    };

    if !store.rename_category(id, &name)? {
        return Err(ApiError::field("name", "Category with this name already exists"));
    }
    Ok(Category { id, name })
}

pub fn delete_category(store: &Store, id: Uuid) -> Result<(), ApiError> {
    if store.delete_category(id)? {
        Ok(())
    } else {
        Err(ApiError::NotFound("Category"))
    }
}

// ── Tests ──────────────────────────────────────────────────────
