use crate::error::ApiError;
use crate::models::{
    Category, CategoryPayload, CreateTaskRequest, SubTaskDetail, SubTaskPayload, TaskCreated,
    TaskDetail, TaskFilters, TaskListResponse,
};
use crate::pagination::{self, Page};
use crate::store::Store;
use crate::{admin, service, stats};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

// ── Shared state ───────────────────────────────────────────────

pub struct AppState {
    pub store: Store,
}

pub type SharedState = Arc<AppState>;

/// Parse a JSON body ourselves so malformed JSON is a 400 with an
/// `{"error": "Invalid JSON"}` body instead of the extractor's 422.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|_| ApiError::invalid("Invalid JSON"))
}

// ── HTML index ─────────────────────────────────────────────────

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// GET /
pub async fn index(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    let listing = service::list_tasks(&state.store, TaskFilters::default(), Utc::now())?;

    let mut page = String::from(
        "<!doctype html><html><head><title>Tasks</title></head><body><h1>Tasks</h1><ul>",
    );
    for task in &listing.tasks {
        let deadline = task
            .deadline
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "no deadline".to_string());
        page.push_str(&format!(
            "<li>{} — {} ({})</li>",
            html_escape(&task.title),
            html_escape(&task.status),
            deadline,
        ));
    }
    page.push_str("</ul></body></html>");
    Ok(Html(page))
}

// ── Task handlers ──────────────────────────────────────────────

// POST /api/tasks/create/
pub async fn create_task(
    State(state): State<SharedState>,
    body: String,
) -> Result<(StatusCode, Json<TaskCreated>), ApiError> {
    let req: CreateTaskRequest = parse_json(&body)?;
    let task = service::create_task(&state.store, req, Utc::now())?;
    Ok((
        StatusCode::CREATED,
        Json(TaskCreated { message: "Task created successfully", task }),
    ))
}

// GET /api/tasks/
pub async fn list_tasks(
    State(state): State<SharedState>,
    Query(filters): Query<TaskFilters>,
) -> Result<Json<TaskListResponse>, ApiError> {
    Ok(Json(service::list_tasks(&state.store, filters, Utc::now())?))
}

// GET /api/tasks/:id/
pub async fn task_detail(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskDetail>, ApiError> {
    Ok(Json(service::task_detail(&state.store, id)?))
}

// GET /api/tasks/:id/subtasks/
pub async fn task_subtasks(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let subtasks = service::task_subtasks(&state.store, id)?;
    let count = subtasks.len();
    Ok(Json(json!({ "subtasks": subtasks, "count": count })))
}

// GET /api/stats/
pub async fn task_stats(
    State(state): State<SharedState>,
) -> Result<Json<stats::StatsResponse>, ApiError> {
    Ok(Json(stats::collect(&state.store, Utc::now())?))
}

// ── SubTask handlers ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubTaskListQuery {
    pub task_id: Option<Uuid>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

// GET /api/subtasks/
pub async fn list_subtasks(
    State(state): State<SharedState>,
    Query(query): Query<SubTaskListQuery>,
) -> Result<Json<Page<SubTaskDetail>>, ApiError> {
    let page_size = pagination::clamp_page_size(query.page_size);
    let page = query.page.unwrap_or(1);
    let items = service::list_subtasks(&state.store, query.task_id)?;

    let link = |p: usize| match query.task_id {
        Some(task_id) => format!("/api/subtasks/?task_id={task_id}&page={p}&page_size={page_size}"),
        None => format!("/api/subtasks/?page={p}&page_size={page_size}"),
    };
    Ok(Json(pagination::paginate(items, page, page_size, link)?))
}

// POST /api/subtasks/
pub async fn create_subtask(
    State(state): State<SharedState>,
    body: String,
) -> Result<(StatusCode, Json<SubTaskDetail>), ApiError> {
    let payload: SubTaskPayload = parse_json(&body)?;
    let sub = service::create_subtask(&state.store, payload, Utc::now())?;
    Ok((StatusCode::CREATED, Json(sub)))
}

// GET /api/subtasks/:id/
pub async fn subtask_detail(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubTaskDetail>, ApiError> {
    Ok(Json(service::subtask_detail(&state.store, id)?))
}

// PUT /api/subtasks/:id/
pub async fn put_subtask(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: String,
) -> Result<Json<SubTaskDetail>, ApiError> {
    let payload: SubTaskPayload = parse_json(&body)?;
    Ok(Json(service::update_subtask(&state.store, id, payload, false, Utc::now())?))
}

// PATCH /api/subtasks/:id/
pub async fn patch_subtask(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: String,
) -> Result<Json<SubTaskDetail>, ApiError> {
    let payload: SubTaskPayload = parse_json(&body)?;
    Ok(Json(service::update_subtask(&state.store, id, payload, true, Utc::now())?))
}

// DELETE /api/subtasks/:id/
pub async fn delete_subtask(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    service::delete_subtask(&state.store, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Category handlers ──────────────────────────────────────────

// GET /api/categories/
pub async fn list_categories(
    State(state): State<SharedState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let mut categories = state.store.list_categories()?;
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(categories))
}

// POST /api/categories/
pub async fn create_category(
    State(state): State<SharedState>,
    body: String,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let payload: CategoryPayload = parse_json(&body)?;
    let category = service::create_category(&state.store, payload)?;
    Ok((StatusCode::CREATED, Json(category)))
}

// GET /api/categories/:id/
pub async fn category_detail(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(service::category_detail(&state.store, id)?))
}

// PUT /api/categories/:id/
pub async fn put_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: String,
) -> Result<Json<Category>, ApiError> {
    let payload: CategoryPayload = parse_json(&body)?;
    Ok(Json(service::update_category(&state.store, id, payload, false)?))
}

// PATCH /api/categories/:id/
pub async fn patch_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: String,
) -> Result<Json<Category>, ApiError> {
    let payload: CategoryPayload = parse_json(&body)?;
    Ok(Json(service::update_category(&state.store, id, payload, true)?))
}

// DELETE /api/categories/:id/
pub async fn delete_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    service::delete_category(&state.store, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Router ─────────────────────────────────────────────────────

/// The one authoritative route table.
///
/// The subtask endpoints are deliberately unauthenticated: any caller
/// may create, mutate, or delete any subtask. That mirrors the system
/// this replaces and is configuration, not an oversight.
pub fn map_routes(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/tasks/create/", post(create_task))
        .route("/api/tasks/", get(list_tasks))
        .route("/api/tasks/:id/", get(task_detail))
        .route("/api/tasks/:id/subtasks/", get(task_subtasks))
        .route("/api/stats/", get(task_stats))
        .route("/api/subtasks/", get(list_subtasks).post(create_subtask))
        .route(
            "/api/subtasks/:id/",
            get(subtask_detail)
                .put(put_subtask)
                .patch(patch_subtask)
                .delete(delete_subtask),
        )
        .route("/api/categories/", get(list_categories).post(create_category))
        .route(
            "/api/categories/:id/",
            get(category_detail)
                .put(put_category)
                .patch(patch_category)
                .delete(delete_category),
        )
        .merge(admin::routes())
        .with_state(state)
}
