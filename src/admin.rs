//! Operator-facing bulk actions. Each one operates through the same
//! service functions the public handlers call — no internal HTTP
//! round-trips — so the validated path stays the only path.

use crate::api::{parse_json, SharedState};
use crate::error::ApiError;
use crate::models::SubTaskPayload;
use crate::service;
use crate::store::Store;
use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Methods the subtask detail resource answers to.
const SUBTASK_DETAIL_METHODS: [&str; 4] = ["GET", "PUT", "PATCH", "DELETE"];

const SMOKE_DESCRIPTION: &str = "Updated via admin smoke test";

#[derive(Debug, Deserialize)]
pub struct Selection {
    pub ids: Vec<Uuid>,
}

// ── Mark done ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MarkDoneReport {
    pub updated: usize,
    pub missing: Vec<Uuid>,
}

// POST /api/admin/subtasks/mark-done/
pub async fn mark_done(
    State(state): State<SharedState>,
    body: String,
) -> Result<Json<MarkDoneReport>, ApiError> {
    let selection: Selection = parse_json(&body)?;
    let outcome = service::mark_subtasks_done(&state.store, &selection.ids)?;
    Ok(Json(MarkDoneReport { updated: outcome.updated, missing: outcome.missing }))
}

// ── Smoke test ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SmokeItem {
    pub id: Uuid,
    /// Capability check: which methods the detail resource allows.
    pub allow: Vec<&'static str>,
    pub options: u16,
    pub patch: u16,
}

#[derive(Debug, Serialize)]
pub struct SmokeReport {
    pub ok: usize,
    pub total: usize,
    pub results: Vec<SmokeItem>,
}

fn run_smoke_test(store: &Store, ids: &[Uuid], now: DateTime<Utc>) -> Result<SmokeReport, ApiError> {
    let mut results = Vec::with_capacity(ids.len());
    let mut ok = 0;

    for &id in ids {
        let payload = SubTaskPayload {
            description: Some(SMOKE_DESCRIPTION.to_string()),
            ..Default::default()
        };
        let patch = match service::update_subtask(store, id, payload, true, now) {
            Ok(_) => 200,
            Err(e) => e.status().as_u16(),
        };
        if (200..300).contains(&patch) {
            ok += 1;
        }
        results.push(SmokeItem {
            id,
            allow: SUBTASK_DETAIL_METHODS.to_vec(),
            options: 200,
            patch,
        });
    }

    Ok(SmokeReport { ok, total: ids.len(), results })
}

// POST /api/admin/subtasks/smoke-test/
pub async fn smoke_test(
    State(state): State<SharedState>,
    body: String,
) -> Result<Json<SmokeReport>, ApiError> {
    let selection: Selection = parse_json(&body)?;
    Ok(Json(run_smoke_test(&state.store, &selection.ids, Utc::now())?))
}

// ── Delete via the shared path ─────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DeleteItem {
    pub id: Uuid,
    pub status: u16,
}

#[derive(Debug, Serialize)]
pub struct DeleteReport {
    pub deleted: usize,
    pub total: usize,
    pub results: Vec<DeleteItem>,
}

fn run_delete(store: &Store, ids: &[Uuid]) -> Result<DeleteReport, ApiError> {
    let mut results = Vec::with_capacity(ids.len());
    let mut deleted = 0;

    for &id in ids {
        let status = match service::delete_subtask(store, id) {
            Ok(()) => {
                deleted += 1;
                204
            }
            Err(e) => e.status().as_u16(),
        };
        results.push(DeleteItem { id, status });
    }

    Ok(DeleteReport { deleted, total: ids.len(), results })
}

// POST /api/admin/subtasks/delete/
pub async fn delete_subtasks(
    State(state): State<SharedState>,
    body: String,
) -> Result<Json<DeleteReport>, ApiError> {
    let selection: Selection = parse_json(&body)?;
    Ok(Json(run_delete(&state.store, &selection.ids)?))
}

// ── Task delete (cascade) ──────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TaskDeleteItem {
    pub id: Uuid,
    pub status: u16,
    pub subtasks_removed: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskDeleteReport {
    pub deleted: usize,
    pub total: usize,
    pub results: Vec<TaskDeleteItem>,
}

fn run_task_delete(store: &Store, ids: &[Uuid]) -> Result<TaskDeleteReport, ApiError> {
    let mut results = Vec::with_capacity(ids.len());
    let mut deleted = 0;

    for &id in ids {
        match service::delete_task(store, id) {
            Ok(subtasks_removed) => {
                deleted += 1;
                results.push(TaskDeleteItem { id, status: 204, subtasks_removed });
            }
            Err(e) => {
                results.push(TaskDeleteItem {
                    id,
                    status: e.status().as_u16(),
                    subtasks_removed: 0,
                });
            }
        }
    }

    Ok(TaskDeleteReport { deleted, total: ids.len(), results })
}

// POST /api/admin/tasks/delete/
pub async fn delete_tasks(
    State(state): State<SharedState>,
    body: String,
) -> Result<Json<TaskDeleteReport>, ApiError> {
    let selection: Selection = parse_json(&body)?;
    Ok(Json(run_task_delete(&state.store, &selection.ids)?))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/admin/subtasks/mark-done/", post(mark_done))
        .route("/api/admin/subtasks/smoke-test/", post(smoke_test))
        .route("/api/admin/subtasks/delete/", post(delete_subtasks))
        .route("/api/admin/tasks/delete/", post(delete_tasks))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateTaskRequest, SubTaskPayload};
    use chrono::{Duration, Utc};
    use std::fs;

    fn temp_store(name: &str) -> (Store, String) {
        let path = format!("/tmp/taskdesk_admin_{name}_{}.redb", std::process::id());
        let _ = fs::remove_file(&path);
        let store = Store::open(&path).unwrap();
        (store, path)
    }

    fn cleanup(path: &str) {
        let _ = fs::remove_file(path);
    }

    fn seed(store: &Store) -> (Uuid, Vec<Uuid>) {
        let now = Utc::now();
        let parent = service::create_task(
            store,
            CreateTaskRequest {
                title: Some("Parent".into()),
                deadline: Some(now + Duration::days(7)),
                ..Default::default()
            },
            now,
        )
        .unwrap();

        let subs = (0..2)
            .map(|i| {
                service::create_subtask(
                    store,
                    SubTaskPayload {
                        title: Some(format!("child {i}")),
                        task_id: Some(parent.id),
                        ..Default::default()
                    },
                    now,
                )
                .unwrap()
                .id
            })
            .collect();
        (parent.id, subs)
    }

    #[test]
    fn smoke_test_patches_existing_and_reports_missing() {
        let (store, path) = temp_store("smoke");
        let (_, subs) = seed(&store);
        let ghost = Uuid::new_v4();

        let ids = [subs[0], ghost];
        let report = run_smoke_test(&store, &ids, Utc::now()).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.ok, 1);
        assert_eq!(report.results[0].patch, 200);
        assert_eq!(report.results[1].patch, 404);

        let patched = service::subtask_detail(&store, subs[0]).unwrap();
        assert_eq!(patched.description, SMOKE_DESCRIPTION);

        cleanup(&path);
    }

    #[test]
    fn bulk_delete_reports_per_item_status() {
        let (store, path) = temp_store("bulk_delete");
        let (_, subs) = seed(&store);

        // delete the same id twice in one selection: second hit is a 404
        let ids = [subs[0], subs[0], subs[1]];
        let report = run_delete(&store, &ids).unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(report.results[0].status, 204);
        assert_eq!(report.results[1].status, 404);
        assert_eq!(report.results[2].status, 204);

        cleanup(&path);
    }

    #[test]
    fn task_delete_cascades() {
        let (store, path) = temp_store("task_delete");
        let (parent, subs) = seed(&store);

        let report = run_task_delete(&store, &[parent, Uuid::new_v4()]).unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.results[0].subtasks_removed, 2);
        assert_eq!(report.results[1].status, 404);

        for id in subs {
            assert!(store.get_subtask(id).unwrap().is_none());
        }

        cleanup(&path);
    }
}
