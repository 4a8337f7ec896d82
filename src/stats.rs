//! Read-only statistics over one store snapshot, so the sub-counts are
//! mutually consistent.

use crate::store::{Snapshot, Store, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Counts for one side of the task/subtask pair.
#[derive(Debug, Serialize)]
pub struct SideStats {
    pub total: u64,
    /// Every status currently in the store appears here, zero-filled.
    pub by_status: BTreeMap<String, u64>,
    pub overdue: u64,
    pub without_description: u64,
}

#[derive(Debug, Serialize)]
pub struct UpcomingDeadline {
    pub id: Uuid,
    pub title: String,
    pub deadline: DateTime<Utc>,
    pub days_until: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsBody {
    pub tasks: SideStats,
    pub subtasks: SideStats,
    pub upcoming_deadlines: Vec<UpcomingDeadline>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: StatsBody,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

struct Record<'a> {
    status_id: Uuid,
    deadline: Option<DateTime<Utc>>,
    description: &'a str,
}

fn side_stats<'a>(
    records: impl Iterator<Item = Record<'a>>,
    names: &HashMap<Uuid, &str>,
    zero_fill: &BTreeMap<String, u64>,
    now: DateTime<Utc>,
) -> SideStats {
    let mut by_status = zero_fill.clone();
    let mut total = 0;
    let mut overdue = 0;
    let mut without_description = 0;

    for record in records {
        total += 1;
        if let Some(name) = names.get(&record.status_id) {
            *by_status.entry(name.to_string()).or_insert(0) += 1;
        }
        if record.deadline.is_some_and(|d| d < now) {
            overdue += 1;
        }
        if record.description.is_empty() {
            without_description += 1;
        }
    }

    SideStats { total, by_status, overdue, without_description }
}

pub fn collect(store: &Store, now: DateTime<Utc>) -> Result<StatsResponse, StoreError> {
    let Snapshot { statuses, tasks, subtasks } = store.snapshot()?;

    let names: HashMap<Uuid, &str> =
        statuses.iter().map(|s| (s.id, s.name.as_str())).collect();
    let zero_fill: BTreeMap<String, u64> =
        statuses.iter().map(|s| (s.name.clone(), 0)).collect();

    let task_stats = side_stats(
        tasks.iter().map(|t| Record {
            status_id: t.status_id,
            deadline: t.deadline,
            description: &t.description,
        }),
        &names,
        &zero_fill,
        now,
    );
    let subtask_stats = side_stats(
        subtasks.iter().map(|s| Record {
            status_id: s.status_id,
            deadline: s.deadline,
            description: &s.description,
        }),
        &names,
        &zero_fill,
        now,
    );

    let mut upcoming: Vec<&crate::models::Task> = tasks
        .iter()
        .filter(|t| t.deadline.is_some_and(|d| d >= now))
        .collect();
    upcoming.sort_by_key(|t| t.deadline);
    let upcoming_deadlines = upcoming
        .into_iter()
        .take(3)
        .filter_map(|t| {
            t.deadline.map(|deadline| UpcomingDeadline {
                id: t.id,
                title: t.title.clone(),
                deadline,
                days_until: (deadline - now).num_days(),
            })
        })
        .collect();

    Ok(StatsResponse {
        stats: StatsBody {
            tasks: task_stats,
            subtasks: subtask_stats,
            upcoming_deadlines,
        },
        timestamp: now,
        success: true,
    })
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SEED_STATUSES;
    use crate::models::{SubTask, Task};
    use chrono::Duration;
    use std::fs;

    fn temp_store(name: &str) -> (Store, String) {
        let path = format!("/tmp/taskdesk_stats_{name}_{}.redb", std::process::id());
        let _ = fs::remove_file(&path);
        let store = Store::open(&path).unwrap();
        for name in SEED_STATUSES {
            store.get_or_create_status(name).unwrap();
        }
        (store, path)
    }

    fn cleanup(path: &str) {
        let _ = fs::remove_file(path);
    }

    fn put_task(store: &Store, status: &str, deadline: Option<DateTime<Utc>>, desc: &str) -> Task {
        let status = store.get_or_create_status(status).unwrap();
        let task = Task {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: desc.to_string(),
            status_id: status.id,
            deadline,
        };
        store.put_task(&task).unwrap();
        task
    }

    #[test]
    fn by_status_zero_fills_known_statuses() {
        let (store, path) = temp_store("zero_fill");
        let now = Utc::now();

        put_task(&store, "Done", None, "x");
        put_task(&store, "Done", None, "x");
        put_task(&store, "To Do", None, "x");

        let stats = collect(&store, now).unwrap().stats;
        assert_eq!(stats.tasks.total, 3);
        assert_eq!(stats.tasks.by_status.get("Done"), Some(&2));
        assert_eq!(stats.tasks.by_status.get("To Do"), Some(&1));
        assert_eq!(stats.tasks.by_status.get("In Progress"), Some(&0));
        // zero-fill follows the store, not a hardcoded list
        put_task(&store, "Blocked", None, "x");
        let stats = collect(&store, now).unwrap().stats;
        assert_eq!(stats.tasks.by_status.get("Blocked"), Some(&1));
        assert_eq!(stats.subtasks.by_status.get("Blocked"), Some(&0));

        cleanup(&path);
    }

    #[test]
    fn overdue_and_empty_description_counts() {
        let (store, path) = temp_store("overdue");
        let now = Utc::now();

        put_task(&store, "To Do", Some(now - Duration::days(1)), "");
        put_task(&store, "To Do", Some(now + Duration::days(1)), "described");
        put_task(&store, "To Do", None, "");

        let status = store.get_or_create_status("To Do").unwrap();
        store
            .put_subtask(&SubTask {
                id: Uuid::new_v4(),
                title: "s".into(),
                description: String::new(),
                status_id: status.id,
                deadline: Some(now - Duration::hours(2)),
                task_id: Uuid::new_v4(),
                created_at: now,
            })
            .unwrap();

        let stats = collect(&store, now).unwrap();
        assert!(stats.success);
        assert_eq!(stats.timestamp, now);
        assert_eq!(stats.stats.tasks.overdue, 1);
        assert_eq!(stats.stats.tasks.without_description, 2);
        assert_eq!(stats.stats.subtasks.total, 1);
        assert_eq!(stats.stats.subtasks.overdue, 1);

        cleanup(&path);
    }

    #[test]
    fn upcoming_is_three_nearest_future_deadlines() {
        let (store, path) = temp_store("upcoming");
        let now = Utc::now();

        put_task(&store, "To Do", Some(now - Duration::days(1)), "x"); // past, excluded
        let d3 = put_task(&store, "To Do", Some(now + Duration::days(3)), "x");
        let d1 = put_task(&store, "To Do", Some(now + Duration::days(1)), "x");
        let d9 = put_task(&store, "To Do", Some(now + Duration::days(9)), "x");
        put_task(&store, "To Do", Some(now + Duration::days(30)), "x"); // fourth, cut

        let upcoming = collect(&store, now).unwrap().stats.upcoming_deadlines;
        let ids: Vec<_> = upcoming.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![d1.id, d3.id, d9.id]);
        assert_eq!(upcoming[0].days_until, 1);
        assert_eq!(upcoming[2].days_until, 9);

        cleanup(&path);
    }
}
