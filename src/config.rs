use std::env;

/// Status name assigned when a task or subtask is created without an
/// explicit status.
pub const DEFAULT_STATUS: &str = "To Do";

/// Statuses seeded at boot so the stats endpoint has a full zero-fill
/// set even on an empty database. Seeding is idempotent get-or-create.
pub const SEED_STATUSES: [&str; 3] = ["To Do", "In Progress", "Done"];

/// Status applied by the admin bulk "mark as done" action.
pub const DONE_STATUS: &str = "Done";

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            bind_addr: env::var("TASKDESK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            db_path: env::var("TASKDESK_DB").unwrap_or_else(|_| "taskdesk.redb".to_string()),
        }
    }
}
