#![allow(dead_code)]

use ganttline_core::db::open_db_in_memory;
use ganttline_core::{
    ActivityDetail, ActivityId, ActivityService, NewActivity, SqliteActivityRepository,
};
use rusqlite::Connection;

pub const DAY_MS: i64 = 86_400_000;
const JAN_1_2024_MS: i64 = 1_704_067_200_000;

/// Midnight UTC of `day` January 2024.
pub fn jan(day: i64) -> i64 {
    JAN_1_2024_MS + (day - 1) * DAY_MS
}

pub fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn service(conn: &Connection) -> ActivityService<SqliteActivityRepository<'_>> {
    ActivityService::new(SqliteActivityRepository::try_new(conn).unwrap())
}

pub fn create(
    service: &ActivityService<SqliteActivityRepository<'_>>,
    name: &str,
    start: i64,
    end: i64,
    dependencies: &[ActivityId],
) -> ActivityDetail {
    service
        .create_activity(&NewActivity::new(name, start, end).depends_on(dependencies.iter().copied()))
        .unwrap()
}

pub fn edge_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM activity_dependencies;", [], |row| {
        row.get(0)
    })
    .unwrap()
}
