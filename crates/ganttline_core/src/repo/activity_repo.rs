//! Activity store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide point and batched lookups used by the dependency engine.
//! - Persist activity records and their prerequisite edges.
//! - Serialize validate-then-persist through an exclusive write scope.
//!
//! # Invariants
//! - Write paths call `Activity::validate()` before SQL mutations.
//! - Edge replacement is all-or-nothing (savepoint per write).
//! - Deleting an activity removes every edge touching it (FK cascade).
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::activity::{
    Activity, ActivityDetail, ActivityId, ActivityLookup, ActivityStatus, ActivityType,
    ActivityValidationError,
};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ACTIVITY_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    start_ms,
    end_ms,
    progress,
    status,
    type,
    color,
    sort_order,
    created_by,
    created_at,
    updated_at
FROM activities";

const ACTIVITY_ORDER_SQL: &str = " ORDER BY sort_order ASC, created_at ASC, id ASC";

const WRITE_SAVEPOINT: &str = "activity_write";

/// Ids bound per `IN (...)` query, well under SQLite's variable limit.
const MAX_IDS_PER_QUERY: usize = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Store-level error for activity persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(ActivityValidationError),
    Db(DbError),
    NotFound(ActivityId),
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Lock contention, as opposed to a broken store.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_busy())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "activity not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted activity data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "activity store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "activity store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "activity store requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ActivityValidationError> for RepoError {
    fn from(value: ActivityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// What an update does to the stored prerequisite edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyChange {
    /// Keep the stored edges as they are.
    Unchanged,
    /// Replace every stored edge with this list (may be empty).
    Replace(Vec<ActivityId>),
}

/// Validated update ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityWrite {
    /// Full record after merging the patch; `id` selects the row.
    pub activity: Activity,
    pub dependencies: DependencyChange,
}

/// Query options for listing activities.
#[derive(Debug, Clone, Default)]
pub struct ActivityListQuery {
    pub status: Option<ActivityStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Read access to direct prerequisite edges.
///
/// This is the only store capability cycle detection needs.
pub trait EdgeLookup {
    /// Direct prerequisite ids of `id`. Unknown ids have no edges.
    fn edges_of(&self, id: ActivityId) -> RepoResult<Vec<ActivityId>>;
}

/// Storage contract consumed by the dependency engine and activity service.
pub trait ActivityStore: EdgeLookup {
    fn find_by_id(&self, id: ActivityId) -> RepoResult<Option<Activity>>;
    /// Returns only the activities that exist, in no particular order.
    fn find_by_ids(&self, ids: &[ActivityId]) -> RepoResult<Vec<Activity>>;
    /// Inserts a new record together with its prerequisite edges.
    fn insert_activity(
        &self,
        activity: &Activity,
        dependencies: &[ActivityId],
    ) -> RepoResult<Activity>;
    /// Writes scalar fields and applies the dependency change atomically.
    fn persist(&self, write: &ActivityWrite) -> RepoResult<Activity>;
    /// Ids of activities that list `id` as a prerequisite.
    fn dependents_of(&self, id: ActivityId) -> RepoResult<Vec<ActivityId>>;
    fn list_activities(&self, query: &ActivityListQuery) -> RepoResult<Vec<ActivityDetail>>;
    /// Picker rows for every activity not listed in `excluded`.
    fn list_lookups(&self, excluded: &[ActivityId]) -> RepoResult<Vec<ActivityLookup>>;
    /// Hard delete; edges touching `id` are removed with it.
    fn delete_activity(&self, id: ActivityId) -> RepoResult<()>;
    /// Runs `f` with exclusive write access to the store.
    ///
    /// Nothing `f` writes is visible to other writers unless it returns `Ok`.
    /// Scopes do not nest.
    fn write_atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed activity store.
pub struct SqliteActivityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActivityRepository<'conn> {
    /// Creates the store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_activity_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn load_required(&self, id: ActivityId) -> RepoResult<Activity> {
        self.find_by_id(id)?.ok_or(RepoError::NotFound(id))
    }

    fn replace_edges(&self, id: ActivityId, dependencies: &[ActivityId]) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM activity_dependencies WHERE activity_id = ?1;",
            [id.to_string()],
        )?;
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO activity_dependencies (activity_id, dependency_id, position)
             VALUES (?1, ?2, ?3);",
        )?;
        for (position, dependency_id) in dependencies.iter().enumerate() {
            stmt.execute(params![
                id.to_string(),
                dependency_id.to_string(),
                position as i64,
            ])?;
        }
        Ok(())
    }
}

impl EdgeLookup for SqliteActivityRepository<'_> {
    fn edges_of(&self, id: ActivityId) -> RepoResult<Vec<ActivityId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT dependency_id
             FROM activity_dependencies
             WHERE activity_id = ?1
             ORDER BY position ASC, dependency_id ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "activity_dependencies.dependency_id")?);
        }
        Ok(ids)
    }
}

impl ActivityStore for SqliteActivityRepository<'_> {
    fn find_by_id(&self, id: ActivityId) -> RepoResult<Option<Activity>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{ACTIVITY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_activity_row(row)?));
        }
        Ok(None)
    }

    fn find_by_ids(&self, ids: &[ActivityId]) -> RepoResult<Vec<Activity>> {
        let unique = dedupe(ids);
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let mut activities = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(MAX_IDS_PER_QUERY) {
            let sql = format!(
                "{ACTIVITY_SELECT_SQL} WHERE id IN ({});",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare_cached(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter().map(|id| id.to_string())))?;
            while let Some(row) = rows.next()? {
                activities.push(parse_activity_row(row)?);
            }
        }
        Ok(activities)
    }

    fn insert_activity(
        &self,
        activity: &Activity,
        dependencies: &[ActivityId],
    ) -> RepoResult<Activity> {
        activity.validate()?;

        in_savepoint(self.conn, || {
            self.conn.execute(
                "INSERT INTO activities (
                    id,
                    name,
                    description,
                    start_ms,
                    end_ms,
                    progress,
                    status,
                    type,
                    color,
                    sort_order,
                    created_by,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
                params![
                    activity.id.to_string(),
                    activity.name.as_str(),
                    activity.description.as_deref(),
                    activity.start,
                    activity.end,
                    i64::from(activity.progress),
                    status_to_db(activity.status),
                    activity_type_to_db(activity.kind),
                    activity.color.as_deref(),
                    activity.order,
                    activity.created_by.as_deref(),
                    activity.created_at,
                    activity.updated_at,
                ],
            )?;
            self.replace_edges(activity.id, &dedupe(dependencies))?;
            self.load_required(activity.id)
        })
    }

    fn persist(&self, write: &ActivityWrite) -> RepoResult<Activity> {
        let activity = &write.activity;
        activity.validate()?;

        in_savepoint(self.conn, || {
            let changed = self.conn.execute(
                "UPDATE activities
                 SET
                    name = ?2,
                    description = ?3,
                    start_ms = ?4,
                    end_ms = ?5,
                    progress = ?6,
                    status = ?7,
                    type = ?8,
                    color = ?9,
                    sort_order = ?10,
                    updated_at = MAX(updated_at, (strftime('%s', 'now') * 1000))
                 WHERE id = ?1;",
                params![
                    activity.id.to_string(),
                    activity.name.as_str(),
                    activity.description.as_deref(),
                    activity.start,
                    activity.end,
                    i64::from(activity.progress),
                    status_to_db(activity.status),
                    activity_type_to_db(activity.kind),
                    activity.color.as_deref(),
                    activity.order,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(activity.id));
            }

            if let DependencyChange::Replace(dependencies) = &write.dependencies {
                self.replace_edges(activity.id, &dedupe(dependencies))?;
            }
            self.load_required(activity.id)
        })
    }

    fn dependents_of(&self, id: ActivityId) -> RepoResult<Vec<ActivityId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT d.activity_id
             FROM activity_dependencies d
             INNER JOIN activities a ON a.id = d.activity_id
             WHERE d.dependency_id = ?1
             ORDER BY a.sort_order ASC, a.created_at ASC, a.id ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "activity_dependencies.activity_id")?);
        }
        Ok(ids)
    }

    fn list_activities(&self, query: &ActivityListQuery) -> RepoResult<Vec<ActivityDetail>> {
        let mut sql = format!("{ACTIVITY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status_to_db(status).to_string()));
        }

        sql.push_str(ACTIVITY_ORDER_SQL);

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut activities = Vec::new();
        while let Some(row) = rows.next()? {
            activities.push(parse_activity_row(row)?);
        }

        activities
            .into_iter()
            .map(|activity| -> RepoResult<ActivityDetail> {
                let dependencies = self.edges_of(activity.id)?;
                Ok(ActivityDetail {
                    activity,
                    dependencies,
                })
            })
            .collect()
    }

    fn list_lookups(&self, excluded: &[ActivityId]) -> RepoResult<Vec<ActivityLookup>> {
        // Filtered here rather than in SQL so the exclusion list has no size cap.
        let excluded: HashSet<ActivityId> = excluded.iter().copied().collect();
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT id, name FROM activities{ACTIVITY_ORDER_SQL};"))?;
        let mut rows = stmt.query([])?;
        let mut lookups = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            let id = parse_uuid(&id_text, "activities.id")?;
            if excluded.contains(&id) {
                continue;
            }
            lookups.push(ActivityLookup {
                id,
                name: row.get("name")?,
            });
        }
        Ok(lookups)
    }

    fn delete_activity(&self, id: ActivityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM activities WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn write_atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        // IMMEDIATE takes the write lock up front, so reads made by `f` come
        // from the snapshot its writes will land on.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let value = f(self)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

fn in_savepoint<T>(conn: &Connection, f: impl FnOnce() -> RepoResult<T>) -> RepoResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {WRITE_SAVEPOINT};"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {WRITE_SAVEPOINT};"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute_batch(&format!(
                "ROLLBACK TO {WRITE_SAVEPOINT}; RELEASE {WRITE_SAVEPOINT};"
            )) {
                warn!(
                    "event=savepoint_rollback module=repo status=error error={rollback_err}"
                );
            }
            Err(err)
        }
    }
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<Activity> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "activities.id")?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in activities.status"
        ))
    })?;

    let type_text: String = row.get("type")?;
    let kind = parse_activity_type(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid type `{type_text}` in activities.type"))
    })?;

    let progress_value: i64 = row.get("progress")?;
    let progress = u8::try_from(progress_value).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid progress value `{progress_value}` in activities.progress"
        ))
    })?;

    let activity = Activity {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        start: row.get("start_ms")?,
        end: row.get("end_ms")?,
        progress,
        status,
        kind,
        color: row.get("color")?,
        order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        created_by: row.get("created_by")?,
    };
    activity.validate()?;
    Ok(activity)
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn status_to_db(status: ActivityStatus) -> &'static str {
    match status {
        ActivityStatus::Todo => "todo",
        ActivityStatus::InProgress => "in_progress",
        ActivityStatus::Completed => "completed",
        ActivityStatus::Blocked => "blocked",
    }
}

fn parse_status(value: &str) -> Option<ActivityStatus> {
    match value {
        "todo" => Some(ActivityStatus::Todo),
        "in_progress" => Some(ActivityStatus::InProgress),
        "completed" => Some(ActivityStatus::Completed),
        "blocked" => Some(ActivityStatus::Blocked),
        _ => None,
    }
}

fn activity_type_to_db(kind: ActivityType) -> &'static str {
    match kind {
        ActivityType::Task => "task",
        ActivityType::Project => "project",
        ActivityType::Milestone => "milestone",
    }
}

fn parse_activity_type(value: &str) -> Option<ActivityType> {
    match value {
        "task" => Some(ActivityType::Task),
        "project" => Some(ActivityType::Project),
        "milestone" => Some(ActivityType::Milestone),
        _ => None,
    }
}

/// Drops repeated ids, keeping first occurrence order.
pub(crate) fn dedupe(ids: &[ActivityId]) -> Vec<ActivityId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn ensure_activity_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["activities", "activity_dependencies"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in ["activity_id", "dependency_id", "position"] {
        if !table_has_column(conn, "activity_dependencies", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "activity_dependencies",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
