use super::{PersistenceError, PersistenceResult, PlanningSnapshot, PlanningStore};
use crate::activity::{Activity, ActivityRow, NewActivity};
use crate::budget::BudgetRollup;
use crate::capacity::ResourceUtilization;
use crate::change_log::{ChangeAction, ChangeLogEntry, EntityType};
use crate::hours::{from_hundredths, quantize, to_hundredths};
use crate::project::{NewProject, NewWorkPackage, Project, RamsTag, WorkPackage};
use crate::resource::{MonthlyAvailability, NewResource, Resource};
use crate::validation::{
    ValidationError, validate_activity, validate_period, validate_project, validate_resource,
    validate_work_package,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

// Hour amounts are stored as INTEGER hundredths of an hour.
const RESOURCE_COLUMNS: &str = "id, name, contract_hundredths, monthly_availability_overrides";
const PROJECT_COLUMNS: &str = "id, name, start_date, end_date";
const WORK_PACKAGE_COLUMNS: &str = "id, project_id, name, rams_tag, standard_effort_hundredths";
const ACTIVITY_COLUMNS: &str =
    "id, work_package_id, resource_id, planned_hundredths, start_date, end_date";
const CHANGE_LOG_COLUMNS: &str = "id, entity_type, entity_id, action, changed_at, details";

pub struct SqlitePlanningStore {
    connection: Mutex<Connection>,
}

impl SqlitePlanningStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path.as_ref())?;
        Self::initialize_schema(&connection)?;
        info!(path = %path.as_ref().display(), "opened planning database");
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS resources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                contract_hundredths INTEGER NOT NULL,
                monthly_availability_overrides TEXT NOT NULL DEFAULT '{}'
            );
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS work_packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                rams_tag TEXT NOT NULL,
                standard_effort_hundredths INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                work_package_id INTEGER NOT NULL REFERENCES work_packages(id) ON DELETE CASCADE,
                resource_id INTEGER NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
                planned_hundredths INTEGER NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activities_resource_start
                ON activities (resource_id, start_date);
            CREATE INDEX IF NOT EXISTS idx_activities_work_package
                ON activities (work_package_id);
            CREATE TABLE IF NOT EXISTS change_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                changed_at TEXT NOT NULL,
                details TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_change_logs_entity
                ON change_logs (entity_type, entity_id);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn log_change<T: Serialize>(
        tx: &Transaction,
        entity: EntityType,
        entity_id: i64,
        action: ChangeAction,
        details: &T,
    ) -> PersistenceResult<()> {
        let details = serde_json::to_string(details)?;
        tx.execute(
            "INSERT INTO change_logs (entity_type, entity_id, action, changed_at, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entity.as_str(),
                entity_id,
                action.as_str(),
                format_timestamp(Utc::now()),
                details
            ],
        )?;
        debug!(entity = %entity, entity_id, action = action.as_str(), "recorded change");
        Ok(())
    }

    fn ensure_exists(
        tx: &Transaction,
        table: &str,
        label: &str,
        id: i64,
    ) -> PersistenceResult<()> {
        let sql = format!("SELECT 1 FROM {table} WHERE id = ?1");
        let found: Option<i64> = tx.query_row(&sql, params![id], |row| row.get(0)).optional()?;
        if found.is_none() {
            return Err(ValidationError::new(format!("{label} {id} does not exist")).into());
        }
        Ok(())
    }

    fn select_one<T>(
        &self,
        sql: &str,
        id: i64,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> PersistenceResult<Option<T>> {
        let conn = self.connection.lock();
        Ok(conn.query_row(sql, params![id], map).optional()?)
    }

    fn select_all<T>(
        &self,
        sql: &str,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> PersistenceResult<Vec<T>> {
        let conn = self.connection.lock();
        query_all(&conn, sql, map)
    }

    /// Delete a row and log the record it held; `false` when no row had that id.
    ///
    /// The record is read inside the deleting transaction so the log matches what was removed.
    fn delete_row<T: Serialize>(
        &self,
        table: &str,
        columns: &str,
        entity: EntityType,
        id: i64,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> PersistenceResult<bool> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let select = format!("SELECT {columns} FROM {table} WHERE id = ?1");
        let Some(before) = tx.query_row(&select, params![id], map).optional()? else {
            return Ok(false);
        };
        tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
        Self::log_change(&tx, entity, id, ChangeAction::Delete, &before)?;
        tx.commit()?;
        Ok(true)
    }

    fn log_all<T: Serialize>(
        tx: &Transaction,
        entity: EntityType,
        action: ChangeAction,
        records: &[T],
        id: fn(&T) -> i64,
    ) -> PersistenceResult<()> {
        for record in records {
            Self::log_change(tx, entity, id(record), action, record)?;
        }
        Ok(())
    }
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> PersistenceResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|err| conversion_error(idx, err))
}

fn hours_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(from_hundredths(row.get(idx)?))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|err| conversion_error(idx, err))
}

fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|msg: String| conversion_error(idx, PersistenceError::InvalidData(msg)))
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        name: row.get(1)?,
        contract_hours: hours_column(row, 2)?,
        monthly_availability_overrides: json_column::<MonthlyAvailability>(row, 3)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: date_column(row, 2)?,
        end_date: date_column(row, 3)?,
    })
}

fn work_package_from_row(row: &Row<'_>) -> rusqlite::Result<WorkPackage> {
    Ok(WorkPackage {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        rams_tag: RamsTag::from_label(&row.get::<_, String>(3)?),
        standard_effort_hours: hours_column(row, 4)?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        work_package_id: row.get(1)?,
        resource_id: row.get(2)?,
        planned_hours: hours_column(row, 3)?,
        start_date: date_column(row, 4)?,
        end_date: date_column(row, 5)?,
    })
}

fn utilization_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceUtilization> {
    Ok(ResourceUtilization {
        id: row.get(0)?,
        name: row.get(1)?,
        contract_hours: hours_column(row, 2)?,
        monthly_availability_overrides: json_column::<MonthlyAvailability>(row, 3)?,
        total_planned_hours: hours_column(row, 4)?,
    })
}

fn activity_row_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get(0)?,
        work_package_id: row.get(1)?,
        work_package_name: row.get(2)?,
        rams_tag: RamsTag::from_label(&row.get::<_, String>(3)?),
        project_id: row.get(4)?,
        project_name: row.get(5)?,
        resource_id: row.get(6)?,
        resource_name: row.get(7)?,
        planned_hours: hours_column(row, 8)?,
        start_date: date_column(row, 9)?,
        end_date: date_column(row, 10)?,
    })
}

fn rollup_from_row(row: &Row<'_>) -> rusqlite::Result<BudgetRollup> {
    let resource_ids: Option<String> = row.get(6)?;
    let resource_ids = resource_ids
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|id| !id.is_empty())
        .map(|id| id.trim().parse::<i64>().map_err(|err| conversion_error(6, err)))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(BudgetRollup {
        work_package_id: row.get(0)?,
        project_name: row.get(1)?,
        work_package_name: row.get(2)?,
        rams_tag: RamsTag::from_label(&row.get::<_, String>(3)?),
        standard_effort_hours: hours_column(row, 4)?,
        total_planned_hours: hours_column(row, 5)?,
        resource_ids,
    })
}

fn change_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeLogEntry> {
    let changed_at: String = row.get(4)?;
    let changed_at = DateTime::parse_from_rfc3339(&changed_at)
        .map_err(|err| conversion_error(4, err))?
        .with_timezone(&Utc);
    Ok(ChangeLogEntry {
        id: row.get(0)?,
        entity_type: parsed_column(row, 1)?,
        entity_id: row.get(2)?,
        action: parsed_column(row, 3)?,
        changed_at,
        details: json_column(row, 5)?,
    })
}

const UTILIZATION_SQL: &str = "
    SELECT r.id, r.name, r.contract_hundredths, r.monthly_availability_overrides,
           COALESCE(SUM(a.planned_hundredths), 0)
    FROM resources r
    LEFT JOIN activities a ON a.resource_id = r.id AND a.start_date LIKE ?1";

const ACTIVITY_ROW_SQL: &str = "
    SELECT a.id, wp.id, wp.name, wp.rams_tag, p.id, p.name, r.id, r.name,
           a.planned_hundredths, a.start_date, a.end_date
    FROM activities a
    JOIN work_packages wp ON wp.id = a.work_package_id
    JOIN projects p ON p.id = wp.project_id
    JOIN resources r ON r.id = a.resource_id
    ORDER BY a.start_date ASC, a.id ASC";

const ROLLUP_SQL: &str = "
    SELECT wp.id, p.name, wp.name, wp.rams_tag, wp.standard_effort_hundredths,
           COALESCE(SUM(a.planned_hundredths), 0), GROUP_CONCAT(DISTINCT a.resource_id)
    FROM work_packages wp
    JOIN projects p ON p.id = wp.project_id
    LEFT JOIN activities a ON a.work_package_id = wp.id";

/// `LIKE` pattern matching ISO dates inside one month.
fn month_pattern(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}-%")
}

impl PlanningStore for SqlitePlanningStore {
    fn create_resource(&self, resource: NewResource) -> PersistenceResult<Resource> {
        validate_resource(&resource)?;
        let resource = NewResource {
            contract_hours: quantize(resource.contract_hours),
            ..resource
        };
        let overrides = serde_json::to_string(&resource.monthly_availability_overrides)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO resources (name, contract_hundredths, monthly_availability_overrides)
             VALUES (?1, ?2, ?3)",
            params![resource.name, to_hundredths(resource.contract_hours), overrides],
        )?;
        let created = Resource::from_new(tx.last_insert_rowid(), resource);
        Self::log_change(&tx, EntityType::Resource, created.id, ChangeAction::Create, &created)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_resource(&self, id: i64) -> PersistenceResult<Option<Resource>> {
        let sql = format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = ?1");
        self.select_one(&sql, id, resource_from_row)
    }

    fn list_resources(&self) -> PersistenceResult<Vec<Resource>> {
        let sql = format!("SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY name ASC, id ASC");
        self.select_all(&sql, resource_from_row)
    }

    fn update_resource(&self, resource: &Resource) -> PersistenceResult<Resource> {
        validate_resource(&resource.to_new())?;
        let resource = &Resource {
            contract_hours: quantize(resource.contract_hours),
            ..resource.clone()
        };
        let overrides = serde_json::to_string(&resource.monthly_availability_overrides)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE resources SET name = ?1, contract_hundredths = ?2,
             monthly_availability_overrides = ?3 WHERE id = ?4",
            params![
                resource.name,
                to_hundredths(resource.contract_hours),
                overrides,
                resource.id
            ],
        )?;
        if updated == 0 {
            return Err(PersistenceError::NotFound {
                entity: EntityType::Resource,
                id: resource.id,
            });
        }
        Self::log_change(&tx, EntityType::Resource, resource.id, ChangeAction::Update, resource)?;
        tx.commit()?;
        Ok(resource.clone())
    }

    fn delete_resource(&self, id: i64) -> PersistenceResult<bool> {
        self.delete_row(
            "resources",
            RESOURCE_COLUMNS,
            EntityType::Resource,
            id,
            resource_from_row,
        )
    }

    fn create_project(&self, project: NewProject) -> PersistenceResult<Project> {
        validate_project(&project)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO projects (name, start_date, end_date) VALUES (?1, ?2, ?3)",
            params![
                project.name,
                format_date(project.start_date),
                format_date(project.end_date)
            ],
        )?;
        let created = Project::from_new(tx.last_insert_rowid(), project);
        Self::log_change(&tx, EntityType::Project, created.id, ChangeAction::Create, &created)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_project(&self, id: i64) -> PersistenceResult<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
        self.select_one(&sql, id, project_from_row)
    }

    fn list_projects(&self) -> PersistenceResult<Vec<Project>> {
        let sql =
            format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY start_date DESC, id ASC");
        self.select_all(&sql, project_from_row)
    }

    fn update_project(&self, project: &Project) -> PersistenceResult<Project> {
        validate_project(&project.to_new())?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE projects SET name = ?1, start_date = ?2, end_date = ?3 WHERE id = ?4",
            params![
                project.name,
                format_date(project.start_date),
                format_date(project.end_date),
                project.id
            ],
        )?;
        if updated == 0 {
            return Err(PersistenceError::NotFound {
                entity: EntityType::Project,
                id: project.id,
            });
        }
        Self::log_change(&tx, EntityType::Project, project.id, ChangeAction::Update, project)?;
        tx.commit()?;
        Ok(project.clone())
    }

    fn delete_project(&self, id: i64) -> PersistenceResult<bool> {
        self.delete_row(
            "projects",
            PROJECT_COLUMNS,
            EntityType::Project,
            id,
            project_from_row,
        )
    }

    fn create_work_package(&self, work_package: NewWorkPackage) -> PersistenceResult<WorkPackage> {
        validate_work_package(&work_package)?;
        let work_package = NewWorkPackage {
            standard_effort_hours: quantize(work_package.standard_effort_hours),
            ..work_package
        };
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_exists(&tx, "projects", "project", work_package.project_id)?;
        tx.execute(
            "INSERT INTO work_packages (project_id, name, rams_tag, standard_effort_hundredths)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                work_package.project_id,
                work_package.name,
                work_package.rams_tag.as_str(),
                to_hundredths(work_package.standard_effort_hours)
            ],
        )?;
        let created = WorkPackage::from_new(tx.last_insert_rowid(), work_package);
        Self::log_change(
            &tx,
            EntityType::WorkPackage,
            created.id,
            ChangeAction::Create,
            &created,
        )?;
        tx.commit()?;
        Ok(created)
    }

    fn get_work_package(&self, id: i64) -> PersistenceResult<Option<WorkPackage>> {
        let sql = format!("SELECT {WORK_PACKAGE_COLUMNS} FROM work_packages WHERE id = ?1");
        self.select_one(&sql, id, work_package_from_row)
    }

    fn list_work_packages(&self) -> PersistenceResult<Vec<WorkPackage>> {
        self.select_all(
            "SELECT wp.id, wp.project_id, wp.name, wp.rams_tag, wp.standard_effort_hundredths
             FROM work_packages wp JOIN projects p ON p.id = wp.project_id
             ORDER BY p.name ASC, wp.name ASC, wp.id ASC",
            work_package_from_row,
        )
    }

    fn list_work_packages_for_project(
        &self,
        project_id: i64,
    ) -> PersistenceResult<Vec<WorkPackage>> {
        let conn = self.connection.lock();
        let sql = format!(
            "SELECT {WORK_PACKAGE_COLUMNS} FROM work_packages
             WHERE project_id = ?1 ORDER BY name ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![project_id], work_package_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn update_work_package(&self, work_package: &WorkPackage) -> PersistenceResult<WorkPackage> {
        validate_work_package(&work_package.to_new())?;
        let work_package = &WorkPackage {
            standard_effort_hours: quantize(work_package.standard_effort_hours),
            ..work_package.clone()
        };
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_exists(&tx, "projects", "project", work_package.project_id)?;
        let updated = tx.execute(
            "UPDATE work_packages SET project_id = ?1, name = ?2, rams_tag = ?3,
             standard_effort_hundredths = ?4 WHERE id = ?5",
            params![
                work_package.project_id,
                work_package.name,
                work_package.rams_tag.as_str(),
                to_hundredths(work_package.standard_effort_hours),
                work_package.id
            ],
        )?;
        if updated == 0 {
            return Err(PersistenceError::NotFound {
                entity: EntityType::WorkPackage,
                id: work_package.id,
            });
        }
        Self::log_change(
            &tx,
            EntityType::WorkPackage,
            work_package.id,
            ChangeAction::Update,
            work_package,
        )?;
        tx.commit()?;
        Ok(work_package.clone())
    }

    fn delete_work_package(&self, id: i64) -> PersistenceResult<bool> {
        self.delete_row(
            "work_packages",
            WORK_PACKAGE_COLUMNS,
            EntityType::WorkPackage,
            id,
            work_package_from_row,
        )
    }

    fn create_activity(&self, activity: NewActivity) -> PersistenceResult<Activity> {
        validate_activity(&activity)?;
        let activity = NewActivity {
            planned_hours: quantize(activity.planned_hours),
            ..activity
        };
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_exists(&tx, "work_packages", "work package", activity.work_package_id)?;
        Self::ensure_exists(&tx, "resources", "resource", activity.resource_id)?;
        tx.execute(
            "INSERT INTO activities
             (work_package_id, resource_id, planned_hundredths, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                activity.work_package_id,
                activity.resource_id,
                to_hundredths(activity.planned_hours),
                format_date(activity.start_date),
                format_date(activity.end_date)
            ],
        )?;
        let created = Activity::from_new(tx.last_insert_rowid(), activity);
        Self::log_change(&tx, EntityType::Activity, created.id, ChangeAction::Create, &created)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_activity(&self, id: i64) -> PersistenceResult<Option<Activity>> {
        let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1");
        self.select_one(&sql, id, activity_from_row)
    }

    fn list_activities(&self) -> PersistenceResult<Vec<Activity>> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY start_date DESC, id ASC"
        );
        self.select_all(&sql, activity_from_row)
    }

    fn update_activity(&self, activity: &Activity) -> PersistenceResult<Activity> {
        validate_activity(&activity.to_new())?;
        let activity = &Activity {
            planned_hours: quantize(activity.planned_hours),
            ..activity.clone()
        };
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_exists(&tx, "work_packages", "work package", activity.work_package_id)?;
        Self::ensure_exists(&tx, "resources", "resource", activity.resource_id)?;
        let updated = tx.execute(
            "UPDATE activities SET work_package_id = ?1, resource_id = ?2, planned_hundredths = ?3,
             start_date = ?4, end_date = ?5 WHERE id = ?6",
            params![
                activity.work_package_id,
                activity.resource_id,
                to_hundredths(activity.planned_hours),
                format_date(activity.start_date),
                format_date(activity.end_date),
                activity.id
            ],
        )?;
        if updated == 0 {
            return Err(PersistenceError::NotFound {
                entity: EntityType::Activity,
                id: activity.id,
            });
        }
        Self::log_change(&tx, EntityType::Activity, activity.id, ChangeAction::Update, activity)?;
        tx.commit()?;
        Ok(activity.clone())
    }

    fn delete_activity(&self, id: i64) -> PersistenceResult<bool> {
        self.delete_row(
            "activities",
            ACTIVITY_COLUMNS,
            EntityType::Activity,
            id,
            activity_from_row,
        )
    }

    fn monthly_utilization(
        &self,
        year: i32,
        month: u32,
    ) -> PersistenceResult<Vec<ResourceUtilization>> {
        validate_period(year, month)?;
        let conn = self.connection.lock();
        let sql = format!("{UTILIZATION_SQL} GROUP BY r.id ORDER BY r.name ASC, r.id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![month_pattern(year, month)], utilization_from_row)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(year, month, resources = records.len(), "loaded monthly utilization");
        Ok(records)
    }

    fn resource_monthly_utilization(
        &self,
        resource_id: i64,
        year: i32,
        month: u32,
    ) -> PersistenceResult<Option<ResourceUtilization>> {
        validate_period(year, month)?;
        let conn = self.connection.lock();
        let sql = format!("{UTILIZATION_SQL} WHERE r.id = ?2 GROUP BY r.id");
        Ok(conn
            .query_row(
                &sql,
                params![month_pattern(year, month), resource_id],
                utilization_from_row,
            )
            .optional()?)
    }

    fn activity_rows(&self) -> PersistenceResult<Vec<ActivityRow>> {
        self.select_all(ACTIVITY_ROW_SQL, activity_row_from_row)
    }

    fn budget_rollups(&self) -> PersistenceResult<Vec<BudgetRollup>> {
        let sql = format!("{ROLLUP_SQL} GROUP BY wp.id ORDER BY p.name ASC, wp.name ASC, wp.id ASC");
        self.select_all(&sql, rollup_from_row)
    }

    fn budget_rollup(&self, work_package_id: i64) -> PersistenceResult<Option<BudgetRollup>> {
        let sql = format!("{ROLLUP_SQL} WHERE wp.id = ?1 GROUP BY wp.id");
        self.select_one(&sql, work_package_id, rollup_from_row)
    }

    fn recent_changes(&self, limit: usize) -> PersistenceResult<Vec<ChangeLogEntry>> {
        let conn = self.connection.lock();
        let sql = format!(
            "SELECT {CHANGE_LOG_COLUMNS} FROM change_logs ORDER BY id DESC LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], change_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn changes_for(
        &self,
        entity: EntityType,
        entity_id: i64,
    ) -> PersistenceResult<Vec<ChangeLogEntry>> {
        let conn = self.connection.lock();
        let sql = format!(
            "SELECT {CHANGE_LOG_COLUMNS} FROM change_logs
             WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![entity.as_str(), entity_id], change_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn changes_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PersistenceResult<Vec<ChangeLogEntry>> {
        let conn = self.connection.lock();
        let sql = format!(
            "SELECT {CHANGE_LOG_COLUMNS} FROM change_logs
             WHERE changed_at >= ?1 AND changed_at <= ?2 ORDER BY id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![format_timestamp(start), format_timestamp(end)],
            change_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn import_snapshot(&self, snapshot: &PlanningSnapshot) -> PersistenceResult<()> {
        snapshot.validate()?;
        for resource in &snapshot.resources {
            validate_resource(&resource.to_new())?;
        }
        for project in &snapshot.projects {
            validate_project(&project.to_new())?;
        }
        for work_package in &snapshot.work_packages {
            validate_work_package(&work_package.to_new())?;
        }
        for activity in &snapshot.activities {
            validate_activity(&activity.to_new())?;
        }

        let resources: Vec<Resource> = snapshot
            .resources
            .iter()
            .map(|r| Resource {
                contract_hours: quantize(r.contract_hours),
                ..r.clone()
            })
            .collect();
        let work_packages: Vec<WorkPackage> = snapshot
            .work_packages
            .iter()
            .map(|wp| WorkPackage {
                standard_effort_hours: quantize(wp.standard_effort_hours),
                ..wp.clone()
            })
            .collect();
        let activities: Vec<Activity> = snapshot
            .activities
            .iter()
            .map(|a| Activity {
                planned_hours: quantize(a.planned_hours),
                ..a.clone()
            })
            .collect();

        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;

        // Everything replaced is logged as deleted, children first.
        let removed = query_all(
            &tx,
            &format!("SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY id"),
            activity_from_row,
        )?;
        Self::log_all(&tx, EntityType::Activity, ChangeAction::Delete, &removed, |a| a.id)?;
        let removed = query_all(
            &tx,
            &format!("SELECT {WORK_PACKAGE_COLUMNS} FROM work_packages ORDER BY id"),
            work_package_from_row,
        )?;
        Self::log_all(&tx, EntityType::WorkPackage, ChangeAction::Delete, &removed, |wp| wp.id)?;
        let removed = query_all(
            &tx,
            &format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"),
            project_from_row,
        )?;
        Self::log_all(&tx, EntityType::Project, ChangeAction::Delete, &removed, |p| p.id)?;
        let removed = query_all(
            &tx,
            &format!("SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY id"),
            resource_from_row,
        )?;
        Self::log_all(&tx, EntityType::Resource, ChangeAction::Delete, &removed, |r| r.id)?;

        tx.execute_batch(
            "DELETE FROM activities; DELETE FROM work_packages;
             DELETE FROM projects; DELETE FROM resources;",
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO resources (id, name, contract_hundredths, monthly_availability_overrides)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in &resources {
                let overrides = serde_json::to_string(&r.monthly_availability_overrides)?;
                stmt.execute(params![r.id, r.name, to_hundredths(r.contract_hours), overrides])?;
            }
            let mut stmt = tx.prepare(
                "INSERT INTO projects (id, name, start_date, end_date) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for p in &snapshot.projects {
                stmt.execute(params![
                    p.id,
                    p.name,
                    format_date(p.start_date),
                    format_date(p.end_date)
                ])?;
            }
            let mut stmt = tx.prepare(
                "INSERT INTO work_packages
                 (id, project_id, name, rams_tag, standard_effort_hundredths)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for wp in &work_packages {
                stmt.execute(params![
                    wp.id,
                    wp.project_id,
                    wp.name,
                    wp.rams_tag.as_str(),
                    to_hundredths(wp.standard_effort_hours)
                ])?;
            }
            let mut stmt = tx.prepare(
                "INSERT INTO activities
                 (id, work_package_id, resource_id, planned_hundredths, start_date, end_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for a in &activities {
                stmt.execute(params![
                    a.id,
                    a.work_package_id,
                    a.resource_id,
                    to_hundredths(a.planned_hours),
                    format_date(a.start_date),
                    format_date(a.end_date)
                ])?;
            }
        }

        Self::log_all(&tx, EntityType::Resource, ChangeAction::Create, &resources, |r| r.id)?;
        Self::log_all(&tx, EntityType::Project, ChangeAction::Create, &snapshot.projects, |p| {
            p.id
        })?;
        Self::log_all(&tx, EntityType::WorkPackage, ChangeAction::Create, &work_packages, |wp| {
            wp.id
        })?;
        Self::log_all(&tx, EntityType::Activity, ChangeAction::Create, &activities, |a| a.id)?;
        tx.commit()?;
        info!(
            resources = snapshot.resources.len(),
            projects = snapshot.projects.len(),
            work_packages = snapshot.work_packages.len(),
            activities = snapshot.activities.len(),
            "imported planning snapshot"
        );
        Ok(())
    }
}
