use crate::activity::{Activity, ActivityRow, NewActivity};
use crate::budget::BudgetRollup;
use crate::capacity::ResourceUtilization;
use crate::change_log::{ChangeLogEntry, EntityType};
use crate::project::{NewProject, NewWorkPackage, Project, WorkPackage};
use crate::resource::{NewResource, Resource};
use crate::validation::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityType, id: i64 },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Every record of a planning database, used for seeding and backups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningSnapshot {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub work_packages: Vec<WorkPackage>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl PlanningSnapshot {
    /// Referential checks across the collections (ids unique, references resolvable).
    pub fn validate(&self) -> PersistenceResult<()> {
        use std::collections::HashSet;

        fn unique(entity: &str, ids: impl Iterator<Item = i64>) -> PersistenceResult<HashSet<i64>> {
            let mut seen = HashSet::new();
            for id in ids {
                if !seen.insert(id) {
                    return Err(PersistenceError::InvalidData(format!(
                        "duplicate {entity} id {id}"
                    )));
                }
            }
            Ok(seen)
        }

        let resources = unique("resource", self.resources.iter().map(|r| r.id))?;
        let projects = unique("project", self.projects.iter().map(|p| p.id))?;
        let work_packages = unique("work package", self.work_packages.iter().map(|w| w.id))?;
        unique("activity", self.activities.iter().map(|a| a.id))?;

        for wp in &self.work_packages {
            if !projects.contains(&wp.project_id) {
                return Err(PersistenceError::InvalidData(format!(
                    "work package {} references unknown project {}",
                    wp.id, wp.project_id
                )));
            }
        }
        for activity in &self.activities {
            if !work_packages.contains(&activity.work_package_id) {
                return Err(PersistenceError::InvalidData(format!(
                    "activity {} references unknown work package {}",
                    activity.id, activity.work_package_id
                )));
            }
            if !resources.contains(&activity.resource_id) {
                return Err(PersistenceError::InvalidData(format!(
                    "activity {} references unknown resource {}",
                    activity.id, activity.resource_id
                )));
            }
        }
        Ok(())
    }
}

/// CRUD access plus the read models the capacity, workload and budget views are built from.
pub trait PlanningStore {
    fn create_resource(&self, resource: NewResource) -> PersistenceResult<Resource>;
    fn get_resource(&self, id: i64) -> PersistenceResult<Option<Resource>>;
    /// Ordered by name.
    fn list_resources(&self) -> PersistenceResult<Vec<Resource>>;
    fn update_resource(&self, resource: &Resource) -> PersistenceResult<Resource>;
    /// Also removes the resource's activities.
    fn delete_resource(&self, id: i64) -> PersistenceResult<bool>;

    fn create_project(&self, project: NewProject) -> PersistenceResult<Project>;
    fn get_project(&self, id: i64) -> PersistenceResult<Option<Project>>;
    /// Most recent start date first.
    fn list_projects(&self) -> PersistenceResult<Vec<Project>>;
    fn update_project(&self, project: &Project) -> PersistenceResult<Project>;
    /// Also removes the project's work packages and their activities.
    fn delete_project(&self, id: i64) -> PersistenceResult<bool>;

    fn create_work_package(&self, work_package: NewWorkPackage) -> PersistenceResult<WorkPackage>;
    fn get_work_package(&self, id: i64) -> PersistenceResult<Option<WorkPackage>>;
    /// Ordered by project name, then work package name.
    fn list_work_packages(&self) -> PersistenceResult<Vec<WorkPackage>>;
    fn list_work_packages_for_project(&self, project_id: i64)
    -> PersistenceResult<Vec<WorkPackage>>;
    fn update_work_package(&self, work_package: &WorkPackage) -> PersistenceResult<WorkPackage>;
    fn delete_work_package(&self, id: i64) -> PersistenceResult<bool>;

    fn create_activity(&self, activity: NewActivity) -> PersistenceResult<Activity>;
    fn get_activity(&self, id: i64) -> PersistenceResult<Option<Activity>>;
    /// Most recent start date first.
    fn list_activities(&self) -> PersistenceResult<Vec<Activity>>;
    fn update_activity(&self, activity: &Activity) -> PersistenceResult<Activity>;
    fn delete_activity(&self, id: i64) -> PersistenceResult<bool>;

    /// One row per resource (ordered by name) summing planned hours of activities whose start
    /// date falls in the month. Resources without such activities report zero hours.
    fn monthly_utilization(&self, year: i32, month: u32)
    -> PersistenceResult<Vec<ResourceUtilization>>;
    fn resource_monthly_utilization(
        &self,
        resource_id: i64,
        year: i32,
        month: u32,
    ) -> PersistenceResult<Option<ResourceUtilization>>;
    /// Activities joined with resource, work package and project names.
    fn activity_rows(&self) -> PersistenceResult<Vec<ActivityRow>>;
    /// Ordered by project name, then work package name.
    fn budget_rollups(&self) -> PersistenceResult<Vec<BudgetRollup>>;
    fn budget_rollup(&self, work_package_id: i64) -> PersistenceResult<Option<BudgetRollup>>;

    /// Latest first.
    fn recent_changes(&self, limit: usize) -> PersistenceResult<Vec<ChangeLogEntry>>;
    fn changes_for(&self, entity: EntityType, entity_id: i64)
    -> PersistenceResult<Vec<ChangeLogEntry>>;
    fn changes_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PersistenceResult<Vec<ChangeLogEntry>>;

    /// Replace every record with the snapshot's, keeping its ids.
    fn import_snapshot(&self, snapshot: &PlanningSnapshot) -> PersistenceResult<()>;

    fn export_snapshot(&self) -> PersistenceResult<PlanningSnapshot> {
        Ok(PlanningSnapshot {
            resources: self.list_resources()?,
            projects: self.list_projects()?,
            work_packages: self.list_work_packages()?,
            activities: self.list_activities()?,
        })
    }
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{load_snapshot_from_json, save_snapshot_to_json};
