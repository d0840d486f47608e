use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::budget::{RamsDistribution, WorkPackageBudgetStatus, rams_distribution};
use crate::calendar::{WorkCalendar, WorkCalendarConfig};
use crate::capacity::{
    CapacityOverview, CapacitySummary, EnrichedResourceCapacity, capacity_for_year, enrich_on,
};
use crate::change_log::{ChangeLogEntry, EntityType};
use crate::persistence::{PersistenceError, PlanningSnapshot, PlanningStore};
use crate::report;
use crate::validation::validate_period;
use crate::warnings::CapacityWarning;
use crate::workload::{SplitPolicy, WorkloadBucket, WorkloadFilter, WorkloadTotals};
use crate::{
    Activity, NewActivity, NewProject, NewResource, NewWorkPackage, Project, Resource,
    WorkPackage, aggregate_with_policy,
};

const DEFAULT_CHANGE_LOG_LIMIT: usize = 50;

type SharedStore = Arc<dyn PlanningStore + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    store: SharedStore,
    calendar: Arc<RwLock<WorkCalendar>>,
}

impl AppState {
    pub fn new<S>(store: S, calendar: WorkCalendar) -> Self
    where
        S: PlanningStore + Send + Sync + 'static,
    {
        Self {
            store: Arc::new(store),
            calendar: Arc::new(RwLock::new(calendar)),
        }
    }

    fn store(&self) -> SharedStore {
        self.store.clone()
    }

    fn calendar(&self) -> WorkCalendar {
        self.calendar.read().clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Invalid(rejection.body_text())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity} {id} not found"))
            }
            PersistenceError::Validation(err) => ApiError::Invalid(err.message().to_string()),
            PersistenceError::InvalidData(message) => ApiError::Invalid(message),
            PersistenceError::Sqlite(rusqlite::Error::SqliteFailure(code, _))
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ApiError::Conflict(format!("constraint violation: {code}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                let body = Json(ErrorBody {
                    error: "not_found",
                    message,
                });
                (StatusCode::NOT_FOUND, body).into_response()
            }
            ApiError::Conflict(message) => {
                warn!(%message, "request conflicted with stored data");
                let body = Json(ErrorBody {
                    error: "conflict",
                    message,
                });
                (StatusCode::CONFLICT, body).into_response()
            }
            ApiError::Invalid(message) => {
                let body = Json(ErrorBody {
                    error: "invalid_request",
                    message,
                });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::Internal(message) => {
                error!(%message, "request failed");
                let body = Json(ErrorBody {
                    error: "internal_error",
                    message,
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/calendar", get(get_calendar).put(update_calendar))
        .route("/resources", get(list_resources).post(create_resource))
        .route(
            "/resources/:id",
            get(get_resource).put(update_resource).delete(delete_resource),
        )
        .route("/resources/:id/capacity", get(resource_capacity))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/work_packages", get(list_project_work_packages))
        .route(
            "/work_packages",
            get(list_work_packages).post(create_work_package),
        )
        .route(
            "/work_packages/:id",
            get(get_work_package)
                .put(update_work_package)
                .delete(delete_work_package),
        )
        .route("/activities", get(list_activities).post(create_activity))
        .route(
            "/activities/:id",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
        .route("/capacity", get(monthly_capacity_overview))
        .route("/capacity/year", get(yearly_capacity_overview))
        .route("/workload", get(workload))
        .route("/budget", get(budget_overview))
        .route("/budget/:work_package_id", get(work_package_budget))
        .route("/rams_distribution", get(rams_distribution_overview))
        .route("/change_logs", get(change_logs))
        .route("/snapshot", get(export_snapshot).put(import_snapshot))
        .route("/reports/capacity.csv", get(capacity_report))
        .route("/reports/budget.csv", get(budget_report))
        .route("/reports/rams.csv", get(rams_report))
        .route("/reports/workload.csv", get(workload_report))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// Query parameters arrive as strings so that malformed numbers produce the JSON error body.

#[derive(Debug, Default, Deserialize)]
struct PeriodQuery {
    year: Option<String>,
    month: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkloadQuery {
    year: Option<String>,
    resource_id: Option<String>,
    project_id: Option<String>,
    policy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeLogQuery {
    limit: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<String>,
}

fn parse_param<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::invalid(format!("{name} must be a number, got '{value}'"))),
    }
}

fn required_param<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<T, ApiError> {
    parse_param(name, raw)?.ok_or_else(|| ApiError::invalid(format!("{name} is required")))
}

impl PeriodQuery {
    fn year(&self) -> Result<i32, ApiError> {
        let year = required_param("year", self.year.as_deref())?;
        validate_period(year, 1).map_err(|err| ApiError::invalid(err.message()))?;
        Ok(year)
    }

    fn year_month(&self) -> Result<(i32, u32), ApiError> {
        let year = required_param("year", self.year.as_deref())?;
        let month = required_param("month", self.month.as_deref())?;
        validate_period(year, month).map_err(|err| ApiError::invalid(err.message()))?;
        Ok((year, month))
    }
}

impl WorkloadQuery {
    fn year(&self) -> Result<i32, ApiError> {
        PeriodQuery {
            year: self.year.clone(),
            month: None,
        }
        .year()
    }

    fn filter(&self) -> Result<WorkloadFilter, ApiError> {
        Ok(WorkloadFilter {
            resource_id: parse_param("resource_id", self.resource_id.as_deref())?,
            project_id: parse_param("project_id", self.project_id.as_deref())?,
        })
    }

    fn policy(&self) -> Result<SplitPolicy, ApiError> {
        match self.policy.as_deref().map(str::trim) {
            None | Some("") | Some("full_span") => Ok(SplitPolicy::FullSpan),
            Some("target_year_only") => Ok(SplitPolicy::TargetYearOnly),
            Some(other) => Err(ApiError::invalid(format!(
                "unknown policy '{other}' (expected full_span or target_year_only)"
            ))),
        }
    }
}

async fn get_calendar(State(state): State<AppState>) -> Json<WorkCalendarConfig> {
    Json(state.calendar().to_config())
}

async fn update_calendar(
    State(state): State<AppState>,
    payload: Result<Json<WorkCalendarConfig>, JsonRejection>,
) -> Result<Json<WorkCalendarConfig>, ApiError> {
    let Json(config) = payload?;
    let calendar =
        WorkCalendar::from_config(&config).map_err(|err| ApiError::invalid(err.to_string()))?;
    let current = calendar.to_config();
    *state.calendar.write() = calendar;
    info!(
        working_days = current.working_days().len(),
        holidays = current.holidays().len(),
        "updated work calendar"
    );
    Ok(Json(current))
}

async fn list_resources(State(state): State<AppState>) -> Result<Json<Vec<Resource>>, ApiError> {
    Ok(Json(state.store().list_resources()?))
}

async fn get_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<i64>,
) -> Result<Json<Resource>, ApiError> {
    match state.store().get_resource(resource_id)? {
        Some(resource) => Ok(Json(resource)),
        None => Err(ApiError::not_found(format!(
            "resource {resource_id} not found"
        ))),
    }
}

async fn create_resource(
    State(state): State<AppState>,
    payload: Result<Json<NewResource>, JsonRejection>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    let Json(resource) = payload?;
    let created = state.store().create_resource(resource)?;
    info!(resource_id = created.id, "created resource");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<i64>,
    payload: Result<Json<NewResource>, JsonRejection>,
) -> Result<Json<Resource>, ApiError> {
    let Json(resource) = payload?;
    let updated = state
        .store()
        .update_resource(&Resource::from_new(resource_id, resource))?;
    Ok(Json(updated))
}

async fn delete_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store().delete_resource(resource_id)? {
        return Err(ApiError::not_found(format!(
            "resource {resource_id} not found"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn resource_capacity(
    State(state): State<AppState>,
    Path(resource_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<EnrichedResourceCapacity>, ApiError> {
    let (year, month) = query.year_month()?;
    let record = state
        .store()
        .resource_monthly_utilization(resource_id, year, month)?
        .ok_or_else(|| ApiError::not_found(format!("resource {resource_id} not found")))?;
    Ok(Json(enrich_on(&state.calendar(), &record, year, month)))
}

async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.store().list_projects()?))
}

async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    match state.store().get_project(project_id)? {
        Some(project) => Ok(Json(project)),
        None => Err(ApiError::not_found(format!("project {project_id} not found"))),
    }
}

async fn create_project(
    State(state): State<AppState>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let Json(project) = payload?;
    let created = state.store().create_project(project)?;
    info!(project_id = created.id, "created project");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> Result<Json<Project>, ApiError> {
    let Json(project) = payload?;
    let updated = state
        .store()
        .update_project(&Project::from_new(project_id, project))?;
    Ok(Json(updated))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store().delete_project(project_id)? {
        return Err(ApiError::not_found(format!("project {project_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_project_work_packages(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<WorkPackage>>, ApiError> {
    let store = state.store();
    if store.get_project(project_id)?.is_none() {
        return Err(ApiError::not_found(format!("project {project_id} not found")));
    }
    Ok(Json(store.list_work_packages_for_project(project_id)?))
}

async fn list_work_packages(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkPackage>>, ApiError> {
    Ok(Json(state.store().list_work_packages()?))
}

async fn get_work_package(
    State(state): State<AppState>,
    Path(work_package_id): Path<i64>,
) -> Result<Json<WorkPackage>, ApiError> {
    match state.store().get_work_package(work_package_id)? {
        Some(work_package) => Ok(Json(work_package)),
        None => Err(ApiError::not_found(format!(
            "work package {work_package_id} not found"
        ))),
    }
}

async fn create_work_package(
    State(state): State<AppState>,
    payload: Result<Json<NewWorkPackage>, JsonRejection>,
) -> Result<(StatusCode, Json<WorkPackage>), ApiError> {
    let Json(work_package) = payload?;
    let created = state.store().create_work_package(work_package)?;
    info!(work_package_id = created.id, "created work package");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_work_package(
    State(state): State<AppState>,
    Path(work_package_id): Path<i64>,
    payload: Result<Json<NewWorkPackage>, JsonRejection>,
) -> Result<Json<WorkPackage>, ApiError> {
    let Json(work_package) = payload?;
    let updated = state
        .store()
        .update_work_package(&WorkPackage::from_new(work_package_id, work_package))?;
    Ok(Json(updated))
}

async fn delete_work_package(
    State(state): State<AppState>,
    Path(work_package_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store().delete_work_package(work_package_id)? {
        return Err(ApiError::not_found(format!(
            "work package {work_package_id} not found"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_activities(State(state): State<AppState>) -> Result<Json<Vec<Activity>>, ApiError> {
    Ok(Json(state.store().list_activities()?))
}

async fn get_activity(
    State(state): State<AppState>,
    Path(activity_id): Path<i64>,
) -> Result<Json<Activity>, ApiError> {
    match state.store().get_activity(activity_id)? {
        Some(activity) => Ok(Json(activity)),
        None => Err(ApiError::not_found(format!(
            "activity {activity_id} not found"
        ))),
    }
}

async fn create_activity(
    State(state): State<AppState>,
    payload: Result<Json<NewActivity>, JsonRejection>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    let Json(activity) = payload?;
    let created = state.store().create_activity(activity)?;
    info!(activity_id = created.id, "created activity");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_activity(
    State(state): State<AppState>,
    Path(activity_id): Path<i64>,
    payload: Result<Json<NewActivity>, JsonRejection>,
) -> Result<Json<Activity>, ApiError> {
    let Json(activity) = payload?;
    let updated = state
        .store()
        .update_activity(&Activity::from_new(activity_id, activity))?;
    Ok(Json(updated))
}

async fn delete_activity(
    State(state): State<AppState>,
    Path(activity_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store().delete_activity(activity_id)? {
        return Err(ApiError::not_found(format!(
            "activity {activity_id} not found"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct CapacityResponse {
    year: i32,
    month: u32,
    data: Vec<EnrichedResourceCapacity>,
    warnings: Vec<CapacityWarning>,
    summary: CapacitySummary,
}

impl From<CapacityOverview> for CapacityResponse {
    fn from(overview: CapacityOverview) -> Self {
        Self {
            year: overview.year,
            month: overview.month,
            data: overview.resources,
            warnings: overview.warnings,
            summary: overview.summary,
        }
    }
}

fn load_overview(state: &AppState, year: i32, month: u32) -> Result<CapacityOverview, ApiError> {
    let records = state.store().monthly_utilization(year, month)?;
    Ok(CapacityOverview::build_on(
        &state.calendar(),
        &records,
        year,
        month,
    ))
}

async fn monthly_capacity_overview(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<CapacityResponse>, ApiError> {
    let (year, month) = query.year_month()?;
    Ok(Json(load_overview(&state, year, month)?.into()))
}

async fn yearly_capacity_overview(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<CapacityOverview>>, ApiError> {
    let year = query.year()?;
    let store = state.store();
    let mut monthly_records = Vec::with_capacity(12);
    for month in 1..=12 {
        monthly_records.push((month, store.monthly_utilization(year, month)?));
    }
    Ok(Json(capacity_for_year(
        &state.calendar(),
        year,
        &monthly_records,
    )))
}

#[derive(Debug, Serialize)]
struct WorkloadResponse {
    year: i32,
    policy: SplitPolicy,
    data: Vec<WorkloadBucket>,
    totals: WorkloadTotals,
}

fn load_workload(
    state: &AppState,
    query: &WorkloadQuery,
) -> Result<(i32, SplitPolicy, Vec<WorkloadBucket>), ApiError> {
    let year = query.year()?;
    let filter = query.filter()?;
    let policy = query.policy()?;
    let rows = state.store().activity_rows()?;
    Ok((year, policy, aggregate_with_policy(&rows, year, filter, policy)))
}

async fn workload(
    State(state): State<AppState>,
    Query(query): Query<WorkloadQuery>,
) -> Result<Json<WorkloadResponse>, ApiError> {
    let (year, policy, data) = load_workload(&state, &query)?;
    let totals = WorkloadTotals::from_buckets(&data);
    Ok(Json(WorkloadResponse {
        year,
        policy,
        data,
        totals,
    }))
}

fn load_budget(state: &AppState) -> Result<Vec<WorkPackageBudgetStatus>, ApiError> {
    Ok(state
        .store()
        .budget_rollups()?
        .iter()
        .map(WorkPackageBudgetStatus::from_rollup)
        .collect())
}

async fn budget_overview(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkPackageBudgetStatus>>, ApiError> {
    Ok(Json(load_budget(&state)?))
}

async fn work_package_budget(
    State(state): State<AppState>,
    Path(work_package_id): Path<i64>,
) -> Result<Json<WorkPackageBudgetStatus>, ApiError> {
    let rollup = state
        .store()
        .budget_rollup(work_package_id)?
        .ok_or_else(|| ApiError::not_found(format!("work package {work_package_id} not found")))?;
    Ok(Json(WorkPackageBudgetStatus::from_rollup(&rollup)))
}

async fn rams_distribution_overview(
    State(state): State<AppState>,
) -> Result<Json<Vec<RamsDistribution>>, ApiError> {
    Ok(Json(rams_distribution(&state.store().budget_rollups()?)))
}

async fn change_logs(
    State(state): State<AppState>,
    Query(query): Query<ChangeLogQuery>,
) -> Result<Json<Vec<ChangeLogEntry>>, ApiError> {
    let store = state.store();
    let entity_type = query
        .entity_type
        .as_deref()
        .map(str::parse::<EntityType>)
        .transpose()
        .map_err(ApiError::invalid)?;
    let entity_id: Option<i64> = parse_param("entity_id", query.entity_id.as_deref())?;
    let entries = match (entity_type, entity_id) {
        (Some(entity), Some(id)) => store.changes_for(entity, id)?,
        (None, None) => {
            let limit = parse_param("limit", query.limit.as_deref())?
                .unwrap_or(DEFAULT_CHANGE_LOG_LIMIT);
            store.recent_changes(limit)?
        }
        _ => {
            return Err(ApiError::invalid(
                "entity_type and entity_id must be given together",
            ));
        }
    };
    Ok(Json(entries))
}

async fn export_snapshot(
    State(state): State<AppState>,
) -> Result<Json<PlanningSnapshot>, ApiError> {
    Ok(Json(state.store().export_snapshot()?))
}

async fn import_snapshot(
    State(state): State<AppState>,
    payload: Result<Json<PlanningSnapshot>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(snapshot) = payload?;
    state.store().import_snapshot(&snapshot)?;
    Ok(StatusCode::NO_CONTENT)
}

fn csv_response(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

async fn capacity_report(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Response, ApiError> {
    let (year, month) = query.year_month()?;
    let overview = load_overview(&state, year, month)?;
    let mut body = Vec::new();
    report::write_capacity_report(&mut body, &overview.resources)?;
    Ok(csv_response(
        &format!("capacity_{year:04}_{month:02}.csv"),
        body,
    ))
}

async fn budget_report(State(state): State<AppState>) -> Result<Response, ApiError> {
    let statuses = load_budget(&state)?;
    let mut body = Vec::new();
    report::write_budget_report(&mut body, &statuses)?;
    Ok(csv_response("budget.csv", body))
}

async fn rams_report(State(state): State<AppState>) -> Result<Response, ApiError> {
    let distribution = rams_distribution(&state.store().budget_rollups()?);
    let mut body = Vec::new();
    report::write_rams_distribution_report(&mut body, &distribution)?;
    Ok(csv_response("rams_distribution.csv", body))
}

async fn workload_report(
    State(state): State<AppState>,
    Query(query): Query<WorkloadQuery>,
) -> Result<Response, ApiError> {
    let (year, _, buckets) = load_workload(&state, &query)?;
    let mut body = Vec::new();
    report::write_workload_report(&mut body, &buckets)?;
    Ok(csv_response(&format!("workload_{year:04}.csv"), body))
}
