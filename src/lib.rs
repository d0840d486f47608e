pub mod activity;
pub mod budget;
pub mod calendar;
pub mod capacity;
pub mod change_log;
pub mod config;
pub mod hours;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod logging;
pub mod period;
pub mod persistence;
pub mod project;
pub mod report;
pub mod resource;
pub mod validation;
pub mod warnings;
pub mod workload;

pub use activity::{Activity, ActivityRow, NewActivity};
pub use budget::{
    BudgetAssessment, BudgetRollup, BudgetStatus, RamsDistribution, WorkPackageBudgetStatus,
    budget_status, rams_distribution,
};
pub use calendar::{CalendarError, WorkCalendar, WorkCalendarConfig, working_days};
pub use capacity::{
    CapacityOverview, CapacityStatus, CapacitySummary, EnrichedResourceCapacity,
    ResourceUtilization, capacity_for_year, enrich, enrich_on, is_over_capacity,
    monthly_capacity, monthly_capacity_on, utilization_percentage,
};
pub use change_log::{ChangeAction, ChangeLogEntry, EntityType};
pub use config::{AppConfig, ConfigError};
pub use period::{YearMonth, YearMonthParseError, days_in_month};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqlitePlanningStore;
pub use persistence::{
    PersistenceError, PersistenceResult, PlanningSnapshot, PlanningStore,
    load_snapshot_from_json, save_snapshot_to_json,
};
pub use project::{NewProject, NewWorkPackage, Project, RamsTag, WorkPackage};
pub use resource::{AvailabilityOverride, MonthlyAvailability, NewResource, Resource};
pub use validation::ValidationError;
pub use warnings::{CapacityWarning, Severity, WarningType, capacity_warnings};
pub use workload::{
    SplitPolicy, WorkloadBucket, WorkloadFilter, WorkloadTotals, aggregate,
    aggregate_with_policy, workload_matrix,
};
