//! Input checks applied before records reach storage or the capacity engine.

use crate::activity::NewActivity;
use crate::project::{NewProject, NewWorkPackage};
use crate::resource::{MonthlyAvailability, NewResource};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn require_name(entity: &str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new(format!("{entity} requires a non-empty name")));
    }
    Ok(())
}

fn require_hours(entity: &str, field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(format!(
            "{entity} has invalid {field} {value} (must be a non-negative number)"
        )));
    }
    Ok(())
}

fn require_range(entity: &str, start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::new(format!(
            "{entity} end date {end} is before start date {start}"
        )));
    }
    Ok(())
}

pub fn validate_overrides(overrides: &MonthlyAvailability) -> Result<(), ValidationError> {
    for (month, entry) in overrides {
        if let Some(days) = entry.available_days {
            let max = month.days_in_month();
            if days > max {
                return Err(ValidationError::new(format!(
                    "availability override for {month} has {days} days (month has {max})"
                )));
            }
        }
    }
    Ok(())
}

pub fn validate_resource(resource: &NewResource) -> Result<(), ValidationError> {
    require_name("resource", &resource.name)?;
    require_hours("resource", "contract_hours", resource.contract_hours)?;
    validate_overrides(&resource.monthly_availability_overrides)
}

pub fn validate_project(project: &NewProject) -> Result<(), ValidationError> {
    require_name("project", &project.name)?;
    require_range("project", project.start_date, project.end_date)
}

pub fn validate_work_package(work_package: &NewWorkPackage) -> Result<(), ValidationError> {
    require_name("work package", &work_package.name)?;
    require_hours(
        "work package",
        "standard_effort_hours",
        work_package.standard_effort_hours,
    )
}

pub fn validate_activity(activity: &NewActivity) -> Result<(), ValidationError> {
    require_hours("activity", "planned_hours", activity.planned_hours)?;
    require_range("activity", activity.start_date, activity.end_date)
}

/// Year/month pair as received from a query string.
pub fn validate_period(year: i32, month: u32) -> Result<(), ValidationError> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::new(format!(
            "month {month} is outside 1..=12"
        )));
    }
    if !(1900..=9999).contains(&year) {
        return Err(ValidationError::new(format!("year {year} is out of range")));
    }
    Ok(())
}
