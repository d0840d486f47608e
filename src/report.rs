//! CSV exports of the capacity, budget, RAMS and workload views.
//!
//! Every writer takes any `io::Write`, so the same code backs file exports in the CLI and
//! download responses in the HTTP API.

use crate::budget::{RamsDistribution, WorkPackageBudgetStatus};
use crate::capacity::{EnrichedResourceCapacity, round_to_hundredths};
use crate::persistence::PersistenceResult;
use crate::workload::WorkloadBucket;
use serde::Serialize;
use std::io::Write;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// English month name, or an empty string outside 1..=12.
pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES.get(idx as usize))
        .copied()
        .unwrap_or("")
}

#[derive(Serialize)]
struct CapacityCsvRecord<'a> {
    #[serde(rename = "Resource Name")]
    name: &'a str,
    #[serde(rename = "Contract Hours")]
    contract_hours: f64,
    #[serde(rename = "Working Days")]
    working_days: u32,
    #[serde(rename = "Monthly Capacity (h)")]
    monthly_capacity: f64,
    #[serde(rename = "Planned Hours (h)")]
    total_planned_hours: f64,
    #[serde(rename = "Available Hours (h)")]
    available_hours: f64,
    #[serde(rename = "Utilization %")]
    utilization_percentage: f64,
    #[serde(rename = "Status")]
    capacity_status: &'static str,
}

#[derive(Serialize)]
struct BudgetCsvRecord<'a> {
    #[serde(rename = "Project")]
    project_name: &'a str,
    #[serde(rename = "Work Package")]
    work_package_name: &'a str,
    #[serde(rename = "RAMS Tag")]
    rams_tag: &'a str,
    #[serde(rename = "Standard Effort (h)")]
    standard_effort_hours: f64,
    #[serde(rename = "Planned Hours (h)")]
    total_planned_hours: f64,
    #[serde(rename = "Hours Remaining (h)")]
    hours_remaining: f64,
    #[serde(rename = "Status")]
    budget_status: &'static str,
}

#[derive(Serialize)]
struct RamsCsvRecord<'a> {
    #[serde(rename = "RAMS Tag")]
    rams_tag: &'a str,
    #[serde(rename = "Total Work Packages")]
    work_package_count: usize,
    #[serde(rename = "Total Standard Hours")]
    total_standard_hours: f64,
    #[serde(rename = "Total Planned Hours")]
    total_planned_hours: f64,
    #[serde(rename = "Total Resources")]
    resource_count: usize,
}

#[derive(Serialize)]
struct WorkloadCsvRecord<'a> {
    #[serde(rename = "Resource")]
    resource_name: &'a str,
    #[serde(rename = "Project")]
    project_name: &'a str,
    #[serde(rename = "Month")]
    month: &'static str,
    #[serde(rename = "Total Hours")]
    total_hours: String,
    #[serde(rename = "Work Packages")]
    work_packages: String,
}

pub fn write_capacity_report<W: Write>(
    writer: W,
    resources: &[EnrichedResourceCapacity],
) -> PersistenceResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for resource in resources {
        writer.serialize(CapacityCsvRecord {
            name: &resource.name,
            contract_hours: resource.contract_hours,
            working_days: resource.working_days,
            monthly_capacity: round_to_hundredths(resource.monthly_capacity),
            total_planned_hours: round_to_hundredths(resource.total_planned_hours),
            available_hours: round_to_hundredths(resource.available_hours),
            utilization_percentage: resource.utilization_percentage,
            capacity_status: resource.capacity_status.as_str(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_budget_report<W: Write>(
    writer: W,
    statuses: &[WorkPackageBudgetStatus],
) -> PersistenceResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for status in statuses {
        writer.serialize(BudgetCsvRecord {
            project_name: &status.project_name,
            work_package_name: &status.work_package_name,
            rams_tag: status.rams_tag.as_str(),
            standard_effort_hours: status.standard_effort_hours,
            total_planned_hours: round_to_hundredths(status.total_planned_hours),
            hours_remaining: round_to_hundredths(status.hours_remaining),
            budget_status: status.budget_status.as_str(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_rams_distribution_report<W: Write>(
    writer: W,
    distribution: &[RamsDistribution],
) -> PersistenceResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for group in distribution {
        writer.serialize(RamsCsvRecord {
            rams_tag: group.rams_tag.as_str(),
            work_package_count: group.work_package_count,
            total_standard_hours: round_to_hundredths(group.total_standard_hours),
            total_planned_hours: round_to_hundredths(group.total_planned_hours),
            resource_count: group.resource_count,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per bucket; work package names are de-duplicated in first-seen order.
pub fn write_workload_report<W: Write>(
    writer: W,
    buckets: &[WorkloadBucket],
) -> PersistenceResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for bucket in buckets {
        let mut names: Vec<&str> = Vec::new();
        for contribution in &bucket.activities {
            if !names.contains(&contribution.work_package_name.as_str()) {
                names.push(&contribution.work_package_name);
            }
        }
        writer.serialize(WorkloadCsvRecord {
            resource_name: &bucket.resource_name,
            project_name: &bucket.project_name,
            month: month_name(bucket.month),
            total_hours: format!("{:.2}", round_to_hundredths(bucket.total_hours)),
            work_packages: names.join("; "),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_names_cover_the_year_only() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(0), "");
        assert_eq!(month_name(13), "");
    }
}
