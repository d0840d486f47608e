//! Distribution of activity hours over calendar months, grouped per resource and project.

use crate::activity::ActivityRow;
use crate::period::YearMonth;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// How an activity's hours are divided when its range reaches outside the target year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Divide by every month the range touches; the share of months in other years is dropped
    /// rather than redistributed into the target year.
    #[default]
    FullSpan,
    /// Divide by the months that fall inside the target year only.
    TargetYearOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

impl WorkloadFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn resource(resource_id: i64) -> Self {
        Self {
            resource_id: Some(resource_id),
            project_id: None,
        }
    }

    pub fn project(project_id: i64) -> Self {
        Self {
            resource_id: None,
            project_id: Some(project_id),
        }
    }

    fn matches(&self, row: &ActivityRow) -> bool {
        self.resource_id.is_none_or(|id| id == row.resource_id)
            && self.project_id.is_none_or(|id| id == row.project_id)
    }
}

/// One activity's share of a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityContribution {
    pub activity_id: i64,
    pub work_package_name: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadBucket {
    pub resource_id: i64,
    pub resource_name: String,
    pub project_id: i64,
    pub project_name: String,
    /// 1-based month within the target year.
    pub month: u32,
    pub total_hours: f64,
    pub activities: Vec<ActivityContribution>,
}

/// Spread each matching activity's hours evenly over the months of `target_year` it touches.
pub fn aggregate(
    activities: &[ActivityRow],
    target_year: i32,
    filter: WorkloadFilter,
) -> Vec<WorkloadBucket> {
    aggregate_with_policy(activities, target_year, filter, SplitPolicy::default())
}

pub fn aggregate_with_policy(
    activities: &[ActivityRow],
    target_year: i32,
    filter: WorkloadFilter,
    policy: SplitPolicy,
) -> Vec<WorkloadBucket> {
    let mut buckets: HashMap<(i64, i64, u32), WorkloadBucket> = HashMap::new();

    for activity in activities.iter().filter(|a| filter.matches(a)) {
        let touched: Vec<YearMonth> = activity.months().collect();
        let retained: Vec<u32> = touched
            .iter()
            .filter(|ym| ym.year() == target_year)
            .map(|ym| ym.month())
            .collect();
        if retained.is_empty() {
            trace!(activity_id = activity.id, target_year, "activity outside target year");
            continue;
        }

        let denominator = match policy {
            SplitPolicy::FullSpan => touched.len(),
            SplitPolicy::TargetYearOnly => retained.len(),
        };
        let hours_per_month = activity.planned_hours / denominator as f64;

        for month in retained {
            let bucket = buckets
                .entry((activity.resource_id, activity.project_id, month))
                .or_insert_with(|| WorkloadBucket {
                    resource_id: activity.resource_id,
                    resource_name: activity.resource_name.clone(),
                    project_id: activity.project_id,
                    project_name: activity.project_name.clone(),
                    month,
                    total_hours: 0.0,
                    activities: Vec::new(),
                });
            bucket.total_hours += hours_per_month;
            bucket.activities.push(ActivityContribution {
                activity_id: activity.id,
                work_package_name: activity.work_package_name.clone(),
                hours: hours_per_month,
            });
        }
    }

    let mut result: Vec<WorkloadBucket> = buckets.into_values().collect();
    // String ordering is byte-wise, so the result does not depend on locale.
    result.sort_by(|a, b| {
        a.resource_name
            .cmp(&b.resource_name)
            .then(a.resource_id.cmp(&b.resource_id))
            .then_with(|| a.project_name.cmp(&b.project_name))
            .then(a.project_id.cmp(&b.project_id))
            .then(a.month.cmp(&b.month))
    });
    debug!(
        target_year,
        activities = activities.len(),
        buckets = result.len(),
        "aggregated workload"
    );
    result
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadTotals {
    /// Hours per month 1..=12; months without workload are present with 0.
    pub monthly: BTreeMap<u32, f64>,
    pub by_resource: BTreeMap<String, f64>,
    pub by_project: BTreeMap<String, f64>,
    pub grand_total: f64,
}

impl WorkloadTotals {
    pub fn from_buckets(buckets: &[WorkloadBucket]) -> Self {
        let mut monthly: BTreeMap<u32, f64> = (1..=12).map(|m| (m, 0.0)).collect();
        let mut by_resource = BTreeMap::new();
        let mut by_project = BTreeMap::new();
        let mut grand_total = 0.0;

        for bucket in buckets {
            *monthly.entry(bucket.month).or_insert(0.0) += bucket.total_hours;
            *by_resource
                .entry(bucket.resource_name.clone())
                .or_insert(0.0) += bucket.total_hours;
            *by_project
                .entry(bucket.project_name.clone())
                .or_insert(0.0) += bucket.total_hours;
            grand_total += bucket.total_hours;
        }

        Self {
            monthly,
            by_resource,
            by_project,
            grand_total,
        }
    }
}

/// Pivot buckets into one row per (resource, project) with `m01`..`m12` and `total` columns.
///
/// Rows keep the order in which pairs first appear, so sorted buckets give a sorted matrix.
pub fn workload_matrix(buckets: &[WorkloadBucket]) -> PolarsResult<DataFrame> {
    let mut row_index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut resources: Vec<String> = Vec::new();
    let mut projects: Vec<String> = Vec::new();
    let mut hours: Vec<[f64; 12]> = Vec::new();

    for bucket in buckets {
        let idx = *row_index
            .entry((bucket.resource_id, bucket.project_id))
            .or_insert_with(|| {
                resources.push(bucket.resource_name.clone());
                projects.push(bucket.project_name.clone());
                hours.push([0.0; 12]);
                hours.len() - 1
            });
        if let Some(slot) = (bucket.month as usize)
            .checked_sub(1)
            .and_then(|m| hours[idx].get_mut(m))
        {
            *slot += bucket.total_hours;
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(15);
    columns.push(Series::new(PlSmallStr::from_static("resource"), resources).into_column());
    columns.push(Series::new(PlSmallStr::from_static("project"), projects).into_column());
    for month in 0..12 {
        let values: Vec<f64> = hours.iter().map(|row| row[month]).collect();
        let name = PlSmallStr::from_string(format!("m{:02}", month + 1));
        columns.push(Series::new(name, values).into_column());
    }
    let totals: Vec<f64> = hours.iter().map(|row| row.iter().sum()).collect();
    columns.push(Series::new(PlSmallStr::from_static("total"), totals).into_column());

    DataFrame::new(columns)
}
