use crate::hours::{from_hundredths, to_hundredths};
use crate::project::RamsTag;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    OverBudget,
    AtBudget,
    UnderBudget,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::OverBudget => "OVER_BUDGET",
            BudgetStatus::AtBudget => "AT_BUDGET",
            BudgetStatus::UnderBudget => "UNDER_BUDGET",
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetAssessment {
    pub hours_remaining: f64,
    pub budget_status: BudgetStatus,
}

/// Compare planned hours against the standard effort baseline.
///
/// Both amounts are compared as whole hundredths of an hour.
pub fn budget_status(standard_effort_hours: f64, total_planned_hours: f64) -> BudgetAssessment {
    let standard = to_hundredths(standard_effort_hours);
    let planned = to_hundredths(total_planned_hours);
    let budget_status = match planned.cmp(&standard) {
        Ordering::Greater => BudgetStatus::OverBudget,
        Ordering::Equal => BudgetStatus::AtBudget,
        Ordering::Less => BudgetStatus::UnderBudget,
    };
    BudgetAssessment {
        hours_remaining: from_hundredths(standard - planned),
        budget_status,
    }
}

/// Planned hours summed per work package by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRollup {
    pub work_package_id: i64,
    pub project_name: String,
    pub work_package_name: String,
    pub rams_tag: RamsTag,
    pub standard_effort_hours: f64,
    pub total_planned_hours: f64,
    /// Distinct resources with activities on the work package.
    #[serde(default)]
    pub resource_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkPackageBudgetStatus {
    pub work_package_id: i64,
    pub project_name: String,
    pub work_package_name: String,
    pub rams_tag: RamsTag,
    pub standard_effort_hours: f64,
    pub total_planned_hours: f64,
    pub hours_remaining: f64,
    pub budget_status: BudgetStatus,
}

impl WorkPackageBudgetStatus {
    pub fn from_rollup(rollup: &BudgetRollup) -> Self {
        let assessment = budget_status(rollup.standard_effort_hours, rollup.total_planned_hours);
        Self {
            work_package_id: rollup.work_package_id,
            project_name: rollup.project_name.clone(),
            work_package_name: rollup.work_package_name.clone(),
            rams_tag: rollup.rams_tag.clone(),
            standard_effort_hours: rollup.standard_effort_hours,
            total_planned_hours: rollup.total_planned_hours,
            hours_remaining: assessment.hours_remaining,
            budget_status: assessment.budget_status,
        }
    }
}

/// Per-discipline totals across all work packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamsDistribution {
    pub rams_tag: RamsTag,
    pub work_package_count: usize,
    pub total_standard_hours: f64,
    pub total_planned_hours: f64,
    pub resource_count: usize,
}

#[derive(Default)]
struct TagTotals {
    work_packages: usize,
    standard_hundredths: i64,
    planned_hundredths: i64,
    resources: BTreeSet<i64>,
}

/// Group rollups by RAMS tag, ordered by tag label. Hours are summed as whole hundredths.
pub fn rams_distribution(rollups: &[BudgetRollup]) -> Vec<RamsDistribution> {
    let mut groups: BTreeMap<String, (RamsTag, TagTotals)> = BTreeMap::new();
    for rollup in rollups {
        let (_, totals) = groups
            .entry(rollup.rams_tag.as_str().to_string())
            .or_insert_with(|| (rollup.rams_tag.clone(), TagTotals::default()));
        totals.work_packages += 1;
        totals.standard_hundredths += to_hundredths(rollup.standard_effort_hours);
        totals.planned_hundredths += to_hundredths(rollup.total_planned_hours);
        totals.resources.extend(rollup.resource_ids.iter().copied());
    }

    groups
        .into_values()
        .map(|(rams_tag, totals)| RamsDistribution {
            rams_tag,
            work_package_count: totals.work_packages,
            total_standard_hours: from_hundredths(totals.standard_hundredths),
            total_planned_hours: from_hundredths(totals.planned_hundredths),
            resource_count: totals.resources.len(),
        })
        .collect()
}
