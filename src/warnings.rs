use crate::capacity::{EnrichedResourceCapacity, round_half_up};
use serde::{Deserialize, Serialize};

/// Utilization at or above this percentage is flagged even when still within capacity.
pub const HIGH_UTILIZATION_THRESHOLD: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningType {
    OverCapacity,
    HighUtilization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityWarning {
    #[serde(rename = "type")]
    pub warning_type: WarningType,
    pub severity: Severity,
    pub resource_id: i64,
    pub resource_name: String,
    pub year: i32,
    pub month: u32,
    pub message: String,
    pub planned_hours: f64,
    pub capacity_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excess_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_percentage: Option<f64>,
}

/// Scan enriched resources in order and emit at most one warning per resource.
pub fn capacity_warnings(resources: &[EnrichedResourceCapacity]) -> Vec<CapacityWarning> {
    resources.iter().filter_map(warning_for).collect()
}

fn warning_for(resource: &EnrichedResourceCapacity) -> Option<CapacityWarning> {
    let planned = resource.total_planned_hours;
    let capacity = resource.monthly_capacity;
    let period = resource.period();

    // Over-capacity short-circuits the percentage check.
    if resource.is_over_capacity {
        let excess = planned - capacity;
        return Some(CapacityWarning {
            warning_type: WarningType::OverCapacity,
            severity: Severity::High,
            resource_id: resource.id,
            resource_name: resource.name.clone(),
            year: resource.year,
            month: resource.month,
            message: format!(
                "{} is over capacity by {} hours in {}",
                resource.name,
                round_half_up(excess),
                period
            ),
            planned_hours: planned,
            capacity_hours: capacity,
            excess_hours: Some(excess),
            utilization_percentage: None,
        });
    }

    if resource.utilization_percentage >= HIGH_UTILIZATION_THRESHOLD {
        return Some(CapacityWarning {
            warning_type: WarningType::HighUtilization,
            severity: Severity::Medium,
            resource_id: resource.id,
            resource_name: resource.name.clone(),
            year: resource.year,
            month: resource.month,
            message: format!(
                "{} is at {}% capacity in {}",
                resource.name,
                round_half_up(resource.utilization_percentage),
                period
            ),
            planned_hours: planned,
            capacity_hours: capacity,
            excess_hours: None,
            utilization_percentage: Some(resource.utilization_percentage),
        });
    }

    None
}
