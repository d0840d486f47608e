//! Monthly capacity, utilization and status classification per resource.
//!
//! Everything here is a pure function of the records passed in; nothing is cached between
//! calls, so the same input always yields the same enriched view.

use crate::calendar::{WorkCalendar, working_days};
use crate::hours::{HUNDREDTHS_PER_HOUR, to_hundredths};
use crate::period::YearMonth;
use crate::resource::MonthlyAvailability;
use crate::warnings::{CapacityWarning, capacity_warnings};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Contract hours are per five-day week.
const DAYS_PER_CONTRACT_WEEK: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityStatus {
    OverCapacity,
    AtCapacity,
    HighUtilization,
    ModerateUtilization,
    LowUtilization,
}

impl CapacityStatus {
    /// Thresholds are inclusive at the lower bound and checked from the top down.
    pub fn from_percentage(utilization_percentage: f64) -> Self {
        if utilization_percentage > 100.0 {
            CapacityStatus::OverCapacity
        } else if utilization_percentage >= 90.0 {
            CapacityStatus::AtCapacity
        } else if utilization_percentage >= 70.0 {
            CapacityStatus::HighUtilization
        } else if utilization_percentage >= 40.0 {
            CapacityStatus::ModerateUtilization
        } else {
            CapacityStatus::LowUtilization
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityStatus::OverCapacity => "OVER_CAPACITY",
            CapacityStatus::AtCapacity => "AT_CAPACITY",
            CapacityStatus::HighUtilization => "HIGH_UTILIZATION",
            CapacityStatus::ModerateUtilization => "MODERATE_UTILIZATION",
            CapacityStatus::LowUtilization => "LOW_UTILIZATION",
        }
    }
}

impl fmt::Display for CapacityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity in hours for one month using the Mon-Fri calendar.
pub fn monthly_capacity(
    contract_hours: f64,
    year: i32,
    month: u32,
    overrides: &MonthlyAvailability,
) -> f64 {
    let days = override_days(year, month, overrides).unwrap_or_else(|| working_days(year, month));
    capacity_hours(contract_hours, days)
}

/// Capacity in hours for one month, counting default days on a custom calendar.
pub fn monthly_capacity_on(
    calendar: &WorkCalendar,
    contract_hours: f64,
    year: i32,
    month: u32,
    overrides: &MonthlyAvailability,
) -> f64 {
    let days = override_days(year, month, overrides)
        .unwrap_or_else(|| calendar.working_days(year, month));
    capacity_hours(contract_hours, days)
}

/// `contract_hours / 5 * days`, taken from whole hundredths so the result is the float
/// nearest to the exact value.
fn capacity_hours(contract_hours: f64, days: u32) -> f64 {
    (to_hundredths(contract_hours) * i64::from(days)) as f64 / EXACT_UNITS_PER_HOUR
}

/// Planned hours are whole hundredths and capacities whole fifths of a hundredth, so both
/// are whole multiples of this fraction of an hour.
const EXACT_UNITS_PER_HOUR: f64 = HUNDREDTHS_PER_HOUR * DAYS_PER_CONTRACT_WEEK;

fn exact_units(hours: f64) -> f64 {
    (hours * EXACT_UNITS_PER_HOUR).round()
}

fn override_days(year: i32, month: u32, overrides: &MonthlyAvailability) -> Option<u32> {
    let key = YearMonth::new(year, month).ok()?;
    overrides.get(&key).and_then(|o| o.available_days)
}

/// Planned hours as a percentage of capacity. Zero capacity reports 0%, never infinity.
pub fn utilization_percentage(planned_hours: f64, capacity_hours: f64) -> f64 {
    let capacity = exact_units(capacity_hours);
    if capacity == 0.0 {
        return 0.0;
    }
    exact_units(planned_hours) * 100.0 / capacity
}

/// Strictly more planned than available; equality is still within capacity.
pub fn is_over_capacity(planned_hours: f64, capacity_hours: f64) -> bool {
    exact_units(planned_hours) > exact_units(capacity_hours)
}

/// Round half up on the hundredths digit.
pub(crate) fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Round half up to the nearest integer.
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// One resource's planned hours for a month, as summed by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub id: i64,
    pub name: String,
    pub contract_hours: f64,
    #[serde(default)]
    pub monthly_availability_overrides: MonthlyAvailability,
    #[serde(default)]
    pub total_planned_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedResourceCapacity {
    pub id: i64,
    pub name: String,
    pub contract_hours: f64,
    pub monthly_availability_overrides: MonthlyAvailability,
    pub year: i32,
    pub month: u32,
    pub working_days: u32,
    pub monthly_capacity: f64,
    pub total_planned_hours: f64,
    /// Capacity minus planned hours; negative when over capacity.
    pub available_hours: f64,
    /// Rounded to two decimals.
    pub utilization_percentage: f64,
    pub capacity_status: CapacityStatus,
    pub is_over_capacity: bool,
}

impl EnrichedResourceCapacity {
    pub fn period(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

pub fn enrich(record: &ResourceUtilization, year: i32, month: u32) -> EnrichedResourceCapacity {
    enrich_on(&WorkCalendar::default(), record, year, month)
}

pub fn enrich_on(
    calendar: &WorkCalendar,
    record: &ResourceUtilization,
    year: i32,
    month: u32,
) -> EnrichedResourceCapacity {
    let planned = record.total_planned_hours;
    let capacity = monthly_capacity_on(
        calendar,
        record.contract_hours,
        year,
        month,
        &record.monthly_availability_overrides,
    );
    let pct = utilization_percentage(planned, capacity);

    EnrichedResourceCapacity {
        id: record.id,
        name: record.name.clone(),
        contract_hours: record.contract_hours,
        monthly_availability_overrides: record.monthly_availability_overrides.clone(),
        year,
        month,
        working_days: calendar.working_days(year, month),
        monthly_capacity: capacity,
        total_planned_hours: planned,
        available_hours: (exact_units(capacity) - exact_units(planned)) / EXACT_UNITS_PER_HOUR,
        utilization_percentage: round_to_hundredths(pct),
        capacity_status: CapacityStatus::from_percentage(pct),
        is_over_capacity: is_over_capacity(planned, capacity),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacitySummary {
    pub resource_count: usize,
    pub over_capacity: usize,
    /// At or above 90% without exceeding capacity.
    pub at_capacity: usize,
    /// From 70% up to (excluding) 90%.
    pub high_utilization: usize,
    pub average_utilization: f64,
}

impl CapacitySummary {
    pub fn from_enriched(resources: &[EnrichedResourceCapacity]) -> Self {
        let mut summary = CapacitySummary {
            resource_count: resources.len(),
            ..CapacitySummary::default()
        };
        let mut pct_sum = 0.0;
        for resource in resources {
            let pct = resource.utilization_percentage;
            if resource.is_over_capacity {
                summary.over_capacity += 1;
            } else if pct >= 90.0 {
                summary.at_capacity += 1;
            }
            if (70.0..90.0).contains(&pct) {
                summary.high_utilization += 1;
            }
            pct_sum += pct;
        }
        if !resources.is_empty() {
            summary.average_utilization = pct_sum / resources.len() as f64;
        }
        summary
    }
}

/// Dashboard view of a single month: enriched resources, their warnings and headline counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityOverview {
    pub year: i32,
    pub month: u32,
    pub resources: Vec<EnrichedResourceCapacity>,
    pub warnings: Vec<CapacityWarning>,
    pub summary: CapacitySummary,
}

impl CapacityOverview {
    pub fn build(records: &[ResourceUtilization], year: i32, month: u32) -> Self {
        Self::build_on(&WorkCalendar::default(), records, year, month)
    }

    pub fn build_on(
        calendar: &WorkCalendar,
        records: &[ResourceUtilization],
        year: i32,
        month: u32,
    ) -> Self {
        let resources: Vec<EnrichedResourceCapacity> = records
            .iter()
            .map(|record| enrich_on(calendar, record, year, month))
            .collect();
        let warnings = capacity_warnings(&resources);
        let summary = CapacitySummary::from_enriched(&resources);
        debug!(
            year,
            month,
            resources = summary.resource_count,
            over_capacity = summary.over_capacity,
            warnings = warnings.len(),
            "built capacity overview"
        );
        Self {
            year,
            month,
            resources,
            warnings,
            summary,
        }
    }
}

/// Builds one overview per supplied month; months are computed independently in parallel.
pub fn capacity_for_year(
    calendar: &WorkCalendar,
    year: i32,
    monthly_records: &[(u32, Vec<ResourceUtilization>)],
) -> Vec<CapacityOverview> {
    let mut overviews: Vec<CapacityOverview> = monthly_records
        .par_iter()
        .map(|(month, records)| CapacityOverview::build_on(calendar, records, year, *month))
        .collect();
    overviews.sort_by_key(|overview| overview.month);
    overviews
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundredths_round_half_up() {
        assert_eq!(round_to_hundredths(66.666_666), 66.67);
        assert_eq!(round_to_hundredths(12.5), 12.5);
        assert_eq!(round_to_hundredths(0.0), 0.0);
    }

    #[test]
    fn integer_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(2.49), 2.0);
    }
}
