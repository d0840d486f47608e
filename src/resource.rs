use crate::period::YearMonth;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparse per-month availability. A month without an entry uses the calendar's working days.
pub type MonthlyAvailability = BTreeMap<YearMonth, AvailabilityOverride>;

/// Explicit availability for one month (vacation, part-time month, secondment).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityOverride {
    /// Days the resource can work that month. `Some(0)` is a full-month absence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_days: Option<u32>,
}

impl AvailabilityOverride {
    pub fn days(available_days: u32) -> Self {
        Self {
            available_days: Some(available_days),
        }
    }
}

/// A person whose weekly contract hours are planned against work packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    /// Hours per five-day week (typically 35 or 40).
    pub contract_hours: f64,
    #[serde(default)]
    pub monthly_availability_overrides: MonthlyAvailability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResource {
    pub name: String,
    pub contract_hours: f64,
    #[serde(default)]
    pub monthly_availability_overrides: MonthlyAvailability,
}

impl NewResource {
    pub fn new(name: impl Into<String>, contract_hours: f64) -> Self {
        Self {
            name: name.into(),
            contract_hours,
            monthly_availability_overrides: MonthlyAvailability::new(),
        }
    }

    pub fn with_override(mut self, month: YearMonth, available_days: u32) -> Self {
        self.monthly_availability_overrides
            .insert(month, AvailabilityOverride::days(available_days));
        self
    }
}

impl Resource {
    pub fn from_new(id: i64, new: NewResource) -> Self {
        Self {
            id,
            name: new.name,
            contract_hours: new.contract_hours,
            monthly_availability_overrides: new.monthly_availability_overrides,
        }
    }

    pub fn to_new(&self) -> NewResource {
        NewResource {
            name: self.name.clone(),
            contract_hours: self.contract_hours,
            monthly_availability_overrides: self.monthly_availability_overrides.clone(),
        }
    }

    /// Override days for `month`, or `None` when the default working days apply.
    pub fn available_days_override(&self, month: YearMonth) -> Option<u32> {
        self.monthly_availability_overrides
            .get(&month)
            .and_then(|o| o.available_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_round_trip_through_month_keyed_json() {
        let march = YearMonth::new(2024, 3).unwrap();
        let resource = Resource::from_new(7, NewResource::new("Ana", 40.0).with_override(march, 0));
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            json["monthly_availability_overrides"]["2024-03"]["available_days"],
            serde_json::json!(0)
        );

        let parsed: Resource = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.available_days_override(march), Some(0));
        assert_eq!(
            parsed.available_days_override(YearMonth::new(2024, 4).unwrap()),
            None
        );
    }

    #[test]
    fn override_without_days_is_treated_as_absent() {
        let json = r#"{"id":1,"name":"Bo","contract_hours":35,
            "monthly_availability_overrides":{"2024-01":{}}}"#;
        let resource: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(
            resource.available_days_override(YearMonth::new(2024, 1).unwrap()),
            None
        );
    }
}
