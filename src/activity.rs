use crate::period::{MonthRange, YearMonth};
use crate::project::RamsTag;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Hours of one resource booked against one work package over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub work_package_id: i64,
    pub resource_id: i64,
    pub planned_hours: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub work_package_id: i64,
    pub resource_id: i64,
    pub planned_hours: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Activity {
    pub fn from_new(id: i64, new: NewActivity) -> Self {
        Self {
            id,
            work_package_id: new.work_package_id,
            resource_id: new.resource_id,
            planned_hours: new.planned_hours,
            start_date: new.start_date,
            end_date: new.end_date,
        }
    }

    pub fn to_new(&self) -> NewActivity {
        NewActivity {
            work_package_id: self.work_package_id,
            resource_id: self.resource_id,
            planned_hours: self.planned_hours,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// An activity joined with the names of its resource, work package and project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: i64,
    pub work_package_id: i64,
    pub work_package_name: String,
    pub rams_tag: RamsTag,
    pub project_id: i64,
    pub project_name: String,
    pub resource_id: i64,
    pub resource_name: String,
    pub planned_hours: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ActivityRow {
    /// Calendar months touched by the date range, start month through end month.
    pub fn months(&self) -> MonthRange {
        YearMonth::of(self.start_date).through(YearMonth::of(self.end_date))
    }
}
