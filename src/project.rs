use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Project {
    pub fn from_new(id: i64, new: NewProject) -> Self {
        Self {
            id,
            name: new.name,
            start_date: new.start_date,
            end_date: new.end_date,
        }
    }

    pub fn to_new(&self) -> NewProject {
        NewProject {
            name: self.name.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// Safety-discipline label attached to a work package.
///
/// Labels outside the known set are kept verbatim so that records written by other tools
/// survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RamsTag {
    #[default]
    Fmeca,
    HazardLog,
    SilAnalysis,
    SafetyCase,
    RiskAssessment,
    ThrAnalysis,
    Fta,
    Eta,
    Hazop,
    Other,
    Custom(String),
}

impl RamsTag {
    pub const KNOWN: [RamsTag; 10] = [
        RamsTag::Fmeca,
        RamsTag::HazardLog,
        RamsTag::SilAnalysis,
        RamsTag::SafetyCase,
        RamsTag::RiskAssessment,
        RamsTag::ThrAnalysis,
        RamsTag::Fta,
        RamsTag::Eta,
        RamsTag::Hazop,
        RamsTag::Other,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            RamsTag::Fmeca => "FMECA",
            RamsTag::HazardLog => "Hazard Log",
            RamsTag::SilAnalysis => "SIL Analysis",
            RamsTag::SafetyCase => "Safety Case",
            RamsTag::RiskAssessment => "Risk Assessment",
            RamsTag::ThrAnalysis => "THR Analysis",
            RamsTag::Fta => "FTA",
            RamsTag::Eta => "ETA",
            RamsTag::Hazop => "HAZOP",
            RamsTag::Other => "Other",
            RamsTag::Custom(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::KNOWN
            .iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(label))
            .cloned()
            .unwrap_or_else(|| RamsTag::Custom(label.to_string()))
    }
}

impl fmt::Display for RamsTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RamsTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RamsTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(RamsTag::from_label(&label))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkPackage {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub rams_tag: RamsTag,
    /// Budget baseline in hours.
    pub standard_effort_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkPackage {
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub rams_tag: RamsTag,
    pub standard_effort_hours: f64,
}

impl WorkPackage {
    pub fn from_new(id: i64, new: NewWorkPackage) -> Self {
        Self {
            id,
            project_id: new.project_id,
            name: new.name,
            rams_tag: new.rams_tag,
            standard_effort_hours: new.standard_effort_hours,
        }
    }

    pub fn to_new(&self) -> NewWorkPackage {
        NewWorkPackage {
            project_id: self.project_id,
            name: self.name.clone(),
            rams_tag: self.rams_tag.clone(),
            standard_effort_hours: self.standard_effort_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_parse_case_insensitively() {
        assert_eq!(RamsTag::from_label("hazop"), RamsTag::Hazop);
        assert_eq!(RamsTag::from_label(" Hazard Log "), RamsTag::HazardLog);
    }

    #[test]
    fn unknown_labels_are_preserved() {
        let tag: RamsTag = serde_json::from_str("\"RAM Demonstration\"").unwrap();
        assert_eq!(tag, RamsTag::Custom("RAM Demonstration".into()));
        assert_eq!(
            serde_json::to_string(&tag).unwrap(),
            "\"RAM Demonstration\""
        );
    }
}
