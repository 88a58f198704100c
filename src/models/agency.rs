use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A public body that answered a records request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    pub id: Uuid,
    pub name: String,
    /// Population served, used for sorting agencies by size.
    pub population: Option<i64>,
    pub completed: bool,
    pub request_done: bool,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
}

impl Agency {
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            population: None,
            completed: false,
            request_done: false,
            created_at: now,
            created_by: None,
            updated_at: now,
            updated_by: None,
        }
    }
}

const AGENCY_SUFFIXES: &[&str] = &["Police Department", "Marshals Office", "Sheriff's Office"];

/// Populations for agencies that don't map onto a city record.
/// University figures are approximate student counts.
const KNOWN_POPULATIONS: &[(&str, i64)] = &[
    ("Eastern Washington University", 12_633),
    ("Western Washington University", 16_142),
    ("University of Washington", 47_571),
    ("Central Washington University", 12_342),
    ("Sedro-Wooley", 10_540),
    ("Bainbridge", 23_025),
    ("Lakewood", 58_163),
    ("Sunnyside", 15_858),
    ("King County", 2_252_782),
];

/// Strip the agency-type suffix to get the jurisdiction name,
/// e.g. "Aberdeen Police Department" -> "Aberdeen".
pub fn jurisdiction_name(agency_name: &str) -> String {
    let mut name = agency_name.to_string();
    for suffix in AGENCY_SUFFIXES {
        name = name.replace(suffix, "");
    }
    name.trim().to_string()
}

/// Best-effort population for an agency from the built-in table.
pub fn population_hint(agency_name: &str) -> Option<i64> {
    let jurisdiction = jurisdiction_name(agency_name);
    KNOWN_POPULATIONS
        .iter()
        .find(|(name, _)| *name == jurisdiction)
        .map(|(_, population)| *population)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jurisdiction_strips_suffixes() {
        assert_eq!(jurisdiction_name("Aberdeen Police Department"), "Aberdeen");
        assert_eq!(jurisdiction_name("King County Sheriff's Office"), "King County");
        assert_eq!(jurisdiction_name("Tukwila"), "Tukwila");
    }

    #[test]
    fn population_hint_uses_known_table() {
        assert_eq!(population_hint("Lakewood Police Department"), Some(58_163));
        assert_eq!(population_hint("King County Sheriff's Office"), Some(2_252_782));
        assert_eq!(population_hint("Nowhere Police Department"), None);
    }

    #[test]
    fn new_agency_defaults() {
        let agency = Agency::new("Yakima Police Department");
        assert!(!agency.completed);
        assert!(!agency.request_done);
        assert!(agency.population.is_none());
        assert_eq!(agency.created_at, agency.updated_at);
    }
}
