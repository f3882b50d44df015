//! Administrative reference data
//!
//! Counties, constituencies, wards and seed polling stations. The dataset is
//! TOML; a default copy is compiled into the binary and an operator can point
//! `[reference] path` in `civic.toml` at a fuller one.
//!
//! Constituency and ward codes are looked up by bare name, so when the same
//! name appears twice in the dataset the first entry wins.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// Reference dataset compiled into the binary
const BUILTIN_REFERENCE: &str = include_str!("../data/reference.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct County {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constituency {
    pub county: String,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub constituency: String,
    pub name: String,
    pub code: String,
}

/// Seed record for the `polling_stations` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSeed {
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub station_name: String,
    pub station_code: String,
    #[serde(default = "default_expected_agents")]
    pub expected_agents: i64,
}

fn default_expected_agents() -> i64 {
    1
}

/// On-disk layout of the dataset
#[derive(Debug, Default, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    counties: Vec<County>,
    #[serde(default)]
    constituencies: Vec<Constituency>,
    #[serde(default)]
    wards: Vec<Ward>,
    #[serde(default)]
    polling_stations: Vec<StationSeed>,
}

/// Loaded reference dataset with name→code indexes
#[derive(Debug, Clone)]
pub struct ReferenceData {
    counties: Vec<County>,
    constituencies: Vec<Constituency>,
    wards: Vec<Ward>,
    polling_stations: Vec<StationSeed>,
    constituency_codes: HashMap<String, String>,
    ward_codes: HashMap<String, String>,
}

impl ReferenceData {
    /// Dataset compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_REFERENCE)
    }

    /// Load a dataset from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read reference data {} failed: {}", path.display(), e))
        })?;
        let data = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            counties = data.counties.len(),
            constituencies = data.constituencies.len(),
            wards = data.wards.len(),
            polling_stations = data.polling_stations.len(),
            "Loaded reference data"
        );
        Ok(data)
    }

    /// Load from `path` when given, otherwise the built-in dataset
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    /// Parse and validate a dataset
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ReferenceFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse reference data failed: {}", e)))?;
        Self::from_parts(file)
    }

    fn from_parts(file: ReferenceFile) -> Result<Self> {
        for c in &file.constituencies {
            check_code("constituency", &c.name, &c.code, 3)?;
        }
        for w in &file.wards {
            check_code("ward", &w.name, &w.code, 4)?;
        }

        let mut seen_codes = HashSet::new();
        for s in &file.polling_stations {
            if s.station_name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Polling station {} has an empty name",
                    s.station_code
                )));
            }
            if !seen_codes.insert(s.station_code.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate polling station code: {}",
                    s.station_code
                )));
            }
        }

        let mut constituency_codes = HashMap::new();
        for c in &file.constituencies {
            constituency_codes
                .entry(c.name.clone())
                .or_insert_with(|| c.code.clone());
        }

        let mut ward_codes = HashMap::new();
        for w in &file.wards {
            ward_codes
                .entry(w.name.clone())
                .or_insert_with(|| w.code.clone());
        }

        Ok(Self {
            counties: file.counties,
            constituencies: file.constituencies,
            wards: file.wards,
            polling_stations: file.polling_stations,
            constituency_codes,
            ward_codes,
        })
    }

    pub fn counties(&self) -> &[County] {
        &self.counties
    }

    /// Constituencies of a county, in dataset order. Unknown county yields nothing.
    pub fn constituencies_of<'a>(&'a self, county: &'a str) -> impl Iterator<Item = &'a Constituency> + 'a {
        self.constituencies.iter().filter(move |c| c.county == county)
    }

    /// Wards of a constituency, in dataset order. Unknown constituency yields nothing.
    pub fn wards_of<'a>(&'a self, constituency: &'a str) -> impl Iterator<Item = &'a Ward> + 'a {
        self.wards.iter().filter(move |w| w.constituency == constituency)
    }

    pub fn polling_stations(&self) -> &[StationSeed] {
        &self.polling_stations
    }

    /// 3-digit code for a constituency name, if listed
    pub fn constituency_code(&self, name: &str) -> Option<&str> {
        self.constituency_codes.get(name).map(String::as_str)
    }

    /// 4-digit code for a ward name, if listed
    pub fn ward_code(&self, name: &str) -> Option<&str> {
        self.ward_codes.get(name).map(String::as_str)
    }
}

fn check_code(kind: &str, name: &str, code: &str, width: usize) -> Result<()> {
    if code.len() != width || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Config(format!(
            "{} '{}' has code '{}', expected {} digits",
            kind, name, code, width
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_dataset_loads() {
        let data = ReferenceData::builtin().unwrap();
        assert_eq!(data.counties().len(), 47);
        assert_eq!(data.polling_stations().len(), 28);
        assert_eq!(data.constituency_code("Kasarani"), Some("002"));
        assert_eq!(data.ward_code("Eastleigh North"), Some("0001"));
        assert_eq!(data.constituency_code("Lang'ata"), Some("003"));
    }

    #[test]
    fn test_hierarchy_queries() {
        let data = ReferenceData::builtin().unwrap();
        let mombasa: Vec<_> = data.constituencies_of("Mombasa").map(|c| c.name.as_str()).collect();
        assert_eq!(mombasa, vec!["Changamwe", "Kisauni", "Likoni", "Mvita"]);

        let bahati: Vec<_> = data.wards_of("Bahati").map(|w| w.code.as_str()).collect();
        assert_eq!(bahati, vec!["0001", "0002", "0003", "0004"]);

        assert_eq!(data.constituencies_of("Atlantis").count(), 0);
        assert_eq!(data.wards_of("Nowhere").count(), 0);
    }

    #[test]
    fn test_first_entry_wins_for_repeated_names() {
        let data = ReferenceData::from_toml_str(
            r#"
            [[wards]]
            constituency = "A"
            name = "Central"
            code = "0007"

            [[wards]]
            constituency = "B"
            name = "Central"
            code = "0002"
            "#,
        )
        .unwrap();
        assert_eq!(data.ward_code("Central"), Some("0007"));
    }

    #[test]
    fn test_rejects_malformed_codes() {
        let err = ReferenceData::from_toml_str(
            r#"
            [[constituencies]]
            county = "Nairobi"
            name = "Kasarani"
            code = "02"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_duplicate_station_codes() {
        let err = ReferenceData::from_toml_str(
            r#"
            [[polling_stations]]
            county = "Nairobi"
            constituency = "Kasarani"
            ward = "Ruai"
            station_name = "Ruai Primary School"
            station_code = "KAS-002-0004-001"

            [[polling_stations]]
            county = "Nairobi"
            constituency = "Kasarani"
            ward = "Ruai"
            station_name = "Ruai Secondary School"
            station_code = "KAS-002-0004-001"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate polling station code"));
    }

    #[test]
    fn test_empty_dataset_is_valid() {
        let data = ReferenceData::from_toml_str("").unwrap();
        assert!(data.counties().is_empty());
        assert_eq!(data.constituency_code("Kasarani"), None);
    }
}
