//! Form34A submission reconciliation
//!
//! Pure functions over submission and polling station records. The database
//! loaders in `db::dashboard` fetch records and hand them here, so every rule
//! below can be exercised without SQLite.
//!
//! Ordering: groups are sorted by their key (byte-wise, registered station
//! codes ahead of unmatched names), submissions inside a group by
//! `submitted_at` then guid, missing stations by station code, candidate
//! totals by votes descending then name and party.

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Optional exact-match location restriction shared by all dashboard queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationFilter {
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub constituency: Option<String>,
    #[serde(default)]
    pub ward: Option<String>,
}

impl LocationFilter {
    pub fn county(county: impl Into<String>) -> Self {
        Self {
            county: Some(county.into()),
            ..Self::default()
        }
    }

    /// Empty strings are treated as "no filter", as a query string `?county=` would be
    pub fn normalized(self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.is_empty())
        }
        Self {
            county: keep(self.county),
            constituency: keep(self.constituency),
            ward: keep(self.ward),
        }
    }

    pub fn matches(&self, county: &str, constituency: &str, ward: &str) -> bool {
        fn ok(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |w| w == have)
        }
        ok(&self.county, county) && ok(&self.constituency, constituency) && ok(&self.ward, ward)
    }
}

/// How a submission is tied to a registered polling station
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationMatch {
    /// Free-text station name must equal the registered name exactly
    #[default]
    ExactName,
    /// Resolve each submission to a registered station, by its station code
    /// first and then by exact name within its ward
    StationCode,
}

impl FromStr for StationMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact_name" => Ok(StationMatch::ExactName),
            "station_code" => Ok(StationMatch::StationCode),
            other => Err(format!(
                "unknown station match '{}', expected exact_name or station_code",
                other
            )),
        }
    }
}

impl fmt::Display for StationMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationMatch::ExactName => write!(f, "exact_name"),
            StationMatch::StationCode => write!(f, "station_code"),
        }
    }
}

/// One Form34A submission joined with its agent's civic code
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub guid: String,
    pub agent_code: Option<String>,
    pub serial_number: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub polling_station: String,
    pub station_code: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionRecord {
    fn in_filter(&self, filter: &LocationFilter) -> bool {
        filter.matches(&self.county, &self.constituency, &self.ward)
    }
}

/// Registered polling station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationRecord {
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub station_name: String,
    pub station_code: String,
}

/// What a submission is grouped under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum StationKey<'a> {
    /// Code of a registered station
    Registered(&'a str),
    /// Code that no registered station carries
    UnknownCode(&'a str),
    /// Free-text station name
    Name(&'a str),
}

struct StationIndex<'a> {
    matching: StationMatch,
    by_code: HashMap<&'a str, &'a StationRecord>,
    by_ward_name: HashMap<(&'a str, &'a str, &'a str, &'a str), &'a StationRecord>,
}

impl<'a> StationIndex<'a> {
    fn new(stations: &'a [StationRecord], matching: StationMatch) -> Self {
        let mut by_code = HashMap::new();
        let mut by_ward_name = HashMap::new();
        for st in stations {
            by_code.entry(st.station_code.as_str()).or_insert(st);
            by_ward_name
                .entry((
                    st.county.as_str(),
                    st.constituency.as_str(),
                    st.ward.as_str(),
                    st.station_name.as_str(),
                ))
                .or_insert(st);
        }
        Self {
            matching,
            by_code,
            by_ward_name,
        }
    }

    fn resolve(&self, sub: &'a SubmissionRecord) -> StationKey<'a> {
        if self.matching == StationMatch::ExactName {
            return StationKey::Name(&sub.polling_station);
        }

        let code = sub.station_code.as_deref().filter(|c| !c.is_empty());
        if let Some(st) = code.and_then(|c| self.by_code.get(c).copied()) {
            return StationKey::Registered(&st.station_code);
        }
        let ward_name = (
            sub.county.as_str(),
            sub.constituency.as_str(),
            sub.ward.as_str(),
            sub.polling_station.as_str(),
        );
        if let Some(st) = self.by_ward_name.get(&ward_name).copied() {
            return StationKey::Registered(&st.station_code);
        }
        match code {
            Some(c) => StationKey::UnknownCode(c),
            None => StationKey::Name(&sub.polling_station),
        }
    }

    fn station_key(&self, st: &'a StationRecord) -> StationKey<'a> {
        match self.matching {
            StationMatch::ExactName => StationKey::Name(&st.station_name),
            StationMatch::StationCode => StationKey::Registered(&st.station_code),
        }
    }

    /// Registered station behind `key`, if any
    fn station(&self, key: StationKey<'a>) -> Option<&'a StationRecord> {
        match key {
            StationKey::Registered(code) => self.by_code.get(code).copied(),
            _ => None,
        }
    }
}

/// One candidate tally line with the location of its submission
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLine {
    pub form34a_id: String,
    pub candidate_first_name: String,
    pub candidate_last_name: String,
    pub party_name: String,
    pub votes: i64,
    pub county: String,
    pub constituency: String,
    pub ward: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateTotal {
    pub candidate_first_name: String,
    pub candidate_last_name: String,
    pub party_name: String,
    pub total_votes: i64,
    pub forms_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerialDiscrepancy {
    pub serial_number: String,
    pub submission_count: usize,
    pub forms: Vec<SerialForm>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerialForm {
    pub agent_code: Option<String>,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingStation {
    pub polling_station: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub station_code: String,
    pub has_submission: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraSubmissions {
    pub polling_station: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub submissions: Vec<StationSubmission>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSubmission {
    pub agent_code: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A set of submissions that should have been one
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DuplicateGroup {
    SameStation {
        polling_station: String,
        submissions: Vec<SameStationEntry>,
    },
    SameSerial {
        serial_number: String,
        submissions: Vec<SameSerialEntry>,
    },
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        match self {
            DuplicateGroup::SameStation { submissions, .. } => submissions.len(),
            DuplicateGroup::SameSerial { submissions, .. } => submissions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SameStationEntry {
    pub agent_code: Option<String>,
    pub serial_number: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SameSerialEntry {
    pub agent_code: Option<String>,
    pub polling_station: String,
    pub submitted_at: DateTime<Utc>,
}

/// Group by `key`, keep groups in key order with members in submission order
fn group_by<'a, K, F>(subs: impl Iterator<Item = &'a SubmissionRecord>, key: F) -> BTreeMap<K, Vec<&'a SubmissionRecord>>
where
    K: Ord,
    F: Fn(&'a SubmissionRecord) -> K,
{
    let mut groups: BTreeMap<K, Vec<&SubmissionRecord>> = BTreeMap::new();
    for sub in subs {
        groups.entry(key(sub)).or_default().push(sub);
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.guid.cmp(&b.guid))
        });
    }
    groups
}

/// Sum votes per (first name, last name, party) over filtered submissions
///
/// A total that does not fit in `i64` is an error rather than a wrapped value.
pub fn candidate_votes(
    lines: &[CandidateLine],
    filter: &LocationFilter,
) -> crate::Result<Vec<CandidateTotal>> {
    let mut groups: BTreeMap<(&str, &str, &str), (i64, HashSet<&str>)> = BTreeMap::new();

    for line in lines
        .iter()
        .filter(|l| filter.matches(&l.county, &l.constituency, &l.ward))
    {
        let entry = groups
            .entry((
                line.candidate_first_name.as_str(),
                line.candidate_last_name.as_str(),
                line.party_name.as_str(),
            ))
            .or_default();
        entry.0 = entry.0.checked_add(line.votes).ok_or_else(|| {
            Error::Internal(format!(
                "Vote total overflow for {} {} ({})",
                line.candidate_first_name, line.candidate_last_name, line.party_name
            ))
        })?;
        entry.1.insert(line.form34a_id.as_str());
    }

    let mut totals: Vec<CandidateTotal> = groups
        .into_iter()
        .map(|((first, last, party), (votes, forms))| CandidateTotal {
            candidate_first_name: first.to_string(),
            candidate_last_name: last.to_string(),
            party_name: party.to_string(),
            total_votes: votes,
            forms_count: forms.len() as i64,
        })
        .collect();

    totals.sort_by(|a, b| {
        b.total_votes
            .cmp(&a.total_votes)
            .then_with(|| a.candidate_last_name.cmp(&b.candidate_last_name))
            .then_with(|| a.candidate_first_name.cmp(&b.candidate_first_name))
            .then_with(|| a.party_name.cmp(&b.party_name))
    });
    Ok(totals)
}

/// Serial numbers shared by more than one submission
///
/// Duplication is judged across all submissions; the filter only decides
/// which contributing forms are listed. A serial is reported while at least
/// one of its forms passes the filter.
pub fn serial_discrepancies(subs: &[SubmissionRecord], filter: &LocationFilter) -> Vec<SerialDiscrepancy> {
    group_by(subs.iter(), |s| s.serial_number.as_str())
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .filter_map(|(serial, members)| {
            let forms: Vec<SerialForm> = members
                .into_iter()
                .filter(|s| s.in_filter(filter))
                .map(|s| SerialForm {
                    agent_code: s.agent_code.clone(),
                    county: s.county.clone(),
                    constituency: s.constituency.clone(),
                    ward: s.ward.clone(),
                    submitted_at: s.submitted_at,
                })
                .collect();
            if forms.is_empty() {
                None
            } else {
                Some(SerialDiscrepancy {
                    serial_number: serial.to_string(),
                    submission_count: forms.len(),
                    forms,
                })
            }
        })
        .collect()
}

/// Filtered stations that no submission references
///
/// Any submission anywhere counts, not only those inside the filter. With
/// `ExactName` a near-miss ("a", "A ") does not count as a reference.
pub fn missing_submissions(
    stations: &[StationRecord],
    subs: &[SubmissionRecord],
    filter: &LocationFilter,
    matching: StationMatch,
) -> Vec<MissingStation> {
    let index = StationIndex::new(stations, matching);
    let referenced: HashSet<StationKey> = subs.iter().map(|s| index.resolve(s)).collect();

    let mut missing: Vec<MissingStation> = stations
        .iter()
        .filter(|st| filter.matches(&st.county, &st.constituency, &st.ward))
        .filter(|st| !referenced.contains(&index.station_key(*st)))
        .map(|st| MissingStation {
            polling_station: st.station_name.clone(),
            county: st.county.clone(),
            constituency: st.constituency.clone(),
            ward: st.ward.clone(),
            station_code: st.station_code.clone(),
            has_submission: false,
        })
        .collect();

    missing.sort_by(|a, b| a.station_code.cmp(&b.station_code));
    missing
}

/// Stations with more than one filtered submission
///
/// A group resolved to a registered station is labelled with that station's
/// name and location, otherwise with its earliest submission's.
pub fn extra_submissions(
    stations: &[StationRecord],
    subs: &[SubmissionRecord],
    filter: &LocationFilter,
    matching: StationMatch,
) -> Vec<ExtraSubmissions> {
    let index = StationIndex::new(stations, matching);

    group_by(subs.iter().filter(|s| s.in_filter(filter)), |s| index.resolve(s))
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(key, members)| {
            let submissions = members
                .iter()
                .map(|s| StationSubmission {
                    agent_code: s.agent_code.clone(),
                    submitted_at: s.submitted_at,
                })
                .collect();
            match index.station(key) {
                Some(st) => ExtraSubmissions {
                    polling_station: st.station_name.clone(),
                    county: st.county.clone(),
                    constituency: st.constituency.clone(),
                    ward: st.ward.clone(),
                    submissions,
                },
                None => ExtraSubmissions {
                    polling_station: members[0].polling_station.clone(),
                    county: members[0].county.clone(),
                    constituency: members[0].constituency.clone(),
                    ward: members[0].ward.clone(),
                    submissions,
                },
            }
        })
        .collect()
}

/// Same-station groups followed by same-serial groups, over filtered submissions
pub fn duplicate_submissions(
    stations: &[StationRecord],
    subs: &[SubmissionRecord],
    filter: &LocationFilter,
    matching: StationMatch,
) -> Vec<DuplicateGroup> {
    let index = StationIndex::new(stations, matching);
    let filtered: Vec<&SubmissionRecord> = subs.iter().filter(|s| s.in_filter(filter)).collect();

    let same_station = group_by(filtered.iter().copied(), |s| index.resolve(s))
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(key, members)| DuplicateGroup::SameStation {
            polling_station: index
                .station(key)
                .map_or_else(|| members[0].polling_station.clone(), |st| st.station_name.clone()),
            submissions: members
                .iter()
                .map(|s| SameStationEntry {
                    agent_code: s.agent_code.clone(),
                    serial_number: s.serial_number.clone(),
                    submitted_at: s.submitted_at,
                })
                .collect(),
        });

    let same_serial = group_by(filtered.iter().copied(), |s| s.serial_number.as_str())
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(serial, members)| DuplicateGroup::SameSerial {
            serial_number: serial.to_string(),
            submissions: members
                .iter()
                .map(|s| SameSerialEntry {
                    agent_code: s.agent_code.clone(),
                    polling_station: s.polling_station.clone(),
                    submitted_at: s.submitted_at,
                })
                .collect(),
        });

    same_station.chain(same_serial).collect()
}
