//! Record and snapshot encoding.

use crate::access::{PermissionSet, Role};
use crate::directory::{Employee, User};
use crate::eligibility::EligibilityProfile;
use crate::error::{AppraisalError, Result};
use crate::library::LibraryEntry;
use crate::notification::Notification;
use crate::organization::{Department, Position};
use crate::period::ReviewPeriod;
use crate::scorecard::ScoreCard;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// RECORDS
// =============================================================================

/// Version byte prefixed to every stored record.
pub const RECORD_VERSION: u8 = 1;

/// Encode a record for storage.
pub fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    let mut bytes = vec![RECORD_VERSION];
    bytes.extend(postcard::to_allocvec(record)?);
    Ok(bytes)
}

/// Decode a stored record, checking the version byte.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    match bytes.split_first() {
        Some((&RECORD_VERSION, payload)) => Ok(postcard::from_bytes(payload)?),
        Some((version, _)) => Err(AppraisalError::Encoding(format!(
            "unsupported record version {version}"
        ))),
        None => Err(AppraisalError::Encoding("empty record".to_string())),
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Magic bytes opening a binary snapshot.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"APRS";

/// Binary snapshot layout version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Stored grants of one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
    pub permissions: PermissionSet,
}

/// Full contents of a store, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub periods: Vec<ReviewPeriod>,
    pub employees: Vec<Employee>,
    pub users: Vec<User>,
    pub profiles: Vec<EligibilityProfile>,
    pub library: Vec<LibraryEntry>,
    pub score_cards: Vec<ScoreCard>,
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub positions: Vec<Position>,
    pub role_grants: Vec<RoleGrant>,
    /// Id counters, so ids are not reused after import.
    pub counters: BTreeMap<String, u64>,
}

impl Snapshot {
    pub fn record_count(&self) -> usize {
        self.periods.len()
            + self.employees.len()
            + self.users.len()
            + self.profiles.len()
            + self.library.len()
            + self.score_cards.len()
            + self.notifications.len()
            + self.departments.len()
            + self.positions.len()
    }
}

/// Serialize a snapshot as `APRS` + version + postcard payload.
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(SNAPSHOT_MAGIC.len() + 1);
    bytes.extend_from_slice(SNAPSHOT_MAGIC);
    bytes.push(SNAPSHOT_VERSION);
    bytes.extend(postcard::to_allocvec(snapshot)?);
    Ok(bytes)
}

/// Parse a binary snapshot.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot> {
    let Some(rest) = bytes.strip_prefix(SNAPSHOT_MAGIC.as_slice()) else {
        return Err(AppraisalError::Encoding(
            "not an appraisal snapshot (bad magic)".to_string(),
        ));
    };
    match rest.split_first() {
        Some((&SNAPSHOT_VERSION, payload)) => Ok(postcard::from_bytes(payload)?),
        Some((version, _)) => Err(AppraisalError::Encoding(format!(
            "unsupported snapshot version {version}"
        ))),
        None => Err(AppraisalError::Encoding("truncated snapshot".to_string())),
    }
}

/// Pretty-printed JSON snapshot.
pub fn snapshot_to_json(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn snapshot_from_json(json: &str) -> Result<Snapshot> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weightage::Weightage;
    use crate::{EmployeeId, ReviewPeriodId, ScoreCardId};
    use chrono::Utc;

    fn sample() -> Snapshot {
        let mut counters = BTreeMap::new();
        counters.insert("score_cards".to_string(), 1);
        Snapshot {
            score_cards: vec![ScoreCard::new(
                ScoreCardId(1),
                EmployeeId(3),
                ReviewPeriodId(1),
                Weightage::default(),
                Utc::now(),
            )],
            role_grants: vec![RoleGrant {
                role: Role::Employee,
                permissions: Role::Employee.default_permissions(),
            }],
            counters,
            ..Snapshot::default()
        }
    }

    #[test]
    fn record_version_is_checked() {
        let bytes = encode_record(&Weightage::default()).expect("encode");
        assert_eq!(bytes[0], RECORD_VERSION);
        let back: Weightage = decode_record(&bytes).expect("decode");
        assert_eq!(back, Weightage::default());

        let mut future = bytes.clone();
        future[0] = 9;
        assert!(decode_record::<Weightage>(&future).is_err());
        assert!(decode_record::<Weightage>(&[]).is_err());
    }

    #[test]
    fn binary_snapshot_has_magic_header() {
        let snapshot = sample();
        let bytes = snapshot_to_bytes(&snapshot).expect("encode");
        assert!(bytes.starts_with(b"APRS"));
        assert_eq!(snapshot_from_bytes(&bytes).expect("decode"), snapshot);
        assert!(snapshot_from_bytes(b"NOPE1234").is_err());
        assert!(snapshot_from_bytes(b"APRS").is_err());
    }

    #[test]
    fn json_snapshot_roundtrips() {
        let snapshot = sample();
        let json = snapshot_to_json(&snapshot).expect("json");
        assert!(json.contains("\"Plan Not Started\""));
        assert_eq!(snapshot_from_json(&json).expect("parse"), snapshot);
        assert_eq!(snapshot.record_count(), 1);
    }
}
