//! redb-backed record store.
//!
//! Records live in one table per type, keyed by `u64` id and encoded with
//! [`encode_record`]. A single `unique_index` table maps normalized unique
//! keys to the owning record id; [`WriteTx::put`] keeps it in step with the
//! record inside the same transaction.

use crate::access::{PermissionSet, Role};
use crate::directory::{Employee, User};
use crate::eligibility::EligibilityProfile;
use crate::error::{AppraisalError, Result};
use crate::formats::{RoleGrant, Snapshot, decode_record, encode_record};
use crate::library::LibraryEntry;
use crate::notification::Notification;
use crate::organization::{Department, Position};
use crate::period::ReviewPeriod;
use crate::scorecard::ScoreCard;
use redb::backends::InMemoryBackend;
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// TABLES
// =============================================================================

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

const PERIODS: RecordTable = TableDefinition::new("review_periods");
const SCORE_CARDS: RecordTable = TableDefinition::new("score_cards");
const EMPLOYEES: RecordTable = TableDefinition::new("employees");
const USERS: RecordTable = TableDefinition::new("users");
const PROFILES: RecordTable = TableDefinition::new("eligibility_profiles");
const LIBRARY: RecordTable = TableDefinition::new("library");
const NOTIFICATIONS: RecordTable = TableDefinition::new("notifications");
const DEPARTMENTS: RecordTable = TableDefinition::new("departments");
const POSITIONS: RecordTable = TableDefinition::new("positions");

const ROLE_GRANTS: TableDefinition<u8, &[u8]> = TableDefinition::new("role_grants");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");
const UNIQUE: TableDefinition<&str, u64> = TableDefinition::new("unique_index");

const RECORD_TABLES: [RecordTable; 9] = [
    PERIODS,
    SCORE_CARDS,
    EMPLOYEES,
    USERS,
    PROFILES,
    LIBRARY,
    NOTIFICATIONS,
    DEPARTMENTS,
    POSITIONS,
];

/// Normalized index key: `kind:part1:part2`, lowercased and trimmed.
pub fn unique_key(kind: &str, parts: &[&str]) -> String {
    let mut key = kind.to_string();
    for part in parts {
        key.push(':');
        key.push_str(&part.trim().to_lowercase());
    }
    key
}

/// An index entry a record claims, with the text used in conflict errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub key: String,
    pub label: String,
}

// =============================================================================
// RECORD TRAIT
// =============================================================================

/// A type stored in its own table.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: RecordTable;
    /// Name used in `NotFound` errors.
    const KIND: &'static str;
    /// Counter the ids are drawn from.
    const COUNTER: &'static str;

    fn key(&self) -> u64;

    /// Index entries this record must own exclusively.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

impl Record for ReviewPeriod {
    const TABLE: RecordTable = PERIODS;
    const KIND: &'static str = "review period";
    const COUNTER: &'static str = "review_periods";

    fn key(&self) -> u64 {
        self.id.0
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey {
            key: unique_key("period", &[&self.name]),
            label: format!("a review period named '{}'", self.name),
        }]
    }
}

impl Record for ScoreCard {
    const TABLE: RecordTable = SCORE_CARDS;
    const KIND: &'static str = "score card";
    const COUNTER: &'static str = "score_cards";

    fn key(&self) -> u64 {
        self.id.0
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey {
            key: unique_key(
                "card",
                &[&self.employee_id.to_string(), &self.review_period_id.to_string()],
            ),
            label: format!(
                "a score card for employee {} in review period {}",
                self.employee_id, self.review_period_id
            ),
        }]
    }
}

impl Record for Employee {
    const TABLE: RecordTable = EMPLOYEES;
    const KIND: &'static str = "employee";
    const COUNTER: &'static str = "employees";

    fn key(&self) -> u64 {
        self.id.0
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey {
            key: unique_key("employee_code", &[&self.code]),
            label: format!("an employee with code '{}'", self.code),
        }]
    }
}

impl Record for User {
    const TABLE: RecordTable = USERS;
    const KIND: &'static str = "user";
    const COUNTER: &'static str = "users";

    fn key(&self) -> u64 {
        self.id.0
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey {
                key: unique_key("user_email", &[&self.email]),
                label: format!("a user with email '{}'", self.email),
            },
            UniqueKey {
                key: unique_key("username", &[&self.username]),
                label: format!("a user named '{}'", self.username),
            },
        ]
    }
}

impl Record for EligibilityProfile {
    const TABLE: RecordTable = PROFILES;
    const KIND: &'static str = "eligibility profile";
    const COUNTER: &'static str = "eligibility_profiles";

    fn key(&self) -> u64 {
        self.id.0
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey {
            key: unique_key("profile", &[&self.name]),
            label: format!("an eligibility profile named '{}'", self.name),
        }]
    }
}

impl Record for LibraryEntry {
    const TABLE: RecordTable = LIBRARY;
    const KIND: &'static str = "library entry";
    const COUNTER: &'static str = "library";

    fn key(&self) -> u64 {
        self.id.0
    }

    /// Deactivated entries free their name.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        if !self.active {
            return Vec::new();
        }
        vec![UniqueKey {
            key: unique_key("library", &[self.kind.as_str(), &self.name]),
            label: format!("'{}' in the {} library", self.name, self.kind),
        }]
    }
}

impl Record for Notification {
    const TABLE: RecordTable = NOTIFICATIONS;
    const KIND: &'static str = "notification";
    const COUNTER: &'static str = "notifications";

    fn key(&self) -> u64 {
        self.id.0
    }
}

impl Record for Department {
    const TABLE: RecordTable = DEPARTMENTS;
    const KIND: &'static str = "department";
    const COUNTER: &'static str = "departments";

    fn key(&self) -> u64 {
        self.id.0
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        if !self.active {
            return Vec::new();
        }
        vec![UniqueKey {
            key: unique_key("department", &[&self.name]),
            label: format!("a department named '{}'", self.name),
        }]
    }
}

impl Record for Position {
    const TABLE: RecordTable = POSITIONS;
    const KIND: &'static str = "position";
    const COUNTER: &'static str = "positions";

    fn key(&self) -> u64 {
        self.id.0
    }

    /// Titles are unique within a department.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        if !self.active {
            return Vec::new();
        }
        let department = self.department_id.map(|d| d.to_string()).unwrap_or_default();
        vec![UniqueKey {
            key: unique_key("position", &[&department, &self.title]),
            label: format!("a position titled '{}' in that department", self.title),
        }]
    }
}

// =============================================================================
// TABLE HELPERS
// =============================================================================

fn read_record<R: Record>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Option<R>> {
    match table.get(id)? {
        Some(guard) => Ok(Some(decode_record(guard.value())?)),
        None => Ok(None),
    }
}

fn read_all<R: Record>(table: &impl ReadableTable<u64, &'static [u8]>) -> Result<Vec<R>> {
    let mut records = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        records.push(decode_record(value.value())?);
    }
    Ok(records)
}

fn read_grants(
    table: &impl ReadableTable<u8, &'static [u8]>,
    role: Role,
) -> Result<Option<PermissionSet>> {
    match table.get(role.id())? {
        Some(guard) => Ok(Some(decode_record(guard.value())?)),
        None => Ok(None),
    }
}

fn read_counters(table: &impl ReadableTable<&'static str, u64>) -> Result<BTreeMap<String, u64>> {
    let mut counters = BTreeMap::new();
    for entry in table.iter()? {
        let (name, value) = entry?;
        counters.insert(name.value().to_string(), value.value());
    }
    Ok(counters)
}

// =============================================================================
// STORE
// =============================================================================

/// The embedded database.
pub struct Store {
    db: Database,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;
        Self::init(db)
    }

    /// A store that lives only in memory.
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db)
    }

    /// Create every table so read transactions never meet a missing one.
    fn init(db: Database) -> Result<Self> {
        let txn = db.begin_write()?;
        for table in RECORD_TABLES {
            txn.open_table(table)?;
        }
        txn.open_table(ROLE_GRANTS)?;
        txn.open_table(COUNTERS)?;
        txn.open_table(UNIQUE)?;
        txn.commit()?;
        Ok(Self { db })
    }

    /// Run `f` in one write transaction. Commits on `Ok`, aborts on `Err`.
    pub fn write<T>(&self, f: impl FnOnce(&WriteTx<'_>) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_write()?;
        let result = f(&WriteTx { txn: &txn });
        match result {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.abort()?;
                Err(err)
            }
        }
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&ReadTx) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_read()?;
        f(&ReadTx { txn })
    }

    /// Every record, in key order.
    pub fn export(&self) -> Result<Snapshot> {
        self.read(|tx| {
            let mut role_grants = Vec::new();
            for role in Role::ALL {
                if let Some(permissions) = tx.grants(role)? {
                    role_grants.push(RoleGrant { role, permissions });
                }
            }
            Ok(Snapshot {
                periods: tx.all()?,
                employees: tx.all()?,
                users: tx.all()?,
                profiles: tx.all()?,
                library: tx.all()?,
                score_cards: tx.all()?,
                notifications: tx.all()?,
                departments: tx.all()?,
                positions: tx.all()?,
                role_grants,
                counters: tx.counters()?,
            })
        })
    }

    /// Load a snapshot into an empty store. Returns the number of records.
    pub fn import(&self, snapshot: &Snapshot) -> Result<usize> {
        self.write(|tx| {
            if !tx.is_empty()? {
                return Err(AppraisalError::conflict(
                    "snapshots can only be imported into an empty database",
                ));
            }
            tx.put_all(&snapshot.periods)?;
            tx.put_all(&snapshot.employees)?;
            tx.put_all(&snapshot.users)?;
            tx.put_all(&snapshot.profiles)?;
            tx.put_all(&snapshot.library)?;
            tx.put_all(&snapshot.score_cards)?;
            tx.put_all(&snapshot.notifications)?;
            tx.put_all(&snapshot.departments)?;
            tx.put_all(&snapshot.positions)?;
            for grant in &snapshot.role_grants {
                tx.set_grants(grant.role, &grant.permissions)?;
            }
            for (name, value) in &snapshot.counters {
                tx.set_counter(name, *value)?;
            }
            Ok(snapshot.record_count())
        })
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Read-only view of the store.
pub struct ReadTx {
    txn: ReadTransaction,
}

impl ReadTx {
    pub fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        read_record(&self.txn.open_table(R::TABLE)?, id)
    }

    pub fn require<R: Record>(&self, id: u64) -> Result<R> {
        self.get(id)?
            .ok_or_else(|| AppraisalError::not_found(R::KIND, id))
    }

    pub fn all<R: Record>(&self) -> Result<Vec<R>> {
        read_all(&self.txn.open_table(R::TABLE)?)
    }

    pub fn lookup(&self, key: &str) -> Result<Option<u64>> {
        let table = self.txn.open_table(UNIQUE)?;
        Ok(table.get(key)?.map(|guard| guard.value()))
    }

    pub fn grants(&self, role: Role) -> Result<Option<PermissionSet>> {
        read_grants(&self.txn.open_table(ROLE_GRANTS)?, role)
    }

    pub fn counters(&self) -> Result<BTreeMap<String, u64>> {
        read_counters(&self.txn.open_table(COUNTERS)?)
    }

    pub fn count<R: Record>(&self) -> Result<u64> {
        Ok(self.txn.open_table(R::TABLE)?.len()?)
    }
}

/// A write transaction in progress.
pub struct WriteTx<'a> {
    txn: &'a WriteTransaction,
}

impl WriteTx<'_> {
    pub fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        read_record(&self.txn.open_table(R::TABLE)?, id)
    }

    pub fn require<R: Record>(&self, id: u64) -> Result<R> {
        self.get(id)?
            .ok_or_else(|| AppraisalError::not_found(R::KIND, id))
    }

    pub fn all<R: Record>(&self) -> Result<Vec<R>> {
        read_all(&self.txn.open_table(R::TABLE)?)
    }

    /// Insert or replace a record, moving its unique index entries.
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let id = record.key();
        let old_keys: Vec<String> = self
            .get::<R>(id)?
            .map(|old| old.unique_keys().into_iter().map(|k| k.key).collect())
            .unwrap_or_default();
        let new_keys = record.unique_keys();

        {
            let mut index = self.txn.open_table(UNIQUE)?;
            for key in &old_keys {
                if !new_keys.iter().any(|k| &k.key == key) {
                    index.remove(key.as_str())?;
                }
            }
            for unique in &new_keys {
                let owner = index.get(unique.key.as_str())?.map(|guard| guard.value());
                match owner {
                    Some(owner) if owner != id => {
                        tracing::debug!(key = %unique.key, owner, id, "unique key taken");
                        return Err(AppraisalError::conflict(format!(
                            "{} already exists",
                            unique.label
                        )));
                    }
                    Some(_) => {}
                    None => {
                        index.insert(unique.key.as_str(), id)?;
                    }
                }
            }
        }

        let bytes = encode_record(record)?;
        let mut table = self.txn.open_table(R::TABLE)?;
        table.insert(id, bytes.as_slice())?;
        Ok(())
    }

    fn put_all<R: Record>(&self, records: &[R]) -> Result<()> {
        for record in records {
            self.put(record)?;
        }
        Ok(())
    }

    /// Delete a record and free its unique keys.
    pub fn remove<R: Record>(&self, id: u64) -> Result<bool> {
        let Some(old) = self.get::<R>(id)? else {
            return Ok(false);
        };
        {
            let mut index = self.txn.open_table(UNIQUE)?;
            for unique in old.unique_keys() {
                index.remove(unique.key.as_str())?;
            }
        }
        let mut table = self.txn.open_table(R::TABLE)?;
        table.remove(id)?;
        Ok(true)
    }

    pub fn lookup(&self, key: &str) -> Result<Option<u64>> {
        let table = self.txn.open_table(UNIQUE)?;
        Ok(table.get(key)?.map(|guard| guard.value()))
    }

    /// Next id for `R`, starting at 1.
    pub fn next_id<R: Record>(&self) -> Result<u64> {
        let mut table = self.txn.open_table(COUNTERS)?;
        let current = table.get(R::COUNTER)?.map(|guard| guard.value()).unwrap_or(0);
        let next = current.saturating_add(1);
        table.insert(R::COUNTER, next)?;
        Ok(next)
    }

    fn set_counter(&self, name: &str, value: u64) -> Result<()> {
        let mut table = self.txn.open_table(COUNTERS)?;
        let current = table.get(name)?.map(|guard| guard.value()).unwrap_or(0);
        table.insert(name, current.max(value))?;
        Ok(())
    }

    pub fn grants(&self, role: Role) -> Result<Option<PermissionSet>> {
        read_grants(&self.txn.open_table(ROLE_GRANTS)?, role)
    }

    pub fn set_grants(&self, role: Role, permissions: &PermissionSet) -> Result<()> {
        let bytes = encode_record(permissions)?;
        let mut table = self.txn.open_table(ROLE_GRANTS)?;
        table.insert(role.id(), bytes.as_slice())?;
        Ok(())
    }

    fn is_empty(&self) -> Result<bool> {
        for table in RECORD_TABLES {
            if !self.txn.open_table(table)?.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::{NewPeriod, PeriodType};
    use crate::weightage::Weightage;
    use crate::{EmployeeId, ReviewPeriodId, ScoreCardId};
    use chrono::{NaiveDate, Utc};

    fn period(id: u64, name: &str) -> ReviewPeriod {
        ReviewPeriod::create(
            ReviewPeriodId(id),
            NewPeriod {
                name: name.to_string(),
                period_type: PeriodType::Annual,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
                end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap_or_default(),
                financial_period: None,
                description: String::new(),
            },
            Utc::now(),
        )
        .expect("period")
    }

    #[test]
    fn put_and_get_roundtrip() {
        let store = Store::in_memory().expect("store");
        store
            .write(|tx| tx.put(&period(1, "FY 2026")))
            .expect("write");
        let back: ReviewPeriod = store.read(|tx| tx.require(1)).expect("read");
        assert_eq!(back.name, "FY 2026");
        assert!(store.read(|tx| tx.require::<ReviewPeriod>(2)).is_err());
    }

    #[test]
    fn unique_names_are_case_insensitive() {
        let store = Store::in_memory().expect("store");
        store.write(|tx| tx.put(&period(1, "FY 2026"))).expect("first");
        let err = store.write(|tx| tx.put(&period(2, "fy 2026"))).err();
        assert!(matches!(err, Some(AppraisalError::Conflict(_))));
        // Failed transaction left nothing behind.
        assert_eq!(store.read(|tx| tx.count::<ReviewPeriod>()).expect("count"), 1);
    }

    #[test]
    fn renaming_releases_the_old_key() {
        let store = Store::in_memory().expect("store");
        store.write(|tx| tx.put(&period(1, "Old"))).expect("put");
        let mut renamed = period(1, "New");
        renamed.id = ReviewPeriodId(1);
        store.write(|tx| tx.put(&renamed)).expect("rename");
        store.write(|tx| tx.put(&period(2, "Old"))).expect("reuse old name");
    }

    #[test]
    fn counters_start_at_one() {
        let store = Store::in_memory().expect("store");
        let ids = store
            .write(|tx| Ok((tx.next_id::<ScoreCard>()?, tx.next_id::<ScoreCard>()?)))
            .expect("ids");
        assert_eq!(ids, (1, 2));
    }

    #[test]
    fn error_aborts_the_transaction() {
        let store = Store::in_memory().expect("store");
        let result: Result<()> = store.write(|tx| {
            tx.put(&period(1, "Doomed"))?;
            Err(AppraisalError::validation("boom"))
        });
        assert!(result.is_err());
        assert!(store.read(|tx| tx.get::<ReviewPeriod>(1)).expect("read").is_none());
    }

    #[test]
    fn export_import_preserves_records_and_indexes() {
        let store = Store::in_memory().expect("store");
        store
            .write(|tx| {
                tx.put(&period(1, "FY 2026"))?;
                tx.next_id::<ReviewPeriod>()?;
                tx.put(&ScoreCard::new(
                    ScoreCardId(1),
                    EmployeeId(3),
                    ReviewPeriodId(1),
                    Weightage::default(),
                    Utc::now(),
                ))?;
                tx.set_grants(Role::Employee, &PermissionSet::default())
            })
            .expect("seed");
        let snapshot = store.export().expect("export");
        assert_eq!(snapshot.record_count(), 2);

        let copy = Store::in_memory().expect("copy");
        assert_eq!(copy.import(&snapshot).expect("import"), 2);
        let err = copy.write(|tx| tx.put(&period(5, "FY 2026"))).err();
        assert!(matches!(err, Some(AppraisalError::Conflict(_))));
        assert!(copy.import(&snapshot).is_err());
        let next = copy.write(|tx| tx.next_id::<ReviewPeriod>()).expect("id");
        assert_eq!(next, 2);
        let grants = copy.read(|tx| tx.grants(Role::Employee)).expect("grants");
        assert_eq!(grants, Some(PermissionSet::default()));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("appraisal.redb");
        {
            let store = Store::open(&path).expect("open");
            store.write(|tx| tx.put(&period(1, "FY 2026"))).expect("put");
        }
        let store = Store::open(&path).expect("reopen");
        assert_eq!(store.read(|tx| tx.count::<ReviewPeriod>()).expect("count"), 1);
    }
}
