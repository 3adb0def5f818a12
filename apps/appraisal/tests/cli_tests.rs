//! Integration tests for Appraisal CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use appraisal::cli::{
    cmd_export, cmd_generate, cmd_import, cmd_init, cmd_period_create, cmd_period_list,
    cmd_period_open, cmd_seed, cmd_status, cmd_user_add, open_cycle,
};
use appraisal_core::{PeriodStatus, ReviewPeriodId};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Initialize and seed a database in `dir`.
fn seeded_db(dir: &TempDir) -> PathBuf {
    let db_path = dir.path().join("appraisal.redb");
    cmd_init(&db_path, false).unwrap();
    cmd_seed(&db_path, false).unwrap();
    db_path
}

/// Create and open an FY period that ends far in the future.
fn open_period(db_path: &Path) -> ReviewPeriodId {
    let id = cmd_period_create(
        db_path,
        "FY 2026",
        "Annual",
        "2026-01-01",
        "2099-12-31",
        Some("FY26"),
    )
    .unwrap();
    cmd_period_open(db_path, id.0, true).unwrap();
    id
}

// =============================================================================
// INIT COMMAND TESTS
// =============================================================================

#[test]
fn test_init_creates_database() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");

    let result = cmd_init(&db_path, false);
    assert!(result.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_init_fails_if_exists_without_force() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");

    // First init
    cmd_init(&db_path, false).unwrap();

    // Second init should fail
    let result = cmd_init(&db_path, false);
    assert!(result.is_err());
}

#[test]
fn test_init_force_replaces_database() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);
    assert!(open_cycle(&db_path).unwrap().stats().unwrap().users > 0);

    cmd_init(&db_path, true).unwrap();

    let stats = open_cycle(&db_path).unwrap().stats().unwrap();
    assert_eq!(stats.users, 0);
    assert_eq!(stats.employees, 0);
}

// =============================================================================
// SEED / STATUS TESTS
// =============================================================================

#[test]
fn test_seed_populates_directory() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);

    let stats = open_cycle(&db_path).unwrap().stats().unwrap();
    assert_eq!(stats.employees, 3);
    assert_eq!(stats.users, 4);
    assert_eq!(stats.profiles, 5);
    assert_eq!(stats.departments, 3);
    assert_eq!(stats.positions, 3);
    assert!(stats.library_entries > 0);
    assert_eq!(stats.score_cards, 0);
}

#[test]
fn test_seed_twice_adds_nothing() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);
    let before = open_cycle(&db_path).unwrap().stats().unwrap();

    cmd_seed(&db_path, true).unwrap();

    let after = open_cycle(&db_path).unwrap().stats().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_status_text_and_json() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);

    assert!(cmd_status(&db_path, false).is_ok());
    assert!(cmd_status(&db_path, true).is_ok());
}

// =============================================================================
// USER COMMAND TESTS
// =============================================================================

#[test]
fn test_user_add_links_employee() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);

    cmd_user_add(
        &db_path,
        "hr2",
        "hr2@pms.com",
        "secret-pass",
        "HR Admin",
        Some("EMP001"),
    )
    .unwrap();

    let cycle = open_cycle(&db_path).unwrap();
    let user = cycle.user_by_username("hr2").unwrap().unwrap();
    let employee = cycle.employee_by_code("EMP001").unwrap().unwrap();
    assert_eq!(user.employee_id, Some(employee.id));
    assert!(user.password_hash.starts_with("$argon2"));
}

#[test]
fn test_user_add_rejects_unknown_employee() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);

    let result = cmd_user_add(&db_path, "ghost", "ghost@pms.com", "pw", "Employee", Some("EMP999"));
    assert!(result.is_err());
}

#[test]
fn test_user_add_rejects_unknown_role() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);

    let result = cmd_user_add(&db_path, "x", "x@pms.com", "pw", "Superuser", None);
    assert!(result.is_err());
}

#[test]
fn test_user_add_rejects_duplicate_username() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);

    let result = cmd_user_add(&db_path, "admin", "other@pms.com", "pw", "User Admin", None);
    assert!(result.is_err());
}

// =============================================================================
// PERIOD COMMAND TESTS
// =============================================================================

#[test]
fn test_period_create_and_list() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");
    cmd_init(&db_path, false).unwrap();

    let id = cmd_period_create(&db_path, "Q1 2026", "Q1", "2026-01-01", "2026-03-31", None).unwrap();
    assert!(cmd_period_list(&db_path, false).is_ok());
    assert!(cmd_period_list(&db_path, true).is_ok());

    let periods = open_cycle(&db_path).unwrap().list_periods().unwrap();
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].id, id);
    assert_eq!(periods[0].status, PeriodStatus::Closed);
}

#[test]
fn test_period_create_rejects_bad_input() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");
    cmd_init(&db_path, false).unwrap();

    assert!(cmd_period_create(&db_path, "Q1", "Q1", "01/01/2026", "2026-03-31", None).is_err());
    assert!(cmd_period_create(&db_path, "Q1", "Q5", "2026-01-01", "2026-03-31", None).is_err());
    assert!(cmd_period_create(&db_path, "Q1", "Q1", "2026-03-31", "2026-01-01", None).is_err());
    assert!(open_cycle(&db_path).unwrap().list_periods().unwrap().is_empty());
}

#[test]
fn test_opening_a_period_closes_the_others() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");
    cmd_init(&db_path, false).unwrap();

    let first = open_period(&db_path);
    let second = cmd_period_create(&db_path, "FY 2027", "Annual", "2027-01-01", "2099-12-31", None).unwrap();
    cmd_period_open(&db_path, second.0, true).unwrap();

    let cycle = open_cycle(&db_path).unwrap();
    assert_eq!(cycle.period(first).unwrap().status, PeriodStatus::Closed);
    assert_eq!(cycle.period(second).unwrap().status, PeriodStatus::Open);

    cmd_period_open(&db_path, second.0, false).unwrap();
    assert_eq!(open_cycle(&db_path).unwrap().stats().unwrap().open_periods, 0);
}

#[test]
fn test_period_open_unknown_id_fails() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");
    cmd_init(&db_path, false).unwrap();

    assert!(cmd_period_open(&db_path, 42, true).is_err());
}

// =============================================================================
// GENERATE COMMAND TESTS
// =============================================================================

#[test]
fn test_generate_creates_cards_once() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);
    let period = open_period(&db_path);

    // Profile 2 is the seeded software developer profile.
    cmd_generate(&db_path, period.0, &[2], false).unwrap();
    assert_eq!(open_cycle(&db_path).unwrap().stats().unwrap().score_cards, 1);

    // A second run skips the existing card.
    cmd_generate(&db_path, period.0, &[2], true).unwrap();
    assert_eq!(open_cycle(&db_path).unwrap().stats().unwrap().score_cards, 1);
}

#[test]
fn test_generate_requires_open_period() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);
    let period = cmd_period_create(&db_path, "FY 2026", "Annual", "2026-01-01", "2099-12-31", None).unwrap();

    assert!(cmd_generate(&db_path, period.0, &[2], false).is_err());
    assert!(cmd_generate(&db_path, period.0, &[], false).is_err());
}

// =============================================================================
// EXPORT / IMPORT TESTS
// =============================================================================

#[test]
fn test_export_import_binary() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);
    let period = open_period(&db_path);
    cmd_generate(&db_path, period.0, &[1, 2], false).unwrap();
    let snapshot_path = temp.path().join("snapshot.aprs");

    cmd_export(&db_path, &snapshot_path, "binary").unwrap();
    assert!(std::fs::read(&snapshot_path).unwrap().starts_with(b"APRS"));

    let restored = temp.path().join("restored.redb");
    cmd_init(&restored, false).unwrap();
    cmd_import(&restored, &snapshot_path).unwrap();

    let original = open_cycle(&db_path).unwrap().stats().unwrap();
    let copy = open_cycle(&restored).unwrap().stats().unwrap();
    assert_eq!(original, copy);
}

#[test]
fn test_export_import_json() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);
    let snapshot_path = temp.path().join("snapshot.json");

    cmd_export(&db_path, &snapshot_path, "json").unwrap();
    let text = std::fs::read_to_string(&snapshot_path).unwrap();
    assert!(text.contains("EMP003"));

    let restored = temp.path().join("restored.redb");
    cmd_import(&restored, &snapshot_path).unwrap();

    let cycle = open_cycle(&restored).unwrap();
    assert!(cycle.user_by_username("manager").unwrap().is_some());

    // Ids keep counting from the imported counters.
    let id = cmd_period_create(&restored, "Q1", "Q1", "2026-01-01", "2026-03-31", None).unwrap();
    assert_eq!(id, ReviewPeriodId(1));
}

#[test]
fn test_export_unknown_format_fails() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);

    let result = cmd_export(&db_path, &temp.path().join("out.xml"), "xml");
    assert!(result.is_err());
}

#[test]
fn test_import_into_populated_database_fails() {
    let temp = create_temp_dir();
    let db_path = seeded_db(&temp);
    let snapshot_path = temp.path().join("snapshot.aprs");
    cmd_export(&db_path, &snapshot_path, "binary").unwrap();

    let result = cmd_import(&db_path, &snapshot_path);
    assert!(result.is_err());
}

#[test]
fn test_import_garbage_fails() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");
    let input = temp.path().join("garbage.json");
    std::fs::write(&input, "not a snapshot").unwrap();

    assert!(cmd_import(&db_path, &input).is_err());
}
