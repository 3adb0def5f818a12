//! # Review Cycle
//!
//! Actor-checked operations over the [`Store`]. Every mutation runs in one
//! write transaction: the card is read, the actor's scope and the review
//! period are checked, the state machine in [`crate::scorecard`] applies the
//! change, notifications are queued, and everything commits together or not
//! at all.
//!
//! Scope rules:
//! - HR acts on every card.
//! - A manager acts on the cards of direct reports.
//! - Everyone acts as the employee on their own card.
//! - User administrators and external users have no score-card access.

use crate::access::{navigation, NavRoute, Permission, PermissionSet, Role};
use crate::directory::{Employee, EmployeeUpdate, NewEmployee, NewUser, User, UserUpdate};
use crate::eligibility::{EligibilityProfile, NewProfile};
use crate::error::{AppraisalError, Result};
use crate::formats::Snapshot;
use crate::library::{EntryUpdate, LibraryEntry, LibraryKind, NewEntry};
use crate::notification::{Draft, Notification};
use crate::organization::{Department, NewDepartment, NewPosition, Position};
use crate::period::{NewPeriod, PeriodUpdate, ReviewPeriod};
use crate::rating::{Rating, RatingSource};
use crate::scorecard::{Contributor, ItemStatus, ItemUpdate, NewItem, ScoreCard, ScoreCardSummary};
use crate::status::ScoreCardStatus;
use crate::storage::{unique_key, Store, WriteTx};
use crate::weightage::{Section, Weightage};
use crate::{
    CommentId, DepartmentId, EmployeeId, ItemId, NotificationId, PositionId, ProfileId,
    ReviewPeriodId, ScoreCardId, TemplateId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// ACTOR
// =============================================================================

/// The authenticated user an operation runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub employee_id: Option<EmployeeId>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            employee_id: user.employee_id,
        }
    }

    fn owns(&self, card: &ScoreCard) -> bool {
        self.employee_id == Some(card.employee_id)
    }
}

fn require_card_access(actor: &Actor) -> Result<Contributor> {
    actor.role.contributor().ok_or_else(|| {
        AppraisalError::forbidden(format!("{} accounts have no score-card access", actor.role))
    })
}

/// The party `actor` acts as on `card`. `load` fetches the card's employee
/// when the manager relationship has to be checked.
fn card_party(
    actor: &Actor,
    card: &ScoreCard,
    load: impl FnOnce(EmployeeId) -> Result<Employee>,
) -> Result<Contributor> {
    let contributor = require_card_access(actor)?;
    if actor.owns(card) {
        return Ok(Contributor::Employee);
    }
    match contributor {
        Contributor::Hr => Ok(Contributor::Hr),
        Contributor::Manager => {
            let employee = load(card.employee_id)?;
            match actor.employee_id {
                Some(manager) if employee.reports_to(manager) => Ok(Contributor::Manager),
                _ => Err(AppraisalError::forbidden(format!(
                    "score card {} belongs to someone outside your team",
                    card.id
                ))),
            }
        }
        Contributor::Employee => Err(AppraisalError::forbidden(format!(
            "score card {} is not yours",
            card.id
        ))),
    }
}

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Outcome of bulk generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub created: Vec<ScoreCardId>,
    pub skipped: usize,
    /// Matched employees with no active login account. Included in `skipped`.
    #[serde(default)]
    pub without_account: Vec<EmployeeId>,
}

/// An open period with the number of score cards it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodOverview {
    #[serde(flatten)]
    pub period: ReviewPeriod,
    pub score_cards: usize,
}

/// An active profile with the number of employees it currently matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCount {
    #[serde(flatten)]
    pub profile: EligibilityProfile,
    pub matching_employees: usize,
}

/// Filter for score-card listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct CardFilter {
    #[serde(default)]
    pub period_id: Option<ReviewPeriodId>,
    #[serde(default)]
    pub status: Option<ScoreCardStatus>,
    #[serde(default)]
    pub employee_id: Option<EmployeeId>,
}

impl CardFilter {
    fn accepts(&self, card: &ScoreCard) -> bool {
        self.period_id.is_none_or(|id| card.review_period_id == id)
            && self.status.is_none_or(|status| card.status == status)
            && self.employee_id.is_none_or(|id| card.employee_id == id)
    }
}

/// What the signed-in user may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessView {
    pub role: Role,
    pub permissions: PermissionSet,
    pub navigation: Vec<NavRoute>,
    pub dashboard: Option<&'static str>,
}

/// Record counts, for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub periods: u64,
    pub open_periods: usize,
    pub employees: u64,
    pub users: u64,
    pub profiles: u64,
    pub library_entries: u64,
    pub departments: u64,
    pub positions: u64,
    pub score_cards: u64,
    pub cards_by_status: BTreeMap<ScoreCardStatus, usize>,
}

/// A plan item to add, either spelled out or copied from a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AddItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: Option<u8>,
    #[serde(default)]
    pub template_id: Option<TemplateId>,
}

// =============================================================================
// NOTIFICATION HELPERS
// =============================================================================

fn notify(tx: &WriteTx<'_>, draft: Draft, now: DateTime<Utc>) -> Result<()> {
    let id = NotificationId(tx.next_id::<Notification>()?);
    tracing::debug!(recipient = %draft.recipient, notification = %id, "notification queued");
    tx.put(&draft.into_notification(id, now))
}

fn user_of(tx: &WriteTx<'_>, employee: EmployeeId) -> Result<Option<UserId>> {
    Ok(tx
        .all::<User>()?
        .into_iter()
        .find(|user| user.active && user.employee_id == Some(employee))
        .map(|user| user.id))
}

fn manager_user_of(tx: &WriteTx<'_>, employee: EmployeeId) -> Result<Option<UserId>> {
    let employee: Employee = tx.require(employee.0)?;
    match employee.manager_id {
        Some(manager) => user_of(tx, manager),
        None => Ok(None),
    }
}

fn hr_users(tx: &WriteTx<'_>) -> Result<Vec<UserId>> {
    Ok(tx
        .all::<User>()?
        .into_iter()
        .filter(|user| user.active && user.role == Role::HrAdmin)
        .map(|user| user.id)
        .collect())
}

fn employee_name(tx: &WriteTx<'_>, employee: EmployeeId) -> Result<String> {
    Ok(tx.require::<Employee>(employee.0)?.full_name)
}

// =============================================================================
// TRANSACTION CHECKS
// =============================================================================

/// HR and managers also need `permission` for planning work. Employees
/// contribute to their own plan without one.
fn require_planner_grant(
    tx: &WriteTx<'_>,
    actor: &Actor,
    party: Contributor,
    permission: Permission,
) -> Result<()> {
    if !party.is_planner() {
        return Ok(());
    }
    tx.grants(actor.role)?
        .unwrap_or_else(|| actor.role.default_permissions())
        .require(permission)
}

/// `manager` must exist and must not report to `employee`, directly or not.
fn check_reporting_line(tx: &WriteTx<'_>, employee: EmployeeId, manager: EmployeeId) -> Result<()> {
    let mut current: Employee = tx.require(manager.0)?;
    let mut seen = BTreeSet::new();
    loop {
        if current.id == employee {
            return Err(AppraisalError::validation(format!(
                "employee {manager} cannot manage employee {employee}: that would create a reporting loop"
            )));
        }
        if !seen.insert(current.id) {
            return Ok(());
        }
        match current.manager_id {
            Some(next) => current = tx.require(next.0)?,
            None => return Ok(()),
        }
    }
}

fn active_department(tx: &WriteTx<'_>, id: DepartmentId) -> Result<Department> {
    let department: Department = tx.require(id.0)?;
    if department.active {
        Ok(department)
    } else {
        Err(AppraisalError::not_found("department", id))
    }
}

fn active_position(tx: &WriteTx<'_>, id: PositionId) -> Result<Position> {
    let position: Position = tx.require(id.0)?;
    if position.active {
        Ok(position)
    } else {
        Err(AppraisalError::not_found("position", id))
    }
}

#[derive(Debug, Clone, Copy)]
enum LibraryChange {
    Create,
    Edit,
    Delete,
}

fn library_permission(kind: LibraryKind, change: LibraryChange) -> Permission {
    use LibraryChange::*;
    match (kind, change) {
        (LibraryKind::Goals, Create) => Permission::CreateGoal,
        (LibraryKind::Goals, Edit) => Permission::EditGoal,
        (LibraryKind::Goals, Delete) => Permission::DeleteGoal,
        (LibraryKind::Competencies, Create) => Permission::CreateCompetency,
        (LibraryKind::Competencies, Edit) => Permission::EditCompetency,
        (LibraryKind::Competencies, Delete) => Permission::DeleteCompetency,
        (LibraryKind::Values, Create) => Permission::CreateValue,
        (LibraryKind::Values, Edit) => Permission::EditValue,
        (LibraryKind::Values, Delete) => Permission::DeleteValue,
    }
}

// =============================================================================
// REVIEW CYCLE
// =============================================================================

/// The review-cycle service.
#[derive(Debug)]
pub struct ReviewCycle {
    store: Store,
}

impl ReviewCycle {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Permissions
    // -------------------------------------------------------------------------

    /// Stored grants of `role`, or its defaults.
    pub fn permissions(&self, role: Role) -> Result<PermissionSet> {
        Ok(self
            .store
            .read(|tx| tx.grants(role))?
            .unwrap_or_else(|| role.default_permissions()))
    }

    pub fn require_permission(&self, actor: &Actor, permission: Permission) -> Result<()> {
        self.permissions(actor.role)?.require(permission)
    }

    /// Replace a role's grants.
    pub fn set_permissions(&self, actor: &Actor, role: Role, permissions: PermissionSet) -> Result<()> {
        self.require_permission(actor, Permission::ManagePermissions)?;
        self.store.write(|tx| tx.set_grants(role, &permissions))?;
        tracing::info!(%role, count = permissions.len(), by = %actor.user_id, "role permissions replaced");
        Ok(())
    }

    /// Role, grants and navigation for the signed-in user.
    pub fn access_view(&self, actor: &Actor) -> Result<AccessView> {
        let permissions = self.permissions(actor.role)?;
        Ok(AccessView {
            role: actor.role,
            navigation: navigation(&permissions),
            permissions,
            dashboard: actor.role.dashboard_route(),
        })
    }

    // -------------------------------------------------------------------------
    // Directory
    // -------------------------------------------------------------------------

    /// Add an employee record.
    pub fn create_employee(&self, actor: &Actor, new: NewEmployee) -> Result<Employee> {
        self.require_permission(actor, Permission::CreateEmployee)?;
        self.add_employee(new)
    }

    /// Add an employee without an actor (seeding, CLI).
    pub fn add_employee(&self, new: NewEmployee) -> Result<Employee> {
        self.store.write(|tx| {
            if let Some(manager) = new.manager_id {
                tx.require::<Employee>(manager.0)?;
            }
            let id = EmployeeId(tx.next_id::<Employee>()?);
            let employee = Employee::create(id, new)?;
            tx.put(&employee)?;
            Ok(employee)
        })
    }

    /// Employees visible to `actor`: everyone, the team, or just themselves.
    pub fn list_employees(&self, actor: &Actor) -> Result<Vec<Employee>> {
        let permissions = self.permissions(actor.role)?;
        let all: Vec<Employee> = self.store.read(|tx| tx.all())?;
        if permissions.contains(Permission::ViewAllEmployees) {
            return Ok(all);
        }
        let team = permissions.contains(Permission::ViewTeamEmployees);
        Ok(all
            .into_iter()
            .filter(|e| {
                Some(e.id) == actor.employee_id
                    || (team && actor.employee_id.is_some_and(|me| e.reports_to(me)))
            })
            .collect())
    }

    pub fn employee(&self, id: EmployeeId) -> Result<Employee> {
        self.store.read(|tx| tx.require(id.0))
    }

    /// Employee by code (case-insensitive).
    pub fn employee_by_code(&self, code: &str) -> Result<Option<Employee>> {
        self.store.read(|tx| match tx.lookup(&unique_key("employee_code", &[code]))? {
            Some(id) => tx.get(id),
            None => Ok(None),
        })
    }

    /// Edit an employee record.
    pub fn update_employee(&self, actor: &Actor, id: EmployeeId, update: EmployeeUpdate) -> Result<Employee> {
        self.require_permission(actor, Permission::EditEmployeeProfile)?;
        let employee = self.store.write(|tx| {
            let mut employee: Employee = tx.require(id.0)?;
            if let Some(Some(manager)) = update.manager_id {
                check_reporting_line(tx, id, manager)?;
            }
            employee.update(update)?;
            tx.put(&employee)?;
            Ok(employee)
        })?;
        tracing::info!(employee = %id, by = %actor.user_id, "employee updated");
        Ok(employee)
    }

    /// Deactivate an employee together with their login accounts.
    ///
    /// The record stays so past score cards keep their owner. Employees who
    /// still manage active staff cannot be removed.
    pub fn delete_employee(&self, actor: &Actor, id: EmployeeId) -> Result<Employee> {
        self.require_permission(actor, Permission::DeleteEmployee)?;
        if actor.employee_id == Some(id) {
            return Err(AppraisalError::validation("you cannot remove your own employee record"));
        }
        let (employee, accounts) = self.store.write(|tx| {
            let mut employee: Employee = tx.require(id.0)?;
            let reports = tx
                .all::<Employee>()?
                .iter()
                .filter(|e| e.active && e.reports_to(id))
                .count();
            if reports > 0 {
                return Err(AppraisalError::conflict(format!(
                    "employee {id} still manages {reports} active employee(s)"
                )));
            }
            employee.active = false;
            tx.put(&employee)?;
            let mut accounts = 0usize;
            for mut user in tx.all::<User>()? {
                if user.active && user.employee_id == Some(id) {
                    user.active = false;
                    tx.put(&user)?;
                    accounts += 1;
                }
            }
            Ok((employee, accounts))
        })?;
        tracing::info!(employee = %id, accounts, by = %actor.user_id, "employee deactivated");
        Ok(employee)
    }

    /// Add a login account on behalf of `actor`.
    pub fn create_user(&self, actor: &Actor, new: NewUser) -> Result<User> {
        self.require_permission(actor, Permission::ManageUsers)?;
        self.add_user(new)
    }

    /// Add a login account. The password must already be hashed.
    pub fn add_user(&self, new: NewUser) -> Result<User> {
        self.store.write(|tx| {
            if let Some(employee) = new.employee_id {
                tx.require::<Employee>(employee.0)?;
            }
            let id = UserId(tx.next_id::<User>()?);
            let user = User::create(id, new)?;
            tx.put(&user)?;
            tracing::info!(user = %user.id, role = %user.role, "user added");
            Ok(user)
        })
    }

    pub fn user(&self, id: UserId) -> Result<User> {
        self.store.read(|tx| tx.require(id.0))
    }

    /// Every account, for user administration.
    pub fn list_users(&self, actor: &Actor) -> Result<Vec<User>> {
        self.require_permission(actor, Permission::ManageUsers)?;
        self.store.read(|tx| tx.all())
    }

    /// Edit an account. Nobody can deactivate their own account.
    pub fn update_user(&self, actor: &Actor, id: UserId, update: UserUpdate) -> Result<User> {
        self.require_permission(actor, Permission::ManageUsers)?;
        if id == actor.user_id && update.active == Some(false) {
            return Err(AppraisalError::validation("you cannot deactivate your own account"));
        }
        let user = self.store.write(|tx| {
            let mut user: User = tx.require(id.0)?;
            if let Some(Some(employee)) = update.employee_id {
                tx.require::<Employee>(employee.0)?;
            }
            user.update(update)?;
            tx.put(&user)?;
            Ok(user)
        })?;
        tracing::info!(user = %id, role = %user.role, active = user.active, by = %actor.user_id, "user updated");
        Ok(user)
    }

    pub fn deactivate_user(&self, actor: &Actor, id: UserId) -> Result<User> {
        self.update_user(
            actor,
            id,
            UserUpdate {
                active: Some(false),
                ..UserUpdate::default()
            },
        )
    }

    // -------------------------------------------------------------------------
    // Departments and positions
    // -------------------------------------------------------------------------

    /// Active departments, by name.
    pub fn departments(&self) -> Result<Vec<Department>> {
        let mut departments: Vec<Department> = self
            .store
            .read(|tx| tx.all::<Department>())?
            .into_iter()
            .filter(|d| d.active)
            .collect();
        departments.sort_by_key(|d| d.name.to_lowercase());
        Ok(departments)
    }

    pub fn create_department(&self, actor: &Actor, new: NewDepartment) -> Result<Department> {
        self.require_permission(actor, Permission::ManageDepartments)?;
        self.add_department(new)
    }

    /// Create a department without an actor (seeding).
    pub fn add_department(&self, new: NewDepartment) -> Result<Department> {
        self.store.write(|tx| {
            let id = DepartmentId(tx.next_id::<Department>()?);
            let department = Department::create(id, new)?;
            tx.put(&department)?;
            Ok(department)
        })
    }

    pub fn update_department(&self, actor: &Actor, id: DepartmentId, new: NewDepartment) -> Result<Department> {
        self.require_permission(actor, Permission::ManageDepartments)?;
        self.store.write(|tx| {
            let mut department = active_department(tx, id)?;
            department.update(new)?;
            tx.put(&department)?;
            Ok(department)
        })
    }

    /// Soft delete. Refused while active positions belong to it.
    pub fn delete_department(&self, actor: &Actor, id: DepartmentId) -> Result<Department> {
        self.require_permission(actor, Permission::ManageDepartments)?;
        self.store.write(|tx| {
            let mut department = active_department(tx, id)?;
            let positions = tx
                .all::<Position>()?
                .iter()
                .filter(|p| p.active && p.department_id == Some(id))
                .count();
            if positions > 0 {
                return Err(AppraisalError::conflict(format!(
                    "department '{}' still has {positions} position(s)",
                    department.name
                )));
            }
            department.active = false;
            tx.put(&department)?;
            Ok(department)
        })
    }

    /// Active positions, optionally of one department, by title.
    pub fn positions(&self, department: Option<DepartmentId>) -> Result<Vec<Position>> {
        let mut positions: Vec<Position> = self
            .store
            .read(|tx| tx.all::<Position>())?
            .into_iter()
            .filter(|p| p.active && department.is_none_or(|d| p.department_id == Some(d)))
            .collect();
        positions.sort_by_key(|p| p.title.to_lowercase());
        Ok(positions)
    }

    pub fn create_position(&self, actor: &Actor, new: NewPosition) -> Result<Position> {
        self.require_permission(actor, Permission::ManagePositions)?;
        self.add_position(new)
    }

    /// Create a position without an actor (seeding).
    pub fn add_position(&self, new: NewPosition) -> Result<Position> {
        self.store.write(|tx| {
            if let Some(department) = new.department_id {
                active_department(tx, department)?;
            }
            let id = PositionId(tx.next_id::<Position>()?);
            let position = Position::create(id, new)?;
            tx.put(&position)?;
            Ok(position)
        })
    }

    pub fn update_position(&self, actor: &Actor, id: PositionId, new: NewPosition) -> Result<Position> {
        self.require_permission(actor, Permission::ManagePositions)?;
        self.store.write(|tx| {
            let mut position = active_position(tx, id)?;
            if let Some(department) = new.department_id {
                active_department(tx, department)?;
            }
            position.update(new)?;
            tx.put(&position)?;
            Ok(position)
        })
    }

    pub fn delete_position(&self, actor: &Actor, id: PositionId) -> Result<Position> {
        self.require_permission(actor, Permission::ManagePositions)?;
        self.store.write(|tx| {
            let mut position = active_position(tx, id)?;
            position.active = false;
            tx.put(&position)?;
            Ok(position)
        })
    }

    /// Account by email (case-insensitive).
    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.store.read(|tx| match tx.lookup(&unique_key("user_email", &[email]))? {
            Some(id) => tx.get(id),
            None => Ok(None),
        })
    }

    /// Account by username (case-insensitive).
    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.store.read(|tx| match tx.lookup(&unique_key("username", &[username]))? {
            Some(id) => tx.get(id),
            None => Ok(None),
        })
    }

    // -------------------------------------------------------------------------
    // Review periods
    // -------------------------------------------------------------------------

    pub fn create_period(&self, actor: &Actor, new: NewPeriod, now: DateTime<Utc>) -> Result<ReviewPeriod> {
        self.require_permission(actor, Permission::CreateReviewPeriod)?;
        self.add_period(new, now)
    }

    /// Create a period without an actor (CLI).
    pub fn add_period(&self, new: NewPeriod, now: DateTime<Utc>) -> Result<ReviewPeriod> {
        let period = self.store.write(|tx| {
            let id = ReviewPeriodId(tx.next_id::<ReviewPeriod>()?);
            let period = ReviewPeriod::create(id, new, now)?;
            tx.put(&period)?;
            Ok(period)
        })?;
        tracing::info!(period = %period.id, name = %period.name, "review period created");
        Ok(period)
    }

    /// All periods, latest start first.
    pub fn list_periods(&self) -> Result<Vec<ReviewPeriod>> {
        let mut periods: Vec<ReviewPeriod> = self.store.read(|tx| tx.all())?;
        periods.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(a.id.cmp(&b.id)));
        Ok(periods)
    }

    pub fn period(&self, id: ReviewPeriodId) -> Result<ReviewPeriod> {
        self.store.read(|tx| tx.require(id.0))
    }

    /// Open periods with their score-card counts. At most one period is
    /// open at a time.
    pub fn active_periods(&self) -> Result<Vec<PeriodOverview>> {
        self.store.read(|tx| {
            let cards: Vec<ScoreCard> = tx.all()?;
            Ok(tx
                .all::<ReviewPeriod>()?
                .into_iter()
                .filter(ReviewPeriod::is_open)
                .map(|period| PeriodOverview {
                    score_cards: cards.iter().filter(|c| c.review_period_id == period.id).count(),
                    period,
                })
                .collect())
        })
    }

    pub fn update_period(
        &self,
        actor: &Actor,
        id: ReviewPeriodId,
        update: PeriodUpdate,
        now: DateTime<Utc>,
    ) -> Result<ReviewPeriod> {
        self.require_permission(actor, Permission::EditReviewPeriod)?;
        self.store.write(|tx| {
            let mut period: ReviewPeriod = tx.require(id.0)?;
            period.update(update, now.date_naive(), now)?;
            tx.put(&period)?;
            Ok(period)
        })
    }

    /// Delete a period that has no score cards.
    pub fn delete_period(&self, actor: &Actor, id: ReviewPeriodId) -> Result<()> {
        self.require_permission(actor, Permission::DeleteReviewPeriod)?;
        self.store.write(|tx| {
            tx.require::<ReviewPeriod>(id.0)?;
            let cards = tx
                .all::<ScoreCard>()?
                .iter()
                .filter(|card| card.review_period_id == id)
                .count();
            if cards > 0 {
                return Err(AppraisalError::conflict(format!(
                    "review period {id} has {cards} score card(s)"
                )));
            }
            tx.remove::<ReviewPeriod>(id.0)?;
            Ok(())
        })
    }

    pub fn open_period(&self, actor: &Actor, id: ReviewPeriodId, now: DateTime<Utc>) -> Result<ReviewPeriod> {
        self.require_permission(actor, Permission::OpenReviewPeriod)?;
        self.set_period_open(id, true, now)
    }

    pub fn close_period(&self, actor: &Actor, id: ReviewPeriodId, now: DateTime<Utc>) -> Result<ReviewPeriod> {
        self.require_permission(actor, Permission::CloseReviewPeriod)?;
        self.set_period_open(id, false, now)
    }

    /// Open or close a period. Opening one closes any other open period.
    pub fn set_period_open(&self, id: ReviewPeriodId, open: bool, now: DateTime<Utc>) -> Result<ReviewPeriod> {
        let period = self.store.write(|tx| {
            let mut period: ReviewPeriod = tx.require(id.0)?;
            if open {
                period.open(now.date_naive(), now)?;
                for mut other in tx.all::<ReviewPeriod>()? {
                    if other.id != id && other.is_open() {
                        other.close(now);
                        tx.put(&other)?;
                        tracing::info!(period = %other.id, "review period closed by opening another");
                    }
                }
            } else {
                period.close(now);
            }
            tx.put(&period)?;
            Ok(period)
        })?;
        tracing::info!(period = %period.id, status = %period.status, "review period status changed");
        Ok(period)
    }

    // -------------------------------------------------------------------------
    // Eligibility and generation
    // -------------------------------------------------------------------------

    pub fn create_profile(&self, actor: &Actor, new: NewProfile) -> Result<EligibilityProfile> {
        self.require_permission(actor, Permission::GenerateScoreCards)?;
        self.add_profile(new)
    }

    /// Create a profile without an actor (seeding, CLI).
    pub fn add_profile(&self, new: NewProfile) -> Result<EligibilityProfile> {
        self.store.write(|tx| {
            let id = ProfileId(tx.next_id::<EligibilityProfile>()?);
            let profile = EligibilityProfile::create(id, new)?;
            tx.put(&profile)?;
            Ok(profile)
        })
    }

    pub fn profile(&self, id: ProfileId) -> Result<EligibilityProfile> {
        self.store.read(|tx| tx.require(id.0))
    }

    /// Ids of employees `profile` currently selects.
    pub fn matching_employees(&self, id: ProfileId) -> Result<Vec<EmployeeId>> {
        self.store.read(|tx| {
            let profile: EligibilityProfile = tx.require(id.0)?;
            let roles = account_roles(&tx.all::<User>()?);
            Ok(match_profile(&profile, &tx.all::<Employee>()?, &roles))
        })
    }

    /// Active profiles with their match counts.
    pub fn profiles_with_counts(&self) -> Result<Vec<ProfileCount>> {
        self.store.read(|tx| {
            let employees: Vec<Employee> = tx.all()?;
            let roles = account_roles(&tx.all::<User>()?);
            Ok(tx
                .all::<EligibilityProfile>()?
                .into_iter()
                .filter(|profile| profile.active)
                .map(|profile| ProfileCount {
                    matching_employees: match_profile(&profile, &employees, &roles).len(),
                    profile,
                })
                .collect())
        })
    }

    /// Create `Plan Not Started` cards for everyone the profiles match.
    ///
    /// Employees that already have a card for the period, that an earlier
    /// profile in the list already covered, or that have no active login
    /// account to accept a plan with, are counted as skipped.
    pub fn generate_score_cards(
        &self,
        actor: &Actor,
        period_id: ReviewPeriodId,
        profile_ids: &[ProfileId],
        weightage_override: Option<Weightage>,
        now: DateTime<Utc>,
    ) -> Result<GenerationReport> {
        self.require_permission(actor, Permission::GenerateScoreCards)?;
        self.generate(period_id, profile_ids, weightage_override, now)
    }

    /// Generation without an actor (CLI).
    pub fn generate(
        &self,
        period_id: ReviewPeriodId,
        profile_ids: &[ProfileId],
        weightage_override: Option<Weightage>,
        now: DateTime<Utc>,
    ) -> Result<GenerationReport> {
        if profile_ids.is_empty() {
            return Err(AppraisalError::validation("select at least one eligibility profile"));
        }
        let report = self.store.write(|tx| {
            let period: ReviewPeriod = tx.require(period_id.0)?;
            period.require_open()?;
            let employees: Vec<Employee> = tx.all()?;
            let roles = account_roles(&tx.all::<User>()?);

            let mut report = GenerationReport::default();
            let mut seen = BTreeSet::new();
            for profile_id in profile_ids {
                let profile: EligibilityProfile = tx.require(profile_id.0)?;
                if !profile.active {
                    return Err(AppraisalError::validation(format!(
                        "eligibility profile '{}' is inactive",
                        profile.name
                    )));
                }
                let weightage = weightage_override.unwrap_or(profile.weightage);
                for employee_id in match_profile(&profile, &employees, &roles) {
                    let key = unique_key(
                        "card",
                        &[&employee_id.to_string(), &period_id.to_string()],
                    );
                    if !seen.insert(employee_id) || tx.lookup(&key)?.is_some() {
                        report.skipped += 1;
                        continue;
                    }
                    if !roles.contains_key(&employee_id) {
                        report.skipped += 1;
                        report.without_account.push(employee_id);
                        continue;
                    }
                    let id = ScoreCardId(tx.next_id::<ScoreCard>()?);
                    tx.put(&ScoreCard::new(id, employee_id, period_id, weightage, now))?;
                    report.created.push(id);
                }
            }
            Ok(report)
        })?;
        tracing::info!(
            period = %period_id,
            created = report.created.len(),
            skipped = report.skipped,
            without_account = report.without_account.len(),
            "score cards generated"
        );
        Ok(report)
    }

    /// Create one card by hand.
    pub fn create_score_card(
        &self,
        actor: &Actor,
        period_id: ReviewPeriodId,
        employee_id: EmployeeId,
        weightage: Option<Weightage>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.require_permission(actor, Permission::GenerateScoreCards)?;
        self.store.write(|tx| {
            tx.require::<ReviewPeriod>(period_id.0)?.require_open()?;
            tx.require::<Employee>(employee_id.0)?;
            let id = ScoreCardId(tx.next_id::<ScoreCard>()?);
            let card = ScoreCard::new(id, employee_id, period_id, weightage.unwrap_or_default(), now);
            tx.put(&card)?;
            Ok(card)
        })
    }

    /// HR may delete a card whose plan has not started.
    pub fn delete_score_card(&self, actor: &Actor, id: ScoreCardId) -> Result<()> {
        self.store.write(|tx| {
            let card: ScoreCard = tx.require(id.0)?;
            if card_party(actor, &card, |e| tx.require(e.0))? != Contributor::Hr {
                return Err(AppraisalError::forbidden("only HR may delete score cards"));
            }
            if card.status != ScoreCardStatus::PlanNotStarted {
                return Err(AppraisalError::InvalidTransition {
                    action: "delete the score card",
                    from: card.status,
                });
            }
            tx.remove::<ScoreCard>(id.0)?;
            Ok(())
        })?;
        tracing::info!(score_card = %id, by = %actor.user_id, "score card deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Score cards: reads
    // -------------------------------------------------------------------------

    /// One card, if `actor` may see it.
    pub fn score_card(&self, actor: &Actor, id: ScoreCardId) -> Result<ScoreCard> {
        self.store.read(|tx| {
            let card: ScoreCard = tx.require(id.0)?;
            card_party(actor, &card, |e| tx.require(e.0))?;
            Ok(card)
        })
    }

    /// Cards `actor` may see, filtered.
    pub fn list_score_cards(&self, actor: &Actor, filter: CardFilter) -> Result<Vec<ScoreCard>> {
        require_card_access(actor)?;
        self.store.read(|tx| {
            let mut visible = Vec::new();
            for card in tx.all::<ScoreCard>()? {
                if !filter.accepts(&card) {
                    continue;
                }
                match card_party(actor, &card, |e| tx.require(e.0)) {
                    Ok(_) => visible.push(card),
                    Err(AppraisalError::Forbidden(_)) => {}
                    Err(err) => return Err(err),
                }
            }
            Ok(visible)
        })
    }

    pub fn summary(&self, actor: &Actor, id: ScoreCardId) -> Result<ScoreCardSummary> {
        Ok(self.score_card(actor, id)?.summary())
    }

    // -------------------------------------------------------------------------
    // Score cards: mutations
    // -------------------------------------------------------------------------

    /// Load, scope-check, mutate and store one card in one transaction.
    fn mutate_card<T>(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        expected_version: Option<u64>,
        needs_open_period: bool,
        f: impl FnOnce(&WriteTx<'_>, &mut ScoreCard, Contributor) -> Result<T>,
    ) -> Result<(T, ScoreCard)> {
        self.store.write(|tx| {
            let mut card: ScoreCard = tx.require(id.0)?;
            let party = card_party(actor, &card, |e| tx.require(e.0))?;
            card.check_version(expected_version)?;
            if needs_open_period {
                tx.require::<ReviewPeriod>(card.review_period_id.0)?
                    .require_open()?;
            }
            let out = f(tx, &mut card, party)?;
            tx.put(&card)?;
            Ok((out, card))
        })
    }

    /// Add a goal, competency or value. Template fields fill in blanks.
    pub fn add_item(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        section: Section,
        item: AddItem,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<(ItemId, ScoreCard)> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            require_planner_grant(tx, actor, party, Permission::CreateGoal)?;
            let new = match item.template_id {
                Some(template_id) => {
                    let template: LibraryEntry = tx.require(template_id.0)?;
                    if !template.active || template.kind.section() != section {
                        return Err(AppraisalError::validation(format!(
                            "template {template_id} is not an active {section} template"
                        )));
                    }
                    let mut new = template.to_item(item.weight);
                    if !item.name.trim().is_empty() {
                        new.name = item.name;
                    }
                    if !item.description.trim().is_empty() {
                        new.description = item.description;
                    }
                    new
                }
                None => NewItem {
                    name: item.name,
                    description: item.description,
                    weight: item.weight,
                    template_id: None,
                },
            };
            card.add_item(section, party, new, now)
        })
    }

    pub fn update_item(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        item_id: ItemId,
        update: ItemUpdate,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            require_planner_grant(tx, actor, party, Permission::EditGoal)?;
            card.update_item(item_id, party, update, now)
        })
        .map(|(_, card)| card)
    }

    pub fn set_item_progress(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        item_id: ItemId,
        progress: ItemStatus,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            require_planner_grant(tx, actor, party, Permission::EditGoal)?;
            card.set_item_progress(item_id, progress, party, now)
        })
        .map(|(_, card)| card)
    }

    pub fn remove_item(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        item_id: ItemId,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            require_planner_grant(tx, actor, party, Permission::DeleteGoal)?;
            card.remove_item(item_id, party, now)
        })
        .map(|(_, card)| card)
    }

    pub fn set_weightage(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        weightage: Weightage,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            require_planner_grant(tx, actor, party, Permission::UpdateScoreCardWeightage)?;
            card.set_weightage(weightage, party, now)
        })
        .map(|(_, card)| card)
    }

    pub fn rebalance_weightage(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        section: Section,
        value: u8,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            require_planner_grant(tx, actor, party, Permission::UpdateScoreCardWeightage)?;
            card.rebalance_weightage(section, value, party, now)
        })
        .map(|(_, card)| card)
    }

    /// Planner hands the plan to the employee.
    pub fn send_for_acceptance(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            require_planner_grant(tx, actor, party, Permission::SendScoreCardAcceptance)?;
            card.send_for_acceptance(party, now)?;
            if let Some(recipient) = user_of(tx, card.employee_id)? {
                notify(
                    tx,
                    Draft::score_card(recipient, card.id, "Your performance plan is ready for your acceptance"),
                    now,
                )?;
            }
            Ok(())
        })
        .map(|(_, card)| card)
    }

    fn require_employee(party: Contributor, action: &str) -> Result<()> {
        if party == Contributor::Employee {
            Ok(())
        } else {
            Err(AppraisalError::forbidden(format!(
                "only the employee may {action} their plan"
            )))
        }
    }

    pub fn accept(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            Self::require_employee(party, "accept")?;
            card.accept(now)?;
            if let Some(recipient) = manager_user_of(tx, card.employee_id)? {
                let name = employee_name(tx, card.employee_id)?;
                notify(
                    tx,
                    Draft::score_card(recipient, card.id, format!("{name} accepted their performance plan")),
                    now,
                )?;
            }
            Ok(())
        })
        .map(|(_, card)| card)
    }

    /// Employee rejects the plan; the reason is kept as a comment.
    pub fn reject(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        reason: &str,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            Self::require_employee(party, "reject")?;
            card.reject(reason, actor.user_id, now)?;
            if let Some(recipient) = manager_user_of(tx, card.employee_id)? {
                let name = employee_name(tx, card.employee_id)?;
                notify(
                    tx,
                    Draft::score_card(
                        recipient,
                        card.id,
                        format!("{name} rejected their performance plan: {}", reason.trim()),
                    ),
                    now,
                )?;
            }
            Ok(())
        })
        .map(|(_, card)| card)
    }

    pub fn start_evaluation(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            if party != Contributor::Hr {
                return Err(AppraisalError::forbidden("only HR may start evaluation"));
            }
            card.start_evaluation(now)?;
            if let Some(recipient) = user_of(tx, card.employee_id)? {
                notify(
                    tx,
                    Draft::score_card(recipient, card.id, "Evaluation has started: your self evaluation is due"),
                    now,
                )?;
            }
            Ok(())
        })
        .map(|(_, card)| card)
    }

    /// Save a draft rating as the actor's party.
    pub fn rate_item(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        item_id: ItemId,
        rating: Option<Rating>,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |_, card, party| {
            card.rate_item(RatingSource::from(party), item_id, rating, now)
        })
        .map(|(_, card)| card)
    }

    /// Submit the actor's ratings and notify whoever evaluates next.
    pub fn submit_ratings(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ScoreCard> {
        self.mutate_card(actor, id, expected_version, true, |tx, card, party| {
            let next = card.submit_ratings(RatingSource::from(party), now)?;
            let name = employee_name(tx, card.employee_id)?;
            let drafts: Vec<Draft> = match next {
                ScoreCardStatus::PendingManagerEvaluation => manager_user_of(tx, card.employee_id)?
                    .map(|manager| {
                        Draft::score_card(manager, card.id, format!("{name} submitted a self evaluation"))
                    })
                    .into_iter()
                    .collect(),
                ScoreCardStatus::PendingHrEvaluation => hr_users(tx)?
                    .into_iter()
                    .map(|hr| {
                        Draft::score_card(hr, card.id, format!("Manager evaluation of {name} is ready for HR"))
                    })
                    .collect(),
                ScoreCardStatus::EvaluationComplete => user_of(tx, card.employee_id)?
                    .map(|employee| {
                        Draft::score_card(employee, card.id, "Your evaluation is complete")
                    })
                    .into_iter()
                    .collect(),
                _ => Vec::new(),
            };
            for draft in drafts {
                notify(tx, draft, now)?;
            }
            Ok(())
        })
        .map(|(_, card)| card)
    }

    /// Append a comment. Allowed in any status, even with the period closed.
    pub fn add_comment(
        &self,
        actor: &Actor,
        id: ScoreCardId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<(CommentId, ScoreCard)> {
        self.mutate_card(actor, id, None, false, |_, card, party| {
            card.add_comment(party, actor.user_id, text, now)
        })
    }

    // -------------------------------------------------------------------------
    // Libraries
    // -------------------------------------------------------------------------

    /// Templates of one kind, by name.
    pub fn library(&self, kind: LibraryKind, include_inactive: bool) -> Result<Vec<LibraryEntry>> {
        let mut entries: Vec<LibraryEntry> = self
            .store
            .read(|tx| tx.all::<LibraryEntry>())?
            .into_iter()
            .filter(|e| e.kind == kind && (include_inactive || e.active))
            .collect();
        entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(entries)
    }

    pub fn create_library_entry(&self, actor: &Actor, kind: LibraryKind, new: NewEntry) -> Result<LibraryEntry> {
        self.require_permission(actor, library_permission(kind, LibraryChange::Create))?;
        self.add_library_entry(kind, new)
    }

    /// Create a template without an actor (seeding).
    pub fn add_library_entry(&self, kind: LibraryKind, new: NewEntry) -> Result<LibraryEntry> {
        self.store.write(|tx| {
            let id = TemplateId(tx.next_id::<LibraryEntry>()?);
            let entry = LibraryEntry::create(id, kind, new)?;
            tx.put(&entry)?;
            Ok(entry)
        })
    }

    /// Edit a template. Cards that copied it keep their own text.
    pub fn update_library_entry(
        &self,
        actor: &Actor,
        kind: LibraryKind,
        id: TemplateId,
        update: EntryUpdate,
    ) -> Result<LibraryEntry> {
        self.require_permission(actor, library_permission(kind, LibraryChange::Edit))?;
        self.store.write(|tx| {
            let mut entry: LibraryEntry = tx.require(id.0)?;
            if entry.kind != kind || !entry.active {
                return Err(AppraisalError::not_found("library entry", id));
            }
            entry.update(update)?;
            tx.put(&entry)?;
            Ok(entry)
        })
    }

    /// Soft delete.
    pub fn deactivate_library_entry(&self, actor: &Actor, kind: LibraryKind, id: TemplateId) -> Result<LibraryEntry> {
        self.require_permission(actor, library_permission(kind, LibraryChange::Delete))?;
        self.store.write(|tx| {
            let mut entry: LibraryEntry = tx.require(id.0)?;
            if entry.kind != kind {
                return Err(AppraisalError::not_found("library entry", id));
            }
            entry.active = false;
            tx.put(&entry)?;
            Ok(entry)
        })
    }

    /// Distinct categories of active templates.
    pub fn categories(&self, kind: LibraryKind) -> Result<Vec<String>> {
        let categories: BTreeSet<String> = self
            .library(kind, false)?
            .into_iter()
            .filter_map(|entry| entry.category)
            .collect();
        Ok(categories.into_iter().collect())
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    pub fn unread_notifications(&self, actor: &Actor) -> Result<Vec<Notification>> {
        Ok(self
            .store
            .read(|tx| tx.all::<Notification>())?
            .into_iter()
            .filter(|n| n.recipient == actor.user_id && !n.read)
            .collect())
    }

    pub fn mark_notification_read(&self, actor: &Actor, id: NotificationId) -> Result<Notification> {
        self.store.write(|tx| {
            let mut notification: Notification = tx.require(id.0)?;
            notification.mark_read(actor.user_id)?;
            tx.put(&notification)?;
            Ok(notification)
        })
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    pub fn stats(&self) -> Result<CycleStats> {
        self.store.read(|tx| {
            let mut cards_by_status = BTreeMap::new();
            for card in tx.all::<ScoreCard>()? {
                *cards_by_status.entry(card.status).or_insert(0) += 1;
            }
            Ok(CycleStats {
                periods: tx.count::<ReviewPeriod>()?,
                open_periods: tx
                    .all::<ReviewPeriod>()?
                    .iter()
                    .filter(|p| p.is_open())
                    .count(),
                employees: tx.count::<Employee>()?,
                users: tx.count::<User>()?,
                profiles: tx.count::<EligibilityProfile>()?,
                library_entries: tx.count::<LibraryEntry>()?,
                departments: tx.count::<Department>()?,
                positions: tx.count::<Position>()?,
                score_cards: tx.count::<ScoreCard>()?,
                cards_by_status,
            })
        })
    }

    pub fn export(&self) -> Result<Snapshot> {
        self.store.export()
    }

    pub fn import(&self, snapshot: &Snapshot) -> Result<usize> {
        let count = self.store.import(snapshot)?;
        tracing::info!(records = count, "snapshot imported");
        Ok(count)
    }
}

/// Role of each employee's active login account.
fn account_roles(users: &[User]) -> BTreeMap<EmployeeId, Role> {
    users
        .iter()
        .filter(|user| user.active)
        .filter_map(|user| user.employee_id.map(|employee| (employee, user.role)))
        .collect()
}

fn match_profile(
    profile: &EligibilityProfile,
    employees: &[Employee],
    roles: &BTreeMap<EmployeeId, Role>,
) -> Vec<EmployeeId> {
    employees
        .iter()
        .filter(|employee| profile.matches(employee, roles.get(&employee.id).copied()))
        .map(|employee| employee.id)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
