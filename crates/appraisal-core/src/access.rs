//! # Access
//!
//! Roles, permission codes and the permission-gated navigation table.
//!
//! Access is plain set membership: each role carries a precomputed
//! [`PermissionSet`]. There is no inheritance between roles. The defaults
//! below can be replaced per role at runtime; the store keeps the result.

use crate::error::{AppraisalError, Result};
use crate::scorecard::Contributor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ROLES
// =============================================================================

/// User role. Numeric ids match the seeded role table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "User Admin")]
    UserAdmin,
    #[serde(rename = "HR Admin")]
    HrAdmin,
    Manager,
    Employee,
    #[serde(rename = "External User")]
    ExternalUser,
}

impl Role {
    pub const ALL: [Self; 5] = [
        Self::UserAdmin,
        Self::HrAdmin,
        Self::Manager,
        Self::Employee,
        Self::ExternalUser,
    ];

    pub fn id(self) -> u8 {
        match self {
            Self::UserAdmin => 1,
            Self::HrAdmin => 2,
            Self::Manager => 3,
            Self::Employee => 4,
            Self::ExternalUser => 5,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UserAdmin => "User Admin",
            Self::HrAdmin => "HR Admin",
            Self::Manager => "Manager",
            Self::Employee => "Employee",
            Self::ExternalUser => "External User",
        }
    }

    /// The party this role acts as on a score card, if any.
    pub fn contributor(self) -> Option<Contributor> {
        match self {
            Self::HrAdmin => Some(Contributor::Hr),
            Self::Manager => Some(Contributor::Manager),
            Self::Employee => Some(Contributor::Employee),
            Self::UserAdmin | Self::ExternalUser => None,
        }
    }

    /// Landing page after login.
    pub fn dashboard_route(self) -> Option<&'static str> {
        match self {
            Self::HrAdmin => Some("/hr-dashboard"),
            Self::Manager => Some("/manager-dashboard"),
            Self::Employee => Some("/employee-dashboard"),
            Self::UserAdmin | Self::ExternalUser => None,
        }
    }

    /// Grants a role starts with.
    pub fn default_permissions(self) -> PermissionSet {
        use Permission::*;
        match self {
            // Admin roles get the full administrative set.
            Self::HrAdmin | Self::UserAdmin => PermissionSet::from_iter([
                ViewPlanningPage,
                ViewScorecardsPage,
                ViewEvaluationPage,
                ViewHrManagementPage,
                ViewHrEmployeesPage,
                ViewHrDepartmentsPage,
                ViewHrPositionsPage,
                ViewHrReportsPage,
                CreateReviewPeriod,
                EditReviewPeriod,
                DeleteReviewPeriod,
                OpenReviewPeriod,
                CloseReviewPeriod,
                GenerateScoreCards,
                UpdateScoreCardWeightage,
                SendScoreCardAcceptance,
                ViewAllScoreCards,
                ViewAllEmployees,
                CreateGoal,
                EditGoal,
                DeleteGoal,
                CreateCompetency,
                EditCompetency,
                DeleteCompetency,
                CreateValue,
                EditValue,
                DeleteValue,
                CreateEmployee,
                EditEmployeeProfile,
                DeleteEmployee,
                ManageDepartments,
                ManagePositions,
                CreateEvaluation,
                EditEvaluation,
                ViewEvaluations,
                ManageUsers,
                ManagePermissions,
            ]),
            Self::Manager => PermissionSet::from_iter([
                ViewManagerDashboard,
                ViewScorecardsPage,
                ViewEvaluationPage,
                ViewTeamScoreCards,
                ViewTeamEmployees,
                CreateGoal,
                EditGoal,
                DeleteGoal,
                SendScoreCardAcceptance,
                CreateEvaluation,
                EditEvaluation,
                ViewEvaluations,
            ]),
            Self::Employee => PermissionSet::from_iter([
                ViewEmployeeDashboard,
                ViewEmployeeScorecards,
                ViewSelfEvaluation,
                ViewEmployeeRatings,
            ]),
            Self::ExternalUser => PermissionSet::default(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = AppraisalError;

    /// Accepts the label (`HR Admin`), a snake/kebab form (`hr_admin`) or the id.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        if let Ok(id) = wanted.parse::<u8>() {
            return Self::from_id(id)
                .ok_or_else(|| AppraisalError::validation(format!("unknown role id {id}")));
        }
        let folded = wanted.replace(['_', '-'], " ");
        Self::ALL
            .into_iter()
            .find(|role| role.label().eq_ignore_ascii_case(&folded))
            .ok_or_else(|| AppraisalError::validation(format!("unknown role '{wanted}'")))
    }
}

// =============================================================================
// PERMISSIONS
// =============================================================================

macro_rules! permissions {
    ($($variant:ident => $code:literal),* $(,)?) => {
        /// A permission code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Permission {
            $($variant,)*
        }

        impl Permission {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            pub fn code(self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)*
                }
            }
        }

        impl FromStr for Permission {
            type Err = AppraisalError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim() {
                    $($code => Ok(Self::$variant),)*
                    other => Err(AppraisalError::validation(format!(
                        "unknown permission '{other}'"
                    ))),
                }
            }
        }
    };
}

permissions! {
    // Pages
    ViewPlanningPage => "view_planning_page",
    ViewScorecardsPage => "view_scorecards_page",
    ViewEvaluationPage => "view_evaluation_page",
    ViewHrManagementPage => "view_hr_management_page",
    ViewHrEmployeesPage => "view_hr_employees_page",
    ViewHrDepartmentsPage => "view_hr_departments_page",
    ViewHrPositionsPage => "view_hr_positions_page",
    ViewHrReportsPage => "view_hr_reports_page",
    ViewManagerDashboard => "view_manager_dashboard",
    ViewEmployeeDashboard => "view_employee_dashboard",
    ViewEmployeeScorecards => "view_employee_scorecards",
    ViewSelfEvaluation => "view_self_evaluation",
    ViewEmployeeRatings => "view_employee_ratings",
    // Review periods
    CreateReviewPeriod => "create_review_period",
    EditReviewPeriod => "edit_review_period",
    DeleteReviewPeriod => "delete_review_period",
    OpenReviewPeriod => "open_review_period",
    CloseReviewPeriod => "close_review_period",
    // Score cards
    GenerateScoreCards => "generate_score_cards",
    UpdateScoreCardWeightage => "update_score_card_weightage",
    SendScoreCardAcceptance => "send_score_card_acceptance",
    ViewAllScoreCards => "view_all_score_cards",
    ViewTeamScoreCards => "view_team_score_cards",
    // Libraries
    CreateGoal => "create_goal",
    EditGoal => "edit_goal",
    DeleteGoal => "delete_goal",
    CreateCompetency => "create_competency",
    EditCompetency => "edit_competency",
    DeleteCompetency => "delete_competency",
    CreateValue => "create_value",
    EditValue => "edit_value",
    DeleteValue => "delete_value",
    // Directory
    ViewAllEmployees => "view_all_employees",
    ViewTeamEmployees => "view_team_employees",
    EditEmployeeProfile => "edit_employee_profile",
    DeleteEmployee => "delete_employee",
    CreateEmployee => "create_employee",
    ManageDepartments => "manage_departments",
    ManagePositions => "manage_positions",
    // Evaluations
    CreateEvaluation => "create_evaluation",
    EditEvaluation => "edit_evaluation",
    ViewEvaluations => "view_evaluations",
    // Administration
    ManageUsers => "manage_users",
    ManagePermissions => "manage_permissions",
}

impl Permission {
    /// Catalog group, as shown on the permissions page.
    pub fn category(self) -> &'static str {
        use Permission::*;
        match self {
            ViewPlanningPage | ViewScorecardsPage | ViewEvaluationPage | ViewHrManagementPage
            | ViewHrEmployeesPage | ViewHrDepartmentsPage | ViewHrPositionsPage
            | ViewHrReportsPage | ViewManagerDashboard | ViewEmployeeDashboard
            | ViewEmployeeScorecards | ViewSelfEvaluation | ViewEmployeeRatings => "pages",
            CreateReviewPeriod | EditReviewPeriod | DeleteReviewPeriod | OpenReviewPeriod
            | CloseReviewPeriod => "review_periods",
            GenerateScoreCards | UpdateScoreCardWeightage | SendScoreCardAcceptance
            | ViewAllScoreCards | ViewTeamScoreCards => "score_cards",
            CreateGoal | EditGoal | DeleteGoal | CreateCompetency | EditCompetency
            | DeleteCompetency | CreateValue | EditValue | DeleteValue => "libraries",
            ViewAllEmployees | ViewTeamEmployees | EditEmployeeProfile | DeleteEmployee
            | CreateEmployee | ManageDepartments | ManagePositions => "directory",
            CreateEvaluation | EditEvaluation | ViewEvaluations => "evaluations",
            ManageUsers | ManagePermissions => "administration",
        }
    }
}

/// One entry of the permission catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionInfo {
    pub code: Permission,
    pub category: &'static str,
}

/// Every permission code with its group, in declaration order.
pub fn catalog() -> Vec<PermissionInfo> {
    Permission::ALL
        .iter()
        .map(|&code| PermissionInfo {
            code,
            category: code.category(),
        })
        .collect()
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

/// A set of granted permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl PermissionSet {
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// True if any of `required` is granted. An empty requirement passes.
    pub fn has_any(&self, required: &[Permission]) -> bool {
        required.is_empty() || required.iter().any(|p| self.0.contains(p))
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail with `Forbidden` unless `permission` is granted.
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.contains(permission) {
            Ok(())
        } else {
            Err(AppraisalError::forbidden(format!(
                "missing permission '{permission}'"
            )))
        }
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// A UI route and the permissions that unlock it (any of them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavRoute {
    pub path: &'static str,
    pub label: &'static str,
    pub requires: &'static [Permission],
}

const fn route(
    path: &'static str,
    label: &'static str,
    requires: &'static [Permission],
) -> NavRoute {
    NavRoute {
        path,
        label,
        requires,
    }
}

/// The permission-gated pages.
pub const NAVIGATION: &[NavRoute] = &[
    route("/hr-dashboard", "HR Dashboard", &[Permission::ViewHrManagementPage]),
    route("/review-period", "Review Periods", &[Permission::CreateReviewPeriod]),
    route("/planning", "Planning", &[Permission::ViewPlanningPage]),
    route(
        "/planning/eligibility-profiles",
        "Eligibility Profiles",
        &[Permission::GenerateScoreCards],
    ),
    route("/score-cards", "Score Cards", &[Permission::ViewScorecardsPage]),
    route("/evaluation-periods", "Evaluation", &[Permission::ViewEvaluationPage]),
    route("/manager-dashboard", "Manager Dashboard", &[Permission::ViewManagerDashboard]),
    route("/manager-score-cards", "Team Score Cards", &[Permission::ViewTeamScoreCards]),
    route("/employee-dashboard", "My Dashboard", &[Permission::ViewEmployeeDashboard]),
    route(
        "/employee-score-cards",
        "My Score Cards",
        &[Permission::ViewEmployeeScorecards],
    ),
    route(
        "/employee-self-evaluation",
        "Self Evaluation",
        &[Permission::ViewSelfEvaluation],
    ),
    route("/employee-ratings", "My Ratings", &[Permission::ViewEmployeeRatings]),
    route("/hr-management", "HR Management", &[Permission::ViewHrManagementPage]),
    route("/hr-employees", "Employees", &[Permission::ViewHrEmployeesPage]),
    route("/hr-departments", "Departments", &[Permission::ViewHrDepartmentsPage]),
    route("/hr-positions", "Positions", &[Permission::ViewHrPositionsPage]),
    route("/hr-users", "Users", &[Permission::ManageUsers]),
    route("/hr-reports", "Reports", &[Permission::ViewHrReportsPage]),
    route("/hr-permissions", "Permissions", &[Permission::ManagePermissions]),
    route("/goals-library", "Goals Library", &[Permission::ViewHrManagementPage]),
];

/// Routes reachable with `granted`, in table order.
pub fn navigation(granted: &PermissionSet) -> Vec<NavRoute> {
    NAVIGATION
        .iter()
        .filter(|route| granted.has_any(route.requires))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids_match_seeded_table() {
        for role in Role::ALL {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::HrAdmin.id(), 2);
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn role_parses_labels_and_ids() {
        assert_eq!("hr_admin".parse::<Role>().ok(), Some(Role::HrAdmin));
        assert_eq!("External User".parse::<Role>().ok(), Some(Role::ExternalUser));
        assert_eq!("4".parse::<Role>().ok(), Some(Role::Employee));
        assert!("Root".parse::<Role>().is_err());
    }

    #[test]
    fn empty_requirement_always_passes() {
        let none = PermissionSet::default();
        assert!(none.has_any(&[]));
        assert!(!none.has_any(&[Permission::ManagePermissions]));
    }

    #[test]
    fn one_matching_grant_is_enough() {
        let perms = Role::Employee.default_permissions();
        assert!(perms.has_any(&[Permission::ViewSelfEvaluation, Permission::ManagePermissions]));
        assert!(!perms.has_any(&[Permission::ManageUsers, Permission::ManagePermissions]));
    }

    #[test]
    fn permission_codes_roundtrip() {
        for permission in Permission::ALL {
            assert_eq!(permission.code().parse::<Permission>().ok(), Some(*permission));
        }
        let json = serde_json::to_string(&Role::Manager.default_permissions()).unwrap_or_default();
        assert!(json.contains("\"view_manager_dashboard\""));
    }

    #[test]
    fn catalog_groups_every_code() {
        let catalog = catalog();
        assert_eq!(catalog.len(), Permission::ALL.len());
        let libraries: Vec<Permission> = catalog
            .iter()
            .filter(|entry| entry.category == "libraries")
            .map(|entry| entry.code)
            .collect();
        assert!(libraries.contains(&Permission::CreateValue));
        assert!(libraries.contains(&Permission::DeleteCompetency));
        assert!(Role::HrAdmin.default_permissions().contains(Permission::EditValue));
        assert!(!Role::Manager.default_permissions().contains(Permission::CreateValue));
    }

    #[test]
    fn navigation_follows_grants() {
        let employee = navigation(&Role::Employee.default_permissions());
        let paths: Vec<&str> = employee.iter().map(|r| r.path).collect();
        assert!(paths.contains(&"/employee-dashboard"));
        assert!(!paths.contains(&"/hr-permissions"));

        let hr = navigation(&Role::HrAdmin.default_permissions());
        assert!(hr.iter().any(|r| r.path == "/hr-permissions"));
        assert!(navigation(&Role::ExternalUser.default_permissions()).is_empty());
    }

    #[test]
    fn dashboards_per_role() {
        assert_eq!(Role::Manager.dashboard_route(), Some("/manager-dashboard"));
        assert_eq!(Role::ExternalUser.dashboard_route(), None);
    }
}
