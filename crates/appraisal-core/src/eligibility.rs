//! # Eligibility Profiles
//!
//! A profile selects the employees a review period generates score cards
//! for, by department and by keywords in the position title.

use crate::access::Role;
use crate::directory::Employee;
use crate::error::{AppraisalError, Result};
use crate::primitives::{MATCH_ALL, MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::weightage::Weightage;
use crate::ProfileId;
use serde::{Deserialize, Serialize};

fn match_all() -> String {
    MATCH_ALL.to_string()
}

/// Input for a new profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "match_all")]
    pub department_filter: String,
    #[serde(default = "match_all")]
    pub position_criteria: String,
    #[serde(default)]
    pub weightage: Weightage,
}

/// An eligibility profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityProfile {
    pub id: ProfileId,
    pub name: String,
    pub description: String,
    /// `All` or an exact department name.
    pub department_filter: String,
    /// `All` or pipe-separated keywords, e.g. `Manager|Lead`.
    pub position_criteria: String,
    pub weightage: Weightage,
    pub active: bool,
}

impl EligibilityProfile {
    pub fn create(id: ProfileId, new: NewProfile) -> Result<Self> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(AppraisalError::validation("profile name is required"));
        }
        if name.chars().count() > MAX_NAME_LEN || new.description.chars().count() > MAX_TEXT_LEN {
            return Err(AppraisalError::validation("profile name or description is too long"));
        }
        Ok(Self {
            id,
            name: name.to_string(),
            description: new.description.trim().to_string(),
            department_filter: or_all(&new.department_filter),
            position_criteria: or_all(&new.position_criteria),
            weightage: new.weightage,
            active: true,
        })
    }

    fn position_keywords(&self) -> Vec<String> {
        if self.position_criteria == MATCH_ALL {
            return Vec::new();
        }
        self.position_criteria
            .split('|')
            .map(|keyword| keyword.trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect()
    }

    /// Whether `employee` is selected by this profile.
    ///
    /// `role` is the role of the employee's login account, if any. HR and
    /// user administrators are never reviewed through a profile.
    pub fn matches(&self, employee: &Employee, role: Option<Role>) -> bool {
        if !employee.is_reviewable() {
            return false;
        }
        if matches!(role, Some(Role::HrAdmin | Role::UserAdmin)) {
            return false;
        }
        if self.department_filter != MATCH_ALL
            && employee.department.as_deref() != Some(self.department_filter.as_str())
        {
            return false;
        }
        let keywords = self.position_keywords();
        if keywords.is_empty() {
            return true;
        }
        let Some(position) = employee.position.as_deref() else {
            return false;
        };
        let position = position.to_lowercase();
        keywords.iter().any(|keyword| position.contains(keyword.as_str()))
    }
}

fn or_all(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(MATCH_ALL) {
        MATCH_ALL.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{EmploymentStatus, NewEmployee};
    use crate::EmployeeId;

    fn employee(department: &str, position: &str) -> Employee {
        Employee::create(
            EmployeeId(10),
            NewEmployee {
                code: "EMP010".to_string(),
                full_name: "Test Person".to_string(),
                email: "test@pms.com".to_string(),
                department: Some(department.to_string()),
                position: Some(position.to_string()),
                manager_id: None,
                employment_status: EmploymentStatus::Active,
            },
        )
        .expect("employee")
    }

    fn profile(department: &str, positions: &str) -> EligibilityProfile {
        EligibilityProfile::create(
            ProfileId(1),
            NewProfile {
                name: "Engineering leads".to_string(),
                description: String::new(),
                department_filter: department.to_string(),
                position_criteria: positions.to_string(),
                weightage: Weightage::default(),
            },
        )
        .expect("profile")
    }

    #[test]
    fn all_matches_every_reviewable_employee() {
        let p = profile("", "All");
        assert_eq!(p.department_filter, "All");
        assert!(p.matches(&employee("IT", "Software Developer"), Some(Role::Employee)));
    }

    #[test]
    fn position_keywords_match_case_insensitive_substrings() {
        let p = profile("IT", "developer| Lead |");
        assert!(p.matches(&employee("IT", "Senior Software Developer"), None));
        assert!(p.matches(&employee("IT", "Team LEAD"), None));
        assert!(!p.matches(&employee("IT", "Tester"), None));
        assert!(!p.matches(&employee("HR", "Developer"), None));
    }

    #[test]
    fn admins_and_inactive_employees_are_excluded() {
        let p = profile("All", "All");
        let e = employee("HR", "HR Manager");
        assert!(!p.matches(&e, Some(Role::HrAdmin)));
        assert!(!p.matches(&e, Some(Role::UserAdmin)));
        assert!(p.matches(&e, Some(Role::Manager)));

        let mut gone = employee("IT", "Developer");
        gone.active = false;
        assert!(!p.matches(&gone, None));
    }

    #[test]
    fn department_filter_is_exact() {
        let p = profile("IT", "All");
        assert!(!p.matches(&employee("it", "Developer"), None));
    }

    #[test]
    fn blank_name_is_rejected() {
        let new = NewProfile {
            name: "  ".to_string(),
            description: String::new(),
            department_filter: "All".to_string(),
            position_criteria: "All".to_string(),
            weightage: Weightage::default(),
        };
        assert!(EligibilityProfile::create(ProfileId(1), new).is_err());
    }
}
