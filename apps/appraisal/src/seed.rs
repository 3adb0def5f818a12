//! Demo data: departments and positions, three employees, the four standard
//! accounts, the standard eligibility profiles and a starter library. Safe to run repeatedly;
//! records that already exist are left alone.

use crate::api::auth::hash_password;
use appraisal_core::directory::{NewEmployee, NewUser};
use appraisal_core::eligibility::NewProfile;
use appraisal_core::library::NewEntry;
use appraisal_core::organization::{NewDepartment, NewPosition};
use appraisal_core::{EmployeeId, LibraryKind, ReviewCycle, Role, Weightage};
use serde::Serialize;
use std::error::Error;

/// What a seed run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub departments: usize,
    pub positions: usize,
    pub employees: usize,
    pub users: usize,
    pub profiles: usize,
    pub templates: usize,
}

struct SeedEmployee {
    code: &'static str,
    name: &'static str,
    email: &'static str,
    department: &'static str,
    position: &'static str,
    manager: Option<&'static str>,
}

const EMPLOYEES: &[SeedEmployee] = &[
    SeedEmployee {
        code: "EMP001",
        name: "HR Manager",
        email: "hr@pms.com",
        department: "HR",
        position: "HR Manager",
        manager: None,
    },
    SeedEmployee {
        code: "EMP002",
        name: "Team Manager",
        email: "manager@pms.com",
        department: "Management",
        position: "Team Manager",
        manager: None,
    },
    SeedEmployee {
        code: "EMP003",
        name: "Regular Employee",
        email: "employee@pms.com",
        department: "IT",
        position: "Software Developer",
        manager: Some("EMP002"),
    },
];

/// `(department, position titles)`
const ORGANIZATION: &[(&str, &[&str])] = &[
    ("HR", &["HR Manager"]),
    ("Management", &["Team Manager"]),
    ("IT", &["Software Developer"]),
];

/// `(username, email, password, role, employee code)`
const USERS: &[(&str, &str, &str, Role, Option<&str>)] = &[
    ("admin", "admin@pms.com", "admin123", Role::UserAdmin, None),
    ("hr", "hr@pms.com", "hr123", Role::HrAdmin, Some("EMP001")),
    ("manager", "manager@pms.com", "manager123", Role::Manager, Some("EMP002")),
    ("employee", "employee@pms.com", "employee123", Role::Employee, Some("EMP003")),
];

/// `(name, description, department filter, position keywords)`
const PROFILES: &[(&str, &str, &str, &str)] = &[
    (
        "Manager Profile",
        "All employees in managerial positions across departments",
        "All",
        "Manager|Director|Lead|Head",
    ),
    (
        "Software Developer Profile",
        "Developers and engineers in IT",
        "IT",
        "Software Developer|Engineer|Developer|Programmer",
    ),
    (
        "Senior Software Engineer Profile",
        "Senior technical staff in IT",
        "IT",
        "Senior|Principal|Staff Engineer|Architect",
    ),
    ("Sales Team Profile", "All sales department employees", "Sales", "All"),
    ("HR Team Profile", "All HR department employees", "HR", "All"),
];

/// `(kind, name, category)`
const TEMPLATES: &[(LibraryKind, &str, &str)] = &[
    (LibraryKind::Goals, "Deliver quarterly roadmap", "Delivery"),
    (LibraryKind::Goals, "Improve test coverage", "Quality"),
    (LibraryKind::Goals, "Mentor a team member", "People"),
    (LibraryKind::Competencies, "Communication", "Interpersonal"),
    (LibraryKind::Competencies, "Problem Solving", "Technical"),
    (LibraryKind::Values, "Integrity", "Core"),
    (LibraryKind::Values, "Customer Focus", "Core"),
];

fn employee_id(cycle: &ReviewCycle, code: &str) -> Result<Option<EmployeeId>, Box<dyn Error>> {
    Ok(cycle.employee_by_code(code)?.map(|employee| employee.id))
}

/// Seed the demo data set.
pub fn seed_demo(cycle: &ReviewCycle) -> Result<SeedReport, Box<dyn Error>> {
    let mut report = SeedReport::default();

    for &(department, titles) in ORGANIZATION {
        let existing = cycle
            .departments()?
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(department));
        let department_id = match existing {
            Some(d) => d.id,
            None => {
                report.departments += 1;
                cycle
                    .add_department(NewDepartment {
                        name: department.to_string(),
                        description: String::new(),
                    })?
                    .id
            }
        };
        let positions = cycle.positions(Some(department_id))?;
        for &title in titles {
            if positions.iter().any(|p| p.title.eq_ignore_ascii_case(title)) {
                continue;
            }
            cycle.add_position(NewPosition {
                title: title.to_string(),
                department_id: Some(department_id),
                ..NewPosition::default()
            })?;
            report.positions += 1;
        }
    }

    for seed in EMPLOYEES {
        if cycle.employee_by_code(seed.code)?.is_some() {
            continue;
        }
        let manager_id = match seed.manager {
            Some(code) => employee_id(cycle, code)?,
            None => None,
        };
        cycle.add_employee(NewEmployee {
            code: seed.code.to_string(),
            full_name: seed.name.to_string(),
            email: seed.email.to_string(),
            department: Some(seed.department.to_string()),
            position: Some(seed.position.to_string()),
            manager_id,
            ..NewEmployee::default()
        })?;
        report.employees += 1;
    }

    for &(username, email, password, role, code) in USERS {
        if cycle.user_by_username(username)?.is_some() {
            continue;
        }
        let employee_id = match code {
            Some(code) => employee_id(cycle, code)?,
            None => None,
        };
        cycle.add_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            role,
            employee_id,
        })?;
        report.users += 1;
    }

    let existing: Vec<String> = cycle
        .profiles_with_counts()?
        .into_iter()
        .map(|count| count.profile.name.to_lowercase())
        .collect();
    for &(name, description, department, positions) in PROFILES {
        if existing.contains(&name.to_lowercase()) {
            continue;
        }
        cycle.add_profile(NewProfile {
            name: name.to_string(),
            description: description.to_string(),
            department_filter: department.to_string(),
            position_criteria: positions.to_string(),
            weightage: Weightage::default(),
        })?;
        report.profiles += 1;
    }

    for &(kind, name, category) in TEMPLATES {
        let taken = cycle
            .library(kind, false)?
            .iter()
            .any(|entry| entry.name.eq_ignore_ascii_case(name));
        if taken {
            continue;
        }
        cycle.add_library_entry(
            kind,
            NewEntry {
                name: name.to_string(),
                category: Some(category.to_string()),
                ..NewEntry::default()
            },
        )?;
        report.templates += 1;
    }

    tracing::info!(
        departments = report.departments,
        positions = report.positions,
        employees = report.employees,
        users = report.users,
        profiles = report.profiles,
        templates = report.templates,
        "demo data seeded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use appraisal_core::Store;

    #[test]
    fn seeding_is_idempotent() {
        let cycle = ReviewCycle::new(Store::in_memory().expect("store"));
        let first = seed_demo(&cycle).expect("seed");
        assert_eq!(first.departments, 3);
        assert_eq!(first.positions, 3);
        assert_eq!(first.employees, 3);
        assert_eq!(first.users, 4);
        assert_eq!(first.profiles, PROFILES.len());
        assert_eq!(first.templates, TEMPLATES.len());

        let second = seed_demo(&cycle).expect("reseed");
        assert_eq!(second, SeedReport::default());

        let employee = cycle.employee_by_code("EMP003").expect("lookup").expect("EMP003");
        let manager = cycle.employee_by_code("EMP002").expect("lookup").expect("EMP002");
        assert_eq!(employee.manager_id, Some(manager.id));

        let it = cycle
            .departments()
            .expect("departments")
            .into_iter()
            .find(|d| d.name == "IT")
            .expect("IT");
        let titles: Vec<String> = cycle
            .positions(Some(it.id))
            .expect("positions")
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, ["Software Developer"]);
    }
}
