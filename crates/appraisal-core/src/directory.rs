//! Employees and login accounts.

use crate::access::Role;
use crate::error::{AppraisalError, Result};
use crate::primitives::MAX_NAME_LEN;
use crate::{EmployeeId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// HR employment status. Only `Active` employees are eligible for review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmploymentStatus {
    #[default]
    Active,
    #[serde(rename = "On Leave")]
    OnLeave,
    Inactive,
    Terminated,
}

impl fmt::Display for EmploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "Active",
            Self::OnLeave => "On Leave",
            Self::Inactive => "Inactive",
            Self::Terminated => "Terminated",
        })
    }
}

/// Input for a new employee record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub code: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub manager_id: Option<EmployeeId>,
    #[serde(default)]
    pub employment_status: EmploymentStatus,
}

/// An employee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub code: String,
    pub full_name: String,
    pub email: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub manager_id: Option<EmployeeId>,
    pub employment_status: EmploymentStatus,
    pub active: bool,
}

impl Employee {
    pub fn create(id: EmployeeId, new: NewEmployee) -> Result<Self> {
        let code = required("employee code", &new.code)?;
        let full_name = required("full name", &new.full_name)?;
        let email = validate_email(&new.email)?;
        if new.manager_id == Some(id) {
            return Err(AppraisalError::validation(
                "an employee cannot be their own reporting manager",
            ));
        }
        Ok(Self {
            id,
            code,
            full_name,
            email,
            department: optional(new.department),
            position: optional(new.position),
            manager_id: new.manager_id,
            employment_status: new.employment_status,
            active: true,
        })
    }

    /// Apply a partial edit. The code cannot change.
    pub fn update(&mut self, update: EmployeeUpdate) -> Result<()> {
        if update.manager_id == Some(Some(self.id)) {
            return Err(AppraisalError::validation(
                "an employee cannot be their own reporting manager",
            ));
        }
        let full_name = update
            .full_name
            .as_deref()
            .map(|name| required("full name", name))
            .transpose()?;
        let email = update.email.as_deref().map(validate_email).transpose()?;
        if let Some(full_name) = full_name {
            self.full_name = full_name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(department) = update.department {
            self.department = optional(Some(department));
        }
        if let Some(position) = update.position {
            self.position = optional(Some(position));
        }
        if let Some(manager_id) = update.manager_id {
            self.manager_id = manager_id;
        }
        if let Some(status) = update.employment_status {
            self.employment_status = status;
        }
        Ok(())
    }

    /// Active record with `Active` employment status.
    pub fn is_reviewable(&self) -> bool {
        self.active && self.employment_status == EmploymentStatus::Active
    }

    pub fn reports_to(&self, manager: EmployeeId) -> bool {
        self.manager_id == Some(manager)
    }
}

/// Partial edit of an employee. `None` leaves a field unchanged; an empty
/// department or position clears it and `manager_id: Some(None)` removes the
/// reporting line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmployeeUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub manager_id: Option<Option<EmployeeId>>,
    #[serde(default)]
    pub employment_status: Option<EmploymentStatus>,
}

/// Keeps an explicit `null` apart from a missing field.
pub fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A login account. `password_hash` is a PHC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub employee_id: Option<EmployeeId>,
    pub active: bool,
}

/// Input for a new account. The password is hashed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub employee_id: Option<EmployeeId>,
}

impl User {
    pub fn create(id: UserId, new: NewUser) -> Result<Self> {
        let username = required("username", &new.username)?;
        let email = validate_email(&new.email)?;
        if new.password_hash.is_empty() {
            return Err(AppraisalError::validation("password is required"));
        }
        Ok(Self {
            id,
            username,
            email,
            password_hash: new.password_hash,
            role: new.role,
            employee_id: new.employee_id,
            active: true,
        })
    }

    /// Apply a partial edit. Deactivated accounts cannot sign in.
    pub fn update(&mut self, update: UserUpdate) -> Result<()> {
        let username = update
            .username
            .as_deref()
            .map(|name| required("username", name))
            .transpose()?;
        let email = update.email.as_deref().map(validate_email).transpose()?;
        if update.password_hash.as_deref() == Some("") {
            return Err(AppraisalError::validation("password is required"));
        }
        if let Some(username) = username {
            self.username = username;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(hash) = update.password_hash {
            self.password_hash = hash;
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(employee_id) = update.employee_id {
            self.employee_id = employee_id;
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        Ok(())
    }

    /// Public view without the password hash.
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            employee_id: self.employee_id,
            active: self.active,
        }
    }
}

/// Partial edit of an account. The password, if any, is already hashed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub employee_id: Option<Option<EmployeeId>>,
    pub active: Option<bool>,
}

/// What API responses show of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub employee_id: Option<EmployeeId>,
    pub active: bool,
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppraisalError::validation(format!("{field} is required")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(AppraisalError::validation(format!("{field} is too long")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Emails are compared lowercase.
fn validate_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppraisalError::validation(format!("invalid email '{email}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_employee() -> NewEmployee {
        NewEmployee {
            code: "EMP003".to_string(),
            full_name: "Regular Employee".to_string(),
            email: "Employee@PMS.com".to_string(),
            department: Some("IT".to_string()),
            position: Some("  ".to_string()),
            manager_id: Some(EmployeeId(2)),
            employment_status: EmploymentStatus::Active,
        }
    }

    #[test]
    fn create_normalizes_fields() {
        let e = Employee::create(EmployeeId(3), new_employee()).expect("employee");
        assert_eq!(e.email, "employee@pms.com");
        assert_eq!(e.position, None);
        assert!(e.reports_to(EmployeeId(2)));
        assert!(e.is_reviewable());
    }

    #[test]
    fn self_manager_is_rejected() {
        let mut new = new_employee();
        new.manager_id = Some(EmployeeId(3));
        assert!(Employee::create(EmployeeId(3), new).is_err());
    }

    #[test]
    fn on_leave_is_not_reviewable() {
        let mut new = new_employee();
        new.employment_status = EmploymentStatus::OnLeave;
        let e = Employee::create(EmployeeId(3), new).expect("employee");
        assert!(!e.is_reviewable());
    }

    #[test]
    fn update_changes_only_given_fields() {
        let mut e = Employee::create(EmployeeId(3), new_employee()).expect("employee");
        e.update(EmployeeUpdate {
            position: Some("Senior Developer".to_string()),
            department: Some(" ".to_string()),
            manager_id: Some(None),
            ..EmployeeUpdate::default()
        })
        .expect("update");
        assert_eq!(e.position.as_deref(), Some("Senior Developer"));
        assert_eq!(e.department, None);
        assert_eq!(e.manager_id, None);
        assert_eq!(e.full_name, "Regular Employee");

        let own = EmployeeUpdate {
            manager_id: Some(Some(EmployeeId(3))),
            ..EmployeeUpdate::default()
        };
        assert!(e.update(own).is_err());
    }

    #[test]
    fn manager_null_differs_from_missing() {
        let missing: EmployeeUpdate = serde_json::from_str("{}").unwrap_or_default();
        assert_eq!(missing.manager_id, None);
        let cleared: EmployeeUpdate =
            serde_json::from_str(r#"{"manager_id": null}"#).unwrap_or_default();
        assert_eq!(cleared.manager_id, Some(None));
        let set: EmployeeUpdate = serde_json::from_str(r#"{"manager_id": 2}"#).unwrap_or_default();
        assert_eq!(set.manager_id, Some(Some(EmployeeId(2))));
    }

    #[test]
    fn user_view_drops_hash() {
        let user = User::create(
            UserId(1),
            NewUser {
                username: "hr".to_string(),
                email: "hr@pms.com".to_string(),
                password_hash: "$argon2id$fake".to_string(),
                role: Role::HrAdmin,
                employee_id: Some(EmployeeId(1)),
            },
        )
        .expect("user");
        let json = serde_json::to_string(&user.view()).unwrap_or_default();
        assert!(!json.contains("password_hash"));
        assert!(json.contains("HR Admin"));
    }
}
