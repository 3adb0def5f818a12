//! Departments and positions.
//!
//! Employees carry department and position by name, which is what
//! eligibility profiles match on. These records are the catalog those names
//! are picked from. Deleting one only deactivates it and frees its name.

use crate::error::{AppraisalError, Result};
use crate::primitives::{MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::{DepartmentId, PositionId};
use serde::{Deserialize, Serialize};

/// Input for a new department, or its replacement fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub description: String,
    pub active: bool,
}

impl Department {
    pub fn create(id: DepartmentId, new: NewDepartment) -> Result<Self> {
        Ok(Self {
            id,
            name: name("department name", &new.name)?,
            description: text(&new.description)?,
            active: true,
        })
    }

    /// Rename or redescribe in place.
    pub fn update(&mut self, new: NewDepartment) -> Result<()> {
        let next = Self::create(self.id, new)?;
        self.name = next.name;
        self.description = next.description;
        Ok(())
    }
}

/// Input for a new position, or its replacement fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosition {
    pub title: String,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub title: String,
    pub department_id: Option<DepartmentId>,
    pub grade_level: Option<String>,
    pub description: String,
    pub active: bool,
}

impl Position {
    pub fn create(id: PositionId, new: NewPosition) -> Result<Self> {
        Ok(Self {
            id,
            title: name("position title", &new.title)?,
            department_id: new.department_id,
            grade_level: new
                .grade_level
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty()),
            description: text(&new.description)?,
            active: true,
        })
    }

    pub fn update(&mut self, new: NewPosition) -> Result<()> {
        let next = Self::create(self.id, new)?;
        *self = Self {
            active: self.active,
            ..next
        };
        Ok(())
    }
}

fn name(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppraisalError::validation(format!("{field} is required")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(AppraisalError::validation(format!("{field} is too long")));
    }
    Ok(value.to_string())
}

fn text(value: &str) -> Result<String> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppraisalError::validation("description is too long"));
    }
    Ok(value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_name_is_trimmed_and_required() {
        let d = Department::create(
            DepartmentId(1),
            NewDepartment {
                name: "  Engineering ".to_string(),
                description: String::new(),
            },
        )
        .expect("department");
        assert_eq!(d.name, "Engineering");
        assert!(d.active);
        assert!(Department::create(DepartmentId(2), NewDepartment::default()).is_err());
    }

    #[test]
    fn position_update_keeps_id_and_state() {
        let mut p = Position::create(
            PositionId(4),
            NewPosition {
                title: "Developer".to_string(),
                grade_level: Some(" ".to_string()),
                ..NewPosition::default()
            },
        )
        .expect("position");
        assert_eq!(p.grade_level, None);
        p.active = false;
        p.update(NewPosition {
            title: "Senior Developer".to_string(),
            department_id: Some(DepartmentId(1)),
            grade_level: Some("L5".to_string()),
            description: String::new(),
        })
        .expect("update");
        assert_eq!(p.id, PositionId(4));
        assert_eq!(p.title, "Senior Developer");
        assert_eq!(p.grade_level.as_deref(), Some("L5"));
        assert!(!p.active);
    }
}
