//! # Libraries
//!
//! Reusable goal, competency and value templates that planners copy onto
//! score cards. Names are unique per kind, ignoring case. Removing an entry
//! only deactivates it, so cards that reference it keep a valid link.

use crate::error::{AppraisalError, Result};
use crate::primitives::{
    DEFAULT_SUGGESTED_WEIGHT, MAX_GOAL_WEIGHT, MAX_NAME_LEN, MAX_TEXT_LEN, MIN_GOAL_WEIGHT,
};
use crate::scorecard::NewItem;
use crate::weightage::Section;
use crate::TemplateId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which library an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    Goals,
    Competencies,
    Values,
}

impl LibraryKind {
    pub const ALL: [Self; 3] = [Self::Goals, Self::Competencies, Self::Values];

    pub fn as_str(self) -> &'static str {
        self.section().as_str()
    }

    /// Score-card section the templates are copied into.
    pub fn section(self) -> Section {
        match self {
            Self::Goals => Section::Goals,
            Self::Competencies => Section::Competencies,
            Self::Values => Section::Values,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::Goals => 1,
            Self::Competencies => 2,
            Self::Values => 3,
        }
    }
}

impl From<Section> for LibraryKind {
    fn from(section: Section) -> Self {
        match section {
            Section::Goals => Self::Goals,
            Section::Competencies => Self::Competencies,
            Section::Values => Self::Values,
        }
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibraryKind {
    type Err = AppraisalError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<Section>().map(Self::from)
    }
}

/// Input for a new template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub suggested_weight: Option<u8>,
}

/// Partial edit of a template. `None` leaves a field unchanged; an empty
/// category clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub suggested_weight: Option<u8>,
}

/// A library template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: TemplateId,
    pub kind: LibraryKind,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    /// Goals only.
    pub suggested_weight: Option<u8>,
    pub active: bool,
}

impl LibraryEntry {
    pub fn create(id: TemplateId, kind: LibraryKind, new: NewEntry) -> Result<Self> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(AppraisalError::validation(format!("{kind} template name is required")));
        }
        if name.chars().count() > MAX_NAME_LEN || new.description.chars().count() > MAX_TEXT_LEN {
            return Err(AppraisalError::validation("template name or description is too long"));
        }
        let suggested_weight = match kind {
            LibraryKind::Goals => {
                let weight = new.suggested_weight.unwrap_or(DEFAULT_SUGGESTED_WEIGHT);
                if !(MIN_GOAL_WEIGHT..=MAX_GOAL_WEIGHT).contains(&weight) {
                    return Err(AppraisalError::validation(format!(
                        "suggested weight {weight}% is out of range"
                    )));
                }
                Some(weight)
            }
            LibraryKind::Competencies | LibraryKind::Values => None,
        };
        Ok(Self {
            id,
            kind,
            name: name.to_string(),
            description: new.description.trim().to_string(),
            category: new
                .category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            suggested_weight,
            active: true,
        })
    }

    /// Apply `update` with the same validation as [`LibraryEntry::create`].
    pub fn update(&mut self, update: EntryUpdate) -> Result<()> {
        let merged = NewEntry {
            name: update.name.unwrap_or_else(|| self.name.clone()),
            description: update.description.unwrap_or_else(|| self.description.clone()),
            category: update.category.or_else(|| self.category.clone()),
            suggested_weight: update.suggested_weight.or(self.suggested_weight),
        };
        let next = Self::create(self.id, self.kind, merged)?;
        *self = Self {
            active: self.active,
            ..next
        };
        Ok(())
    }

    /// Plan item prefilled from this template. `weight` overrides the
    /// suggested weight.
    pub fn to_item(&self, weight: Option<u8>) -> NewItem {
        NewItem {
            name: self.name.clone(),
            description: self.description.clone(),
            weight: match self.kind {
                LibraryKind::Goals => weight.or(self.suggested_weight),
                LibraryKind::Competencies | LibraryKind::Values => None,
            },
            template_id: Some(self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: LibraryKind, weight: Option<u8>) -> Result<LibraryEntry> {
        LibraryEntry::create(
            TemplateId(1),
            kind,
            NewEntry {
                name: " Improve test coverage ".to_string(),
                description: String::new(),
                category: Some("Quality".to_string()),
                suggested_weight: weight,
            },
        )
    }

    #[test]
    fn goal_templates_default_to_ten_percent() {
        let e = entry(LibraryKind::Goals, None).expect("entry");
        assert_eq!(e.suggested_weight, Some(10));
        assert_eq!(e.name, "Improve test coverage");
        assert_eq!(e.to_item(None).weight, Some(10));
        assert_eq!(e.to_item(Some(25)).weight, Some(25));
    }

    #[test]
    fn value_templates_carry_no_weight() {
        let e = entry(LibraryKind::Values, Some(30)).expect("entry");
        assert_eq!(e.suggested_weight, None);
        assert_eq!(e.to_item(Some(30)).weight, None);
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        assert!(entry(LibraryKind::Goals, Some(0)).is_err());
    }

    #[test]
    fn update_merges_and_revalidates() {
        let mut e = entry(LibraryKind::Goals, Some(20)).expect("entry");
        e.update(EntryUpdate {
            description: Some("Cover the billing module".to_string()),
            category: Some(" ".to_string()),
            ..EntryUpdate::default()
        })
        .expect("update");
        assert_eq!(e.name, "Improve test coverage");
        assert_eq!(e.suggested_weight, Some(20));
        assert_eq!(e.category, None);

        let before = e.clone();
        let bad = EntryUpdate {
            name: Some("   ".to_string()),
            ..EntryUpdate::default()
        };
        assert!(e.update(bad).is_err());
        assert_eq!(e, before);
    }

    #[test]
    fn kind_parses_from_path_segments() {
        assert_eq!("competencies".parse::<LibraryKind>().ok(), Some(LibraryKind::Competencies));
        assert!("skills".parse::<LibraryKind>().is_err());
    }
}
