//! # Weightage
//!
//! The percentage split between goals, competencies and values. A
//! [`Weightage`] always adds up to 100: the constructor and the serde path
//! both validate, so an invalid split cannot be stored.

use crate::error::{AppraisalError, Result};
use crate::primitives::{WEIGHTAGE_STEP, WEIGHTAGE_TOTAL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three sections of a score card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Goals,
    Competencies,
    Values,
}

impl Section {
    pub const ALL: [Self; 3] = [Self::Goals, Self::Competencies, Self::Values];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Goals => "goals",
            Self::Competencies => "competencies",
            Self::Values => "values",
        }
    }

    /// The two sections other than `self`, in declaration order.
    fn others(self) -> [Self; 2] {
        match self {
            Self::Goals => [Self::Competencies, Self::Values],
            Self::Competencies => [Self::Goals, Self::Values],
            Self::Values => [Self::Goals, Self::Competencies],
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = AppraisalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "goals" | "goal" => Ok(Self::Goals),
            "competencies" | "competency" => Ok(Self::Competencies),
            "values" | "value" => Ok(Self::Values),
            other => Err(AppraisalError::validation(format!(
                "unknown section '{other}'"
            ))),
        }
    }
}

/// Unvalidated wire form.
#[derive(Debug, Clone, Copy, Deserialize)]
struct RawWeightage {
    goals: u8,
    competencies: u8,
    values: u8,
}

/// Percentage split between the sections; always sums to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWeightage")]
pub struct Weightage {
    goals: u8,
    competencies: u8,
    values: u8,
}

impl Default for Weightage {
    /// 60 / 25 / 15, the split HR starts planning from.
    fn default() -> Self {
        Self {
            goals: 60,
            competencies: 25,
            values: 15,
        }
    }
}

impl TryFrom<RawWeightage> for Weightage {
    type Error = AppraisalError;

    fn try_from(raw: RawWeightage) -> Result<Self> {
        Self::new(raw.goals, raw.competencies, raw.values)
    }
}

impl Weightage {
    /// Validate and build a weightage.
    pub fn new(goals: u8, competencies: u8, values: u8) -> Result<Self> {
        let total = u16::from(goals) + u16::from(competencies) + u16::from(values);
        if total != u16::from(WEIGHTAGE_TOTAL) {
            return Err(AppraisalError::validation(format!(
                "weightage must total {WEIGHTAGE_TOTAL}%, got {total}% \
                 (goals {goals}, competencies {competencies}, values {values})"
            )));
        }
        Ok(Self {
            goals,
            competencies,
            values,
        })
    }

    pub fn goals(&self) -> u8 {
        self.goals
    }

    pub fn competencies(&self) -> u8 {
        self.competencies
    }

    pub fn values(&self) -> u8 {
        self.values
    }

    pub fn get(&self, section: Section) -> u8 {
        match section {
            Section::Goals => self.goals,
            Section::Competencies => self.competencies,
            Section::Values => self.values,
        }
    }

    fn set(&mut self, section: Section, value: u8) {
        match section {
            Section::Goals => self.goals = value,
            Section::Competencies => self.competencies = value,
            Section::Values => self.values = value,
        }
    }

    /// Set one section and spread the remainder over the other two in
    /// proportion to their current share, snapped to multiples of 5.
    ///
    /// The second of the other sections takes whatever the rounding leaves,
    /// so the result still totals 100.
    pub fn rebalance(&self, changed: Section, value: u8) -> Result<Self> {
        if value > WEIGHTAGE_TOTAL {
            return Err(AppraisalError::validation(format!(
                "{changed} weightage {value}% exceeds {WEIGHTAGE_TOTAL}%"
            )));
        }
        let remaining = u32::from(WEIGHTAGE_TOTAL - value);
        let [first, second] = changed.others();
        let current_first = u32::from(self.get(first));
        let other_total = current_first + u32::from(self.get(second));
        let step = u32::from(WEIGHTAGE_STEP);

        let first_value = if other_total == 0 {
            // Nothing to be proportional to: split evenly.
            snap_half_up(remaining, 2, step)
        } else {
            snap_half_up(remaining * current_first, other_total, step)
        }
        .min(remaining);

        let mut next = *self;
        next.set(changed, value);
        next.set(first, first_value as u8);
        next.set(second, (remaining - first_value) as u8);
        Self::new(next.goals, next.competencies, next.values)
    }
}

/// `round(numerator / denominator / step) * step`, half-up, integers only.
fn snap_half_up(numerator: u32, denominator: u32, step: u32) -> u32 {
    let scaled = denominator * step;
    ((numerator * 2 + scaled) / (scaled * 2)) * step
}

impl fmt::Display for Weightage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "goals {}% / competencies {}% / values {}%",
            self.goals, self.competencies, self.values
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
