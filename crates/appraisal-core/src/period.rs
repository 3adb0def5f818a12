//! # Review Periods
//!
//! A review period frames one planning/evaluation round. Planning and
//! evaluation only proceed while the period is open, and at most one period
//! is open at a time (the store closes the others when one is opened).

use crate::error::{AppraisalError, Result};
use crate::primitives::{MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::ReviewPeriodId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of review period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    Q1,
    Q2,
    Q3,
    Q4,
    Annual,
    #[serde(rename = "Mid-Year")]
    MidYear,
}

impl PeriodType {
    pub const ALL: [Self; 6] = [
        Self::Q1,
        Self::Q2,
        Self::Q3,
        Self::Q4,
        Self::Annual,
        Self::MidYear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
            Self::Annual => "Annual",
            Self::MidYear => "Mid-Year",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = AppraisalError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == wanted)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|ty| ty.as_str()).collect();
                AppraisalError::validation(format!(
                    "period type must be one of: {}",
                    allowed.join(", ")
                ))
            })
    }
}

/// Whether planning and evaluation may proceed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodStatus {
    Open,
    #[default]
    Closed,
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
        })
    }
}

/// Input for a new review period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPeriod {
    pub name: String,
    pub period_type: PeriodType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub financial_period: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Partial edit of a review period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub period_type: Option<PeriodType>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub financial_period: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A review period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPeriod {
    pub id: ReviewPeriodId,
    pub name: String,
    pub period_type: PeriodType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub financial_period: Option<String>,
    pub description: String,
    pub status: PeriodStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewPeriod {
    /// Validate input and build a closed period.
    pub fn create(id: ReviewPeriodId, new: NewPeriod, now: DateTime<Utc>) -> Result<Self> {
        let name = validate_period_name(&new.name)?;
        validate_dates(new.start_date, new.end_date)?;
        if new.description.chars().count() > MAX_TEXT_LEN {
            return Err(AppraisalError::validation("description is too long"));
        }
        Ok(Self {
            id,
            name,
            period_type: new.period_type,
            start_date: new.start_date,
            end_date: new.end_date,
            financial_period: new.financial_period.filter(|fp| !fp.trim().is_empty()),
            description: new.description.trim().to_string(),
            status: PeriodStatus::Closed,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }

    /// Closed and already over. Historical periods are read-only.
    pub fn is_historical(&self, today: NaiveDate) -> bool {
        self.status == PeriodStatus::Closed && self.end_date < today
    }

    fn require_mutable(&self, today: NaiveDate) -> Result<()> {
        if self.is_historical(today) {
            return Err(AppraisalError::validation(format!(
                "review period '{}' ended on {} and can no longer be changed",
                self.name, self.end_date
            )));
        }
        Ok(())
    }

    /// Fail unless planning and evaluation may proceed.
    pub fn require_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AppraisalError::validation(format!(
                "review period '{}' is closed",
                self.name
            )))
        }
    }

    /// Apply a partial update. Dates are revalidated together.
    pub fn update(&mut self, update: PeriodUpdate, today: NaiveDate, now: DateTime<Utc>) -> Result<()> {
        self.require_mutable(today)?;
        let name = update.name.as_deref().map(validate_period_name).transpose()?;
        let start = update.start_date.unwrap_or(self.start_date);
        let end = update.end_date.unwrap_or(self.end_date);
        validate_dates(start, end)?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(period_type) = update.period_type {
            self.period_type = period_type;
        }
        self.start_date = start;
        self.end_date = end;
        if let Some(fp) = update.financial_period {
            self.financial_period = Some(fp).filter(|fp| !fp.trim().is_empty());
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn open(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Result<()> {
        self.require_mutable(today)?;
        self.status = PeriodStatus::Open;
        self.updated_at = now;
        Ok(())
    }

    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = PeriodStatus::Closed;
        self.updated_at = now;
    }
}

fn validate_period_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppraisalError::validation("period name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppraisalError::validation("period name is too long"));
    }
    Ok(name.to_string())
}

fn validate_dates(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end <= start {
        return Err(AppraisalError::validation(format!(
            "end date {end} must be after start date {start}"
        )));
    }
    Ok(())
}
