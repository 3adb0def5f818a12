//! # Ratings and Aggregation
//!
//! Ratings are fixed-point hundredths in `0..=500` (0.00 to 5.00). Averages
//! round half-up to two decimals in integer arithmetic, so the same inputs
//! always give the same result on every platform.
//!
//! Aggregates never fail: with nothing to average they are
//! [`RatingAverage::NotAvailable`], rendered as `N/A`.

use crate::error::{AppraisalError, Result};
use crate::primitives::{MAX_RATING_CENTI, RATING_SCALE};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// RATING SOURCE
// =============================================================================

/// The party a rating comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingSource {
    Employee,
    Manager,
    Hr,
}

impl RatingSource {
    pub const ALL: [Self; 3] = [Self::Employee, Self::Manager, Self::Hr];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::Hr => "hr",
        }
    }
}

impl fmt::Display for RatingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatingSource {
    type Err = AppraisalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(Self::Employee),
            "manager" => Ok(Self::Manager),
            "hr" => Ok(Self::Hr),
            other => Err(AppraisalError::validation(format!(
                "unknown rating source '{other}'"
            ))),
        }
    }
}

// =============================================================================
// RATING
// =============================================================================

/// A rating between 0.00 and 5.00, stored in hundredths.
///
/// Human-readable formats (JSON) carry it as a number such as `4.5`; binary
/// formats carry the raw hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(u16);

impl Rating {
    /// Build from hundredths (`470` is 4.70).
    pub fn from_centi(centi: u16) -> Result<Self> {
        if centi > MAX_RATING_CENTI {
            return Err(AppraisalError::validation(format!(
                "rating {} is above 5",
                Self(centi)
            )));
        }
        Ok(Self(centi))
    }

    /// Build from a whole number of points.
    pub fn from_points(points: u8) -> Result<Self> {
        Self::from_centi(u16::from(points).saturating_mul(RATING_SCALE))
    }

    /// Hundredths.
    pub fn centi(self) -> u16 {
        self.0
    }

    /// Parse a decimal such as `4`, `4.5` or `4.25`.
    pub fn parse_decimal(text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = || AppraisalError::validation(format!("invalid rating '{text}'"));

        let (whole, frac) = match text.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (text, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let frac = frac.trim_end_matches('0');
        if frac.len() > 2 {
            return Err(AppraisalError::validation(format!(
                "rating '{text}' has more than two decimals"
            )));
        }

        let whole: u16 = whole.parse().map_err(|_| invalid())?;
        let frac_centi: u16 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u16>().map_err(|_| invalid())?.saturating_mul(10),
            _ => frac.parse().map_err(|_| invalid())?,
        };
        let centi = whole
            .checked_mul(RATING_SCALE)
            .and_then(|c| c.checked_add(frac_centi))
            .ok_or_else(invalid)?;
        Self::from_centi(centi)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / RATING_SCALE, self.0 % RATING_SCALE)
    }
}

impl FromStr for Rating {
    type Err = AppraisalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_decimal(s)
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            // Parsing the canonical text avoids any float arithmetic.
            let value: f64 = match self.to_string().parse() {
                Ok(value) => value,
                Err(err) => return Err(serde::ser::Error::custom(err)),
            };
            serializer.serialize_f64(value)
        } else {
            serializer.serialize_u16(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(RatingVisitor)
        } else {
            let centi = u16::deserialize(deserializer)?;
            Self::from_centi(centi).map_err(de::Error::custom)
        }
    }
}

struct RatingVisitor;

impl Visitor<'_> for RatingVisitor {
    type Value = Rating;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a rating between 0 and 5 with at most two decimals")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Rating, E> {
        let points = u8::try_from(v).map_err(|_| E::custom(format!("rating {v} is above 5")))?;
        Rating::from_points(points).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Rating, E> {
        let v = u64::try_from(v).map_err(|_| E::custom(format!("rating {v} is negative")))?;
        self.visit_u64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Rating, E> {
        if v.is_sign_negative() {
            return Err(E::custom(format!("rating {v} is negative")));
        }
        Rating::parse_decimal(&v.to_string()).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Rating, E> {
        Rating::parse_decimal(v).map_err(E::custom)
    }
}

// =============================================================================
// PER-ITEM RATINGS
// =============================================================================

/// The up-to-three ratings carried by a plan item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    pub employee: Option<Rating>,
    pub manager: Option<Rating>,
    pub hr: Option<Rating>,
}

impl Ratings {
    pub fn get(&self, source: RatingSource) -> Option<Rating> {
        match source {
            RatingSource::Employee => self.employee,
            RatingSource::Manager => self.manager,
            RatingSource::Hr => self.hr,
        }
    }

    pub fn set(&mut self, source: RatingSource, rating: Option<Rating>) {
        match source {
            RatingSource::Employee => self.employee = rating,
            RatingSource::Manager => self.manager = rating,
            RatingSource::Hr => self.hr = rating,
        }
    }
}

// =============================================================================
// AGGREGATES
// =============================================================================

/// Result of an aggregation: a rating or `N/A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingAverage {
    Value(Rating),
    NotAvailable,
}

impl RatingAverage {
    pub fn value(self) -> Option<Rating> {
        match self {
            Self::Value(rating) => Some(rating),
            Self::NotAvailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl fmt::Display for RatingAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(rating) => rating.fmt(f),
            Self::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for RatingAverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Weighted average `Σ(rating × weight) / Σ(weight)` over the rated entries.
///
/// Unrated entries are skipped entirely, weight included. A zero weight sum
/// yields `N/A`.
pub fn weighted_average<I>(entries: I) -> RatingAverage
where
    I: IntoIterator<Item = (Option<Rating>, u32)>,
{
    let mut numerator: u64 = 0;
    let mut denominator: u64 = 0;

    for (rating, weight) in entries {
        let Some(rating) = rating else { continue };
        let weight = u64::from(weight);
        numerator = numerator.saturating_add(u64::from(rating.centi()).saturating_mul(weight));
        denominator = denominator.saturating_add(weight);
    }

    divide_rounded(numerator, denominator)
}

/// Arithmetic mean of the present ratings.
pub fn simple_average<I>(ratings: I) -> RatingAverage
where
    I: IntoIterator<Item = Option<Rating>>,
{
    weighted_average(ratings.into_iter().map(|rating| (rating, 1)))
}

/// `numerator / denominator` rounded half-up, as a rating.
fn divide_rounded(numerator: u64, denominator: u64) -> RatingAverage {
    if denominator == 0 {
        return RatingAverage::NotAvailable;
    }
    let doubled = numerator.saturating_mul(2).saturating_add(denominator);
    let centi = doubled / denominator.saturating_mul(2);
    // A mean of values in 0..=500 stays in 0..=500.
    match u16::try_from(centi).ok().map(Rating::from_centi) {
        Some(Ok(rating)) => RatingAverage::Value(rating),
        _ => RatingAverage::NotAvailable,
    }
}

// =============================================================================
// TESTS
// =============================================================================
