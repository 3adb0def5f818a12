//! Bounds shared across the core.

/// Ratings are stored in hundredths: 5.00 is 500.
pub const RATING_SCALE: u16 = 100;

/// Highest rating a party may give, in hundredths.
pub const MAX_RATING_CENTI: u16 = 5 * RATING_SCALE;

/// Weightage sections must add up to this.
pub const WEIGHTAGE_TOTAL: u8 = 100;

/// Rebalanced weightage snaps to multiples of this step.
pub const WEIGHTAGE_STEP: u8 = 5;

/// Goal weight bounds, whole percent.
pub const MIN_GOAL_WEIGHT: u8 = 1;
pub const MAX_GOAL_WEIGHT: u8 = 100;

/// Suggested weight for goal templates that don't name one.
pub const DEFAULT_SUGGESTED_WEIGHT: u8 = 10;

/// Maximum length of names (periods, items, profiles, templates).
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length of free text (descriptions, comments, reasons).
pub const MAX_TEXT_LEN: usize = 4000;

/// Period types accepted by the review period service.
pub const PERIOD_TYPES: &[&str] = &["Q1", "Q2", "Q3", "Q4", "Annual", "Mid-Year"];

/// Department filter / position criteria value that matches everyone.
pub const MATCH_ALL: &str = "All";
