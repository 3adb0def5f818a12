//! # Score Card Status
//!
//! The lifecycle is linear. Only one backward edge exists: an employee
//! rejecting a plan sends it back to `Plan Started`.
//!
//! ```text
//! Plan Not Started → Plan Started → Planning in Progress
//!     → Pending Employee Acceptance → Plan Finalized
//!     → Evaluation Started → Pending Manager Evaluation
//!     → Pending HR Evaluation → Evaluation Complete
//! ```

use crate::error::{AppraisalError, Result};
use crate::rating::RatingSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a score card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScoreCardStatus {
    #[serde(rename = "Plan Not Started")]
    PlanNotStarted,
    #[serde(rename = "Plan Started")]
    PlanStarted,
    #[serde(rename = "Planning in Progress")]
    PlanningInProgress,
    #[serde(rename = "Pending Employee Acceptance")]
    PendingEmployeeAcceptance,
    #[serde(rename = "Plan Finalized")]
    PlanFinalized,
    #[serde(rename = "Evaluation Started")]
    EvaluationStarted,
    #[serde(rename = "Pending Manager Evaluation")]
    PendingManagerEvaluation,
    #[serde(rename = "Pending HR Evaluation")]
    PendingHrEvaluation,
    #[serde(rename = "Evaluation Complete")]
    EvaluationComplete,
}

impl ScoreCardStatus {
    /// Every status in lifecycle order.
    pub const ALL: [Self; 9] = [
        Self::PlanNotStarted,
        Self::PlanStarted,
        Self::PlanningInProgress,
        Self::PendingEmployeeAcceptance,
        Self::PlanFinalized,
        Self::EvaluationStarted,
        Self::PendingManagerEvaluation,
        Self::PendingHrEvaluation,
        Self::EvaluationComplete,
    ];

    /// Display label, as shown to users.
    pub fn label(self) -> &'static str {
        match self {
            Self::PlanNotStarted => "Plan Not Started",
            Self::PlanStarted => "Plan Started",
            Self::PlanningInProgress => "Planning in Progress",
            Self::PendingEmployeeAcceptance => "Pending Employee Acceptance",
            Self::PlanFinalized => "Plan Finalized",
            Self::EvaluationStarted => "Evaluation Started",
            Self::PendingManagerEvaluation => "Pending Manager Evaluation",
            Self::PendingHrEvaluation => "Pending HR Evaluation",
            Self::EvaluationComplete => "Evaluation Complete",
        }
    }

    /// Plan items, weightage and goal weights may be edited.
    pub fn is_plan_editable(self) -> bool {
        matches!(
            self,
            Self::PlanNotStarted | Self::PlanStarted | Self::PlanningInProgress
        )
    }

    /// The party whose ratings are expected in this status.
    pub fn rating_turn(self) -> Option<RatingSource> {
        match self {
            Self::EvaluationStarted => Some(RatingSource::Employee),
            Self::PendingManagerEvaluation => Some(RatingSource::Manager),
            Self::PendingHrEvaluation => Some(RatingSource::Hr),
            _ => None,
        }
    }

    /// Status reached once the party whose turn it is submits ratings.
    pub fn after_submission(self) -> Option<Self> {
        match self {
            Self::EvaluationStarted => Some(Self::PendingManagerEvaluation),
            Self::PendingManagerEvaluation => Some(Self::PendingHrEvaluation),
            Self::PendingHrEvaluation => Some(Self::EvaluationComplete),
            _ => None,
        }
    }
}

impl fmt::Display for ScoreCardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScoreCardStatus {
    type Err = AppraisalError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppraisalError::validation(format!("unknown status '{wanted}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_order_is_linear() {
        let mut sorted = ScoreCardStatus::ALL;
        sorted.sort();
        assert_eq!(sorted, ScoreCardStatus::ALL);
    }

    #[test]
    fn labels_roundtrip_through_from_str() {
        for status in ScoreCardStatus::ALL {
            assert_eq!(status.label().parse::<ScoreCardStatus>().ok(), Some(status));
        }
        assert!("pending hr evaluation".parse::<ScoreCardStatus>().is_ok());
        assert!("Archived".parse::<ScoreCardStatus>().is_err());
    }

    #[test]
    fn plan_is_frozen_from_pending_acceptance_on() {
        assert!(ScoreCardStatus::PlanningInProgress.is_plan_editable());
        assert!(!ScoreCardStatus::PendingEmployeeAcceptance.is_plan_editable());
        assert!(!ScoreCardStatus::PlanFinalized.is_plan_editable());
    }

    #[test]
    fn rating_turns_follow_evaluation_order() {
        let mut status = ScoreCardStatus::EvaluationStarted;
        let mut turns = Vec::new();
        while let Some(source) = status.rating_turn() {
            turns.push(source);
            status = status.after_submission().unwrap_or(status);
        }
        assert_eq!(
            turns,
            vec![RatingSource::Employee, RatingSource::Manager, RatingSource::Hr]
        );
        assert_eq!(status, ScoreCardStatus::EvaluationComplete);
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&ScoreCardStatus::PendingHrEvaluation).ok();
        assert_eq!(json.as_deref(), Some("\"Pending HR Evaluation\""));
    }
}
