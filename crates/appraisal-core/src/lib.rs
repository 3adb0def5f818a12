//! # Appraisal Core
//!
//! The performance review cycle engine: review periods, eligibility-based
//! score-card generation, goal/competency/value planning, multi-party
//! evaluation and the weighted rating aggregator.
//!
//! ## Layout
//!
//! - [`scorecard`]: the score-card record and its status state machine
//! - [`rating`]: fixed-point ratings and the aggregator
//! - [`weightage`]: the goals/competencies/values split
//! - [`period`], [`eligibility`], [`library`], [`notification`]: supporting records
//! - [`directory`], [`organization`]: employees, accounts, departments and positions
//! - [`access`]: roles, permission codes and the navigation table
//! - [`storage`]: the redb-backed store, one write transaction per mutation
//! - [`cycle`]: actor-checked operations composed over the store
//! - [`formats`]: record encoding and snapshot export/import
//!
//! No float arithmetic is used anywhere: ratings are hundredths, weights are
//! whole percentages.

pub mod access;
pub mod cycle;
pub mod directory;
pub mod eligibility;
pub mod error;
pub mod formats;
pub mod library;
pub mod notification;
pub mod organization;
pub mod period;
pub mod primitives;
pub mod rating;
pub mod scorecard;
pub mod status;
pub mod storage;
pub mod weightage;

pub use access::{Permission, PermissionSet, Role};
pub use cycle::{Actor, ReviewCycle};
pub use directory::{Employee, EmploymentStatus, User};
pub use eligibility::EligibilityProfile;
pub use error::{AppraisalError, Result};
pub use library::{LibraryEntry, LibraryKind};
pub use notification::Notification;
pub use organization::{Department, Position};
pub use period::{PeriodStatus, PeriodType, ReviewPeriod};
pub use rating::{Rating, RatingAverage, RatingSource};
pub use scorecard::{Contributor, ItemStatus, PlanItem, PlanningComment, ScoreCard};
pub use status::ScoreCardStatus;
pub use storage::Store;
pub use weightage::{Section, Weightage};

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identifier of a review period.
    ReviewPeriodId
);
id_type!(
    /// Identifier of a score card.
    ScoreCardId
);
id_type!(
    /// Identifier of a goal, competency or value inside a score card.
    ItemId
);
id_type!(
    /// Identifier of an employee record.
    EmployeeId
);
id_type!(
    /// Identifier of a login account.
    UserId
);
id_type!(
    /// Identifier of an eligibility profile.
    ProfileId
);
id_type!(
    /// Identifier of a library template.
    TemplateId
);
id_type!(
    /// Identifier of a notification.
    NotificationId
);
id_type!(
    /// Identifier of a planning comment.
    CommentId
);
id_type!(
    /// Identifier of a department.
    DepartmentId
);
id_type!(
    /// Identifier of a position.
    PositionId
);
