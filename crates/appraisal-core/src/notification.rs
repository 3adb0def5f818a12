//! In-app notifications raised by score-card transitions.

use crate::error::{AppraisalError, Result};
use crate::{NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    ScoreCard,
    ReviewPeriod,
}

/// A notification for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub message: String,
    pub entity_type: EntityType,
    pub entity_id: u64,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub recipient: UserId,
    pub message: String,
    pub entity_type: EntityType,
    pub entity_id: u64,
}

impl Draft {
    pub fn score_card(recipient: UserId, card: crate::ScoreCardId, message: impl Into<String>) -> Self {
        Self {
            recipient,
            message: message.into(),
            entity_type: EntityType::ScoreCard,
            entity_id: card.0,
        }
    }

    pub fn into_notification(self, id: NotificationId, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            recipient: self.recipient,
            message: self.message,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            read: false,
            created_at: now,
        }
    }
}

impl Notification {
    /// Only the recipient may mark a notification read.
    pub fn mark_read(&mut self, by: UserId) -> Result<()> {
        if self.recipient != by {
            return Err(AppraisalError::forbidden(
                "notifications can only be marked read by their recipient",
            ));
        }
        self.read = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScoreCardId;

    #[test]
    fn only_recipient_marks_read() {
        let mut n = Draft::score_card(UserId(4), ScoreCardId(1), "Plan sent for acceptance")
            .into_notification(NotificationId(1), Utc::now());
        assert!(!n.read);
        assert!(n.mark_read(UserId(3)).is_err());
        n.mark_read(UserId(4)).expect("mark read");
        assert!(n.read);
    }
}
