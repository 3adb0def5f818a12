//! # Score Card
//!
//! One employee's plan and evaluation for one review period, together with
//! the status state machine that governs it.
//!
//! Every method here checks the status rules and the party making the change.
//! Whether that party is allowed to touch this particular card at all (the
//! reporting line, the review period being open) is checked by
//! [`crate::cycle`] before these methods are reached.
//!
//! Each successful mutation bumps [`ScoreCard::version`].

use crate::error::{AppraisalError, Result};
use crate::primitives::{MAX_GOAL_WEIGHT, MAX_NAME_LEN, MAX_TEXT_LEN, MIN_GOAL_WEIGHT};
use crate::rating::{simple_average, weighted_average, Rating, RatingAverage, RatingSource, Ratings};
use crate::status::ScoreCardStatus;
use crate::weightage::{Section, Weightage};
use crate::{CommentId, EmployeeId, ItemId, ReviewPeriodId, ScoreCardId, TemplateId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// PARTIES
// =============================================================================

/// The party who added a plan item or wrote a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Contributor {
    #[serde(rename = "HR")]
    Hr,
    Manager,
    Employee,
}

impl Contributor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hr => "HR",
            Self::Manager => "Manager",
            Self::Employee => "Employee",
        }
    }

    /// HR and managers drive planning; employees only contribute to it.
    pub fn is_planner(self) -> bool {
        matches!(self, Self::Hr | Self::Manager)
    }
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Contributor> for RatingSource {
    fn from(party: Contributor) -> Self {
        match party {
            Contributor::Hr => Self::Hr,
            Contributor::Manager => Self::Manager,
            Contributor::Employee => Self::Employee,
        }
    }
}

// =============================================================================
// PLAN ITEMS
// =============================================================================

/// Progress of a plan item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

/// A goal, competency or value on a score card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    /// Whole percent. Goals only.
    pub weight: Option<u8>,
    pub added_by: Contributor,
    pub status: ItemStatus,
    pub template_id: Option<TemplateId>,
    pub ratings: Ratings,
}

/// Input for a new plan item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: Option<u8>,
    #[serde(default)]
    pub template_id: Option<TemplateId>,
}

/// Partial edit of a plan item. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: Option<u8>,
}

/// Append-only planning comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningComment {
    pub id: CommentId,
    pub role: Contributor,
    pub author_user_id: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// SCORE CARD
// =============================================================================

/// A score card and its plan items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub id: ScoreCardId,
    pub employee_id: EmployeeId,
    pub review_period_id: ReviewPeriodId,
    pub status: ScoreCardStatus,
    pub weightage: Weightage,
    pub goals: Vec<PlanItem>,
    pub competencies: Vec<PlanItem>,
    pub values: Vec<PlanItem>,
    pub comments: Vec<PlanningComment>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    next_item_id: u64,
    next_comment_id: u64,
}

impl ScoreCard {
    /// A fresh card in `Plan Not Started`.
    pub fn new(
        id: ScoreCardId,
        employee_id: EmployeeId,
        review_period_id: ReviewPeriodId,
        weightage: Weightage,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            employee_id,
            review_period_id,
            status: ScoreCardStatus::PlanNotStarted,
            weightage,
            goals: Vec::new(),
            competencies: Vec::new(),
            values: Vec::new(),
            comments: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
            next_item_id: 1,
            next_comment_id: 1,
        }
    }

    /// Items of one section.
    pub fn items(&self, section: Section) -> &[PlanItem] {
        match section {
            Section::Goals => &self.goals,
            Section::Competencies => &self.competencies,
            Section::Values => &self.values,
        }
    }

    fn items_mut(&mut self, section: Section) -> &mut Vec<PlanItem> {
        match section {
            Section::Goals => &mut self.goals,
            Section::Competencies => &mut self.competencies,
            Section::Values => &mut self.values,
        }
    }

    /// Every item with its section, goals first.
    pub fn all_items(&self) -> impl Iterator<Item = (Section, &PlanItem)> {
        Section::ALL
            .into_iter()
            .flat_map(move |section| self.items(section).iter().map(move |item| (section, item)))
    }

    /// Find an item by id in any section.
    pub fn find_item(&self, item_id: ItemId) -> Option<(Section, &PlanItem)> {
        self.all_items().find(|(_, item)| item.id == item_id)
    }

    fn find_item_mut(&mut self, item_id: ItemId) -> Result<&mut PlanItem> {
        let section = self
            .find_item(item_id)
            .map(|(section, _)| section)
            .ok_or_else(|| AppraisalError::not_found("plan item", item_id))?;
        self.items_mut(section)
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| AppraisalError::not_found("plan item", item_id))
    }

    /// Sum of goal weights, whole percent.
    pub fn total_goal_weight(&self) -> u32 {
        self.goals
            .iter()
            .map(|goal| u32::from(goal.weight.unwrap_or(0)))
            .sum()
    }

    /// Fail with `Conflict` if the caller's view of the card is stale.
    pub fn check_version(&self, expected: Option<u64>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.version => Err(AppraisalError::conflict(format!(
                "score card {} was modified (version {} expected, current {})",
                self.id, expected, self.version
            ))),
            _ => Ok(()),
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version = self.version.saturating_add(1);
        self.updated_at = now;
    }

    fn transition(&mut self, to: ScoreCardStatus) {
        tracing::info!(
            score_card = %self.id,
            from = %self.status,
            to = %to,
            "score card status changed"
        );
        self.status = to;
    }

    // -------------------------------------------------------------------------
    // Planning
    // -------------------------------------------------------------------------

    fn require_plan_editable(&self, action: &'static str, by: Contributor) -> Result<()> {
        let allowed = self.status.is_plan_editable()
            && !(by == Contributor::Employee && self.status == ScoreCardStatus::PlanNotStarted);
        if allowed {
            Ok(())
        } else {
            tracing::debug!(score_card = %self.id, status = %self.status, %by, action, "planning edit refused");
            Err(AppraisalError::InvalidTransition {
                action,
                from: self.status,
            })
        }
    }

    fn require_planner(by: Contributor, action: &str) -> Result<()> {
        if by.is_planner() {
            Ok(())
        } else {
            Err(AppraisalError::forbidden(format!(
                "only HR or a manager may {action}"
            )))
        }
    }

    fn note_planning_edit(&mut self) {
        if self.status == ScoreCardStatus::PlanStarted {
            self.transition(ScoreCardStatus::PlanningInProgress);
        }
    }

    /// Add a plan item.
    ///
    /// The first goal added by HR or a manager starts the plan. Employees may
    /// only contribute once the plan has started.
    pub fn add_item(
        &mut self,
        section: Section,
        by: Contributor,
        new: NewItem,
        now: DateTime<Utc>,
    ) -> Result<ItemId> {
        self.require_plan_editable("add plan items", by)?;
        let name = validate_name(&new.name)?;
        validate_text("description", &new.description)?;
        let weight = validate_weight(section, new.weight)?;

        let id = ItemId(self.next_item_id);
        self.next_item_id = self.next_item_id.saturating_add(1);
        self.items_mut(section).push(PlanItem {
            id,
            name,
            description: new.description.trim().to_string(),
            weight,
            added_by: by,
            status: ItemStatus::NotStarted,
            template_id: new.template_id,
            ratings: Ratings::default(),
        });

        if self.status == ScoreCardStatus::PlanNotStarted {
            if section == Section::Goals && by.is_planner() {
                self.transition(ScoreCardStatus::PlanStarted);
            }
        } else {
            self.note_planning_edit();
        }
        self.touch(now);
        Ok(id)
    }

    /// Edit an item's name, description or goal weight.
    ///
    /// Employees may only edit items they added themselves.
    pub fn update_item(
        &mut self,
        item_id: ItemId,
        by: Contributor,
        update: ItemUpdate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.require_plan_editable("edit plan items", by)?;
        let section = self
            .find_item(item_id)
            .map(|(section, _)| section)
            .ok_or_else(|| AppraisalError::not_found("plan item", item_id))?;

        let name = update.name.as_deref().map(validate_name).transpose()?;
        if let Some(description) = &update.description {
            validate_text("description", description)?;
        }
        let weight = match update.weight {
            Some(weight) => validate_weight(section, Some(weight))?,
            None => None,
        };

        let item = self.find_item_mut(item_id)?;
        if by == Contributor::Employee && item.added_by != Contributor::Employee {
            return Err(AppraisalError::forbidden(
                "employees may only edit items they added",
            ));
        }
        if let Some(name) = name {
            item.name = name;
        }
        if let Some(description) = update.description {
            item.description = description.trim().to_string();
        }
        if weight.is_some() {
            item.weight = weight;
        }

        self.note_planning_edit();
        self.touch(now);
        Ok(())
    }

    /// Remove an item. Employees may only remove items they added.
    pub fn remove_item(&mut self, item_id: ItemId, by: Contributor, now: DateTime<Utc>) -> Result<()> {
        self.require_plan_editable("remove plan items", by)?;
        let (section, item) = self
            .find_item(item_id)
            .ok_or_else(|| AppraisalError::not_found("plan item", item_id))?;
        if by == Contributor::Employee && item.added_by != Contributor::Employee {
            return Err(AppraisalError::forbidden(
                "employees may only remove items they added",
            ));
        }
        self.items_mut(section).retain(|item| item.id != item_id);
        self.note_planning_edit();
        self.touch(now);
        Ok(())
    }

    /// Record item progress. Allowed until evaluation is complete.
    ///
    /// Employees may only track items they added.
    pub fn set_item_progress(
        &mut self,
        item_id: ItemId,
        progress: ItemStatus,
        by: Contributor,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status == ScoreCardStatus::EvaluationComplete {
            return Err(AppraisalError::InvalidTransition {
                action: "update progress",
                from: self.status,
            });
        }
        let item = self.find_item_mut(item_id)?;
        if by == Contributor::Employee && item.added_by != Contributor::Employee {
            return Err(AppraisalError::forbidden(
                "employees may only update progress on items they added",
            ));
        }
        item.status = progress;
        self.touch(now);
        Ok(())
    }

    /// Replace the weightage.
    pub fn set_weightage(&mut self, weightage: Weightage, by: Contributor, now: DateTime<Utc>) -> Result<()> {
        Self::require_planner(by, "change the weightage")?;
        self.require_plan_editable("change the weightage", by)?;
        self.weightage = weightage;
        self.note_planning_edit();
        self.touch(now);
        Ok(())
    }

    /// Set one section and rebalance the other two.
    pub fn rebalance_weightage(
        &mut self,
        section: Section,
        value: u8,
        by: Contributor,
        now: DateTime<Utc>,
    ) -> Result<Weightage> {
        let next = self.weightage.rebalance(section, value)?;
        self.set_weightage(next, by, now)?;
        Ok(next)
    }

    /// Send the plan to the employee for acceptance.
    ///
    /// Goal weights must add up to the goals weightage.
    pub fn send_for_acceptance(&mut self, by: Contributor, now: DateTime<Utc>) -> Result<()> {
        Self::require_planner(by, "send a plan for acceptance")?;
        if !matches!(
            self.status,
            ScoreCardStatus::PlanStarted | ScoreCardStatus::PlanningInProgress
        ) {
            return Err(AppraisalError::InvalidTransition {
                action: "send for acceptance",
                from: self.status,
            });
        }
        let total = self.total_goal_weight();
        let expected = u32::from(self.weightage.goals());
        if total != expected {
            tracing::debug!(score_card = %self.id, total, expected, "goal weights unbalanced");
            return Err(AppraisalError::validation(format!(
                "total goal weight is {total}%, but the goals weightage is {expected}%"
            )));
        }
        self.transition(ScoreCardStatus::PendingEmployeeAcceptance);
        self.touch(now);
        Ok(())
    }

    fn require_pending_acceptance(&self, action: &'static str) -> Result<()> {
        if self.status == ScoreCardStatus::PendingEmployeeAcceptance {
            Ok(())
        } else {
            Err(AppraisalError::InvalidTransition {
                action,
                from: self.status,
            })
        }
    }

    /// The employee accepts the plan.
    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require_pending_acceptance("accept the plan")?;
        self.transition(ScoreCardStatus::PlanFinalized);
        self.touch(now);
        Ok(())
    }

    /// The employee rejects the plan. The reason becomes a planning comment.
    pub fn reject(&mut self, reason: &str, author: UserId, now: DateTime<Utc>) -> Result<CommentId> {
        self.require_pending_acceptance("reject the plan")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppraisalError::validation(
                "a reason is required to reject the plan",
            ));
        }
        validate_text("reason", reason)?;
        self.transition(ScoreCardStatus::PlanStarted);
        let id = self.push_comment(Contributor::Employee, author, reason.to_string(), now);
        self.touch(now);
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // Evaluation
    // -------------------------------------------------------------------------

    /// HR opens evaluation on a finalized plan.
    pub fn start_evaluation(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != ScoreCardStatus::PlanFinalized {
            return Err(AppraisalError::InvalidTransition {
                action: "start evaluation",
                from: self.status,
            });
        }
        self.transition(ScoreCardStatus::EvaluationStarted);
        self.touch(now);
        Ok(())
    }

    fn require_turn(&self, source: RatingSource, action: &'static str) -> Result<()> {
        if self.status.rating_turn() == Some(source) {
            Ok(())
        } else {
            tracing::debug!(score_card = %self.id, status = %self.status, %source, "not this party's turn");
            Err(AppraisalError::InvalidTransition {
                action,
                from: self.status,
            })
        }
    }

    /// Save (or clear) a draft rating for the party whose turn it is.
    pub fn rate_item(
        &mut self,
        source: RatingSource,
        item_id: ItemId,
        rating: Option<Rating>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.require_turn(source, "rate items")?;
        self.find_item_mut(item_id)?.ratings.set(source, rating);
        self.touch(now);
        Ok(())
    }

    /// Submit the party's ratings and hand over to the next evaluator.
    pub fn submit_ratings(&mut self, source: RatingSource, now: DateTime<Utc>) -> Result<ScoreCardStatus> {
        self.require_turn(source, "submit ratings")?;
        let missing: Vec<String> = self
            .all_items()
            .filter(|(_, item)| item.ratings.get(source).is_none())
            .map(|(_, item)| item.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(AppraisalError::validation(format!(
                "{} item(s) have no {source} rating: {}",
                missing.len(),
                missing.join(", ")
            )));
        }
        let next = self.status.after_submission().ok_or(AppraisalError::InvalidTransition {
            action: "submit ratings",
            from: self.status,
        })?;
        self.transition(next);
        self.touch(now);
        Ok(next)
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    fn push_comment(&mut self, role: Contributor, author: UserId, text: String, now: DateTime<Utc>) -> CommentId {
        let id = CommentId(self.next_comment_id);
        self.next_comment_id = self.next_comment_id.saturating_add(1);
        self.comments.push(PlanningComment {
            id,
            role,
            author_user_id: author,
            text,
            timestamp: now,
        });
        id
    }

    /// Append a comment. Allowed in any status.
    pub fn add_comment(
        &mut self,
        role: Contributor,
        author: UserId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<CommentId> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppraisalError::validation("comment text is required"));
        }
        validate_text("comment", text)?;
        let id = self.push_comment(role, author, text.to_string(), now);
        self.touch(now);
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    /// Aggregate of one section for one source.
    ///
    /// Goals are weight-averaged; competencies and values are a plain mean.
    pub fn aggregate(&self, section: Section, source: RatingSource) -> RatingAverage {
        let items = self.items(section);
        match section {
            Section::Goals => weighted_average(
                items
                    .iter()
                    .map(|item| (item.ratings.get(source), u32::from(item.weight.unwrap_or(0)))),
            ),
            Section::Competencies | Section::Values => {
                simple_average(items.iter().map(|item| item.ratings.get(source)))
            }
        }
    }

    /// Section aggregates weighted by the card's weightage.
    pub fn overall(&self, source: RatingSource) -> RatingAverage {
        weighted_average(Section::ALL.into_iter().map(|section| {
            (
                self.aggregate(section, source).value(),
                u32::from(self.weightage.get(section)),
            )
        }))
    }

    /// Aggregates for every source.
    pub fn summary(&self) -> ScoreCardSummary {
        let sources = RatingSource::ALL
            .into_iter()
            .map(|source| SourceSummary {
                source,
                goals: self.aggregate(Section::Goals, source),
                competencies: self.aggregate(Section::Competencies, source),
                values: self.aggregate(Section::Values, source),
                overall: self.overall(source),
            })
            .collect();
        let total_goal_weight = self.total_goal_weight();
        ScoreCardSummary {
            score_card_id: self.id,
            status: self.status,
            weightage: self.weightage,
            total_goal_weight,
            goal_weights_balanced: total_goal_weight == u32::from(self.weightage.goals()),
            sources,
        }
    }
}

/// Aggregates of one rating source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source: RatingSource,
    pub goals: RatingAverage,
    pub competencies: RatingAverage,
    pub values: RatingAverage,
    pub overall: RatingAverage,
}

/// Rating aggregates and weight balance of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreCardSummary {
    pub score_card_id: ScoreCardId,
    pub status: ScoreCardStatus,
    pub weightage: Weightage,
    pub total_goal_weight: u32,
    pub goal_weights_balanced: bool,
    pub sources: Vec<SourceSummary>,
}

// =============================================================================
// VALIDATION
// =============================================================================

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppraisalError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppraisalError::validation(format!(
            "name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_text(field: &str, text: &str) -> Result<()> {
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(AppraisalError::validation(format!(
            "{field} is longer than {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_weight(section: Section, weight: Option<u8>) -> Result<Option<u8>> {
    match (section, weight) {
        (Section::Goals, Some(w)) if (MIN_GOAL_WEIGHT..=MAX_GOAL_WEIGHT).contains(&w) => Ok(Some(w)),
        (Section::Goals, Some(w)) => Err(AppraisalError::validation(format!(
            "goal weight {w}% must be between {MIN_GOAL_WEIGHT} and {MAX_GOAL_WEIGHT}"
        ))),
        (Section::Goals, None) => Err(AppraisalError::validation("goals need a weight")),
        (_, Some(_)) => Err(AppraisalError::validation(format!(
            "{section} do not carry a weight"
        ))),
        (_, None) => Ok(None),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).single().unwrap_or_default()
    }

    fn card() -> ScoreCard {
        ScoreCard::new(
            ScoreCardId(1),
            EmployeeId(3),
            ReviewPeriodId(1),
            Weightage::default(),
            now(),
        )
    }

    fn goal(name: &str, weight: u8) -> NewItem {
        NewItem {
            name: name.to_string(),
            weight: Some(weight),
            ..NewItem::default()
        }
    }

    fn named(name: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            ..NewItem::default()
        }
    }

    fn rating(text: &str) -> Option<Rating> {
        Rating::parse_decimal(text).ok()
    }

    /// Card with three 20% goals, sent and accepted.
    fn finalized() -> ScoreCard {
        let mut c = card();
        for name in ["Ship", "Mentor", "Learn"] {
            c.add_item(Section::Goals, Contributor::Manager, goal(name, 20), now())
                .expect("add goal");
        }
        c.add_item(Section::Values, Contributor::Hr, named("Integrity"), now())
            .expect("add value");
        c.send_for_acceptance(Contributor::Manager, now()).expect("send");
        c.accept(now()).expect("accept");
        c
    }

    // =========================================================================
    // PLANNING
    // =========================================================================

    #[test]
    fn first_goal_by_manager_starts_the_plan() {
        let mut c = card();
        c.add_item(Section::Goals, Contributor::Manager, goal("Ship", 20), now())
            .expect("add");
        assert_eq!(c.status, ScoreCardStatus::PlanStarted);
        c.add_item(Section::Goals, Contributor::Manager, goal("Mentor", 20), now())
            .expect("add");
        assert_eq!(c.status, ScoreCardStatus::PlanningInProgress);
    }

    #[test]
    fn competency_first_does_not_start_the_plan() {
        let mut c = card();
        c.add_item(Section::Competencies, Contributor::Hr, named("Teamwork"), now())
            .expect("add");
        assert_eq!(c.status, ScoreCardStatus::PlanNotStarted);
    }

    #[test]
    fn employee_cannot_add_before_plan_starts() {
        let mut c = card();
        let err = c
            .add_item(Section::Goals, Contributor::Employee, goal("Mine", 10), now())
            .err();
        assert!(matches!(err, Some(AppraisalError::InvalidTransition { .. })));

        c.add_item(Section::Goals, Contributor::Hr, goal("Ship", 20), now())
            .expect("add");
        c.add_item(Section::Goals, Contributor::Employee, goal("Mine", 10), now())
            .expect("employee add after start");
    }

    #[test]
    fn employee_edits_only_own_items() {
        let mut c = card();
        let hr_goal = c
            .add_item(Section::Goals, Contributor::Hr, goal("Ship", 20), now())
            .expect("add");
        let update = ItemUpdate {
            weight: Some(30),
            ..ItemUpdate::default()
        };
        let err = c.update_item(hr_goal, Contributor::Employee, update.clone(), now()).err();
        assert!(matches!(err, Some(AppraisalError::Forbidden(_))));
        c.update_item(hr_goal, Contributor::Manager, update, now()).expect("manager edit");
        assert_eq!(c.total_goal_weight(), 30);
    }

    #[test]
    fn employee_tracks_progress_only_on_own_items() {
        let mut c = card();
        let hr_goal = c
            .add_item(Section::Goals, Contributor::Hr, goal("Ship", 20), now())
            .expect("add");
        let own = c
            .add_item(Section::Goals, Contributor::Employee, goal("Mine", 10), now())
            .expect("employee add");

        let err = c
            .set_item_progress(hr_goal, ItemStatus::Completed, Contributor::Employee, now())
            .err();
        assert!(matches!(err, Some(AppraisalError::Forbidden(_))));

        c.set_item_progress(own, ItemStatus::InProgress, Contributor::Employee, now())
            .expect("own item");
        c.set_item_progress(hr_goal, ItemStatus::Completed, Contributor::Manager, now())
            .expect("manager");
        assert_eq!(c.find_item(own).map(|(_, i)| i.status), Some(ItemStatus::InProgress));
        assert_eq!(c.find_item(hr_goal).map(|(_, i)| i.status), Some(ItemStatus::Completed));
    }

    #[test]
    fn goal_weight_bounds_are_enforced() {
        let mut c = card();
        assert!(c.add_item(Section::Goals, Contributor::Hr, goal("Zero", 0), now()).is_err());
        assert!(c.add_item(Section::Goals, Contributor::Hr, named("NoWeight"), now()).is_err());
        assert!(c.add_item(Section::Values, Contributor::Hr, goal("Weighted", 5), now()).is_err());
        assert!(c.add_item(Section::Goals, Contributor::Hr, goal("  ", 5), now()).is_err());
    }

    #[test]
    fn mutations_bump_version() {
        let mut c = card();
        assert_eq!(c.version, 1);
        c.add_item(Section::Goals, Contributor::Hr, goal("Ship", 20), now())
            .expect("add");
        assert_eq!(c.version, 2);
        assert!(c.check_version(Some(2)).is_ok());
        assert!(matches!(c.check_version(Some(1)), Err(AppraisalError::Conflict(_))));
        assert!(c.check_version(None).is_ok());
    }

    // =========================================================================
    // ACCEPTANCE
    // =========================================================================

    #[test]
    fn send_requires_goal_weights_to_match_weightage() {
        let mut c = card();
        for (name, weight) in [("A", 20), ("B", 20), ("C", 10)] {
            c.add_item(Section::Goals, Contributor::Manager, goal(name, weight), now())
                .expect("add");
        }
        let err = c.send_for_acceptance(Contributor::Manager, now()).err();
        assert!(matches!(err, Some(AppraisalError::Validation(_))));
        assert_eq!(c.status, ScoreCardStatus::PlanningInProgress);

        let c_id = c.goals[2].id;
        c.update_item(
            c_id,
            Contributor::Manager,
            ItemUpdate {
                weight: Some(20),
                ..ItemUpdate::default()
            },
            now(),
        )
        .expect("update");
        c.send_for_acceptance(Contributor::Manager, now()).expect("send");
        assert_eq!(c.status, ScoreCardStatus::PendingEmployeeAcceptance);
    }

    #[test]
    fn employee_cannot_send_for_acceptance() {
        let mut c = card();
        c.add_item(Section::Goals, Contributor::Hr, goal("All", 60), now())
            .expect("add");
        let err = c.send_for_acceptance(Contributor::Employee, now()).err();
        assert!(matches!(err, Some(AppraisalError::Forbidden(_))));
    }

    #[test]
    fn reject_requires_a_reason_and_returns_to_plan_started() {
        let mut c = card();
        c.add_item(Section::Goals, Contributor::Hr, goal("All", 60), now())
            .expect("add");
        c.send_for_acceptance(Contributor::Hr, now()).expect("send");

        assert!(c.reject("", UserId(4), now()).is_err());
        assert!(c.reject("   \t", UserId(4), now()).is_err());
        assert_eq!(c.status, ScoreCardStatus::PendingEmployeeAcceptance);

        c.reject("  Too ambitious ", UserId(4), now()).expect("reject");
        assert_eq!(c.status, ScoreCardStatus::PlanStarted);
        assert_eq!(c.comments.len(), 1);
        assert_eq!(c.comments[0].text, "Too ambitious");
        assert_eq!(c.comments[0].role, Contributor::Employee);
    }

    #[test]
    fn plan_is_frozen_while_pending_acceptance() {
        let mut c = card();
        c.add_item(Section::Goals, Contributor::Hr, goal("All", 60), now())
            .expect("add");
        c.send_for_acceptance(Contributor::Hr, now()).expect("send");
        let err = c
            .add_item(Section::Goals, Contributor::Hr, goal("Late", 5), now())
            .err();
        assert!(matches!(err, Some(AppraisalError::InvalidTransition { .. })));
    }

    // =========================================================================
    // EVALUATION
    // =========================================================================

    #[test]
    fn evaluation_runs_employee_manager_hr() {
        let mut c = finalized();
        c.start_evaluation(now()).expect("start");
        let ids: Vec<ItemId> = c.all_items().map(|(_, item)| item.id).collect();

        for source in RatingSource::ALL {
            let err = c.submit_ratings(source, now()).err();
            assert!(err.is_some());
            for id in &ids {
                c.rate_item(source, *id, rating("4"), now()).expect("rate");
            }
            c.submit_ratings(source, now()).expect("submit");
        }
        assert_eq!(c.status, ScoreCardStatus::EvaluationComplete);
    }

    #[test]
    fn rating_out_of_turn_is_rejected() {
        let mut c = finalized();
        c.start_evaluation(now()).expect("start");
        let id = c.goals[0].id;
        let err = c.rate_item(RatingSource::Manager, id, rating("3"), now()).err();
        assert!(matches!(err, Some(AppraisalError::InvalidTransition { .. })));
    }

    #[test]
    fn start_evaluation_requires_finalized_plan() {
        let mut c = card();
        assert!(c.start_evaluation(now()).is_err());
    }

    #[test]
    fn summary_reports_weighted_goal_average() {
        let mut c = card();
        c.add_item(Section::Goals, Contributor::Hr, goal("A", 30), now()).expect("add");
        c.add_item(Section::Goals, Contributor::Hr, goal("B", 30), now()).expect("add");
        c.weightage = Weightage::new(60, 25, 15).expect("weightage");
        c.goals[0].ratings.set(RatingSource::Manager, rating("4"));
        c.goals[1].ratings.set(RatingSource::Manager, rating("5"));
        c.goals[1].weight = Some(70);

        assert_eq!(c.aggregate(Section::Goals, RatingSource::Manager).to_string(), "4.70");
        assert_eq!(
            c.aggregate(Section::Values, RatingSource::Manager),
            RatingAverage::NotAvailable
        );
        // Only goals are numeric, so overall equals the goal average.
        assert_eq!(c.overall(RatingSource::Manager).to_string(), "4.70");
        assert_eq!(c.overall(RatingSource::Hr), RatingAverage::NotAvailable);

        let summary = c.summary();
        assert_eq!(summary.sources.len(), 3);
        assert!(!summary.goal_weights_balanced);
    }

    #[test]
    fn comments_require_text() {
        let mut c = card();
        assert!(c.add_comment(Contributor::Manager, UserId(3), " ", now()).is_err());
        c.add_comment(Contributor::Manager, UserId(3), "Looks good", now())
            .expect("comment");
        assert_eq!(c.comments.len(), 1);
    }

    #[test]
    fn card_roundtrips_through_postcard() {
        let c = finalized();
        let bytes = postcard::to_allocvec(&c).expect("encode");
        let back: ScoreCard = postcard::from_bytes(&bytes).expect("decode");
        assert_eq!(back, c);
    }
}
