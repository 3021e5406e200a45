use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::model::ids::{AssignmentId, CourseId, ExtensionRequestId, SubmissionId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssignmentError {
    #[error("assignment title must not be empty")]
    EmptyTitle,
    #[error("max score must be positive, got {provided}")]
    InvalidMaxScore { provided: f64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("unknown submission kind: {0}")]
    UnknownKind(String),
    #[error("link submission is not a valid URL: {0}")]
    InvalidLink(String),
    #[error("{0} submission requires content")]
    MissingContent(&'static str),
    #[error("file submission requires a file reference")]
    MissingFile,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown extension request status: {0}")]
pub struct ParseExtensionStatusError(pub String);

//
// ─── ASSIGNMENT ────────────────────────────────────────────────────────────────
//

/// A deadline-bound piece of coursework.
///
/// The due date may be edited after creation; submissions already accepted
/// are never re-evaluated against the new deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    id: AssignmentId,
    course_id: CourseId,
    title: String,
    description: Option<String>,
    due_date: DateTime<Utc>,
    max_score: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Creates an assignment, validating the title and maximum score.
    ///
    /// # Errors
    ///
    /// - `AssignmentError::EmptyTitle` if the title is blank.
    /// - `AssignmentError::InvalidMaxScore` if the maximum is not positive.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AssignmentId,
        course_id: CourseId,
        title: impl Into<String>,
        description: Option<String>,
        due_date: DateTime<Utc>,
        max_score: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, AssignmentError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(AssignmentError::EmptyTitle);
        }
        if max_score <= 0.0 {
            return Err(AssignmentError::InvalidMaxScore {
                provided: max_score,
            });
        }
        Ok(Self {
            id,
            course_id,
            title,
            description,
            due_date,
            max_score,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds an assignment from persisted fields.
    ///
    /// # Errors
    ///
    /// Same validation as [`Assignment::new`].
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: AssignmentId,
        course_id: CourseId,
        title: String,
        description: Option<String>,
        due_date: DateTime<Utc>,
        max_score: f64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, AssignmentError> {
        let mut assignment = Self::new(
            id,
            course_id,
            title,
            description,
            due_date,
            max_score,
            created_at,
        )?;
        assignment.updated_at = updated_at;
        Ok(assignment)
    }

    /// Moves the deadline. Prior submissions are untouched.
    pub fn set_due_date(&mut self, due_date: DateTime<Utc>, now: DateTime<Utc>) {
        self.due_date = due_date;
        self.updated_at = now;
    }

    #[must_use]
    pub fn id(&self) -> AssignmentId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    #[must_use]
    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Text,
    Link,
    File,
}

impl SubmissionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionKind::Text => "text",
            SubmissionKind::Link => "link",
            SubmissionKind::File => "file",
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionKind {
    type Err = SubmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(SubmissionKind::Text),
            "link" => Ok(SubmissionKind::Link),
            "file" => Ok(SubmissionKind::File),
            other => Err(SubmissionError::UnknownKind(other.to_owned())),
        }
    }
}

/// Unvalidated submission payload as it arrives from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionDraft {
    Text { content: String },
    Link { href: String },
    File { file_url: String },
}

impl SubmissionDraft {
    /// Validates the payload shape for its kind.
    ///
    /// # Errors
    ///
    /// - `SubmissionError::MissingContent` for blank text or link content.
    /// - `SubmissionError::InvalidLink` when link content fails URL parsing.
    /// - `SubmissionError::MissingFile` for a blank file reference.
    pub fn validate(self) -> Result<ValidatedSubmission, SubmissionError> {
        match self {
            SubmissionDraft::Text { content } => {
                if content.trim().is_empty() {
                    return Err(SubmissionError::MissingContent("text"));
                }
                Ok(ValidatedSubmission {
                    kind: SubmissionKind::Text,
                    content: Some(content),
                    file_url: None,
                })
            }
            SubmissionDraft::Link { href } => {
                if href.trim().is_empty() {
                    return Err(SubmissionError::MissingContent("link"));
                }
                Url::parse(href.trim()).map_err(|_| SubmissionError::InvalidLink(href.clone()))?;
                Ok(ValidatedSubmission {
                    kind: SubmissionKind::Link,
                    content: Some(href),
                    file_url: None,
                })
            }
            SubmissionDraft::File { file_url } => {
                if file_url.trim().is_empty() {
                    return Err(SubmissionError::MissingFile);
                }
                Ok(ValidatedSubmission {
                    kind: SubmissionKind::File,
                    content: None,
                    file_url: Some(file_url),
                })
            }
        }
    }
}

/// A draft that passed shape validation, ready to be stamped and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub kind: SubmissionKind,
    pub content: Option<String>,
    pub file_url: Option<String>,
}

impl ValidatedSubmission {
    #[must_use]
    pub fn into_submission(
        self,
        id: SubmissionId,
        user_id: UserId,
        assignment_id: AssignmentId,
        submitted_at: DateTime<Utc>,
    ) -> Submission {
        Submission {
            id,
            user_id,
            assignment_id,
            kind: self.kind,
            content: self.content,
            file_url: self.file_url,
            grade: None,
            feedback: None,
            submitted_at,
        }
    }
}

/// A learner's accepted submission for an assignment.
///
/// At most one non-deleted submission exists per (user, assignment); the
/// eligibility check enforces that and storage backs it with a uniqueness
/// constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub assignment_id: AssignmentId,
    pub kind: SubmissionKind,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    /// Attaches an instructor grade and optional feedback.
    pub fn record_grade(&mut self, grade: f64, feedback: Option<String>) {
        self.grade = Some(grade);
        self.feedback = feedback;
    }

    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.grade.is_some()
    }
}

//
// ─── LATE APPROVAL ─────────────────────────────────────────────────────────────
//

/// An administrative override letting one user submit one assignment late.
///
/// At most one active approval exists per (user, assignment); creating a new
/// one supersedes any prior approval for the pair (last-writer-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateApproval {
    pub user_id: UserId,
    pub assignment_id: AssignmentId,
    pub approved_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LateApproval {
    #[must_use]
    pub fn new(
        user_id: UserId,
        assignment_id: AssignmentId,
        approved_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            assignment_id,
            approved_until,
            created_at: now,
        }
    }

    /// An approval is active while its window has not elapsed.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.approved_until > now
    }
}

//
// ─── EXTENSION REQUESTS ────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExtensionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtensionStatus::Pending => "pending",
            ExtensionStatus::Approved => "approved",
            ExtensionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ExtensionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionStatus {
    type Err = ParseExtensionStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExtensionStatus::Pending),
            "approved" => Ok(ExtensionStatus::Approved),
            "rejected" => Ok(ExtensionStatus::Rejected),
            other => Err(ParseExtensionStatusError(other.to_owned())),
        }
    }
}

/// A learner's request for more time, tracked but not enforced.
///
/// Resolving a request flips its status and nothing else; it does not mint
/// a [`LateApproval`]. That linkage stays a separate, explicit instructor
/// action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    pub id: ExtensionRequestId,
    pub user_id: UserId,
    pub assignment_id: AssignmentId,
    pub requested_until: DateTime<Utc>,
    pub reason: String,
    pub status: ExtensionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExtensionRequest {
    #[must_use]
    pub fn new(
        id: ExtensionRequestId,
        user_id: UserId,
        assignment_id: AssignmentId,
        requested_until: DateTime<Utc>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            assignment_id,
            requested_until,
            reason: reason.into(),
            status: ExtensionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Updates the status field only.
    pub fn resolve(&mut self, status: ExtensionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

//
// ─── ELIGIBILITY ───────────────────────────────────────────────────────────────
//

/// Verdict on whether a new submission attempt may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Within the deadline.
    OnTime,
    /// Past the deadline, but an active late approval covers it.
    LateApproved,
    /// A non-deleted submission already exists for the pair.
    AlreadySubmitted,
    /// Past the deadline with no active approval.
    PastDue,
}

impl Eligibility {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Eligibility::OnTime | Eligibility::LateApproved)
    }

    /// Human-readable rejection reason, if the verdict rejects.
    #[must_use]
    pub fn rejection_reason(self) -> Option<&'static str> {
        match self {
            Eligibility::OnTime | Eligibility::LateApproved => None,
            Eligibility::AlreadySubmitted => Some("assignment already submitted"),
            Eligibility::PastDue => Some("past due, no approval"),
        }
    }
}

/// Decides admissibility of a new submission attempt.
///
/// An existing submission rejects regardless of due-date status. Past-due
/// attempts are admitted only by an approval that is still active at `now`.
/// All timestamps are UTC, so no naive/aware normalization is needed here.
#[must_use]
pub fn check_eligibility(
    assignment: &Assignment,
    has_submission: bool,
    approval: Option<&LateApproval>,
    now: DateTime<Utc>,
) -> Eligibility {
    if has_submission {
        return Eligibility::AlreadySubmitted;
    }
    let is_past_due = now > assignment.due_date();
    if !is_past_due {
        return Eligibility::OnTime;
    }
    match approval {
        Some(approval) if approval.is_active(now) => Eligibility::LateApproved,
        _ => Eligibility::PastDue,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
