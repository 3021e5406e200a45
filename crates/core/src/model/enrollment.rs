use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnrollmentError {
    #[error("unknown enrollment status: {0}")]
    UnknownStatus(String),
    #[error("progress must be in [0, 100], got {provided}")]
    InvalidProgress { provided: f64 },
}

//
// ─── LIFECYCLE ─────────────────────────────────────────────────────────────────
//

/// Enrollment lifecycle state, a pure function of overall progress.
///
/// `not_started → in_progress → completed`; there is no transition back out
/// of `completed`. The mapping is applied after every progress recomputation
/// and has no independent triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    /// Maps an overall progress percentage onto a lifecycle state.
    #[must_use]
    pub fn for_progress(overall: f64) -> Self {
        if overall >= 100.0 {
            EnrollmentStatus::Completed
        } else if overall > 0.0 {
            EnrollmentStatus::InProgress
        } else {
            EnrollmentStatus::NotStarted
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::NotStarted => "not_started",
            EnrollmentStatus::InProgress => "in_progress",
            EnrollmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = EnrollmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(EnrollmentStatus::NotStarted),
            "in_progress" => Ok(EnrollmentStatus::InProgress),
            "completed" => Ok(EnrollmentStatus::Completed),
            other => Err(EnrollmentError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── ENROLLMENT ────────────────────────────────────────────────────────────────
//

/// A user's participation in a course and its aggregate progress.
///
/// Unique per (user, course); storage enforces that as a backstop. All
/// mutation goes through [`Enrollment::complete_lesson`] and
/// [`Enrollment::apply_progress`] so that the lesson percentage, overall
/// percentage, and lifecycle status can never drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    user_id: UserId,
    course_id: CourseId,
    /// Stored lesson-completion percentage; an input to the overall blend.
    lesson_progress: f64,
    /// Overall blended progress, written back by recomputation.
    progress_percentage: f64,
    status: EnrollmentStatus,
    completed_lessons: Vec<LessonId>,
    current_lesson: Option<LessonId>,
    enrolled_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// A fresh enrollment with zero progress and `not_started` status.
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            course_id,
            lesson_progress: 0.0,
            progress_percentage: 0.0,
            status: EnrollmentStatus::NotStarted,
            completed_lessons: Vec::new(),
            current_lesson: None,
            enrolled_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds an enrollment from persisted fields.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidProgress` if either stored
    /// percentage is outside [0, 100].
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        course_id: CourseId,
        lesson_progress: f64,
        progress_percentage: f64,
        status: EnrollmentStatus,
        completed_lessons: Vec<LessonId>,
        current_lesson: Option<LessonId>,
        enrolled_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, EnrollmentError> {
        for value in [lesson_progress, progress_percentage] {
            if !(0.0..=100.0).contains(&value) {
                return Err(EnrollmentError::InvalidProgress { provided: value });
            }
        }
        Ok(Self {
            user_id,
            course_id,
            lesson_progress,
            progress_percentage,
            status,
            completed_lessons,
            current_lesson,
            enrolled_at,
            updated_at,
        })
    }

    /// Records a completed lesson and refreshes the stored lesson percentage.
    ///
    /// Idempotent: completing an already-completed lesson only updates the
    /// current-lesson pointer. Returns whether the completion set changed.
    /// `total_lessons` is read from the course and passed in explicitly; the
    /// enrollment holds no ambient knowledge of course size.
    pub fn complete_lesson(
        &mut self,
        lesson: LessonId,
        total_lessons: usize,
        now: DateTime<Utc>,
    ) -> bool {
        self.current_lesson = Some(lesson);
        if self.completed_lessons.contains(&lesson) {
            return false;
        }
        self.completed_lessons.push(lesson);
        if total_lessons > 0 {
            #[allow(clippy::cast_precision_loss)]
            let ratio = self.completed_lessons.len() as f64 / total_lessons as f64;
            self.lesson_progress = (ratio * 100.0).min(100.0);
        }
        self.updated_at = now;
        true
    }

    /// Writes back a recomputed overall progress and the derived status.
    ///
    /// Progress is clamped to [0, 100] and monotonic non-decreasing; once
    /// `completed`, the status never regresses. Returns the status actually
    /// stored.
    pub fn apply_progress(&mut self, overall: f64, now: DateTime<Utc>) -> EnrollmentStatus {
        let clamped = overall.clamp(0.0, 100.0);
        if clamped > self.progress_percentage {
            self.progress_percentage = clamped;
        }
        let derived = EnrollmentStatus::for_progress(self.progress_percentage);
        if self.status != EnrollmentStatus::Completed {
            self.status = derived;
        }
        self.updated_at = now;
        self.status
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn lesson_progress(&self) -> f64 {
        self.lesson_progress
    }

    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }

    #[must_use]
    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    #[must_use]
    pub fn completed_lessons(&self) -> &[LessonId] {
        &self.completed_lessons
    }

    #[must_use]
    pub fn current_lesson(&self) -> Option<LessonId> {
        self.current_lesson
    }

    #[must_use]
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
