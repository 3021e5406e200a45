//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::SubmissionError;
use storage::repository::StorageError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("course not found")]
    CourseNotFound,
    #[error("lesson does not belong to the course")]
    LessonNotInCourse,
    #[error("already enrolled in this course")]
    AlreadyEnrolled,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("quiz not found")]
    QuizNotFound,
    #[error("quiz has no questions")]
    NoQuestions,
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AssignmentService`.
///
/// `PastDeadline` is the one rejection that carries a user-facing reason
/// string; everything else reports by kind only.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssignmentServiceError {
    #[error("assignment not found")]
    AssignmentNotFound,
    #[error("submission not found")]
    SubmissionNotFound,
    #[error("extension request not found")]
    ExtensionRequestNotFound,
    #[error("assignment already submitted")]
    AlreadySubmitted,
    #[error("submission rejected: {reason}")]
    PastDeadline { reason: &'static str },
    #[error("grade {grade} is outside [0, {max_score}]")]
    InvalidGrade { grade: f64, max_score: f64 },
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
