use thiserror::Error;

use crate::model::{
    AssignmentError, AttemptError, EnrollmentError, ParseQuestionTypeError, QuizError,
    SubmissionError,
};

/// Umbrella error for callers that don't care which model rejected input.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    QuestionType(#[from] ParseQuestionTypeError),
}
