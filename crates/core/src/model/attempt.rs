use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{AttemptId, QuestionId, QuizId, UserId};
use crate::model::question::QuestionType;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("attempt numbers start at 1, got {provided}")]
    InvalidAttemptNumber { provided: u32 },
    #[error("unknown answer outcome: {0}")]
    UnknownOutcome(String),
}

//
// ─── ANSWER OUTCOME ────────────────────────────────────────────────────────────
//

/// Per-question grading verdict.
///
/// Choice and boolean questions grade to `Correct`/`Incorrect`; coding
/// questions to `Passed`/`Failed`. A question with no submitted answer is
/// `Unanswered` and counts as incorrect in aggregate scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
    Passed,
    Failed,
    Unanswered,
}

impl AnswerOutcome {
    /// Whether the outcome contributes to the correct count.
    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, AnswerOutcome::Correct | AnswerOutcome::Passed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerOutcome::Correct => "correct",
            AnswerOutcome::Incorrect => "incorrect",
            AnswerOutcome::Passed => "passed",
            AnswerOutcome::Failed => "failed",
            AnswerOutcome::Unanswered => "unanswered",
        }
    }
}

impl fmt::Display for AnswerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerOutcome {
    type Err = AttemptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correct" => Ok(AnswerOutcome::Correct),
            "incorrect" => Ok(AnswerOutcome::Incorrect),
            "passed" => Ok(AnswerOutcome::Passed),
            "failed" => Ok(AnswerOutcome::Failed),
            "unanswered" => Ok(AnswerOutcome::Unanswered),
            other => Err(AttemptError::UnknownOutcome(other.to_owned())),
        }
    }
}

//
// ─── PER-QUESTION RESULTS ──────────────────────────────────────────────────────
//

/// Outcome of one test case within a coding question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected: String,
    pub passed: bool,
}

/// Detail block attached to coding-question results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingDetail {
    pub score: f64,
    pub passed_tests: usize,
    pub total_tests: usize,
    pub cases: Vec<TestCaseResult>,
}

/// Graded result for a single question within an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub question_type: QuestionType,
    pub outcome: AnswerOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CodingDetail>,
}

//
// ─── QUIZ ATTEMPT ──────────────────────────────────────────────────────────────
//

/// One graded submission of answers to a quiz.
///
/// Created exactly once per submission and never mutated afterwards; attempt
/// history is append-only. `attempt_number` is unique per (user, quiz),
/// strictly increasing from 1, and assigned by storage at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    id: AttemptId,
    user_id: UserId,
    quiz_id: QuizId,
    attempt_number: u32,
    score: f64,
    passed: bool,
    results: Vec<QuestionResult>,
    completed_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Assembles a recorded attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidAttemptNumber` for a zero number; the
    /// sequence starts at 1.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AttemptId,
        user_id: UserId,
        quiz_id: QuizId,
        attempt_number: u32,
        score: f64,
        passed: bool,
        results: Vec<QuestionResult>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if attempt_number == 0 {
            return Err(AttemptError::InvalidAttemptNumber { provided: 0 });
        }
        Ok(Self {
            id,
            user_id,
            quiz_id,
            attempt_number,
            score,
            passed,
            results,
            completed_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn results(&self) -> &[QuestionResult] {
        &self.results
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
