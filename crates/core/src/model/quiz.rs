use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, QuizId};
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuizError {
    #[error("quiz title must not be empty")]
    EmptyTitle,
    #[error("passing score must be in [0, 100], got {provided}")]
    InvalidPassingScore { provided: f64 },
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A quiz belonging to a course: an ordered question set and a pass threshold.
///
/// Questions are immutable once attempts reference them; an update replaces
/// the whole set via [`Quiz::replace_questions`]. Attempts recorded against
/// the old set are never revalidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    id: QuizId,
    course_id: CourseId,
    title: String,
    description: Option<String>,
    passing_score: f64,
    questions: Vec<Question>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Quiz {
    /// Creates a quiz, validating the title and passing score.
    ///
    /// # Errors
    ///
    /// - `QuizError::EmptyTitle` if the title is blank.
    /// - `QuizError::InvalidPassingScore` if the threshold is outside [0, 100].
    pub fn new(
        id: QuizId,
        course_id: CourseId,
        title: impl Into<String>,
        description: Option<String>,
        passing_score: f64,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if !(0.0..=100.0).contains(&passing_score) {
            return Err(QuizError::InvalidPassingScore {
                provided: passing_score,
            });
        }

        Ok(Self {
            id,
            course_id,
            title,
            description,
            passing_score,
            questions,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a quiz from persisted fields without revalidation timestamps.
    ///
    /// # Errors
    ///
    /// Same validation as [`Quiz::new`]; storage rows that fail it are
    /// corrupt rather than merely stale.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: QuizId,
        course_id: CourseId,
        title: String,
        description: Option<String>,
        passing_score: f64,
        questions: Vec<Question>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        let mut quiz = Self::new(
            id,
            course_id,
            title,
            description,
            passing_score,
            questions,
            created_at,
        )?;
        quiz.updated_at = updated_at;
        Ok(quiz)
    }

    /// Replaces the entire question set (delete-and-reinsert semantics).
    ///
    /// Prior attempts keep referencing the old questions by id and are not
    /// revalidated; that is an accepted constraint, not an oversight.
    pub fn replace_questions(&mut self, questions: Vec<Question>, now: DateTime<Utc>) {
        self.questions = questions;
        self.updated_at = now;
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
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
    pub fn passing_score(&self) -> f64 {
        self.passing_score
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
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
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;
    use crate::time::fixed_now;

    fn sample_questions() -> Vec<Question> {
        vec![
            Question::multiple_choice(
                QuestionId::new(1),
                "Pick A",
                vec!["A".into(), "B".into()],
                "A",
            ),
            Question::true_false(QuestionId::new(2), "Sky is blue", true),
        ]
    }

    #[test]
    fn rejects_blank_title() {
        let err = Quiz::new(
            QuizId::new(1),
            CourseId::new(1),
            "   ",
            None,
            50.0,
            sample_questions(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, QuizError::EmptyTitle);
    }

    #[test]
    fn rejects_out_of_range_passing_score() {
        for bad in [-0.1, 100.5] {
            let err = Quiz::new(
                QuizId::new(1),
                CourseId::new(1),
                "Basics",
                None,
                bad,
                sample_questions(),
                fixed_now(),
            )
            .unwrap_err();
            assert!(matches!(err, QuizError::InvalidPassingScore { provided } if provided == bad));
        }
    }

    #[test]
    fn replace_questions_swaps_the_whole_set_and_touches_updated_at() {
        let now = fixed_now();
        let mut quiz = Quiz::new(
            QuizId::new(1),
            CourseId::new(1),
            "Basics",
            None,
            75.0,
            sample_questions(),
            now,
        )
        .unwrap();

        let later = now + chrono::Duration::hours(1);
        quiz.replace_questions(
            vec![Question::true_false(QuestionId::new(9), "Replaced", false)],
            later,
        );

        assert_eq!(quiz.questions().len(), 1);
        assert_eq!(quiz.questions()[0].id, QuestionId::new(9));
        assert_eq!(quiz.updated_at(), later);
        assert_eq!(quiz.created_at(), now);
    }

    #[test]
    fn boundary_passing_scores_are_accepted() {
        for ok in [0.0, 100.0] {
            assert!(
                Quiz::new(
                    QuizId::new(1),
                    CourseId::new(1),
                    "Basics",
                    None,
                    ok,
                    Vec::new(),
                    fixed_now(),
                )
                .is_ok()
            );
        }
    }
}
