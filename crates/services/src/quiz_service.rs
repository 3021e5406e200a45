use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use course_core::grading::grade_submission;
use course_core::model::{QuestionId, QuizAttempt, QuizId, UserId};
use course_core::time::Clock;
use storage::repository::{AttemptDraft, AttemptRepository, QuizRepository, StorageError};

use crate::error::QuizServiceError;
use crate::progress_service::{CourseProgress, ProgressService};

/// Result of a quiz submission: the recorded attempt and the course progress
/// recomputed in its wake.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSubmissionOutcome {
    pub attempt: QuizAttempt,
    pub progress: CourseProgress,
}

/// Grades quiz submissions and appends them to the attempt history.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn AttemptRepository>,
    progress: ProgressService,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn AttemptRepository>,
        progress: ProgressService,
    ) -> Self {
        Self {
            clock,
            quizzes,
            attempts,
            progress,
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Grades a submitted answer set, records the attempt, and recomputes
    /// course progress for the owning course.
    ///
    /// Grading itself never fails: unanswered questions score as incorrect
    /// and coding questions fall back to their substring oracle. The attempt
    /// number is assigned atomically by storage, so sequential submissions
    /// yield a gap-free 1, 2, 3, … sequence per (user, quiz).
    ///
    /// # Errors
    ///
    /// - `QuizServiceError::QuizNotFound` if the quiz is missing.
    /// - `QuizServiceError::NoQuestions` if the quiz has an empty question
    ///   set; there is nothing to grade against.
    pub async fn submit_quiz(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        answers: &HashMap<QuestionId, String>,
    ) -> Result<QuizSubmissionOutcome, QuizServiceError> {
        let quiz = match self.quizzes.get_quiz(quiz_id).await {
            Ok(quiz) => quiz,
            Err(StorageError::NotFound) => return Err(QuizServiceError::QuizNotFound),
            Err(e) => return Err(e.into()),
        };
        if quiz.questions().is_empty() {
            return Err(QuizServiceError::NoQuestions);
        }

        let graded = grade_submission(quiz.questions(), answers);
        let score = graded.score();
        let passed = score >= quiz.passing_score();

        let attempt = self
            .attempts
            .record_attempt(AttemptDraft {
                user_id,
                quiz_id,
                score,
                passed,
                results: graded.results,
                completed_at: self.now(),
            })
            .await?;

        tracing::info!(
            user = %user_id,
            quiz = %quiz_id,
            attempt = attempt.attempt_number(),
            score,
            passed,
            "quiz attempt recorded"
        );

        let progress = self.progress.recompute(user_id, quiz.course_id()).await?;

        Ok(QuizSubmissionOutcome { attempt, progress })
    }

    /// The user's attempt history for one quiz, ordered by attempt number.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn attempt_history(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Vec<QuizAttempt>, QuizServiceError> {
        Ok(self.attempts.attempts_for_user_quiz(user_id, quiz_id).await?)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{
        AnswerOutcome, Course, CourseId, EnrollmentStatus, Question, Quiz, TestCase,
    };
    use course_core::time::{fixed_clock, fixed_now};
    use storage::repository::{CourseRepository, InMemoryRepository};

    fn service(repo: &InMemoryRepository) -> QuizService {
        let progress = ProgressService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        QuizService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            progress,
        )
    }

    fn four_question_quiz() -> Quiz {
        Quiz::new(
            QuizId::new(1),
            CourseId::new(1),
            "Checkpoint",
            None,
            75.0,
            vec![
                Question::multiple_choice(
                    QuestionId::new(1),
                    "1 + 1",
                    vec!["2".into(), "3".into()],
                    "2",
                ),
                Question::true_false(QuestionId::new(2), "Rust is compiled", true),
                Question::multiple_choice(
                    QuestionId::new(3),
                    "capital of France",
                    vec!["Paris".into(), "Lyon".into()],
                    "Paris",
                ),
                Question::coding(
                    QuestionId::new(4),
                    "implement add",
                    None,
                    vec![TestCase::new("2 2", "a + b")],
                ),
            ],
            fixed_now(),
        )
        .unwrap()
    }

    async fn seed(repo: &InMemoryRepository) {
        let course = Course::new(CourseId::new(1), "Rust Basics", Vec::new(), fixed_now());
        repo.upsert_course(&course).await.unwrap();
        repo.upsert_quiz(&four_question_quiz()).await.unwrap();
    }

    fn answers(pairs: &[(u64, &str)]) -> HashMap<QuestionId, String> {
        pairs
            .iter()
            .map(|(id, answer)| (QuestionId::new(*id), (*answer).to_owned()))
            .collect()
    }

    #[tokio::test]
    async fn three_of_four_meets_the_seventy_five_threshold() {
        let repo = InMemoryRepository::new();
        seed(&repo).await;

        let outcome = service(&repo)
            .submit_quiz(
                UserId::new(1),
                QuizId::new(1),
                &answers(&[(1, "2"), (2, "TRUE"), (3, " paris "), (4, "nope")]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempt.score(), 75.0);
        assert!(outcome.attempt.passed());
        assert_eq!(outcome.attempt.attempt_number(), 1);
        assert_eq!(outcome.attempt.results()[3].outcome, AnswerOutcome::Failed);
    }

    #[tokio::test]
    async fn unanswered_questions_count_against_the_score() {
        let repo = InMemoryRepository::new();
        seed(&repo).await;

        let outcome = service(&repo)
            .submit_quiz(
                UserId::new(1),
                QuizId::new(1),
                &answers(&[(1, "2"), (2, "true")]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempt.score(), 50.0);
        assert!(!outcome.attempt.passed());
        assert_eq!(
            outcome.attempt.results()[2].outcome,
            AnswerOutcome::Unanswered
        );
        assert_eq!(
            outcome.attempt.results()[3].outcome,
            AnswerOutcome::Unanswered
        );
    }

    #[tokio::test]
    async fn repeat_submissions_number_sequentially_and_record_history() {
        let repo = InMemoryRepository::new();
        seed(&repo).await;
        let svc = service(&repo);

        for expected in 1..=3 {
            let outcome = svc
                .submit_quiz(UserId::new(1), QuizId::new(1), &answers(&[(1, "2")]))
                .await
                .unwrap();
            assert_eq!(outcome.attempt.attempt_number(), expected);
        }

        let history = svc
            .attempt_history(UserId::new(1), QuizId::new(1))
            .await
            .unwrap();
        assert_eq!(history.len(), 3);
        let numbers: Vec<u32> = history.iter().map(QuizAttempt::attempt_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn submission_updates_course_progress() {
        let repo = InMemoryRepository::new();
        seed(&repo).await;

        let outcome = service(&repo)
            .submit_quiz(UserId::new(1), QuizId::new(1), &answers(&[]))
            .await
            .unwrap();

        // one of one quizzes attempted, no lessons in the course
        assert_eq!(outcome.progress.completed_quizzes, 1);
        assert_eq!(outcome.progress.total_quizzes, 1);
        assert_eq!(outcome.progress.quiz_progress, 100.0);
        assert_eq!(outcome.progress.overall_progress, 50.0);
        assert_eq!(outcome.progress.status, EnrollmentStatus::InProgress);
    }

    #[tokio::test]
    async fn a_failed_attempt_still_counts_as_quiz_completion() {
        let repo = InMemoryRepository::new();
        seed(&repo).await;

        let outcome = service(&repo)
            .submit_quiz(UserId::new(1), QuizId::new(1), &answers(&[(1, "3")]))
            .await
            .unwrap();
        assert!(!outcome.attempt.passed());
        assert_eq!(outcome.progress.completed_quizzes, 1);
    }

    #[tokio::test]
    async fn missing_quiz_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .submit_quiz(UserId::new(1), QuizId::new(9), &answers(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizServiceError::QuizNotFound));
    }

    #[tokio::test]
    async fn empty_question_set_is_rejected() {
        let repo = InMemoryRepository::new();
        let course = Course::new(CourseId::new(1), "Rust Basics", Vec::new(), fixed_now());
        repo.upsert_course(&course).await.unwrap();
        let quiz = Quiz::new(
            QuizId::new(1),
            CourseId::new(1),
            "Hollow",
            None,
            50.0,
            Vec::new(),
            fixed_now(),
        )
        .unwrap();
        repo.upsert_quiz(&quiz).await.unwrap();

        let err = service(&repo)
            .submit_quiz(UserId::new(1), QuizId::new(1), &answers(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizServiceError::NoQuestions));
    }
}
