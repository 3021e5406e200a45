use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use course_core::grading::round2;
use course_core::model::{
    Course, CourseId, Enrollment, EnrollmentStatus, LessonId, QuizAttempt, QuizId, UserId,
};
use course_core::progress::{overall_progress, quiz_progress};
use course_core::time::Clock;
use storage::repository::{
    AttemptRepository, CourseRepository, EnrollmentRepository, QuizRepository, StorageError,
};

use crate::error::ProgressServiceError;

//
// ─── RESULT TYPES ──────────────────────────────────────────────────────────────
//

/// Recomputed progress snapshot for one (user, course) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub overall_progress: f64,
    pub lesson_progress: f64,
    pub quiz_progress: f64,
    pub completed_quizzes: usize,
    pub total_quizzes: usize,
    pub status: EnrollmentStatus,
}

/// Aggregate quiz statistics across a user's whole attempt history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizStats {
    pub quizzes_attempted: usize,
    pub total_attempts: usize,
    pub average_score: f64,
    pub pass_rate: f64,
}

impl QuizStats {
    fn empty() -> Self {
        Self {
            quizzes_attempted: 0,
            total_attempts: 0,
            average_score: 0.0,
            pass_rate: 0.0,
        }
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Recomputes course progress and drives the enrollment lifecycle.
///
/// This service is the only writer of enrollment progress and status;
/// request handlers never touch the enrollment record directly.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn AttemptRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn AttemptRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            quizzes,
            attempts,
            enrollments,
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

    /// Enrolls a user in a course.
    ///
    /// # Errors
    ///
    /// - `ProgressServiceError::CourseNotFound` if the course is missing.
    /// - `ProgressServiceError::AlreadyEnrolled` if the pair already has an
    ///   enrollment.
    pub async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, ProgressServiceError> {
        self.get_course(course_id).await?;

        let enrollment = Enrollment::new(user_id, course_id, self.now());
        match self.enrollments.insert_enrollment(&enrollment).await {
            Ok(()) => Ok(enrollment),
            Err(StorageError::Conflict) => Err(ProgressServiceError::AlreadyEnrolled),
            Err(e) => Err(e.into()),
        }
    }

    /// Recomputes the blended progress for a (user, course) pair and writes
    /// the result back to the enrollment.
    ///
    /// A missing enrollment is auto-created with zero progress first, so the
    /// operation is idempotent for first-touch users. Recomputing twice with
    /// no underlying change yields the same snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::CourseNotFound` if the course is
    /// missing, or storage errors.
    pub async fn recompute(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        let course = self.get_course(course_id).await?;
        let mut enrollment = self.enrollment_or_default(user_id, course_id).await?;

        let quizzes = self.quizzes.quizzes_for_course(course_id).await?;
        let quiz_ids: Vec<QuizId> = quizzes.iter().map(course_core::model::Quiz::id).collect();
        let completed_quizzes = self
            .attempts
            .completed_quiz_count(user_id, &quiz_ids)
            .await?;

        let quiz_pct = quiz_progress(completed_quizzes, quiz_ids.len());
        let lesson_pct = round2(enrollment.lesson_progress());
        let overall = overall_progress(lesson_pct, quiz_pct, quiz_ids.len());

        let status = enrollment.apply_progress(overall, self.now());
        self.enrollments.update_enrollment(&enrollment).await?;

        tracing::debug!(
            user = %user_id,
            course = %course_id,
            overall = enrollment.progress_percentage(),
            status = %status,
            "course progress recomputed"
        );

        Ok(CourseProgress {
            user_id,
            course_id: course.id,
            overall_progress: enrollment.progress_percentage(),
            lesson_progress: lesson_pct,
            quiz_progress: quiz_pct,
            completed_quizzes,
            total_quizzes: quiz_ids.len(),
            status,
        })
    }

    /// Marks a lesson complete for the user and recomputes course progress.
    ///
    /// Completing the same lesson twice is a no-op beyond moving the
    /// current-lesson pointer.
    ///
    /// # Errors
    ///
    /// - `ProgressServiceError::CourseNotFound` if the course is missing.
    /// - `ProgressServiceError::LessonNotInCourse` if the lesson is not part
    ///   of the course.
    pub async fn complete_lesson(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        let course = self.get_course(course_id).await?;
        if !course.has_lesson(lesson_id) {
            return Err(ProgressServiceError::LessonNotInCourse);
        }

        let mut enrollment = self.enrollment_or_default(user_id, course_id).await?;
        enrollment.complete_lesson(lesson_id, course.lesson_count(), self.now());
        self.enrollments.update_enrollment(&enrollment).await?;

        self.recompute(user_id, course_id).await
    }

    /// Per-course progress snapshots for every enrollment a user holds.
    ///
    /// # Errors
    ///
    /// Returns storage errors, or `CourseNotFound` if an enrollment points
    /// at a course that no longer exists.
    pub async fn progress_overview(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseProgress>, ProgressServiceError> {
        let enrollments = self.enrollments.enrollments_for_user(user_id).await?;
        let mut overview = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            overview.push(self.recompute(user_id, enrollment.course_id()).await?);
        }
        Ok(overview)
    }

    /// Aggregate statistics over the user's whole attempt history.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn quiz_stats(&self, user_id: UserId) -> Result<QuizStats, ProgressServiceError> {
        let attempts = self.attempts.attempts_for_user(user_id).await?;
        if attempts.is_empty() {
            return Ok(QuizStats::empty());
        }

        let total_attempts = attempts.len();
        let passed = attempts.iter().filter(|a| a.passed()).count();
        let score_sum: f64 = attempts.iter().map(QuizAttempt::score).sum();

        let mut quiz_ids: Vec<QuizId> = attempts.iter().map(QuizAttempt::quiz_id).collect();
        quiz_ids.sort_unstable();
        quiz_ids.dedup();

        #[allow(clippy::cast_precision_loss)]
        let average_score = round2(score_sum / total_attempts as f64);
        #[allow(clippy::cast_precision_loss)]
        let pass_rate = round2((passed as f64 / total_attempts as f64) * 100.0);

        Ok(QuizStats {
            quizzes_attempted: quiz_ids.len(),
            total_attempts,
            average_score,
            pass_rate,
        })
    }

    async fn get_course(&self, course_id: CourseId) -> Result<Course, ProgressServiceError> {
        match self.courses.get_course(course_id).await {
            Ok(course) => Ok(course),
            Err(StorageError::NotFound) => Err(ProgressServiceError::CourseNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches the enrollment for the pair, creating a zeroed one if absent.
    async fn enrollment_or_default(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, ProgressServiceError> {
        if let Some(enrollment) = self.enrollments.find_enrollment(user_id, course_id).await? {
            return Ok(enrollment);
        }

        let enrollment = Enrollment::new(user_id, course_id, self.now());
        match self.enrollments.insert_enrollment(&enrollment).await {
            Ok(()) => Ok(enrollment),
            // lost a creation race; the stored row wins
            Err(StorageError::Conflict) => self
                .enrollments
                .find_enrollment(user_id, course_id)
                .await?
                .ok_or(ProgressServiceError::Storage(StorageError::NotFound)),
            Err(e) => Err(e.into()),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{Question, QuestionId, Quiz};
    use course_core::time::{fixed_clock, fixed_now};
    use storage::repository::{AttemptDraft, InMemoryRepository};

    fn service(repo: &InMemoryRepository) -> ProgressService {
        ProgressService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn seed_course(repo: &InMemoryRepository, lessons: u64, quizzes: u64) {
        let course = Course::new(
            CourseId::new(1),
            "Rust Basics",
            (1..=lessons).map(LessonId::new).collect(),
            fixed_now(),
        );
        repo.upsert_course(&course).await.unwrap();

        for id in 1..=quizzes {
            let quiz = Quiz::new(
                QuizId::new(id),
                CourseId::new(1),
                format!("Quiz {id}"),
                None,
                75.0,
                vec![Question::true_false(
                    QuestionId::new(1),
                    "Rust is compiled",
                    true,
                )],
                fixed_now(),
            )
            .unwrap();
            repo.upsert_quiz(&quiz).await.unwrap();
        }
    }

    async fn attempt(repo: &InMemoryRepository, quiz: u64) {
        repo.record_attempt(AttemptDraft {
            user_id: UserId::new(1),
            quiz_id: QuizId::new(quiz),
            score: 0.0,
            passed: false,
            results: Vec::new(),
            completed_at: fixed_now(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn recompute_auto_creates_a_not_started_enrollment() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 2, 0).await;

        let progress = service(&repo)
            .recompute(UserId::new(1), CourseId::new(1))
            .await
            .unwrap();
        assert_eq!(progress.overall_progress, 0.0);
        assert_eq!(progress.status, EnrollmentStatus::NotStarted);

        let stored = repo
            .find_enrollment(UserId::new(1), CourseId::new(1))
            .await
            .unwrap()
            .expect("auto-created");
        assert_eq!(stored.status(), EnrollmentStatus::NotStarted);
    }

    #[tokio::test]
    async fn recompute_for_missing_course_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .recompute(UserId::new(1), CourseId::new(9))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::CourseNotFound));
    }

    #[tokio::test]
    async fn half_lessons_half_quizzes_blend_to_fifty() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 2, 2).await;
        let svc = service(&repo);

        svc.complete_lesson(UserId::new(1), CourseId::new(1), LessonId::new(1))
            .await
            .unwrap();
        attempt(&repo, 1).await;

        let progress = svc.recompute(UserId::new(1), CourseId::new(1)).await.unwrap();
        assert_eq!(progress.lesson_progress, 50.0);
        assert_eq!(progress.quiz_progress, 50.0);
        assert_eq!(progress.overall_progress, 50.0);
        assert_eq!(progress.completed_quizzes, 1);
        assert_eq!(progress.total_quizzes, 2);
        assert_eq!(progress.status, EnrollmentStatus::InProgress);
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 2, 2).await;
        let svc = service(&repo);

        svc.complete_lesson(UserId::new(1), CourseId::new(1), LessonId::new(1))
            .await
            .unwrap();
        attempt(&repo, 1).await;

        let first = svc.recompute(UserId::new(1), CourseId::new(1)).await.unwrap();
        let second = svc.recompute(UserId::new(1), CourseId::new(1)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn without_quizzes_overall_equals_lesson_progress() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 4, 0).await;
        let svc = service(&repo);

        let progress = svc
            .complete_lesson(UserId::new(1), CourseId::new(1), LessonId::new(3))
            .await
            .unwrap();
        assert_eq!(progress.lesson_progress, 25.0);
        assert_eq!(progress.quiz_progress, 0.0);
        assert_eq!(progress.overall_progress, 25.0);
    }

    #[tokio::test]
    async fn everything_complete_reaches_completed_status() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 1, 1).await;
        let svc = service(&repo);

        svc.complete_lesson(UserId::new(1), CourseId::new(1), LessonId::new(1))
            .await
            .unwrap();
        attempt(&repo, 1).await;

        let progress = svc.recompute(UserId::new(1), CourseId::new(1)).await.unwrap();
        assert_eq!(progress.overall_progress, 100.0);
        assert_eq!(progress.status, EnrollmentStatus::Completed);
    }

    #[tokio::test]
    async fn lesson_outside_the_course_is_rejected() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 2, 0).await;
        let err = service(&repo)
            .complete_lesson(UserId::new(1), CourseId::new(1), LessonId::new(99))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::LessonNotInCourse));
    }

    #[tokio::test]
    async fn duplicate_enrollment_is_already_enrolled() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 1, 0).await;
        let svc = service(&repo);

        svc.enroll(UserId::new(1), CourseId::new(1)).await.unwrap();
        let err = svc.enroll(UserId::new(1), CourseId::new(1)).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::AlreadyEnrolled));
    }

    #[tokio::test]
    async fn enrolling_in_a_missing_course_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .enroll(UserId::new(1), CourseId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::CourseNotFound));
    }

    #[tokio::test]
    async fn quiz_stats_aggregate_scores_and_pass_rate() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 0, 2).await;

        for (quiz, score, passed) in [(1_u64, 100.0, true), (1, 50.0, false), (2, 80.0, true)] {
            repo.record_attempt(AttemptDraft {
                user_id: UserId::new(1),
                quiz_id: QuizId::new(quiz),
                score,
                passed,
                results: Vec::new(),
                completed_at: fixed_now(),
            })
            .await
            .unwrap();
        }

        let stats = service(&repo).quiz_stats(UserId::new(1)).await.unwrap();
        assert_eq!(stats.quizzes_attempted, 2);
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.average_score, 76.67);
        assert_eq!(stats.pass_rate, 66.67);
    }

    #[tokio::test]
    async fn quiz_stats_zero_out_without_attempts() {
        let repo = InMemoryRepository::new();
        let stats = service(&repo).quiz_stats(UserId::new(1)).await.unwrap();
        assert_eq!(stats, QuizStats::empty());
    }

    #[tokio::test]
    async fn progress_overview_covers_every_enrollment() {
        let repo = InMemoryRepository::new();
        seed_course(&repo, 1, 0).await;
        let second = Course::new(CourseId::new(2), "Advanced", vec![LessonId::new(1)], fixed_now());
        repo.upsert_course(&second).await.unwrap();

        let svc = service(&repo);
        svc.enroll(UserId::new(1), CourseId::new(1)).await.unwrap();
        svc.enroll(UserId::new(1), CourseId::new(2)).await.unwrap();

        let overview = svc.progress_overview(UserId::new(1)).await.unwrap();
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].course_id, CourseId::new(1));
        assert_eq!(overview[1].course_id, CourseId::new(2));
    }
}
