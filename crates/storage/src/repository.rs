use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use course_core::model::{
    Assignment, AssignmentId, AttemptError, AttemptId, Course, CourseId, Enrollment,
    ExtensionRequest, ExtensionRequestId, LateApproval, QuestionResult, Quiz, QuizAttempt, QuizId,
    Submission, SubmissionId, UserId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── ATTEMPT RECORDS ───────────────────────────────────────────────────────────
//

/// Everything an attempt record holds except its identity and number.
///
/// Storage assigns the attempt number: it must be unique per (user, quiz),
/// start at 1, and increase without the caller ever seeing an intermediate
/// count. That keeps the count-then-insert race out of the service layer;
/// backends take a per-pair critical section (transaction or lock) instead.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptDraft {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub score: f64,
    pub passed: bool,
    pub results: Vec<QuestionResult>,
    pub completed_at: DateTime<Utc>,
}

impl AttemptDraft {
    /// Stamps the draft into a full attempt once storage has assigned the
    /// identity and sequence number.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidAttemptNumber` for a zero number.
    pub fn into_attempt(
        self,
        id: AttemptId,
        attempt_number: u32,
    ) -> Result<QuizAttempt, AttemptError> {
        QuizAttempt::new(
            id,
            self.user_id,
            self.quiz_id,
            attempt_number,
            self.score,
            self.passed,
            self.results,
            self.completed_at,
        )
    }
}

/// Persisted shape of an attempt, with the per-question results flattened to
/// a JSON blob the way the original system stores its detail documents.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub attempt_number: u32,
    pub score: f64,
    pub passed: bool,
    pub results_json: String,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Flattens a domain attempt for persistence.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the results fail to encode.
    pub fn from_attempt(attempt: &QuizAttempt) -> Result<Self, StorageError> {
        let results_json = serde_json::to_string(attempt.results())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self {
            id: attempt.id(),
            user_id: attempt.user_id(),
            quiz_id: attempt.quiz_id(),
            attempt_number: attempt.attempt_number(),
            score: attempt.score(),
            passed: attempt.passed(),
            results_json,
            completed_at: attempt.completed_at(),
        })
    }

    /// Rebuilds the domain attempt, validating on the way out of storage.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for an undecodable results blob
    /// or an invalid attempt number.
    pub fn into_attempt(self) -> Result<QuizAttempt, StorageError> {
        let results: Vec<QuestionResult> = serde_json::from_str(&self.results_json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        QuizAttempt::new(
            self.id,
            self.user_id,
            self.quiz_id,
            self.attempt_number,
            self.score,
            self.passed,
            results,
            self.completed_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository contract for courses and their lesson lists.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist or update a course summary.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Fetch a course by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError>;
}

/// Repository contract for quizzes and their question sets.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Persist or update a quiz. Updating replaces the stored question set
    /// wholesale (delete-and-reinsert), matching the domain's
    /// `replace_questions` semantics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// Fetch a quiz by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError>;

    /// All quizzes belonging to a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn quizzes_for_course(&self, course_id: CourseId) -> Result<Vec<Quiz>, StorageError>;
}

/// Repository contract for the append-only attempt history.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Record an attempt, atomically assigning the next attempt number for
    /// the (user, quiz) pair. Returns the stored attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn record_attempt(&self, draft: AttemptDraft) -> Result<QuizAttempt, StorageError>;

    /// Attempt history for one user on one quiz, ordered by attempt number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn attempts_for_user_quiz(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Vec<QuizAttempt>, StorageError>;

    /// Every attempt a user has recorded, across quizzes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn attempts_for_user(&self, user_id: UserId) -> Result<Vec<QuizAttempt>, StorageError>;

    /// How many of the given quizzes the user has attempted at least once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn completed_quiz_count(
        &self,
        user_id: UserId,
        quiz_ids: &[QuizId],
    ) -> Result<usize, StorageError>;
}

/// Repository contract for enrollments.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert a new enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the (user, course) pair already
    /// has one (the uniqueness backstop).
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// Fetch the enrollment for a (user, course) pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn find_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// Every enrollment a user holds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn enrollments_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StorageError>;

    /// Write back an updated enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the pair has no enrollment.
    async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;
}

/// Repository contract for assignments, submissions, late approvals, and
/// extension requests.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Persist or update an assignment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the assignment cannot be stored.
    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), StorageError>;

    /// Fetch an assignment by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_assignment(&self, id: AssignmentId) -> Result<Assignment, StorageError>;

    /// All assignments belonging to a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn assignments_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Assignment>, StorageError>;

    /// The submission for a (user, assignment) pair, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn find_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Submission>, StorageError>;

    /// Fetch a submission by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_submission(&self, id: SubmissionId) -> Result<Submission, StorageError>;

    /// Insert a new submission.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the (user, assignment) pair
    /// already has one (the uniqueness backstop).
    async fn insert_submission(&self, submission: &Submission) -> Result<(), StorageError>;

    /// Write back an updated submission (instructor grading).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the submission is missing.
    async fn update_submission(&self, submission: &Submission) -> Result<(), StorageError>;

    /// Install a late approval, superseding any prior approval for the pair.
    /// At most one approval row exists per (user, assignment) afterwards.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the approval cannot be stored.
    async fn replace_late_approval(&self, approval: &LateApproval) -> Result<(), StorageError>;

    /// The approval for a pair whose window is still open at `now`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn active_late_approval(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        now: DateTime<Utc>,
    ) -> Result<Option<LateApproval>, StorageError>;

    /// Insert a new extension request.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the request cannot be stored.
    async fn insert_extension_request(
        &self,
        request: &ExtensionRequest,
    ) -> Result<(), StorageError>;

    /// Fetch an extension request by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_extension_request(
        &self,
        id: ExtensionRequestId,
    ) -> Result<ExtensionRequest, StorageError>;

    /// All extension requests filed against an assignment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn extension_requests_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<ExtensionRequest>, StorageError>;

    /// Write back an updated extension request.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the request is missing.
    async fn update_extension_request(
        &self,
        request: &ExtensionRequest,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    quizzes: Arc<Mutex<HashMap<QuizId, Quiz>>>,
    attempts: Arc<Mutex<HashMap<(UserId, QuizId), Vec<QuizAttempt>>>>,
    enrollments: Arc<Mutex<HashMap<(UserId, CourseId), Enrollment>>>,
    assignments: Arc<Mutex<HashMap<AssignmentId, Assignment>>>,
    submissions: Arc<Mutex<HashMap<(UserId, AssignmentId), Submission>>>,
    approvals: Arc<Mutex<HashMap<(UserId, AssignmentId), LateApproval>>>,
    extensions: Arc<Mutex<HashMap<ExtensionRequestId, ExtensionRequest>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.courses.lock().map_err(poisoned)?;
        guard.insert(course.id, course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let guard = self.courses.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        guard.insert(quiz.id(), quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn quizzes_for_course(&self, course_id: CourseId) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        let mut quizzes: Vec<Quiz> = guard
            .values()
            .filter(|q| q.course_id() == course_id)
            .cloned()
            .collect();
        quizzes.sort_by_key(Quiz::id);
        Ok(quizzes)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn record_attempt(&self, draft: AttemptDraft) -> Result<QuizAttempt, StorageError> {
        // One lock spans the number assignment and the insert, so the
        // sequence cannot skip or repeat under interleaving.
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let history = guard.entry((draft.user_id, draft.quiz_id)).or_default();
        let next_number = history
            .iter()
            .map(QuizAttempt::attempt_number)
            .max()
            .unwrap_or(0)
            + 1;
        let attempt = draft
            .into_attempt(AttemptId::generate(), next_number)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        history.push(attempt.clone());
        Ok(attempt)
    }

    async fn attempts_for_user_quiz(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let mut attempts = guard.get(&(user_id, quiz_id)).cloned().unwrap_or_default();
        attempts.sort_by_key(QuizAttempt::attempt_number);
        Ok(attempts)
    }

    async fn attempts_for_user(&self, user_id: UserId) -> Result<Vec<QuizAttempt>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let mut attempts: Vec<QuizAttempt> = guard
            .iter()
            .filter(|((user, _), _)| *user == user_id)
            .flat_map(|(_, history)| history.iter().cloned())
            .collect();
        attempts.sort_by_key(|a| (a.quiz_id(), a.attempt_number()));
        Ok(attempts)
    }

    async fn completed_quiz_count(
        &self,
        user_id: UserId,
        quiz_ids: &[QuizId],
    ) -> Result<usize, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        Ok(quiz_ids
            .iter()
            .filter(|quiz_id| {
                guard
                    .get(&(user_id, **quiz_id))
                    .is_some_and(|history| !history.is_empty())
            })
            .count())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = self.enrollments.lock().map_err(poisoned)?;
        let key = (enrollment.user_id(), enrollment.course_id());
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, enrollment.clone());
        Ok(())
    }

    async fn find_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = self.enrollments.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, course_id)).cloned())
    }

    async fn enrollments_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StorageError> {
        let guard = self.enrollments.lock().map_err(poisoned)?;
        let mut enrollments: Vec<Enrollment> = guard
            .iter()
            .filter(|((user, _), _)| *user == user_id)
            .map(|(_, e)| e.clone())
            .collect();
        enrollments.sort_by_key(Enrollment::course_id);
        Ok(enrollments)
    }

    async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = self.enrollments.lock().map_err(poisoned)?;
        let key = (enrollment.user_id(), enrollment.course_id());
        if !guard.contains_key(&key) {
            return Err(StorageError::NotFound);
        }
        guard.insert(key, enrollment.clone());
        Ok(())
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryRepository {
    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), StorageError> {
        let mut guard = self.assignments.lock().map_err(poisoned)?;
        guard.insert(assignment.id(), assignment.clone());
        Ok(())
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Assignment, StorageError> {
        let guard = self.assignments.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn assignments_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Assignment>, StorageError> {
        let guard = self.assignments.lock().map_err(poisoned)?;
        let mut assignments: Vec<Assignment> = guard
            .values()
            .filter(|a| a.course_id() == course_id)
            .cloned()
            .collect();
        assignments.sort_by_key(Assignment::id);
        Ok(assignments)
    }

    async fn find_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Submission>, StorageError> {
        let guard = self.submissions.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, assignment_id)).cloned())
    }

    async fn get_submission(&self, id: SubmissionId) -> Result<Submission, StorageError> {
        let guard = self.submissions.lock().map_err(poisoned)?;
        guard
            .values()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StorageError> {
        let mut guard = self.submissions.lock().map_err(poisoned)?;
        let key = (submission.user_id, submission.assignment_id);
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, submission.clone());
        Ok(())
    }

    async fn update_submission(&self, submission: &Submission) -> Result<(), StorageError> {
        let mut guard = self.submissions.lock().map_err(poisoned)?;
        let key = (submission.user_id, submission.assignment_id);
        if !guard.contains_key(&key) {
            return Err(StorageError::NotFound);
        }
        guard.insert(key, submission.clone());
        Ok(())
    }

    async fn replace_late_approval(&self, approval: &LateApproval) -> Result<(), StorageError> {
        let mut guard = self.approvals.lock().map_err(poisoned)?;
        guard.insert(
            (approval.user_id, approval.assignment_id),
            approval.clone(),
        );
        Ok(())
    }

    async fn active_late_approval(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        now: DateTime<Utc>,
    ) -> Result<Option<LateApproval>, StorageError> {
        let guard = self.approvals.lock().map_err(poisoned)?;
        Ok(guard
            .get(&(user_id, assignment_id))
            .filter(|approval| approval.is_active(now))
            .cloned())
    }

    async fn insert_extension_request(
        &self,
        request: &ExtensionRequest,
    ) -> Result<(), StorageError> {
        let mut guard = self.extensions.lock().map_err(poisoned)?;
        guard.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_extension_request(
        &self,
        id: ExtensionRequestId,
    ) -> Result<ExtensionRequest, StorageError> {
        let guard = self.extensions.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn extension_requests_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<ExtensionRequest>, StorageError> {
        let guard = self.extensions.lock().map_err(poisoned)?;
        let mut requests: Vec<ExtensionRequest> = guard
            .values()
            .filter(|r| r.assignment_id == assignment_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn update_extension_request(
        &self,
        request: &ExtensionRequest,
    ) -> Result<(), StorageError> {
        let mut guard = self.extensions.lock().map_err(poisoned)?;
        if !guard.contains_key(&request.id) {
            return Err(StorageError::NotFound);
        }
        guard.insert(request.id, request.clone());
        Ok(())
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            courses: Arc::new(repo.clone()),
            quizzes: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            assignments: Arc::new(repo),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use course_core::model::{EnrollmentStatus, SubmissionDraft};
    use course_core::time::fixed_now;

    fn draft(user: u64, quiz: u64) -> AttemptDraft {
        AttemptDraft {
            user_id: UserId::new(user),
            quiz_id: QuizId::new(quiz),
            score: 80.0,
            passed: true,
            results: Vec::new(),
            completed_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn attempt_numbers_increase_without_gaps() {
        let repo = InMemoryRepository::new();
        for expected in 1..=3 {
            let attempt = repo.record_attempt(draft(1, 1)).await.unwrap();
            assert_eq!(attempt.attempt_number(), expected);
        }

        // independent pairs get independent sequences
        let other_quiz = repo.record_attempt(draft(1, 2)).await.unwrap();
        assert_eq!(other_quiz.attempt_number(), 1);
        let other_user = repo.record_attempt(draft(2, 1)).await.unwrap();
        assert_eq!(other_user.attempt_number(), 1);

        let history = repo
            .attempts_for_user_quiz(UserId::new(1), QuizId::new(1))
            .await
            .unwrap();
        let numbers: Vec<u32> = history.iter().map(QuizAttempt::attempt_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn completed_quiz_count_is_distinct_per_quiz() {
        let repo = InMemoryRepository::new();
        repo.record_attempt(draft(1, 1)).await.unwrap();
        repo.record_attempt(draft(1, 1)).await.unwrap();

        let count = repo
            .completed_quiz_count(UserId::new(1), &[QuizId::new(1), QuizId::new(2)])
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn duplicate_enrollment_is_a_conflict() {
        let repo = InMemoryRepository::new();
        let enrollment = Enrollment::new(UserId::new(1), CourseId::new(1), fixed_now());
        repo.insert_enrollment(&enrollment).await.unwrap();

        let err = repo.insert_enrollment(&enrollment).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn update_enrollment_requires_existing_row() {
        let repo = InMemoryRepository::new();
        let enrollment = Enrollment::new(UserId::new(1), CourseId::new(1), fixed_now());
        let err = repo.update_enrollment(&enrollment).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.insert_enrollment(&enrollment).await.unwrap();
        let mut updated = enrollment.clone();
        updated.apply_progress(50.0, fixed_now());
        repo.update_enrollment(&updated).await.unwrap();

        let fetched = repo
            .find_enrollment(UserId::new(1), CourseId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.status(), EnrollmentStatus::InProgress);
    }

    #[tokio::test]
    async fn duplicate_submission_is_a_conflict() {
        let repo = InMemoryRepository::new();
        let submission = SubmissionDraft::Text {
            content: "my essay".into(),
        }
        .validate()
        .unwrap()
        .into_submission(
            SubmissionId::generate(),
            UserId::new(1),
            AssignmentId::new(1),
            fixed_now(),
        );
        repo.insert_submission(&submission).await.unwrap();

        let again = SubmissionDraft::Text {
            content: "second try".into(),
        }
        .validate()
        .unwrap()
        .into_submission(
            SubmissionId::generate(),
            UserId::new(1),
            AssignmentId::new(1),
            fixed_now(),
        );
        let err = repo.insert_submission(&again).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn replacing_a_late_approval_leaves_one_active() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let first = LateApproval::new(
            UserId::new(1),
            AssignmentId::new(1),
            now + Duration::days(1),
            now,
        );
        repo.replace_late_approval(&first).await.unwrap();

        let second = LateApproval::new(
            UserId::new(1),
            AssignmentId::new(1),
            now + Duration::days(5),
            now,
        );
        repo.replace_late_approval(&second).await.unwrap();

        let active = repo
            .active_late_approval(UserId::new(1), AssignmentId::new(1), now)
            .await
            .unwrap()
            .expect("one approval active");
        assert_eq!(active.approved_until, now + Duration::days(5));
    }

    #[tokio::test]
    async fn expired_approval_is_not_active() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let approval = LateApproval::new(
            UserId::new(1),
            AssignmentId::new(1),
            now - Duration::hours(1),
            now - Duration::days(1),
        );
        repo.replace_late_approval(&approval).await.unwrap();

        let active = repo
            .active_late_approval(UserId::new(1), AssignmentId::new(1), now)
            .await
            .unwrap();
        assert!(active.is_none());
    }

    #[tokio::test]
    async fn attempt_record_round_trips_results_json() {
        use course_core::model::{AnswerOutcome, QuestionId, QuestionType};

        let attempt = AttemptDraft {
            user_id: UserId::new(1),
            quiz_id: QuizId::new(1),
            score: 50.0,
            passed: false,
            results: vec![QuestionResult {
                question_id: QuestionId::new(1),
                question_type: QuestionType::MultipleChoice,
                outcome: AnswerOutcome::Correct,
                details: None,
            }],
            completed_at: fixed_now(),
        }
        .into_attempt(AttemptId::generate(), 1)
        .unwrap();

        let record = AttemptRecord::from_attempt(&attempt).unwrap();
        let restored = record.into_attempt().unwrap();
        assert_eq!(restored, attempt);
    }
}
