use std::sync::Arc;

use chrono::{DateTime, Utc};

use course_core::model::{
    Assignment, AssignmentId, Eligibility, ExtensionRequest, ExtensionRequestId, ExtensionStatus,
    LateApproval, Submission, SubmissionDraft, SubmissionId, UserId, check_eligibility,
};
use course_core::time::Clock;
use storage::repository::{AssignmentRepository, StorageError};

use crate::error::AssignmentServiceError;

/// Gatekeeps assignment submissions against deadlines and late approvals,
/// and owns the administrative surfaces around them.
#[derive(Clone)]
pub struct AssignmentService {
    clock: Clock,
    assignments: Arc<dyn AssignmentRepository>,
}

impl AssignmentService {
    #[must_use]
    pub fn new(clock: Clock, assignments: Arc<dyn AssignmentRepository>) -> Self {
        Self { clock, assignments }
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

    /// Decides whether a new submission attempt may proceed at `now`.
    ///
    /// The verdict is advisory; [`AssignmentService::submit`] re-runs the
    /// check at its own clock reading before inserting.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::AssignmentNotFound` if the
    /// assignment is missing, or storage errors.
    pub async fn check_eligibility(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        now: DateTime<Utc>,
    ) -> Result<Eligibility, AssignmentServiceError> {
        let assignment = self.get_assignment(assignment_id).await?;
        let has_submission = self
            .assignments
            .find_submission(user_id, assignment_id)
            .await?
            .is_some();
        let approval = self
            .assignments
            .active_late_approval(user_id, assignment_id, now)
            .await?;

        Ok(check_eligibility(
            &assignment,
            has_submission,
            approval.as_ref(),
            now,
        ))
    }

    /// Accepts a submission if the eligibility check admits it.
    ///
    /// One submission per (user, assignment): a second attempt is rejected
    /// with `AlreadySubmitted` regardless of due-date status, and a storage
    /// conflict from a racing insert maps to the same error.
    ///
    /// # Errors
    ///
    /// - `AssignmentServiceError::AssignmentNotFound` if the assignment is
    ///   missing.
    /// - `AssignmentServiceError::Submission` for a malformed payload.
    /// - `AssignmentServiceError::AlreadySubmitted` for a duplicate pair.
    /// - `AssignmentServiceError::PastDeadline` when past due with no
    ///   active approval.
    pub async fn submit(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        draft: SubmissionDraft,
    ) -> Result<Submission, AssignmentServiceError> {
        let validated = draft.validate()?;
        let now = self.now();

        match self.check_eligibility(user_id, assignment_id, now).await? {
            Eligibility::AlreadySubmitted => {
                return Err(AssignmentServiceError::AlreadySubmitted);
            }
            verdict @ Eligibility::PastDue => {
                tracing::warn!(
                    user = %user_id,
                    assignment = %assignment_id,
                    "submission rejected past deadline"
                );
                return Err(AssignmentServiceError::PastDeadline {
                    reason: verdict
                        .rejection_reason()
                        .unwrap_or("past due, no approval"),
                });
            }
            Eligibility::OnTime | Eligibility::LateApproved => {}
        }

        let submission =
            validated.into_submission(SubmissionId::generate(), user_id, assignment_id, now);
        match self.assignments.insert_submission(&submission).await {
            Ok(()) => Ok(submission),
            Err(StorageError::Conflict) => Err(AssignmentServiceError::AlreadySubmitted),
            Err(e) => Err(e.into()),
        }
    }

    /// Grants (or renews) a late-submission window for one user on one
    /// assignment. Any prior approval for the pair is superseded, so exactly
    /// one approval exists for the pair afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::AssignmentNotFound` if the
    /// assignment is missing, or storage errors.
    pub async fn approve_late(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        approved_until: DateTime<Utc>,
    ) -> Result<LateApproval, AssignmentServiceError> {
        self.get_assignment(assignment_id).await?;

        let approval = LateApproval::new(user_id, assignment_id, approved_until, self.now());
        self.assignments.replace_late_approval(&approval).await?;

        tracing::info!(
            user = %user_id,
            assignment = %assignment_id,
            until = %approved_until,
            "late submission approved"
        );
        Ok(approval)
    }

    /// Files an extension request. Requests accumulate; none of them affect
    /// eligibility until an instructor separately grants a late approval.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::AssignmentNotFound` if the
    /// assignment is missing, or storage errors.
    pub async fn request_extension(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        requested_until: DateTime<Utc>,
        reason: impl Into<String> + Send,
    ) -> Result<ExtensionRequest, AssignmentServiceError> {
        self.get_assignment(assignment_id).await?;

        let request = ExtensionRequest::new(
            ExtensionRequestId::generate(),
            user_id,
            assignment_id,
            requested_until,
            reason,
            self.now(),
        );
        self.assignments.insert_extension_request(&request).await?;
        Ok(request)
    }

    /// Approves or rejects an extension request. Only the status field
    /// changes; no late approval is created or altered.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::ExtensionRequestNotFound` if the
    /// request is missing, or storage errors.
    pub async fn resolve_extension(
        &self,
        request_id: ExtensionRequestId,
        status: ExtensionStatus,
    ) -> Result<ExtensionRequest, AssignmentServiceError> {
        let mut request = match self.assignments.get_extension_request(request_id).await {
            Ok(request) => request,
            Err(StorageError::NotFound) => {
                return Err(AssignmentServiceError::ExtensionRequestNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        request.resolve(status, self.now());
        self.assignments.update_extension_request(&request).await?;
        Ok(request)
    }

    /// Extension requests filed against an assignment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::AssignmentNotFound` if the
    /// assignment is missing, or storage errors.
    pub async fn extension_requests(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<ExtensionRequest>, AssignmentServiceError> {
        self.get_assignment(assignment_id).await?;
        Ok(self
            .assignments
            .extension_requests_for_assignment(assignment_id)
            .await?)
    }

    /// Records an instructor grade on a submission.
    ///
    /// # Errors
    ///
    /// - `AssignmentServiceError::SubmissionNotFound` if the submission is
    ///   missing.
    /// - `AssignmentServiceError::InvalidGrade` if the grade is outside
    ///   `[0, max_score]`.
    pub async fn grade_submission(
        &self,
        submission_id: SubmissionId,
        grade: f64,
        feedback: Option<String>,
    ) -> Result<Submission, AssignmentServiceError> {
        let mut submission = match self.assignments.get_submission(submission_id).await {
            Ok(submission) => submission,
            Err(StorageError::NotFound) => {
                return Err(AssignmentServiceError::SubmissionNotFound);
            }
            Err(e) => return Err(e.into()),
        };
        let assignment = self.get_assignment(submission.assignment_id).await?;

        if !(0.0..=assignment.max_score()).contains(&grade) {
            return Err(AssignmentServiceError::InvalidGrade {
                grade,
                max_score: assignment.max_score(),
            });
        }

        submission.record_grade(grade, feedback);
        self.assignments.update_submission(&submission).await?;
        Ok(submission)
    }

    /// Moves an assignment's deadline. Already-accepted submissions are not
    /// re-evaluated against the new date.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::AssignmentNotFound` if the
    /// assignment is missing, or storage errors.
    pub async fn reschedule(
        &self,
        assignment_id: AssignmentId,
        due_date: DateTime<Utc>,
    ) -> Result<Assignment, AssignmentServiceError> {
        let mut assignment = self.get_assignment(assignment_id).await?;
        assignment.set_due_date(due_date, self.now());
        self.assignments.upsert_assignment(&assignment).await?;
        Ok(assignment)
    }

    async fn get_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Assignment, AssignmentServiceError> {
        match self.assignments.get_assignment(assignment_id).await {
            Ok(assignment) => Ok(assignment),
            Err(StorageError::NotFound) => Err(AssignmentServiceError::AssignmentNotFound),
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
    use chrono::Duration;
    use course_core::model::CourseId;
    use course_core::time::{Clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn service_at(repo: &InMemoryRepository, now: DateTime<Utc>) -> AssignmentService {
        AssignmentService::new(Clock::fixed(now), Arc::new(repo.clone()))
    }

    async fn seed_assignment(repo: &InMemoryRepository, due: DateTime<Utc>) {
        let assignment = Assignment::new(
            AssignmentId::new(1),
            CourseId::new(1),
            "Essay",
            None,
            due,
            100.0,
            fixed_now(),
        )
        .unwrap();
        repo.upsert_assignment(&assignment).await.unwrap();
    }

    fn text_draft() -> SubmissionDraft {
        SubmissionDraft::Text {
            content: "my essay".into(),
        }
    }

    #[tokio::test]
    async fn on_time_submission_is_accepted() {
        let repo = InMemoryRepository::new();
        let due = fixed_now() + Duration::days(1);
        seed_assignment(&repo, due).await;

        let submission = service_at(&repo, fixed_now())
            .submit(UserId::new(1), AssignmentId::new(1), text_draft())
            .await
            .unwrap();
        assert_eq!(submission.content.as_deref(), Some("my essay"));
        assert_eq!(submission.submitted_at, fixed_now());
    }

    #[tokio::test]
    async fn past_due_without_approval_is_rejected_with_reason() {
        let repo = InMemoryRepository::new();
        let due = fixed_now();
        seed_assignment(&repo, due).await;

        let err = service_at(&repo, due + Duration::days(1))
            .submit(UserId::new(1), AssignmentId::new(1), text_draft())
            .await
            .unwrap_err();
        match err {
            AssignmentServiceError::PastDeadline { reason } => {
                assert_eq!(reason, "past due, no approval");
            }
            other => panic!("expected PastDeadline, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn approval_window_admits_the_late_submission() {
        let repo = InMemoryRepository::new();
        let due = fixed_now();
        seed_assignment(&repo, due).await;

        let late = due + Duration::days(1);
        let svc = service_at(&repo, late);

        // rejected first, accepted after approval until day 2
        assert!(matches!(
            svc.submit(UserId::new(1), AssignmentId::new(1), text_draft())
                .await,
            Err(AssignmentServiceError::PastDeadline { .. })
        ));

        svc.approve_late(UserId::new(1), AssignmentId::new(1), due + Duration::days(2))
            .await
            .unwrap();

        let verdict = svc
            .check_eligibility(UserId::new(1), AssignmentId::new(1), late)
            .await
            .unwrap();
        assert_eq!(verdict, Eligibility::LateApproved);

        svc.submit(UserId::new(1), AssignmentId::new(1), text_draft())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn second_submission_is_already_submitted_even_when_on_time() {
        let repo = InMemoryRepository::new();
        seed_assignment(&repo, fixed_now() + Duration::days(7)).await;
        let svc = service_at(&repo, fixed_now());

        svc.submit(UserId::new(1), AssignmentId::new(1), text_draft())
            .await
            .unwrap();
        let err = svc
            .submit(UserId::new(1), AssignmentId::new(1), text_draft())
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentServiceError::AlreadySubmitted));
    }

    #[tokio::test]
    async fn renewing_an_approval_supersedes_the_previous_window() {
        let repo = InMemoryRepository::new();
        let due = fixed_now();
        seed_assignment(&repo, due).await;
        let svc = service_at(&repo, due);

        svc.approve_late(UserId::new(1), AssignmentId::new(1), due + Duration::days(1))
            .await
            .unwrap();
        svc.approve_late(UserId::new(1), AssignmentId::new(1), due + Duration::days(3))
            .await
            .unwrap();

        // the old one-day window no longer bounds eligibility
        let verdict = svc
            .check_eligibility(UserId::new(1), AssignmentId::new(1), due + Duration::days(2))
            .await
            .unwrap();
        assert_eq!(verdict, Eligibility::LateApproved);
    }

    #[tokio::test]
    async fn approving_an_extension_does_not_admit_a_late_submission() {
        let repo = InMemoryRepository::new();
        let due = fixed_now();
        seed_assignment(&repo, due).await;
        let late = due + Duration::days(1);
        let svc = service_at(&repo, late);

        let request = svc
            .request_extension(
                UserId::new(1),
                AssignmentId::new(1),
                due + Duration::days(3),
                "travelling",
            )
            .await
            .unwrap();
        let resolved = svc
            .resolve_extension(request.id, ExtensionStatus::Approved)
            .await
            .unwrap();
        assert_eq!(resolved.status, ExtensionStatus::Approved);

        // extension approval is informational; no late approval was created
        let err = svc
            .submit(UserId::new(1), AssignmentId::new(1), text_draft())
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentServiceError::PastDeadline { .. }));
    }

    #[tokio::test]
    async fn invalid_link_payload_is_rejected_before_any_store_write() {
        let repo = InMemoryRepository::new();
        seed_assignment(&repo, fixed_now() + Duration::days(1)).await;

        let err = service_at(&repo, fixed_now())
            .submit(
                UserId::new(1),
                AssignmentId::new(1),
                SubmissionDraft::Link {
                    href: "not a url".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentServiceError::Submission(_)));

        let stored = repo
            .find_submission(UserId::new(1), AssignmentId::new(1))
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn grading_enforces_the_assignment_maximum() {
        let repo = InMemoryRepository::new();
        seed_assignment(&repo, fixed_now() + Duration::days(1)).await;
        let svc = service_at(&repo, fixed_now());

        let submission = svc
            .submit(UserId::new(1), AssignmentId::new(1), text_draft())
            .await
            .unwrap();

        let err = svc
            .grade_submission(submission.id, 120.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentServiceError::InvalidGrade { .. }));

        let graded = svc
            .grade_submission(submission.id, 92.5, Some("nice".into()))
            .await
            .unwrap();
        assert_eq!(graded.grade, Some(92.5));
        assert!(graded.is_graded());
    }

    #[tokio::test]
    async fn rescheduling_moves_the_deadline_forward() {
        let repo = InMemoryRepository::new();
        let due = fixed_now();
        seed_assignment(&repo, due).await;
        let late = due + Duration::days(1);
        let svc = service_at(&repo, late);

        // past due now, but the deadline edit re-opens the window
        assert!(matches!(
            svc.submit(UserId::new(1), AssignmentId::new(1), text_draft())
                .await,
            Err(AssignmentServiceError::PastDeadline { .. })
        ));

        svc.reschedule(AssignmentId::new(1), due + Duration::days(7))
            .await
            .unwrap();
        svc.submit(UserId::new(1), AssignmentId::new(1), text_draft())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_assignment_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = service_at(&repo, fixed_now())
            .check_eligibility(UserId::new(1), AssignmentId::new(9), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentServiceError::AssignmentNotFound));
    }
}
