use chrono::{DateTime, Utc};
use course_core::model::{
    Assignment, AssignmentId, CourseId, ExtensionRequest, ExtensionRequestId, LateApproval,
    Submission, SubmissionId, UserId,
};

use super::SqliteRepository;
use super::mapping::{
    conn, id_to_i64, map_approval_row, map_assignment_row, map_extension_row, map_submission_row,
    write_err,
};
use crate::repository::{AssignmentRepository, StorageError};

#[async_trait::async_trait]
impl AssignmentRepository for SqliteRepository {
    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO assignments (id, course_id, title, description, due_date, max_score, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert; only update mutable fields
                title = excluded.title,
                description = excluded.description,
                due_date = excluded.due_date,
                max_score = excluded.max_score,
                updated_at = excluded.updated_at
            ",
        )
        .bind(id_to_i64("assignment_id", assignment.id().value())?)
        .bind(id_to_i64("course_id", assignment.course_id().value())?)
        .bind(assignment.title().to_owned())
        .bind(assignment.description().map(ToOwned::to_owned))
        .bind(assignment.due_date())
        .bind(assignment.max_score())
        .bind(assignment.created_at())
        .bind(assignment.updated_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Assignment, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, course_id, title, description, due_date, max_score, created_at, updated_at
            FROM assignments WHERE id = ?1
            ",
        )
        .bind(id_to_i64("assignment_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_assignment_row(&row)
    }

    async fn assignments_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, description, due_date, max_score, created_at, updated_at
            FROM assignments
            WHERE course_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut assignments = Vec::with_capacity(rows.len());
        for row in &rows {
            assignments.push(map_assignment_row(row)?);
        }
        Ok(assignments)
    }

    async fn find_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Submission>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, assignment_id, kind, content, file_url, grade, feedback, submitted_at
            FROM submissions
            WHERE user_id = ?1 AND assignment_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("assignment_id", assignment_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_submission_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn get_submission(&self, id: SubmissionId) -> Result<Submission, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, assignment_id, kind, content, file_url, grade, feedback, submitted_at
            FROM submissions WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_submission_row(&row)
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO submissions (id, user_id, assignment_id, kind, content, file_url, grade, feedback, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(submission.id.to_string())
        .bind(id_to_i64("user_id", submission.user_id.value())?)
        .bind(id_to_i64("assignment_id", submission.assignment_id.value())?)
        .bind(submission.kind.as_str())
        .bind(submission.content.clone())
        .bind(submission.file_url.clone())
        .bind(submission.grade)
        .bind(submission.feedback.clone())
        .bind(submission.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn update_submission(&self, submission: &Submission) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE submissions SET
                grade = ?2,
                feedback = ?3
            WHERE id = ?1
            ",
        )
        .bind(submission.id.to_string())
        .bind(submission.grade)
        .bind(submission.feedback.clone())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn replace_late_approval(&self, approval: &LateApproval) -> Result<(), StorageError> {
        // one row per (user, assignment): a new approval supersedes the old
        sqlx::query(
            r"
            INSERT INTO late_approvals (user_id, assignment_id, approved_until, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, assignment_id) DO UPDATE SET
                approved_until = excluded.approved_until,
                created_at = excluded.created_at
            ",
        )
        .bind(id_to_i64("user_id", approval.user_id.value())?)
        .bind(id_to_i64("assignment_id", approval.assignment_id.value())?)
        .bind(approval.approved_until)
        .bind(approval.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn active_late_approval(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        now: DateTime<Utc>,
    ) -> Result<Option<LateApproval>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, assignment_id, approved_until, created_at
            FROM late_approvals
            WHERE user_id = ?1 AND assignment_id = ?2 AND approved_until > ?3
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("assignment_id", assignment_id.value())?)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_approval_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn insert_extension_request(
        &self,
        request: &ExtensionRequest,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO extension_requests (id, user_id, assignment_id, requested_until, reason, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(request.id.to_string())
        .bind(id_to_i64("user_id", request.user_id.value())?)
        .bind(id_to_i64("assignment_id", request.assignment_id.value())?)
        .bind(request.requested_until)
        .bind(request.reason.clone())
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_extension_request(
        &self,
        id: ExtensionRequestId,
    ) -> Result<ExtensionRequest, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, assignment_id, requested_until, reason, status, created_at, updated_at
            FROM extension_requests WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_extension_row(&row)
    }

    async fn extension_requests_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<ExtensionRequest>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, assignment_id, requested_until, reason, status, created_at, updated_at
            FROM extension_requests
            WHERE assignment_id = ?1
            ORDER BY created_at ASC
            ",
        )
        .bind(id_to_i64("assignment_id", assignment_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            requests.push(map_extension_row(row)?);
        }
        Ok(requests)
    }

    async fn update_extension_request(
        &self,
        request: &ExtensionRequest,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE extension_requests SET
                status = ?2,
                updated_at = ?3
            WHERE id = ?1
            ",
        )
        .bind(request.id.to_string())
        .bind(request.status.as_str())
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
