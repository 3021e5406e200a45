use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use course_core::model::{
    Assignment, AssignmentId, AttemptId, CourseId, Enrollment, EnrollmentStatus, ExtensionRequest,
    ExtensionRequestId, ExtensionStatus, LateApproval, LessonId, Question, QuestionId,
    QuestionType, QuizId, Submission, SubmissionId, SubmissionKind, TestCase, UserId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Distinguishes unique-constraint violations (the uniqueness backstops)
/// from plain connection failures.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn assignment_id_from_i64(v: i64) -> Result<AssignmentId, StorageError> {
    Ok(AssignmentId::new(i64_to_u64("assignment_id", v)?))
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

pub(crate) fn options_to_json(options: Option<&Vec<String>>) -> Result<Option<String>, StorageError> {
    options
        .map(|opts| serde_json::to_string(opts).map_err(ser))
        .transpose()
}

pub(crate) fn test_cases_to_json(cases: &[TestCase]) -> Result<String, StorageError> {
    serde_json::to_string(cases).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let type_str: String = row.try_get("question_type").map_err(ser)?;
    let question_type: QuestionType = type_str.parse().map_err(ser)?;

    let options: Option<Vec<String>> = row
        .try_get::<Option<String>, _>("options")
        .map_err(ser)?
        .map(|json| serde_json::from_str(&json).map_err(ser))
        .transpose()?;

    let test_cases: Vec<TestCase> =
        serde_json::from_str(&row.try_get::<String, _>("test_cases").map_err(ser)?).map_err(ser)?;

    Ok(Question {
        id: QuestionId::new(i64_to_u64(
            "question_id",
            row.try_get::<i64, _>("id").map_err(ser)?,
        )?),
        text: row.try_get("text").map_err(ser)?,
        question_type,
        options,
        correct_answer: row.try_get("correct_answer").map_err(ser)?,
        code_template: row.try_get("code_template").map_err(ser)?,
        test_cases,
    })
}

//
// ─── ENROLLMENTS ───────────────────────────────────────────────────────────────
//

pub(crate) fn lessons_to_json(lessons: &[LessonId]) -> Result<String, StorageError> {
    let raw: Vec<u64> = lessons.iter().map(LessonId::value).collect();
    serde_json::to_string(&raw).map_err(ser)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;
    let status: EnrollmentStatus = status_str.parse().map_err(ser)?;

    let completed_raw: Vec<u64> =
        serde_json::from_str(&row.try_get::<String, _>("completed_lessons").map_err(ser)?)
            .map_err(ser)?;
    let completed_lessons = completed_raw.into_iter().map(LessonId::new).collect();

    let current_lesson = row
        .try_get::<Option<i64>, _>("current_lesson")
        .map_err(ser)?
        .map(|v| i64_to_u64("current_lesson", v).map(LessonId::new))
        .transpose()?;

    Enrollment::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        row.try_get("lesson_progress").map_err(ser)?,
        row.try_get("progress_percentage").map_err(ser)?,
        status,
        completed_lessons,
        current_lesson,
        row.try_get("enrolled_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}

//
// ─── ASSIGNMENTS ───────────────────────────────────────────────────────────────
//

pub(crate) fn map_assignment_row(row: &SqliteRow) -> Result<Assignment, StorageError> {
    Assignment::from_persisted(
        assignment_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        row.try_get("due_date").map_err(ser)?,
        row.try_get("max_score").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_submission_row(row: &SqliteRow) -> Result<Submission, StorageError> {
    let id: SubmissionId = row
        .try_get::<String, _>("id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let kind: SubmissionKind = row
        .try_get::<String, _>("kind")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Ok(Submission {
        id,
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        assignment_id: assignment_id_from_i64(
            row.try_get::<i64, _>("assignment_id").map_err(ser)?,
        )?,
        kind,
        content: row.try_get("content").map_err(ser)?,
        file_url: row.try_get("file_url").map_err(ser)?,
        grade: row.try_get("grade").map_err(ser)?,
        feedback: row.try_get("feedback").map_err(ser)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

pub(crate) fn map_approval_row(row: &SqliteRow) -> Result<LateApproval, StorageError> {
    Ok(LateApproval {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        assignment_id: assignment_id_from_i64(
            row.try_get::<i64, _>("assignment_id").map_err(ser)?,
        )?,
        approved_until: row.try_get("approved_until").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_extension_row(row: &SqliteRow) -> Result<ExtensionRequest, StorageError> {
    let id: ExtensionRequestId = row
        .try_get::<String, _>("id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let status: ExtensionStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Ok(ExtensionRequest {
        id,
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        assignment_id: assignment_id_from_i64(
            row.try_get::<i64, _>("assignment_id").map_err(ser)?,
        )?,
        requested_until: row.try_get("requested_until").map_err(ser)?,
        reason: row.try_get("reason").map_err(ser)?,
        status,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

//
// ─── ATTEMPTS ──────────────────────────────────────────────────────────────────
//

pub(crate) fn map_attempt_record(
    row: &SqliteRow,
) -> Result<crate::repository::AttemptRecord, StorageError> {
    use crate::repository::AttemptRecord;

    let id: AttemptId = row
        .try_get::<String, _>("id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let attempt_number_i64: i64 = row.try_get("attempt_number").map_err(ser)?;
    let attempt_number = u32::try_from(attempt_number_i64).map_err(|_| {
        StorageError::Serialization(format!("invalid attempt_number: {attempt_number_i64}"))
    })?;

    Ok(AttemptRecord {
        id,
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        quiz_id: quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?,
        attempt_number,
        score: row.try_get("score").map_err(ser)?,
        passed: row.try_get::<i64, _>("passed").map_err(ser)? != 0,
        results_json: row.try_get("results").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}
