use course_core::model::{CourseId, Enrollment, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, lessons_to_json, map_enrollment_row, write_err};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO enrollments (
                user_id, course_id, lesson_progress, progress_percentage,
                status, completed_lessons, current_lesson, enrolled_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(id_to_i64("user_id", enrollment.user_id().value())?)
        .bind(id_to_i64("course_id", enrollment.course_id().value())?)
        .bind(enrollment.lesson_progress())
        .bind(enrollment.progress_percentage())
        .bind(enrollment.status().as_str())
        .bind(lessons_to_json(enrollment.completed_lessons())?)
        .bind(
            enrollment
                .current_lesson()
                .map(|l| id_to_i64("current_lesson", l.value()))
                .transpose()?,
        )
        .bind(enrollment.enrolled_at())
        .bind(enrollment.updated_at())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn find_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, course_id, lesson_progress, progress_percentage,
                   status, completed_lessons, current_lesson, enrolled_at, updated_at
            FROM enrollments
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_enrollment_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn enrollments_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, lesson_progress, progress_percentage,
                   status, completed_lessons, current_lesson, enrolled_at, updated_at
            FROM enrollments
            WHERE user_id = ?1
            ORDER BY course_id ASC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut enrollments = Vec::with_capacity(rows.len());
        for row in &rows {
            enrollments.push(map_enrollment_row(row)?);
        }
        Ok(enrollments)
    }

    async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE enrollments SET
                lesson_progress = ?3,
                progress_percentage = ?4,
                status = ?5,
                completed_lessons = ?6,
                current_lesson = ?7,
                updated_at = ?8
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", enrollment.user_id().value())?)
        .bind(id_to_i64("course_id", enrollment.course_id().value())?)
        .bind(enrollment.lesson_progress())
        .bind(enrollment.progress_percentage())
        .bind(enrollment.status().as_str())
        .bind(lessons_to_json(enrollment.completed_lessons())?)
        .bind(
            enrollment
                .current_lesson()
                .map(|l| id_to_i64("current_lesson", l.value()))
                .transpose()?,
        )
        .bind(enrollment.updated_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
