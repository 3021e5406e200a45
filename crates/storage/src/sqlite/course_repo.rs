use course_core::model::{Course, CourseId, LessonId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, course_id_from_i64, i64_to_u64, id_to_i64, ser};
use crate::repository::{CourseRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let course_id = id_to_i64("course_id", course.id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO courses (id, title, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title
            ",
        )
        .bind(course_id)
        .bind(course.title.clone())
        .bind(course.created_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // the lesson list is replaced wholesale to keep ordering authoritative
        sqlx::query("DELETE FROM lessons WHERE course_id = ?1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, lesson) in course.lessons.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO lessons (id, course_id, position)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(id_to_i64("lesson_id", lesson.value())?)
            .bind(course_id)
            .bind(i64::try_from(position).map_err(|_| {
                StorageError::Serialization("lesson position overflow".into())
            })?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)
    }

    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let course_id = id_to_i64("course_id", id.value())?;

        let row = sqlx::query("SELECT id, title, created_at FROM courses WHERE id = ?1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let lesson_rows = sqlx::query(
            r"
            SELECT id FROM lessons
            WHERE course_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lessons = Vec::with_capacity(lesson_rows.len());
        for lesson_row in &lesson_rows {
            lessons.push(LessonId::new(i64_to_u64(
                "lesson_id",
                lesson_row.try_get::<i64, _>("id").map_err(ser)?,
            )?));
        }

        Ok(Course {
            id: course_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
            title: row.try_get("title").map_err(ser)?,
            lessons,
            created_at: row.try_get("created_at").map_err(ser)?,
        })
    }
}
