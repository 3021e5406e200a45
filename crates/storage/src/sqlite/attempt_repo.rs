use course_core::model::{AttemptId, QuizAttempt, QuizId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_attempt_record, write_err};
use crate::repository::{AttemptDraft, AttemptRecord, AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn record_attempt(&self, draft: AttemptDraft) -> Result<QuizAttempt, StorageError> {
        let user_id = id_to_i64("user_id", draft.user_id.value())?;
        let quiz_id = id_to_i64("quiz_id", draft.quiz_id.value())?;

        // Number assignment and insert share one transaction; a concurrent
        // submission that sneaks between them trips the
        // UNIQUE(user_id, quiz_id, attempt_number) constraint and surfaces
        // as Conflict instead of corrupting the sequence.
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let max_number: i64 = sqlx::query_scalar(
            r"
            SELECT COALESCE(MAX(attempt_number), 0)
            FROM quiz_attempts
            WHERE user_id = ?1 AND quiz_id = ?2
            ",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?;

        let attempt_number = u32::try_from(max_number + 1)
            .map_err(|_| StorageError::Serialization("attempt_number overflow".into()))?;

        let attempt = draft
            .into_attempt(AttemptId::generate(), attempt_number)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let record = AttemptRecord::from_attempt(&attempt)?;

        sqlx::query(
            r"
            INSERT INTO quiz_attempts (id, user_id, quiz_id, attempt_number, score, passed, results, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(record.id.to_string())
        .bind(user_id)
        .bind(quiz_id)
        .bind(i64::from(record.attempt_number))
        .bind(record.score)
        .bind(i64::from(record.passed))
        .bind(record.results_json)
        .bind(record.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        tx.commit().await.map_err(conn)?;
        Ok(attempt)
    }

    async fn attempts_for_user_quiz(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, quiz_id, attempt_number, score, passed, results, completed_at
            FROM quiz_attempts
            WHERE user_id = ?1 AND quiz_id = ?2
            ORDER BY attempt_number ASC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut attempts = Vec::with_capacity(rows.len());
        for row in &rows {
            attempts.push(map_attempt_record(row)?.into_attempt()?);
        }
        Ok(attempts)
    }

    async fn attempts_for_user(&self, user_id: UserId) -> Result<Vec<QuizAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, quiz_id, attempt_number, score, passed, results, completed_at
            FROM quiz_attempts
            WHERE user_id = ?1
            ORDER BY quiz_id ASC, attempt_number ASC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut attempts = Vec::with_capacity(rows.len());
        for row in &rows {
            attempts.push(map_attempt_record(row)?.into_attempt()?);
        }
        Ok(attempts)
    }

    async fn completed_quiz_count(
        &self,
        user_id: UserId,
        quiz_ids: &[QuizId],
    ) -> Result<usize, StorageError> {
        if quiz_ids.is_empty() {
            return Ok(0);
        }

        let mut sql = String::from(
            r"
            SELECT COUNT(DISTINCT quiz_id)
            FROM quiz_attempts
            WHERE user_id = ?1 AND quiz_id IN (
            ",
        );
        for i in 0..quiz_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("?{}", i + 2));
        }
        sql.push(')');

        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(id_to_i64("user_id", user_id.value())?);
        for quiz_id in quiz_ids {
            query = query.bind(id_to_i64("quiz_id", quiz_id.value())?);
        }

        let count = query.fetch_one(&self.pool).await.map_err(conn)?;
        usize::try_from(count)
            .map_err(|_| StorageError::Serialization("completed quiz count overflow".into()))
    }
}
