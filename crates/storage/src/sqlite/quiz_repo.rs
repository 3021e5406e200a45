use course_core::model::{CourseId, Question, Quiz, QuizId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, course_id_from_i64, id_to_i64, map_question_row, options_to_json, quiz_id_from_i64, ser,
    test_cases_to_json,
};
use crate::repository::{QuizRepository, StorageError};

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let quiz_id = id_to_i64("quiz_id", quiz.id().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO quizzes (id, course_id, title, description, passing_score, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert; only update mutable fields
                course_id = excluded.course_id,
                title = excluded.title,
                description = excluded.description,
                passing_score = excluded.passing_score,
                updated_at = excluded.updated_at
            ",
        )
        .bind(quiz_id)
        .bind(id_to_i64("course_id", quiz.course_id().value())?)
        .bind(quiz.title().to_owned())
        .bind(quiz.description().map(ToOwned::to_owned))
        .bind(quiz.passing_score())
        .bind(quiz.created_at())
        .bind(quiz.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // question updates are delete-and-reinsert: the stored set always
        // mirrors the quiz's current ordered questions
        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = ?1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in quiz.questions().iter().enumerate() {
            insert_question(&mut tx, quiz_id, position, question).await?;
        }

        tx.commit().await.map_err(conn)
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError> {
        let quiz_id = id_to_i64("quiz_id", id.value())?;
        let row = sqlx::query(
            r"
            SELECT id, course_id, title, description, passing_score, created_at, updated_at
            FROM quizzes WHERE id = ?1
            ",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let questions = self.questions_for_quiz(quiz_id).await?;
        quiz_from_row(&row, questions)
    }

    async fn quizzes_for_course(&self, course_id: CourseId) -> Result<Vec<Quiz>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, description, passing_score, created_at, updated_at
            FROM quizzes
            WHERE course_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut quizzes = Vec::with_capacity(rows.len());
        for row in &rows {
            let quiz_id: i64 = row.try_get("id").map_err(ser)?;
            let questions = self.questions_for_quiz(quiz_id).await?;
            quizzes.push(quiz_from_row(row, questions)?);
        }
        Ok(quizzes)
    }
}

impl SqliteRepository {
    async fn questions_for_quiz(&self, quiz_id: i64) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, text, question_type, options, correct_answer, code_template, test_cases
            FROM quiz_questions
            WHERE quiz_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in &rows {
            questions.push(map_question_row(row)?);
        }
        Ok(questions)
    }
}

async fn insert_question(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    quiz_id: i64,
    position: usize,
    question: &Question,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO quiz_questions (id, quiz_id, position, text, question_type, options, correct_answer, code_template, test_cases)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ",
    )
    .bind(id_to_i64("question_id", question.id.value())?)
    .bind(quiz_id)
    .bind(
        i64::try_from(position)
            .map_err(|_| StorageError::Serialization("question position overflow".into()))?,
    )
    .bind(question.text.clone())
    .bind(question.question_type.as_str())
    .bind(options_to_json(question.options.as_ref())?)
    .bind(question.correct_answer.clone())
    .bind(question.code_template.clone())
    .bind(test_cases_to_json(&question.test_cases)?)
    .execute(&mut **tx)
    .await
    .map_err(conn)?;
    Ok(())
}

fn quiz_from_row(row: &SqliteRow, questions: Vec<Question>) -> Result<Quiz, StorageError> {
    Quiz::from_persisted(
        quiz_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        row.try_get("passing_score").map_err(ser)?,
        questions,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}
