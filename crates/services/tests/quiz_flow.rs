use std::collections::HashMap;
use std::sync::Arc;

use course_core::model::{
    Course, CourseId, EnrollmentStatus, LessonId, Question, QuestionId, Quiz, QuizId, UserId,
};
use course_core::time::{fixed_clock, fixed_now};
use services::{ProgressService, QuizService};
use storage::repository::{CourseRepository, InMemoryRepository, QuizRepository};

fn build_services(repo: &InMemoryRepository) -> (QuizService, ProgressService) {
    let progress = ProgressService::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let quiz = QuizService::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        progress.clone(),
    );
    (quiz, progress)
}

async fn seed(repo: &InMemoryRepository) {
    let course = Course::new(
        CourseId::new(1),
        "Rust Basics",
        vec![LessonId::new(1), LessonId::new(2)],
        fixed_now(),
    );
    repo.upsert_course(&course).await.unwrap();

    for id in [1_u64, 2] {
        let quiz = Quiz::new(
            QuizId::new(id),
            CourseId::new(1),
            format!("Checkpoint {id}"),
            None,
            60.0,
            vec![
                Question::true_false(QuestionId::new(1), "Rust is compiled", true),
                Question::multiple_choice(
                    QuestionId::new(2),
                    "Which keyword binds a value?",
                    vec!["let".into(), "set".into()],
                    "let",
                ),
            ],
            fixed_now(),
        )
        .unwrap();
        repo.upsert_quiz(&quiz).await.unwrap();
    }
}

fn all_correct() -> HashMap<QuestionId, String> {
    let mut answers = HashMap::new();
    answers.insert(QuestionId::new(1), "true".to_owned());
    answers.insert(QuestionId::new(2), "let".to_owned());
    answers
}

#[tokio::test]
async fn learner_walks_a_course_to_completion() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let (quiz_svc, progress_svc) = build_services(&repo);
    let user = UserId::new(7);
    let course = CourseId::new(1);

    progress_svc.enroll(user, course).await.unwrap();

    // half the lessons, half the quizzes -> blended 50, in progress
    progress_svc
        .complete_lesson(user, course, LessonId::new(1))
        .await
        .unwrap();
    let outcome = quiz_svc
        .submit_quiz(user, QuizId::new(1), &all_correct())
        .await
        .unwrap();
    assert_eq!(outcome.attempt.score(), 100.0);
    assert!(outcome.attempt.passed());
    assert_eq!(outcome.progress.overall_progress, 50.0);
    assert_eq!(outcome.progress.status, EnrollmentStatus::InProgress);

    // the rest of the course -> 100, completed
    progress_svc
        .complete_lesson(user, course, LessonId::new(2))
        .await
        .unwrap();
    let outcome = quiz_svc
        .submit_quiz(user, QuizId::new(2), &all_correct())
        .await
        .unwrap();
    assert_eq!(outcome.progress.overall_progress, 100.0);
    assert_eq!(outcome.progress.status, EnrollmentStatus::Completed);

    // completion is terminal; further attempts keep appending history
    let outcome = quiz_svc
        .submit_quiz(user, QuizId::new(1), &HashMap::new())
        .await
        .unwrap();
    assert_eq!(outcome.attempt.attempt_number(), 2);
    assert!(!outcome.attempt.passed());
    assert_eq!(outcome.progress.status, EnrollmentStatus::Completed);
    assert_eq!(outcome.progress.overall_progress, 100.0);
}

#[tokio::test]
async fn failed_attempts_move_progress_but_not_pass_state() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let (quiz_svc, progress_svc) = build_services(&repo);
    let user = UserId::new(7);

    let outcome = quiz_svc
        .submit_quiz(user, QuizId::new(1), &HashMap::new())
        .await
        .unwrap();
    assert_eq!(outcome.attempt.score(), 0.0);
    assert!(!outcome.attempt.passed());
    // an attempt exists, so the quiz counts as completed for progress
    assert_eq!(outcome.progress.completed_quizzes, 1);
    assert_eq!(outcome.progress.quiz_progress, 50.0);

    let stats = progress_svc.quiz_stats(user).await.unwrap();
    assert_eq!(stats.total_attempts, 1);
    assert_eq!(stats.pass_rate, 0.0);
}

#[tokio::test]
async fn replacing_quiz_questions_leaves_recorded_attempts_untouched() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let (quiz_svc, _) = build_services(&repo);
    let user = UserId::new(7);

    let before = quiz_svc
        .submit_quiz(user, QuizId::new(1), &all_correct())
        .await
        .unwrap();

    let mut quiz = repo.get_quiz(QuizId::new(1)).await.unwrap();
    quiz.replace_questions(
        vec![Question::true_false(
            QuestionId::new(9),
            "The borrow checker is optional",
            false,
        )],
        fixed_now(),
    );
    repo.upsert_quiz(&quiz).await.unwrap();

    let history = quiz_svc.attempt_history(user, QuizId::new(1)).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], before.attempt);
    assert_eq!(history[0].results()[0].question_id, QuestionId::new(1));
}
