#![forbid(unsafe_code)]

pub mod assignment_service;
pub mod error;
pub mod progress_service;
pub mod quiz_service;

pub use course_core::Clock;

pub use error::{AssignmentServiceError, ProgressServiceError, QuizServiceError};

pub use assignment_service::AssignmentService;
pub use progress_service::{CourseProgress, ProgressService, QuizStats};
pub use quiz_service::{QuizService, QuizSubmissionOutcome};
