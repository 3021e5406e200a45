mod assignment;
mod attempt;
mod course;
mod enrollment;
mod ids;
mod question;
mod quiz;

pub use ids::{
    AssignmentId, AttemptId, CourseId, ExtensionRequestId, LessonId, ParseIdError, QuestionId,
    QuizId, SubmissionId, UserId,
};

pub use question::{ParseQuestionTypeError, Question, QuestionType, TestCase};

pub use quiz::{Quiz, QuizError};

pub use attempt::{
    AnswerOutcome, AttemptError, CodingDetail, QuestionResult, QuizAttempt, TestCaseResult,
};

pub use course::Course;

pub use enrollment::{Enrollment, EnrollmentError, EnrollmentStatus};

pub use assignment::{
    Assignment, AssignmentError, Eligibility, ExtensionRequest, ExtensionStatus, LateApproval,
    ParseExtensionStatusError, Submission, SubmissionDraft, SubmissionError, SubmissionKind,
    ValidatedSubmission, check_eligibility,
};
