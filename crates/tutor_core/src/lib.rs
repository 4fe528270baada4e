pub mod domain;
pub mod normalize;
pub mod ports;

pub use domain::{
    AnswerVerdict, ChatMessage, LessonContext, Question, QuestionKind, Role, TopicAnalysis,
    TopicOutline,
};
pub use normalize::{normalize, ErrorKind, Notice};
pub use ports::{Action, ChatStream, PortError, PortResult, TutorBackend};
