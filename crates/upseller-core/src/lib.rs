pub mod attachment;
pub mod client_state;
pub mod config_manager;
pub mod conversation;
pub mod error;
pub mod questionnaire;

pub use attachment::*;
pub use config_manager::*;
pub use conversation::*;
pub use error::*;
pub use questionnaire::{
    question, Question, QuestionnaireState, Stage, ANALYSIS_LEVEL, LEVEL_COUNT, MAX_ANSWER_CHARS,
    QUESTIONS,
};
