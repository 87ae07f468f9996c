pub mod format;
pub mod markup;
pub mod question;

pub use question::{Answer, QuestionParser, QuestionRecord};
