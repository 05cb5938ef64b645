pub mod error;
pub mod reader;
pub mod tokenizer;

pub use error::{JsonError, JsonErrorKind};
pub use reader::TokenReader;
pub use tokenizer::{Token, TokenEvent};
