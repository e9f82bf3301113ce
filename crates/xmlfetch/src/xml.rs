//! XML tokenizer module

pub mod event;
pub mod tokenizer;

pub use event::Event;
pub use tokenizer::Tokenizer;
