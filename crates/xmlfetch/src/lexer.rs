//! Byte-level scanning support for the tokenizer

pub mod cursor;

pub use cursor::Cursor;
