//! xmlfetch - schema-free XML to generic objects
//!
//! Fetches an XML document and turns it into a list of records made of
//! [`Value`]s: maps keyed by element and attribute names, sequences for
//! repeated siblings, and scalar text.
//!
//! # Quick Start
//!
//! ```
//! use xmlfetch::{from_xml_str_with_config, Config, Value};
//! # fn main() -> Result<(), xmlfetch::Error> {
//! let xml = r#"<books>
//!     <book id="1"><title>Dune</title><tag>sf</tag><tag>classic</tag></book>
//!     <book id="2"><title>Emma</title></book>
//! </books>"#;
//! let records = from_xml_str_with_config(xml, &Config::new(true, false))?;
//! assert_eq!(records.len(), 2);
//! let title = records[0].get("title").and_then(Value::as_scalar);
//! assert_eq!(title, Some("Dune"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, ErrorKind, Pos, Result, Span};

pub mod config;
pub use config::Config;

pub mod lexer;

pub mod value;
pub use value::{Map, Sequence, Value};

pub mod xml;
pub use xml::{Event, Tokenizer};

pub mod builder;
pub use builder::{Frame, TreeBuilder};

pub mod dispatch;
pub use dispatch::{Callbacks, Channel, Delegate, Dispatcher};

pub mod transport;
pub use transport::{AnyTransport, FileTransport, HttpTransport, Request, Transport};

pub mod fetch;
pub use fetch::Fetcher;

/// Build records from an XML string with the default configuration
pub fn from_xml_str(s: &str) -> Result<Vec<Value>> {
    builder::build(s.as_bytes(), &Config::default())
}

/// Build records from XML bytes with the default configuration
pub fn from_xml_bytes(bytes: &[u8]) -> Result<Vec<Value>> {
    builder::build(bytes, &Config::default())
}

/// Build records from an XML string with custom configuration
pub fn from_xml_str_with_config(s: &str, config: &Config) -> Result<Vec<Value>> {
    builder::build(s.as_bytes(), config)
}

/// Build records from XML bytes with custom configuration
pub fn from_xml_bytes_with_config(bytes: &[u8], config: &Config) -> Result<Vec<Value>> {
    builder::build(bytes, config)
}

/// Fetch `url` (or a file path) and build its records
pub async fn fetch(url: &str, config: Config) -> Result<Vec<Value>> {
    Fetcher::new(AnyTransport::default(), config)
        .fetch_url(url)
        .await
}
