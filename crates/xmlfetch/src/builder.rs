//! Tree-building state machine
//!
//! [`TreeBuilder`] consumes tokenizer events one at a time and assembles the
//! generic object graph. It keeps one [`Frame`] per open element; closing an
//! element folds its frame into the parent frame, or into the result
//! sequence when the element is a record.
//!
//! Records are the children of the wrapper element when
//! [`Config::has_wrapper_tag`] is set, otherwise the root element itself.
//! A record's value is always a [`Map`]. Any other element becomes:
//!
//! - a [`Value::Scalar`] holding its text, when it has no attributes and no
//!   children;
//! - otherwise a [`Value::Map`] with its attributes, then its children
//!   (replacing same-named attributes), then its text under
//!   [`Config::text_key`].
//!
//! Children sharing a key are promoted to a [`Value::Sequence`] on the
//! second occurrence.

use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::value::{Map, Value};
use crate::xml::{Event, Tokenizer};

/// Tokenize `input` and build its records in one pass
pub fn build(input: &[u8], config: &Config) -> Result<Vec<Value>> {
    let mut builder = TreeBuilder::new(config.clone());
    builder.start_document(config.has_wrapper_tag, config.skip_first);
    for event in Tokenizer::with_config(input, config) {
        builder.handle(event?)?;
    }
    builder.end_document()
}

fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// In-progress state of one open element
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Tag name as it appeared in the document
    pub tag: String,
    /// Key the finished value is installed under
    pub key: String,
    /// Attribute values, kept apart so children can take precedence
    pub attributes: Map,
    /// Finished child values, with array promotion applied
    pub children: Map,
    /// Character data received while this frame was innermost
    pub text: String,
    /// Set on the wrapper frame, whose children go straight to the result
    pub is_wrapper: bool,
}

impl Frame {
    fn new(tag: String, key: String, is_wrapper: bool) -> Self {
        Self {
            tag,
            key,
            attributes: Map::new(),
            children: Map::new(),
            text: String::new(),
            is_wrapper,
        }
    }

    /// Merge attributes, children and text into the element's final value
    fn finish(self, config: &Config, is_record: bool) -> Value {
        // whitespace-only text is layout, not content
        let text = if self.text.chars().all(is_xml_whitespace) {
            ""
        } else if config.trim_text {
            self.text.trim_matches(is_xml_whitespace)
        } else {
            self.text.as_str()
        };

        if !is_record && self.attributes.is_empty() && self.children.is_empty() {
            return Value::Scalar(text.to_string());
        }

        let mut map = self.attributes;
        for (key, value) in self.children {
            map.insert(key, value);
        }
        if !text.is_empty() {
            map.insert(config.text_key.as_str(), text);
        }
        Value::Map(map)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// No document started, or the last one was finished
    Idle,
    /// Between `start_document` and the root's close-tag
    Building,
    /// Root closed; only `end_document` is accepted
    RootClosed,
}

/// Event-driven builder for one document at a time
#[derive(Debug)]
pub struct TreeBuilder {
    config: Config,
    state: State,
    frames: Vec<Frame>,
    records: Vec<Value>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl TreeBuilder {
    /// Create a builder; call [`start_document`](Self::start_document) before feeding events
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: State::Idle,
            frames: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current nesting depth, wrapper included
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Records finished so far
    pub fn records(&self) -> &[Value] {
        &self.records
    }

    /// Reset all state and apply the two record-shaping switches
    pub fn start_document(&mut self, has_wrapper_tag: bool, skip_first: bool) {
        self.config.has_wrapper_tag = has_wrapper_tag;
        self.config.skip_first = skip_first;
        self.frames.clear();
        self.records.clear();
        self.state = State::Building;
        trace!(has_wrapper_tag, skip_first, "document start");
    }

    /// Push a frame for a new element and install its attributes
    pub fn element_open<I, K, V>(&mut self, tag: &str, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        match self.state {
            State::Building => {}
            State::Idle => return Err(Error::structural("element opened before document start")),
            State::RootClosed => {
                return Err(Error::structural(format!(
                    "element <{tag}> opened after the root element closed"
                )));
            }
        }

        let is_wrapper = self.frames.is_empty() && self.config.has_wrapper_tag;
        let key = self.config.key_for(tag).to_string();
        let mut frame = Frame::new(tag.to_string(), key, is_wrapper);
        for (name, value) in attributes {
            let name: String = name.into();
            let key = self.config.key_for(&name).to_string();
            frame.attributes.insert(key, Value::Scalar(value.into()));
        }

        trace!(tag, depth = self.frames.len(), is_wrapper, "element open");
        self.frames.push(frame);
        Ok(())
    }

    /// Append character data to the innermost open element
    pub fn character_data(&mut self, text: &str) -> Result<()> {
        match self.frames.last_mut() {
            Some(frame) if self.state == State::Building => {
                frame.text.push_str(text);
                Ok(())
            }
            _ if text.chars().all(is_xml_whitespace) => Ok(()),
            _ => Err(Error::structural("character data outside of any element")),
        }
    }

    /// Pop the innermost frame and install its finished value
    pub fn element_close(&mut self, tag: &str) -> Result<()> {
        if self.state != State::Building {
            return Err(Error::structural(format!(
                "closing tag </{tag}> without open element"
            )));
        }
        let Some(frame) = self.frames.pop() else {
            return Err(Error::structural(format!(
                "closing tag </{tag}> without open element"
            )));
        };
        if frame.tag != tag {
            let expected = frame.tag.clone();
            self.frames.push(frame);
            return Err(Error::structural(format!(
                "closing tag </{tag}> does not match open element <{expected}>"
            )));
        }

        trace!(tag, depth = self.frames.len(), "element close");

        if frame.is_wrapper {
            if !frame.attributes.is_empty() || !frame.text.chars().all(is_xml_whitespace) {
                warn!(tag, "discarding attributes and text of wrapper element");
            }
            // records were already appended as each child closed
            debug!(tag, records = self.records.len(), "wrapper element elided");
            self.state = State::RootClosed;
            return Ok(());
        }

        let is_record = match self.frames.last() {
            None => true,
            Some(parent) => parent.is_wrapper,
        };
        let key = frame.key.clone();
        let value = frame.finish(&self.config, is_record);

        if is_record {
            debug!(tag, index = self.records.len(), "record finished");
            self.records.push(value);
            if self.frames.is_empty() {
                self.state = State::RootClosed;
            }
        } else if let Some(parent) = self.frames.last_mut() {
            parent.children.insert_or_promote(key, value);
        }
        Ok(())
    }

    /// Forward one tokenizer event to the matching handler
    pub fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Start { name, attributes } => self.element_open(&name, attributes),
            Event::Text(text) => self.character_data(&text),
            Event::End { name } => self.element_close(&name),
        }
    }

    /// Finish the document and hand over the records
    ///
    /// Fails if any element is still open. The builder is reset either way.
    pub fn end_document(&mut self) -> Result<Vec<Value>> {
        let state = std::mem::replace(&mut self.state, State::Idle);
        let frames = std::mem::take(&mut self.frames);
        let mut records = std::mem::take(&mut self.records);

        if state == State::Idle {
            return Err(Error::structural("document ended before it started"));
        }
        if let Some(innermost) = frames.last() {
            let open: Vec<&str> = frames.iter().map(|f| f.tag.as_str()).collect();
            warn!(open = ?open, "document ended with open elements");
            return Err(Error::structural(format!(
                "document ended inside <{}> ({} open elements)",
                innermost.tag,
                frames.len()
            )));
        }

        if self.config.skip_first && !records.is_empty() {
            records.remove(0);
            debug!(remaining = records.len(), "skipped first record");
        }
        Ok(records)
    }
}
