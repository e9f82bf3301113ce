//! Structural events emitted by the tokenizer

/// One structural event, delivered in document order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Open tag with its attributes, entity-decoded, in source order
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    /// Character data; one element's text may arrive in several fragments
    Text(String),
    /// Close tag (also emitted right after `Start` for self-closing tags)
    End { name: String },
}

impl Event {
    /// Tag name for `Start` and `End` events
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Start { name, .. } | Self::End { name } => Some(name),
            Self::Text(_) => None,
        }
    }
}
