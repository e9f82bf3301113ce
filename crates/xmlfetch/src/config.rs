//! Per-fetch configuration

/// Key under which character data is stored when an element becomes a map
pub const DEFAULT_TEXT_KEY: &str = "#text";

/// Default maximum element nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum document size in bytes
pub const DEFAULT_MAX_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for a single fetch, fixed before any event is processed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The root element only wraps the records; its children become the result
    pub has_wrapper_tag: bool,
    /// Drop the first record (a header or summary element)
    pub skip_first: bool,
    /// Key for character data of elements that also carry attributes or children
    pub text_key: String,
    /// Trim surrounding whitespace from character data before storing it
    ///
    /// Off by default: text is stored verbatim and only whitespace-only text is dropped.
    pub trim_text: bool,
    /// Use the local part of `prefix:name` as the key
    pub strip_namespace_prefix: bool,
    /// Maximum nesting depth (0 means unlimited)
    pub max_depth: usize,
    /// Maximum document size in bytes (0 means unlimited)
    pub max_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            has_wrapper_tag: false,
            skip_first: false,
            text_key: DEFAULT_TEXT_KEY.to_string(),
            trim_text: false,
            strip_namespace_prefix: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl Config {
    /// Configuration with the two record-shaping switches set and defaults elsewhere
    pub fn new(has_wrapper_tag: bool, skip_first: bool) -> Self {
        Self {
            has_wrapper_tag,
            skip_first,
            ..Self::default()
        }
    }

    /// Default configuration with depth and size limits disabled
    pub fn unlimited() -> Self {
        Self {
            max_depth: 0,
            max_size: 0,
            ..Self::default()
        }
    }

    pub fn with_wrapper_tag(mut self, has_wrapper_tag: bool) -> Self {
        self.has_wrapper_tag = has_wrapper_tag;
        self
    }

    pub fn with_skip_first(mut self, skip_first: bool) -> Self {
        self.skip_first = skip_first;
        self
    }

    pub fn with_text_key(mut self, text_key: impl Into<String>) -> Self {
        self.text_key = text_key.into();
        self
    }

    pub fn with_trim_text(mut self, trim_text: bool) -> Self {
        self.trim_text = trim_text;
        self
    }

    pub fn with_strip_namespace_prefix(mut self, strip: bool) -> Self {
        self.strip_namespace_prefix = strip;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Key name for an element with the given tag
    pub fn key_for<'a>(&self, tag: &'a str) -> &'a str {
        if self.strip_namespace_prefix {
            tag.rsplit_once(':').map_or(tag, |(_, local)| local)
        } else {
            tag
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.has_wrapper_tag);
        assert!(!config.skip_first);
        assert_eq!(config.text_key, "#text");
        assert!(!config.trim_text);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_new_sets_switches() {
        let config = Config::new(true, true);
        assert!(config.has_wrapper_tag);
        assert!(config.skip_first);
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
    }

    #[test]
    fn test_unlimited() {
        let config = Config::unlimited();
        assert_eq!(config.max_depth, 0);
        assert_eq!(config.max_size, 0);
    }

    #[test]
    fn test_key_for() {
        let plain = Config::default();
        assert_eq!(plain.key_for("atom:entry"), "atom:entry");

        let stripped = Config::default().with_strip_namespace_prefix(true);
        assert_eq!(stripped.key_for("atom:entry"), "entry");
        assert_eq!(stripped.key_for("entry"), "entry");
    }
}
