//! Pull tokenizer turning an XML byte buffer into structural events

use tracing::trace;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Pos, Result, Span};
use crate::lexer::cursor::is_whitespace;
use crate::lexer::Cursor;
use crate::xml::event::Event;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Streaming XML tokenizer
///
/// Yields [`Event`]s strictly in document order. Declarations, processing
/// instructions, comments and the doctype are skipped; CDATA sections are
/// reported as text.
#[derive(Debug)]
pub struct Tokenizer<'a> {
    cursor: Cursor<'a>,
    max_depth: usize,
    max_size: usize,
    open: Vec<String>,
    pending_end: Option<String>,
    started: bool,
    seen_root: bool,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer with the default limits
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_config(input, &Config::default())
    }

    /// Create a tokenizer using the limits from `config`
    pub fn with_config(input: &'a [u8], config: &Config) -> Self {
        Self {
            cursor: Cursor::new(input),
            max_depth: config.max_depth,
            max_size: config.max_size,
            open: Vec::new(),
            pending_end: None,
            started: false,
            seen_root: false,
            finished: false,
        }
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Get the next event, or `None` once the root element has closed
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(Event::End { name }));
        }
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            self.start()?;
        }

        loop {
            if self.open.is_empty() {
                self.cursor.skip_whitespace();
                if self.cursor.is_eof() {
                    if !self.seen_root {
                        return Err(self.error_here("no root element"));
                    }
                    self.finished = true;
                    return Ok(None);
                }
                if self.cursor.starts_with(b"<?") {
                    self.skip_until(b"<?", b"?>")?;
                } else if self.cursor.starts_with(b"<!--") {
                    self.skip_until(b"<!--", b"-->")?;
                } else if self.cursor.starts_with(b"<!") {
                    if self.seen_root {
                        return Err(self.error_here("declaration after root element"));
                    }
                    self.skip_doctype()?;
                } else if self.cursor.current() == Some(b'<') && self.cursor.peek(1) != Some(b'/') {
                    if self.seen_root {
                        return Err(self.error_here("multiple root elements"));
                    }
                    return self.start_tag().map(Some);
                } else {
                    return Err(self.error_here("content outside root element"));
                }
                continue;
            }

            if self.cursor.is_eof() {
                let name = self.open.last().map(String::as_str).unwrap_or_default();
                return Err(self.error_here(&format!("unterminated element <{name}>")));
            }
            if self.cursor.starts_with(b"</") {
                return self.end_tag().map(Some);
            }
            if self.cursor.starts_with(b"<!--") {
                self.skip_until(b"<!--", b"-->")?;
                continue;
            }
            if self.cursor.starts_with(b"<![CDATA[") {
                return self.cdata().map(Some);
            }
            if self.cursor.starts_with(b"<?") {
                self.skip_until(b"<?", b"?>")?;
                continue;
            }
            if self.cursor.starts_with(b"<!") {
                return Err(self.error_here("unexpected declaration"));
            }
            if self.cursor.current() == Some(b'<') {
                return self.start_tag().map(Some);
            }
            return self.text().map(Some);
        }
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        let len = self.cursor.remaining().len();
        if self.max_size > 0 && len > self.max_size {
            return Err(Error::at(
                ErrorKind::MaxSizeExceeded { max: self.max_size },
                0,
                1,
                1,
            ));
        }
        if self.cursor.starts_with(BOM) {
            self.cursor.advance_by(BOM.len());
        }
        Ok(())
    }

    fn start_tag(&mut self) -> Result<Event> {
        let start = self.cursor.position();
        self.cursor.advance();

        if self.max_depth > 0 && self.open.len() >= self.max_depth {
            return Err(Error::at(
                ErrorKind::MaxDepthExceeded {
                    max: self.max_depth,
                },
                start.offset,
                start.line,
                start.col,
            ));
        }

        let name = self.parse_name()?;
        let attributes = self.parse_attributes()?;

        if self.cursor.consume(b'/') {
            self.expect_byte(b'>')?;
            self.pending_end = Some(name.clone());
        } else {
            self.expect_byte(b'>')?;
            self.open.push(name.clone());
        }
        self.seen_root = true;

        trace!(name = %name, attributes = attributes.len(), "start tag");
        Ok(Event::Start { name, attributes })
    }

    fn end_tag(&mut self) -> Result<Event> {
        let start = self.cursor.position();
        self.cursor.advance_by(2);
        let name = self.parse_name()?;
        self.cursor.skip_whitespace();
        self.expect_byte(b'>')?;

        match self.open.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(Error::malformed(
                    start,
                    format!("mismatched closing tag: expected </{open}>, found </{name}>"),
                ));
            }
            None => return Err(Error::malformed(start, "unexpected closing tag")),
        }

        trace!(name = %name, "end tag");
        Ok(Event::End { name })
    }

    fn parse_attributes(&mut self) -> Result<Vec<(String, String)>> {
        let mut attrs: Vec<(String, String)> = Vec::new();

        loop {
            let had_space = self.cursor.current().is_some_and(is_whitespace);
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'/') | Some(b'>') => break,
                Some(_) if !had_space => {
                    return Err(self.error_here("expected whitespace before attribute"));
                }
                Some(_) => {}
                None => return Err(self.error_here("unexpected end of input")),
            }

            let pos = self.cursor.position();
            let name = self.parse_name()?;
            self.cursor.skip_whitespace();
            self.expect_byte(b'=')?;
            self.cursor.skip_whitespace();
            let value = self.parse_attribute_value()?;

            if attrs.iter().any(|(existing, _)| *existing == name) {
                return Err(Error::malformed(pos, format!("duplicate attribute: {name}")));
            }
            attrs.push((name, value));
        }

        Ok(attrs)
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b'"') => b'"',
            Some(b'\'') => b'\'',
            _ => return Err(self.error_here("expected quoted attribute value")),
        };
        self.cursor.advance();

        let pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance();
                let text = bytes_to_str(raw, pos)?;
                return decode_entities(text, pos);
            }
            if b == b'<' {
                return Err(self.error_here("'<' in attribute value"));
            }
            self.cursor.advance();
        }

        Err(self.error_here("unterminated attribute value"))
    }

    fn text(&mut self) -> Result<Event> {
        let pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }

        let raw = self.cursor.slice_from(start);
        let text = bytes_to_str(raw, pos)?;
        Ok(Event::Text(decode_entities(text, pos)?))
    }

    fn cdata(&mut self) -> Result<Event> {
        let pos = self.cursor.position();
        self.cursor.advance_by(b"<![CDATA[".len());
        let start = self.cursor.pos();
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(b"]]>") {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance_by(3);
                return Ok(Event::Text(bytes_to_str(raw, pos)?.to_string()));
            }
            self.cursor.advance();
        }
        Err(Error::malformed(pos, "unterminated CDATA section"))
    }

    fn parse_name(&mut self) -> Result<String> {
        let pos = self.cursor.position();
        let start = self.cursor.pos();

        match self.cursor.current() {
            Some(first) if is_name_start(first) => self.cursor.advance(),
            Some(_) => return Err(Error::malformed(pos, "invalid name")),
            None => return Err(self.error_here("expected name")),
        }

        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }

        let raw = self.cursor.slice_from(start);
        bytes_to_str(raw, pos).map(str::to_string)
    }

    fn skip_doctype(&mut self) -> Result<()> {
        // cursor at "<!"; an internal subset may contain '>' inside brackets
        let mut brackets = 0usize;
        while let Some(b) = self.cursor.current() {
            self.cursor.advance();
            match b {
                b'[' => brackets += 1,
                b']' => brackets = brackets.saturating_sub(1),
                b'>' if brackets == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(self.error_here("unterminated declaration"))
    }

    /// Skip markup from `opener` through `terminator`; the two never overlap
    fn skip_until(&mut self, opener: &[u8], terminator: &[u8]) -> Result<()> {
        let pos = self.cursor.position();
        self.cursor.advance_by(opener.len());
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(terminator) {
                self.cursor.advance_by(terminator.len());
                return Ok(());
            }
            self.cursor.advance();
        }
        Err(Error::malformed(pos, "unterminated markup"))
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected '{}'", char::from(expected))))
        }
    }

    fn error_here(&self, message: &str) -> Error {
        let pos = self.cursor.position();
        Error::with_message(ErrorKind::MalformedDocument, Span::new(pos, pos), message)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(err) => {
                self.finished = true;
                self.pending_end = None;
                Some(Err(err))
            }
        }
    }
}

fn bytes_to_str(bytes: &[u8], pos: Pos) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::malformed(pos, "invalid utf-8"))
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

fn decode_entities(input: &str, pos: Pos) -> Result<String> {
    if !input.contains('&') {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        let (head, tail) = rest.split_at(amp);
        result.push_str(head);

        let Some(semi) = tail.find(';') else {
            return Err(Error::malformed(pos, "unterminated entity reference"));
        };
        let entity = tail.get(1..semi).unwrap_or_default();
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => decode_numeric_entity(entity),
        };
        match decoded {
            Some(ch) => result.push(ch),
            None => {
                return Err(Error::malformed(
                    pos,
                    format!("invalid xml entity: &{entity};"),
                ));
            }
        }
        rest = tail.get(semi + 1..).unwrap_or_default();
    }
    result.push_str(rest);

    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let (digits, radix) = if let Some(hex) = entity.strip_prefix("#x") {
        (hex, 16)
    } else {
        (entity.strip_prefix('#')?, 10)
    };
    // from_str_radix would accept a leading sign
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .filter(|&c| is_xml_char(c))
}

/// `Char` production of XML 1.0
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &str) -> Result<Vec<Event>> {
        Tokenizer::new(input.as_bytes()).collect()
    }

    fn start(name: &str, attributes: &[(&str, &str)]) -> Event {
        Event::Start {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn end(name: &str) -> Event {
        Event::End {
            name: name.to_string(),
        }
    }

    fn text(s: &str) -> Event {
        Event::Text(s.to_string())
    }

    #[test]
    fn test_simple_element() -> Result<()> {
        assert_eq!(events("<root></root>")?, vec![start("root", &[]), end("root")]);
        Ok(())
    }

    #[test]
    fn test_attributes_in_source_order() -> Result<()> {
        let got = events("<root id=\"1\" name='test'></root>")?;
        assert_eq!(
            got,
            vec![start("root", &[("id", "1"), ("name", "test")]), end("root")]
        );
        Ok(())
    }

    #[test]
    fn test_nested_with_text() -> Result<()> {
        let got = events("<root><child>text</child></root>")?;
        assert_eq!(
            got,
            vec![
                start("root", &[]),
                start("child", &[]),
                text("text"),
                end("child"),
                end("root"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_self_closing_emits_end() -> Result<()> {
        let got = events("<root><child a=\"1\"/></root>")?;
        assert_eq!(
            got,
            vec![
                start("root", &[]),
                start("child", &[("a", "1")]),
                end("child"),
                end("root"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_whitespace_text_is_reported() -> Result<()> {
        let got = events("<a>\n  <b/>\n</a>")?;
        assert_eq!(got.get(1), Some(&text("\n  ")));
        assert_eq!(got.get(4), Some(&text("\n")));
        Ok(())
    }

    #[test]
    fn test_prolog_comments_and_pi_skipped() -> Result<()> {
        let input = "<?xml version=\"1.0\"?>\n<!DOCTYPE r [<!ENTITY x \"y\">]>\n<!-- c --><r><!-- inner --><?pi x?>t</r>\n<!-- tail -->";
        assert_eq!(events(input)?, vec![start("r", &[]), text("t"), end("r")]);
        Ok(())
    }

    #[test]
    fn test_cdata_is_text() -> Result<()> {
        let got = events("<r><![CDATA[<b>&amp;</b>]]></r>")?;
        assert_eq!(got.get(1), Some(&text("<b>&amp;</b>")));
        Ok(())
    }

    #[test]
    fn test_entities_decoded() -> Result<()> {
        let got = events("<r a=\"&quot;x&quot;\">&lt;&#65;&#x42;&amp;&apos;&gt;</r>")?;
        assert_eq!(
            got,
            vec![start("r", &[("a", "\"x\"")]), text("<AB&'>"), end("r")]
        );
        Ok(())
    }

    #[test]
    fn test_bom_skipped() -> Result<()> {
        let mut input = BOM.to_vec();
        input.extend_from_slice(b"<r/>");
        let got: Vec<Event> = Tokenizer::new(&input).collect::<Result<_>>()?;
        assert_eq!(got, vec![start("r", &[]), end("r")]);
        Ok(())
    }

    #[test]
    fn test_mismatched_close_tag() {
        let err = events("<a><b></a></b>").err();
        assert!(err.is_some_and(|e| e.is_malformed() && e.message().contains("mismatched")));
    }

    #[test]
    fn test_unterminated_element() {
        let err = events("<a><b>text").err();
        assert!(err.is_some_and(|e| e.message() == "unterminated element <b>"));
    }

    #[test]
    fn test_unknown_entity() {
        let err = events("<a>&nbsp;</a>").err();
        assert!(err.is_some_and(|e| e.message().contains("&nbsp;")));
    }

    #[test]
    fn test_duplicate_attribute() {
        let err = events("<a x=\"1\" x=\"2\"/>").err();
        assert!(err.is_some_and(|e| e.message() == "duplicate attribute: x"));
    }

    #[test]
    fn test_multiple_roots() {
        let err = events("<a/><b/>").err();
        assert!(err.is_some_and(|e| e.message() == "multiple root elements"));
    }

    #[test]
    fn test_empty_document() {
        let err = events("  \n").err();
        assert!(err.is_some_and(|e| e.message() == "no root element"));
    }

    #[test]
    fn test_text_outside_root() {
        let err = events("junk<a/>").err();
        assert!(err.is_some_and(|e| e.message() == "content outside root element"));
    }

    #[test]
    fn test_error_position() {
        let err = events("<a>\n  <1/>\n</a>").err();
        let span = err.map(|e| e.span());
        assert_eq!(span.map(|s| (s.start.line, s.start.col)), Some((2, 4)));
    }

    #[test]
    fn test_max_depth() {
        let config = Config::default().with_max_depth(2);
        let result: Result<Vec<Event>> =
            Tokenizer::with_config(b"<a><b><c/></b></a>", &config).collect();
        assert!(result
            .err()
            .is_some_and(|e| e.kind() == &ErrorKind::MaxDepthExceeded { max: 2 }));
    }

    #[test]
    fn test_max_size() {
        let config = Config::default().with_max_size(4);
        let result: Result<Vec<Event>> = Tokenizer::with_config(b"<abc/>", &config).collect();
        assert!(result
            .err()
            .is_some_and(|e| e.kind() == &ErrorKind::MaxSizeExceeded { max: 4 }));
    }

    #[test]
    fn test_comment_opener_is_not_its_own_terminator() {
        let err = events("<r><!--> x</r>").err();
        assert!(err.is_some_and(|e| e.is_malformed() && e.message() == "unterminated markup"));

        assert!(events("<!--><r/>").is_err());
        assert!(events("<r><!---></r>").is_err());
    }

    #[test]
    fn test_pi_opener_is_not_its_own_terminator() {
        let err = events("<?>").err();
        assert!(err.is_some_and(|e| e.message() == "unterminated markup"));

        assert!(events("<r><?></r>").is_err());
    }

    #[test]
    fn test_empty_comment_and_pi() -> Result<()> {
        assert_eq!(
            events("<!----><?x?><r><!----></r>")?,
            vec![start("r", &[]), end("r")]
        );
        Ok(())
    }

    #[test]
    fn test_numeric_reference_rejects_sign() {
        for input in ["<r>&#+65;</r>", "<r>&#-65;</r>", "<r>&#x+41;</r>", "<r>&#;</r>", "<r>&#x;</r>"] {
            let err = events(input).err();
            assert!(
                err.is_some_and(|e| e.message().starts_with("invalid xml entity")),
                "{input}"
            );
        }
    }

    #[test]
    fn test_numeric_reference_rejects_illegal_chars() {
        for input in ["<r>&#0;</r>", "<r>&#x1F;</r>", "<r>&#xFFFE;</r>", "<r>&#xD800;</r>"] {
            assert!(events(input).is_err(), "{input}");
        }
    }

    #[test]
    fn test_numeric_reference_legal_edges() -> Result<()> {
        let got = events("<r>&#9;&#xA;&#x10FFFF;&#x1F600;</r>")?;
        assert_eq!(got.get(1), Some(&text("\t\n\u{10FFFF}\u{1F600}")));
        Ok(())
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut tokenizer = Tokenizer::new(b"<a>&bogus;</a>");
        assert!(matches!(tokenizer.next(), Some(Ok(Event::Start { .. }))));
        assert!(matches!(tokenizer.next(), Some(Err(_))));
        assert!(tokenizer.next().is_none());
    }
}
