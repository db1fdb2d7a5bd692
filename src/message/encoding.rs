//! Delimiter sets and the escape engine.
//!
//! Every HL7 message declares its own delimiters in the header segment. An [`Encoding`] holds
//! those characters for one message together with the MLLP framing bytes and the escape
//! tokens derived from them. It is immutable once built and is passed by reference to every
//! node that parses or encodes text.
//!
//! # Escape tokens
//!
//! Delimiter characters that appear inside a value are written as a three character token
//! made of the escape character, a tag letter and the escape character again:
//!
//! | literal      | tag |
//! |--------------|-----|
//! | repetition   | `R` |
//! | field        | `F` |
//! | component    | `S` |
//! | subcomponent | `T` |
//! | escape       | `E` |
//!
//! The segment delimiter is never escaped.

/// Vertical tab; opens an MLLP frame.
pub const START_BLOCK: u8 = 0x0B;
/// File separator; closes an MLLP frame.
pub const END_BLOCK: u8 = 0x1C;

const REPETITION_TAG: char = 'R';
const FIELD_TAG: char = 'F';
const COMPONENT_TAG: char = 'S';
const SUB_COMPONENT_TAG: char = 'T';
const ESCAPE_TAG: char = 'E';

/// Delimiters, escape tokens and framing bytes for a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub segment: char,
    pub repetition: char,
    pub field: char,
    pub component: char,
    pub sub_component: char,
    pub escape: char,
    pub start_block: u8,
    pub end_block: u8,

    characters: String,
    repetition_escape: String,
    field_escape: String,
    component_escape: String,
    sub_component_escape: String,
    escape_escape: String,
}

impl Default for Encoding {
    /// `\r ~ | ^ & \`, the delimiters nearly every sender uses.
    fn default() -> Self {
        Self::new('\r', '~', '|', '^', '&', '\\')
    }
}

impl Encoding {
    pub fn new(
        segment: char,
        repetition: char,
        field: char,
        component: char,
        sub_component: char,
        escape: char,
    ) -> Self {
        let token = |tag: char| [escape, tag, escape].iter().collect::<String>();

        Self {
            segment,
            repetition,
            field,
            component,
            sub_component,
            escape,
            start_block: START_BLOCK,
            end_block: END_BLOCK,
            characters: [component, repetition, escape, sub_component]
                .iter()
                .collect(),
            repetition_escape: token(REPETITION_TAG),
            field_escape: token(FIELD_TAG),
            component_escape: token(COMPONENT_TAG),
            sub_component_escape: token(SUB_COMPONENT_TAG),
            escape_escape: token(ESCAPE_TAG),
        }
    }

    /// Default delimiters with `\n` between segments.
    pub fn newline() -> Self {
        Self::new('\n', '~', '|', '^', '&', '\\')
    }

    /// Replace the MLLP start and end bytes.
    pub fn with_framing(mut self, start_block: u8, end_block: u8) -> Self {
        self.start_block = start_block;
        self.end_block = end_block;
        self
    }

    /// The MSH-2 text: component, repetition, escape and subcomponent characters.
    pub fn characters(&self) -> &str {
        &self.characters
    }

    /// Split `text` on `delimiter`, keeping empty pieces. Always yields at least one piece.
    pub fn split<'a>(&self, text: &'a str, delimiter: char) -> Vec<&'a str> {
        text.split(delimiter).collect()
    }

    pub fn split_segments<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.split(text, self.segment)
    }

    pub fn split_fields<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.split(text, self.field)
    }

    pub fn split_repetitions<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.split(text, self.repetition)
    }

    pub fn split_components<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.split(text, self.component)
    }

    pub fn split_sub_components<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.split(text, self.sub_component)
    }

    /// Replace every literal delimiter in `text` with its escape token.
    ///
    /// The escape character is handled as if it were replaced before the other delimiters so
    /// that freshly inserted tokens are never escaped a second time.
    pub fn escape(&self, text: &str) -> String {
        if !text.chars().any(|c| self.token_for(c).is_some()) {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len() + 8);
        for c in text.chars() {
            match self.token_for(c) {
                Some(token) => out.push_str(token),
                None => out.push(c),
            }
        }
        out
    }

    /// Replace every escape token in `text` with the literal it stands for.
    ///
    /// Escape sequences this engine does not produce (hex `\X..\`, highlighting, ...) are kept
    /// verbatim.
    pub fn unescape(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find(self.escape) {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + self.escape.len_utf8()..];

            let mut chars = after.chars();
            if let (Some(tag), Some(close)) = (chars.next(), chars.next()) {
                if close == self.escape {
                    if let Some(literal) = self.literal_for(tag) {
                        out.push(literal);
                        rest = chars.as_str();
                        continue;
                    }
                }
            }

            out.push(self.escape);
            rest = after;
        }

        out.push_str(rest);
        out
    }

    fn token_for(&self, c: char) -> Option<&str> {
        // escape is checked first; a set reusing one character for two roles keeps the
        // replacement order the wire format expects
        if c == self.escape {
            Some(&self.escape_escape)
        } else if c == self.repetition {
            Some(&self.repetition_escape)
        } else if c == self.field {
            Some(&self.field_escape)
        } else if c == self.component {
            Some(&self.component_escape)
        } else if c == self.sub_component {
            Some(&self.sub_component_escape)
        } else {
            None
        }
    }

    fn literal_for(&self, tag: char) -> Option<char> {
        match tag {
            REPETITION_TAG => Some(self.repetition),
            FIELD_TAG => Some(self.field),
            COMPONENT_TAG => Some(self.component),
            SUB_COMPONENT_TAG => Some(self.sub_component),
            ESCAPE_TAG => Some(self.escape),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn default_delimiters() {
        let enc = Encoding::default();

        assert_eq!(enc.segment, '\r');
        assert_eq!(enc.repetition, '~');
        assert_eq!(enc.field, '|');
        assert_eq!(enc.component, '^');
        assert_eq!(enc.sub_component, '&');
        assert_eq!(enc.escape, '\\');
        assert_eq!(enc.start_block, 0x0B);
        assert_eq!(enc.end_block, 0x1C);
        assert_eq!(enc.characters(), "^~\\&");
    }

    #[test]
    fn split_keeps_empty_pieces() {
        let enc = Encoding::default();

        assert_eq!(enc.split_fields("a||b|"), vec!["a", "", "b", ""]);
        assert_eq!(enc.split_fields("abc"), vec!["abc"]);
        assert_eq!(enc.split_fields(""), vec![""]);
    }

    #[test]
    fn escape_every_delimiter() {
        let enc = Encoding::default();

        assert_eq!(enc.escape("a|b^c&d~e\\f"), "a\\F\\b\\S\\c\\T\\d\\R\\e\\E\\f");
        assert_eq!(enc.escape("plain"), "plain");
        assert_eq!(enc.escape("\r"), "\r");
    }

    #[test]
    fn escape_char_is_not_double_escaped() {
        let enc = Encoding::default();

        assert_eq!(enc.escape("\\|"), "\\E\\\\F\\");
        assert_eq!(enc.unescape("\\E\\\\F\\"), "\\|");
    }

    #[test]
    fn unescape_keeps_unknown_sequences() {
        let enc = Encoding::default();

        assert_eq!(enc.unescape("\\X0D\\ and \\H\\"), "\\X0D\\ and \\H\\");
        assert_eq!(enc.unescape("trailing\\"), "trailing\\");
        assert_eq!(enc.unescape("\\F"), "\\F");
    }

    #[test]
    fn token_shaped_literals_survive() {
        let enc = Encoding::default();
        let text = "\\F\\ is a field escape";

        assert_eq!(enc.unescape(&enc.escape(text)), text);
    }

    #[test]
    fn custom_delimiters() {
        let enc = Encoding::new('\n', '#', '*', '@', '%', '!');

        assert_eq!(enc.characters(), "@#!%");
        assert_eq!(enc.escape("a*b"), "a!F!b");
        assert_eq!(enc.unescape("a!F!b!E!"), "a*b!");
    }

    proptest! {
        #[test]
        fn unescape_reverses_escape(text in "[|^&~\\\\a-zA-Z0-9 ]{0,40}") {
            let enc = Encoding::default();
            prop_assert_eq!(enc.unescape(&enc.escape(&text)), text);
        }

        #[test]
        fn unescape_reverses_escape_for_any_string(text in any::<String>()) {
            let enc = Encoding::default();
            prop_assert_eq!(enc.unescape(&enc.escape(&text)), text);
        }
    }
}
