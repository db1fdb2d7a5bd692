use std::fmt;

use super::{Element, Encoding, Value};

/// The smallest unit of a message: one unescaped string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SubComponent {
    value: String,
}

impl SubComponent {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Value for SubComponent {
    fn value(&self) -> &str {
        &self.value
    }

    fn set_value(&mut self, value: &str) {
        self.value.clear();
        self.value.push_str(value);
    }
}

impl Element for SubComponent {
    fn from_value(value: &str) -> Self {
        Self::new(value)
    }

    fn parse(text: &str, enc: &Encoding) -> Self {
        Self {
            value: enc.unescape(text),
        }
    }

    fn encode_into(&self, out: &mut String, enc: &Encoding) {
        out.push_str(&enc.escape(&self.value));
        out.push(enc.sub_component);
    }

    fn matches(&self, literal: &str) -> bool {
        self.value == literal
    }
}

impl fmt::Display for SubComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
