use super::{Component, Element, Encoding, Repetition, Repetitions, SubComponent, Value};

/// A field of a segment.
///
/// Ordinary fields hold repetitions. The header segment additionally carries two pinned
/// pseudo-fields so that its 1-based numbering matches the wire: MSH-1 is the field delimiter
/// itself and MSH-2 is the encoding characters. Pinned fields ignore [`Value::set_value`];
/// navigating into one with a mutable accessor turns it into an ordinary field holding the
/// same text. [`Message`](super::Message) pins them again before every encode.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Data(Repetitions),
    /// MSH-1. Writes nothing; the field delimiter after MSH-0 already represents it.
    Separator(String),
    /// MSH-2. Writes the encoding characters of the set it was pinned with.
    EncodingCharacters(Encoding),
}

impl Default for Field {
    fn default() -> Self {
        Field::Data(Repetitions::new())
    }
}

impl Field {
    pub(crate) fn separator(enc: &Encoding) -> Self {
        Field::Separator(enc.field.to_string())
    }

    pub(crate) fn encoding_characters(enc: &Encoding) -> Self {
        Field::EncodingCharacters(enc.clone())
    }

    pub fn is_pinned(&self) -> bool {
        !matches!(self, Field::Data(_))
    }

    /// Repetitions of an ordinary field; pinned fields have none.
    pub fn repetitions(&self) -> Option<&Repetitions> {
        match self {
            Field::Data(repetitions) => Some(repetitions),
            _ => None,
        }
    }

    /// Repetition at a 1-based `index`.
    pub fn repetition(&mut self, index: usize) -> &mut Repetition {
        self.data_mut().child(index)
    }

    /// Component at a 1-based `index` of the first repetition.
    pub fn component(&mut self, index: usize) -> &mut Component {
        self.repetition(1).component(index)
    }

    pub fn repetition_component(&mut self, repetition: usize, component: usize) -> &mut Component {
        self.repetition(repetition).component(component)
    }

    /// Subcomponent of the first repetition.
    pub fn sub_component(&mut self, component: usize, index: usize) -> &mut SubComponent {
        self.component(component).sub_component(index)
    }

    fn data_mut(&mut self) -> &mut Repetitions {
        if self.is_pinned() {
            let value = self.value().to_string();
            *self = Field::Data(Repetitions::from_value(&value));
        }
        match self {
            Field::Data(repetitions) => repetitions,
            _ => unreachable!("pinned field was converted above"),
        }
    }
}

impl Value for Field {
    fn value(&self) -> &str {
        match self {
            Field::Data(repetitions) => repetitions.value(),
            Field::Separator(separator) => separator,
            Field::EncodingCharacters(enc) => enc.characters(),
        }
    }

    fn set_value(&mut self, value: &str) {
        if let Field::Data(repetitions) = self {
            repetitions.set_value(value);
        }
    }
}

impl Element for Field {
    fn from_value(value: &str) -> Self {
        Field::Data(Repetitions::from_value(value))
    }

    fn parse(text: &str, enc: &Encoding) -> Self {
        Field::Data(Repetitions::parse(text, enc))
    }

    fn encode_into(&self, out: &mut String, enc: &Encoding) {
        match self {
            Field::Data(repetitions) => repetitions.encode_into(out, enc),
            Field::Separator(_) => {}
            Field::EncodingCharacters(pinned) => {
                out.push_str(pinned.characters());
                out.push(enc.field);
            }
        }
    }

    fn matches(&self, literal: &str) -> bool {
        match self {
            Field::Data(repetitions) => repetitions.matches(literal),
            _ => self.value() == literal,
        }
    }
}
