use super::{Component, Element, Encoding, Field, Repetition, Segment, SubComponent, Value};

impl Segment {
    /// A segment holding only its type, e.g. `PID`.
    pub fn named(kind: &str) -> Self {
        Self::from_value(kind)
    }

    /// The segment type, field 0.
    pub fn kind(&self) -> &str {
        self.iter().next().map_or("", |f| f.value())
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.iter().next().is_some_and(|f| f.matches(kind))
    }

    /// Field at a 0-based `index`, appending empty fields until it exists.
    pub fn field(&mut self, index: usize) -> &mut Field {
        self.child_at(index)
    }

    /// Field at a 0-based `index`, without growing.
    pub fn get_field(&self, index: usize) -> Option<&Field> {
        self.get(index + 1)
    }

    pub fn repetition(&mut self, field: usize, repetition: usize) -> &mut Repetition {
        self.field(field).repetition(repetition)
    }

    /// Component of the first repetition of `field`.
    pub fn component(&mut self, field: usize, component: usize) -> &mut Component {
        self.field(field).component(component)
    }

    pub fn repetition_component(
        &mut self,
        field: usize,
        repetition: usize,
        component: usize,
    ) -> &mut Component {
        self.field(field).repetition_component(repetition, component)
    }

    pub fn sub_component(
        &mut self,
        field: usize,
        component: usize,
        sub_component: usize,
    ) -> &mut SubComponent {
        self.field(field).sub_component(component, sub_component)
    }

    /// Wire form of this segment alone, terminator included.
    pub fn encode(&self, enc: &Encoding) -> String {
        let mut out = String::new();
        self.encode_into(&mut out, enc);
        out
    }

    /// Place the MSH-1 and MSH-2 pseudo-fields for `enc`, overwriting fields 1 and 2.
    pub(crate) fn pin_header(&mut self, enc: &Encoding) {
        self.field(2);
        *self.field(1) = Field::separator(enc);
        *self.field(2) = Field::encoding_characters(enc);
    }

    /// Shift a freshly parsed header right by one so that field 1 becomes MSH-1, then pin.
    pub(crate) fn bootstrap_header(&mut self, enc: &Encoding) {
        self.field(2);
        self.insert(1, Field::separator(enc));
        *self.field(2) = Field::encoding_characters(enc);
    }
}
