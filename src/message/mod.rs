//! HL7 v2 message model and codec.
//!
//! A [`Message`] is an ordered list of segments. Each segment is a tree of fields,
//! repetitions, components and subcomponents, all built from the generic [`Node`] container and
//! separated on the wire by the delimiters of an [`Encoding`].
//!
//! # Overview
//!
//! ```text
//! MSH|^~\&|AppA|FacA|AppB|FacB|20230101000000||ADT^A01^ADT_A01|CTRL1|P|2.5
//! |   |    |                                   |   |
//! |   |    field 3                             |   component 2 of field 9
//! |   field 2, the encoding characters         component 1 of field 9
//! field 1, the field delimiter itself
//! ```
//!
//! The header segment (`MSH`) both declares and uses the delimiters. Parsing discovers them from
//! the header first and then splits the whole message with them. Fields 1 and 2 of the header are
//! pinned pseudo-fields (see [`Field`]) so that header numbering matches the standard.
//!
//! Leaves always hold unescaped text. Escaping happens only when encoding, unescaping only
//! when parsing.
//!
//! # Example
//! ```rust
//! use hl7_wire::message::{Message, Value};
//!
//! let mut msg: Message = "MSH|^~\\&|AppA|FacA|AppB|FacB|20230101000000||ADT^A01^ADT_A01|CTRL1|P|2.5\r"
//!     .parse()
//!     .unwrap();
//! let msh = msg.segment_of("MSH");
//! assert_eq!(msh.component(9, 1).value(), "ADT");
//! assert_eq!(msh.component(9, 2).value(), "A01");
//! ```
//!
//! # See Also
//! - [`protocol`](crate::protocol): frames messages for transport over a stream.
use std::{fmt, str::FromStr};

use chrono::Local;

mod encoding;
mod field;
mod leaf;
mod node;
mod segment;
pub mod time;

pub use encoding::{END_BLOCK, Encoding, START_BLOCK};
pub use field::Field;
pub use leaf::SubComponent;
pub use node::{
    Component, ComponentLevel, Element, FieldLevel, Level, Node, Repetition, RepetitionLevel,
    Repetitions, Segment, SegmentLevel, Value,
};

use error::MessageError;

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq, Eq)]
    pub enum MessageError {
        #[error("[format error][offset {offset}]: {reason}")]
        Format { offset: usize, reason: String },
    }
}

/// Segment type of the header.
pub const HEADER: &str = "MSH";

// Field delimiters to count in the header before the version field.
const VERSION_FIELD_DELIMITERS: usize = 11;
// Characters from the start of `MSH` through the last encoding character.
const HEADER_PREAMBLE: usize = 8;

/// Routing and type information for a new message's header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
    pub message_code: String,
    pub trigger_event: String,
    pub control_id: String,
    pub processing_id: String,
    pub version: String,
}

/// An HL7 v2 message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    segments: Vec<Segment>,
    encoding: Encoding,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// A message holding only an empty header.
    pub fn new() -> Self {
        Self {
            segments: vec![Segment::named(HEADER)],
            encoding: Encoding::default(),
        }
    }

    /// A message whose header is filled from `header`, timestamped now.
    pub fn from_header(header: &MessageHeader) -> Self {
        let mut msg = Self::new();
        let msh = msg.segment_of(HEADER);

        msh.field(3).set_value(&header.sending_application);
        msh.field(4).set_value(&header.sending_facility);
        msh.field(5).set_value(&header.receiving_application);
        msh.field(6).set_value(&header.receiving_facility);
        time::set_instant(msh.field(7), Local::now());

        let message_type = msh.field(9);
        message_type.component(1).set_value(&header.message_code);
        message_type.component(2).set_value(&header.trigger_event);
        message_type
            .component(3)
            .set_value(&format!("{}_{}", header.message_code, header.trigger_event));

        msh.field(10).set_value(&header.control_id);
        msh.field(11).set_value(&header.processing_id);
        msh.field(12).set_value(&header.version);

        msg
    }

    /// Parse a message, discovering its delimiters from the header segment.
    ///
    /// Anything before the `MSH` marker is ignored.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let start = text.find(HEADER).ok_or(MessageError::Format {
            offset: 0,
            reason: "messages must start with an MSH segment".into(),
        })?;

        let header = &text[start..];
        let preamble = header.chars().take(HEADER_PREAMBLE).collect::<Vec<char>>();
        if preamble.len() < HEADER_PREAMBLE {
            return Err(MessageError::Format {
                offset: text.chars().count(),
                reason: "MSH segment is too short to declare its delimiters".into(),
            });
        }

        let field = preamble[3];
        let enc = Encoding::new(
            discover_segment_delimiter(header, field),
            preamble[5],
            field,
            preamble[4],
            preamble[7],
            preamble[6],
        );

        let preamble_bytes = preamble.iter().map(|c| c.len_utf8()).sum::<usize>();
        let body = format!("{HEADER}{field}{}", &header[preamble_bytes..]);

        let mut segments = enc
            .split_segments(&body)
            .into_iter()
            .filter(|line| !line.is_empty())
            .map(|line| Segment::parse(line, &enc))
            .collect::<Vec<_>>();
        if let Some(msh) = segments.first_mut() {
            msh.bootstrap_header(&enc);
        }

        Ok(Self {
            segments,
            encoding: enc,
        })
    }

    /// Delimiters this message was parsed with, or the defaults for a built message.
    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// Encode with the default delimiters.
    pub fn encode(&self) -> String {
        self.encode_with(&Encoding::default())
    }

    /// Encode with `enc`. Trailing segment delimiters are dropped.
    pub fn encode_with(&self, enc: &Encoding) -> String {
        let mut out = String::new();

        let mut segments = self.segments.iter();
        if let Some(header) = segments.next() {
            let mut header = header.clone();
            header.pin_header(enc);
            header.encode_into(&mut out, enc);
        }
        for segment in segments {
            segment.encode_into(&mut out, enc);
        }

        while out.ends_with(enc.segment) {
            out.pop();
        }
        out
    }

    /// Set the header's MSH-1 and MSH-2 pseudo-fields to describe `enc`.
    pub fn pin_header(&mut self, enc: &Encoding) {
        if let Some(msh) = self.segments.first_mut() {
            msh.pin_header(enc);
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment at a 0-based `index`, appending empty segments until it exists.
    pub fn segment(&mut self, index: usize) -> &mut Segment {
        if self.segments.len() <= index {
            self.segments.resize_with(index + 1, Segment::new);
        }
        &mut self.segments[index]
    }

    /// First segment of type `kind`.
    pub fn find(&self, kind: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.is_kind(kind))
    }

    pub fn find_mut(&mut self, kind: &str) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.is_kind(kind))
    }

    /// First segment of type `kind`, appended if there is none.
    pub fn segment_of(&mut self, kind: &str) -> &mut Segment {
        let index = match self.segments.iter().position(|s| s.is_kind(kind)) {
            Some(index) => index,
            None => {
                self.segments.push(Segment::named(kind));
                self.segments.len() - 1
            }
        };
        &mut self.segments[index]
    }

    /// Every segment of type `kind`, in message order.
    pub fn segments_of(&self, kind: &str) -> Vec<&Segment> {
        self.segments.iter().filter(|s| s.is_kind(kind)).collect()
    }

    pub fn push(&mut self, segment: Segment) -> &mut Self {
        self.segments.push(segment);
        self
    }
}

/// The segment delimiter follows the version field, the 12th field of the header. Digits and
/// `.` belong to the version number; the first other character ends the segment.
fn discover_segment_delimiter(header: &str, field: char) -> char {
    let mut seen = 0;
    for c in header.chars() {
        if seen < VERSION_FIELD_DELIMITERS {
            if c == field {
                seen += 1;
            }
        } else if c != '.' && !c.is_ascii_digit() {
            return c;
        }
    }
    Encoding::default().segment
}

impl FromStr for Message {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
