use std::io::{self, BufRead, BufReader, Read, Write};

use log::trace;
use thiserror::Error;

use crate::message::{Encoding, Message, error::MessageError};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("[framing error][{consumed} bytes read]: end block not followed by segment delimiter")]
    Framing { consumed: usize },
    #[error("failed to decode message: {0}")]
    Message(#[from] MessageError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

/// Read one framed message.
///
/// Bytes are consumed up to the end block, which must be followed by the segment delimiter.
/// Everything before the end block, start block included, is handed to [`Message::parse`],
/// which skips ahead to the header. Returns `Ok(None)` when the stream ends before an end
/// block arrives.
pub fn read_frame<R: BufRead>(
    reader: &mut R,
    enc: &Encoding,
) -> Result<Option<Message>, TransportError> {
    let mut frame = Vec::new();
    if reader.read_until(enc.end_block, &mut frame)? == 0 || frame.pop() != Some(enc.end_block) {
        return Ok(None);
    }

    let framing = TransportError::Framing {
        consumed: frame.len(),
    };
    let mut trailer = [0u8; 1];
    match reader.read_exact(&mut trailer) {
        Ok(()) if char::from(trailer[0]) == enc.segment => {}
        Ok(()) => return Err(framing),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(framing),
        Err(e) => return Err(e.into()),
    }

    trace!("read frame of {} bytes", frame.len());
    Ok(Some(Message::parse(&decode_latin1(&frame))?))
}

/// Write one framed message. The caller is responsible for flushing.
pub fn write_frame<W: Write>(
    writer: &mut W,
    msg: &Message,
    enc: &Encoding,
) -> Result<(), TransportError> {
    let text = msg.encode_with(enc);

    let mut frame = Vec::with_capacity(text.len() + 3);
    frame.push(enc.start_block);
    frame.extend(encode_latin1(&text));
    frame.push(enc.end_block);
    frame.push(encode_latin1_char(enc.segment));

    trace!("writing frame of {} bytes", frame.len());
    writer.write_all(&frame)?;
    Ok(())
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn encode_latin1(text: &str) -> impl Iterator<Item = u8> + '_ {
    text.chars().map(encode_latin1_char)
}

fn encode_latin1_char(c: char) -> u8 {
    u8::try_from(c).unwrap_or(b'?')
}

/// MLLP framed messages over a bidirectional stream.
pub struct MllpTransport<T: Read + Write> {
    stream: BufReader<T>,
    encoding: Encoding,
}

impl<T: Read + Write> MllpTransport<T> {
    pub fn new(stream: T) -> Self {
        Self::with_encoding(stream, Encoding::default())
    }

    /// Frame with the delimiters and framing bytes of `encoding`.
    pub fn with_encoding(stream: T, encoding: Encoding) -> Self {
        Self {
            stream: BufReader::new(stream),
            encoding,
        }
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    pub fn write_message(&mut self, msg: &Message) -> Result<(), TransportError> {
        write_frame(self.stream.get_mut(), msg, &self.encoding)
    }

    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.stream.get_mut().flush()?;
        Ok(())
    }

    pub fn read_message(&mut self) -> Result<Option<Message>, TransportError> {
        read_frame(&mut self.stream, &self.encoding)
    }

    /// Send `request` and block until one reply arrives.
    pub fn exchange(&mut self, request: &Message) -> Result<Option<Message>, TransportError> {
        self.write_message(request)?;
        self.flush()?;
        self.read_message()
    }
}
