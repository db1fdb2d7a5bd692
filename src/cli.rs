//! Terminal input for the bundled tools.
//!
//! Messages are typed one segment per line. An empty line ends the message.
use std::io::{self, BufRead, Write};

/// Possible input from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `.exit`, or end of input
    Exit,
    /// Segments joined with `\r`
    Message(String),
}

/// Prompt user for one message.
///
/// The first line is prompted with `> `, continuation lines with `. `. Blank lines before the
/// first segment are skipped.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> io::Result<Command>
where
    R: BufRead,
    W: Write,
{
    let mut segments = Vec::new();

    loop {
        write!(&mut writer, "{}", if segments.is_empty() { "> " } else { ". " })?;
        writer.flush()?;

        let mut line = String::default();
        if reader.read_line(&mut line)? == 0 {
            break;
        }

        match line.trim_end_matches(['\r', '\n']) {
            ".exit" if segments.is_empty() => return Ok(Command::Exit),
            "" if segments.is_empty() => continue,
            "" => break,
            s => segments.push(s.to_string()),
        }
    }

    match segments.is_empty() {
        true => Ok(Command::Exit),
        false => Ok(Command::Message(segments.join("\r"))),
    }
}

/// Rejoin text whose segments were split by any line ending, dropping blank lines.
pub fn join_segments(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\r")
}
