//! Line-oriented FASTA tokenizer
//!
//! Lazily reads a decompressed stream and yields one [`Token`] per header or
//! non-blank sequence line, followed by a single [`FastaEvent::End`]. The
//! tokenizer does not check the residue alphabet; any text on a
//! non-header line is sequence data. Invalid UTF-8 is decoded lossily.

use std::io::BufRead;

use super::{FastaError, FastaEvent};

/// An event together with the 1-based line it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub line: u64,
    pub event: FastaEvent,
}

pub struct Tokenizer<R> {
    reader: R,
    line: u64,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: Vec::with_capacity(256),
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for Tokenizer<R> {
    type Item = Result<Token, FastaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.finished = true;
                    return Some(Ok(Token {
                        line: self.line,
                        event: FastaEvent::End,
                    }));
                },
                Ok(_) => {
                    self.line += 1;
                    match classify_line(&self.buf, self.line) {
                        Ok(Some(event)) => {
                            return Some(Ok(Token {
                                line: self.line,
                                event,
                            }))
                        },
                        Ok(None) => continue,
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e));
                        },
                    }
                },
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                },
            }
        }
    }
}

fn classify_line(raw: &[u8], line: u64) -> Result<Option<FastaEvent>, FastaError> {
    if raw.first() == Some(&b'>') {
        return parse_header(raw, line).map(Some);
    }

    let text = raw.trim_ascii_end();
    if text.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    Ok(Some(FastaEvent::Data(String::from_utf8_lossy(text).into_owned())))
}

/// `>` then optional whitespace, a name token, and the rest as description.
fn parse_header(raw: &[u8], line: u64) -> Result<FastaEvent, FastaError> {
    let text = String::from_utf8_lossy(&raw[1..]);
    let rest = text.trim();

    let (name, description) = match rest.find(char::is_whitespace) {
        Some(split) => (&rest[..split], rest[split..].trim()),
        None => (rest, ""),
    };

    if name.is_empty() {
        return Err(FastaError::EmptyHeader { line });
    }

    Ok(FastaEvent::Header {
        name: name.to_string(),
        description: description.to_string(),
    })
}
