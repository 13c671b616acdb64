//! Demultiplexer for Aider's stdout
//!
//! The Aider wrapper interleaves three kinds of markup in one text stream:
//!
//! - bracket tags `[~output~]...[~/output~]` and `[~tool_output~]...`
//! - question spans `<question>{json}</question>`
//! - the end-of-turn line `~END_REQUEST~`
//!
//! [`AiderDemuxer::feed`] turns each chunk into [`DemuxEvent`]s with a single
//! left-to-right scan. Open tags and partial questions carry over to the next
//! chunk, so a span may be split anywhere.

use chatwire_domain::{DemuxEvent, Message};
use thiserror::Error;
use tracing::{trace, warn};

/// End-of-turn sentinel line written by the wrapper.
pub const END_SENTINEL: &str = "~END_REQUEST~";

const QUESTION_OPEN: &str = "<question>";
const QUESTION_CLOSE: &str = "</question>";

#[derive(Error, Debug)]
pub enum DemuxError {
    /// A `<question>` payload was not a valid message. `position` is the
    /// index in the output where the question would have been.
    #[error("Invalid question payload: {source}")]
    InvalidQuestion {
        payload: String,
        position: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the demultiplexer is between two chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxState<'a> {
    Idle,
    InBracketTag(&'a str),
    InQuestionSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker<'a> {
    EndOfTurn,
    OpenTag(&'a str),
    CloseTag(&'a str),
    QuestionOpen,
    QuestionClose,
}

#[derive(Debug, Clone, Copy)]
struct Found<'a> {
    start: usize,
    end: usize,
    marker: Marker<'a>,
}

/// Per-process stdout parser. Build a fresh one for every spawned process.
#[derive(Debug, Default)]
pub struct AiderDemuxer {
    open_tag: Option<String>,
    question: Option<String>,
}

impl AiderDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DemuxState<'_> {
        if self.question.is_some() {
            DemuxState::InQuestionSpan
        } else if let Some(tag) = &self.open_tag {
            DemuxState::InBracketTag(tag)
        } else {
            DemuxState::Idle
        }
    }

    /// Demultiplex one chunk, appending events to `out`.
    ///
    /// A malformed question does not stop the scan: the rest of the chunk is
    /// still processed and the first failure is returned at the end.
    pub fn feed(&mut self, chunk: &str, out: &mut Vec<DemuxEvent>) -> Result<(), DemuxError> {
        if chunk.trim() == END_SENTINEL {
            out.push(DemuxEvent::EndOfTurn);
            return Ok(());
        }

        let mut failure = None;
        let mut text = String::new();
        let mut pos = 0;

        while pos < chunk.len() {
            let in_question = self.question.is_some();
            let Some(found) = next_marker(chunk, pos, in_question) else {
                match self.question.as_mut() {
                    Some(buffer) => buffer.push_str(&chunk[pos..]),
                    None => text.push_str(&chunk[pos..]),
                }
                break;
            };
            let before = &chunk[pos..found.start];
            let token = &chunk[found.start..found.end];
            pos = found.end;

            if let Some(mut buffer) = self.question.take() {
                buffer.push_str(before);
                if found.marker == Marker::EndOfTurn {
                    warn!(payload = %buffer, "Turn ended inside a question, dropping it");
                    out.push(DemuxEvent::EndOfTurn);
                    continue;
                }
                match Message::from_json(&buffer) {
                    Ok(message) => out.push(DemuxEvent::Message(message)),
                    Err(source) => {
                        warn!(error = %source, "Malformed question payload");
                        if failure.is_none() {
                            failure = Some(DemuxError::InvalidQuestion {
                                payload: buffer,
                                position: out.len(),
                                source,
                            });
                        }
                    }
                }
                continue;
            }

            text.push_str(before);
            match found.marker {
                Marker::EndOfTurn => {
                    self.flush(&mut text, out);
                    out.push(DemuxEvent::EndOfTurn);
                }
                Marker::OpenTag(name) => {
                    self.flush(&mut text, out);
                    self.open_tag = Some(name.to_string());
                }
                Marker::CloseTag(name) if self.open_tag.as_deref() == Some(name) => {
                    self.flush(&mut text, out);
                    self.open_tag = None;
                }
                Marker::CloseTag(_) | Marker::QuestionClose => {
                    trace!(token, "Unmatched close marker kept as text");
                    text.push_str(token);
                }
                Marker::QuestionOpen => {
                    self.flush(&mut text, out);
                    self.question = Some(String::new());
                }
            }
        }

        self.flush(&mut text, out);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn flush(&self, text: &mut String, out: &mut Vec<DemuxEvent>) {
        if text.is_empty() {
            return;
        }
        out.push(DemuxEvent::Data {
            text: std::mem::take(text),
            tag: self.open_tag.clone(),
        });
    }
}

/// Earliest marker at or after `pos`. Inside a question only the close
/// marker and the end-of-turn line are recognized.
fn next_marker(chunk: &str, pos: usize, in_question: bool) -> Option<Found<'_>> {
    let mut candidates = Vec::with_capacity(4);
    candidates.extend(find_sentinel(chunk, pos));
    candidates.extend(find_literal(chunk, pos, QUESTION_CLOSE, Marker::QuestionClose));
    if !in_question {
        candidates.extend(find_literal(chunk, pos, QUESTION_OPEN, Marker::QuestionOpen));
        candidates.extend(find_bracket_tag(chunk, pos));
    }
    candidates.into_iter().min_by_key(|f| f.start)
}

fn find_literal<'a>(chunk: &'a str, pos: usize, needle: &str, marker: Marker<'a>) -> Option<Found<'a>> {
    chunk[pos..].find(needle).map(|i| Found {
        start: pos + i,
        end: pos + i + needle.len(),
        marker,
    })
}

/// A sentinel alone on its line. Surrounding blanks and the line break
/// belong to it.
fn find_sentinel(chunk: &str, pos: usize) -> Option<Found<'static>> {
    let mut from = pos;
    while let Some(i) = chunk[from..].find(END_SENTINEL) {
        let at = from + i;
        let after = at + END_SENTINEL.len();
        let line_start = chunk[..at].rfind('\n').map_or(0, |n| n + 1);
        let line_end = chunk[after..].find('\n').map_or(chunk.len(), |n| after + n + 1);

        let prefix_blank = chunk[line_start..at].chars().all(char::is_whitespace);
        let suffix_blank = chunk[after..line_end].chars().all(char::is_whitespace);
        if prefix_blank && suffix_blank {
            return Some(Found {
                start: line_start.max(pos),
                end: line_end,
                marker: Marker::EndOfTurn,
            });
        }
        from = after;
    }
    None
}

fn find_bracket_tag(chunk: &str, pos: usize) -> Option<Found<'_>> {
    let mut from = pos;
    while let Some(i) = chunk[from..].find("[~") {
        let start = from + i;
        let body = &chunk[start + 2..];
        if let Some(close) = body.find("~]") {
            let name = &body[..close];
            let (closing, bare) = match name.strip_prefix('/') {
                Some(bare) => (true, bare),
                None => (false, name),
            };
            if is_tag_name(bare) {
                return Some(Found {
                    start,
                    end: start + 2 + close + 2,
                    marker: if closing {
                        Marker::CloseTag(bare)
                    } else {
                        Marker::OpenTag(bare)
                    },
                });
            }
        }
        from = start + 2;
    }
    None
}

fn is_tag_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
