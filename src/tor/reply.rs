//! Control-port reply framing
//!
//! A reply is one or more lines. Mid-reply lines are `<code>-<text>` or
//! `<code>+<keyword>=` followed by a dot-terminated data block; the final
//! line is `<code> <text>`. Asynchronous event lines (6xx) can arrive
//! between replies and are dropped here.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, trace};

/// Status code for success
pub const OK: u16 = 250;

/// A complete reply to one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code of the final line
    pub code: u16,
    /// Text of every line, in order, with the code prefix removed.
    /// Data blocks are folded into their `keyword=` line.
    pub lines: Vec<String>,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.code == OK
    }

    /// Text of the final line
    pub fn message(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    /// Value of the first `key=value` line whose key matches exactly
    pub fn value(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        })
    }

    /// Parse a complete reply from raw text (CRLF or LF line endings)
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = ReplyParser::default();
        for line in text.split_inclusive('\n') {
            if let Some(reply) = parser.feed(line)? {
                return Ok(reply);
            }
        }
        Err(Error::protocol("incomplete reply"))
    }
}

/// Data block being collected after a `+` line
#[derive(Debug)]
struct DataBlock {
    /// Event data is read and thrown away
    discard: bool,
    head: String,
    body: Vec<String>,
}

/// Incremental line-at-a-time reply parser
#[derive(Debug, Default)]
pub(crate) struct ReplyParser {
    code: Option<u16>,
    lines: Vec<String>,
    data: Option<DataBlock>,
    /// Inside a multi-line async event
    in_event: bool,
}

impl ReplyParser {
    /// Feed one raw line; returns the reply once its final line is seen
    pub(crate) fn feed(&mut self, raw: &str) -> Result<Option<Reply>> {
        let line = raw.trim_end_matches(['\r', '\n']);

        if let Some(mut block) = self.data.take() {
            if line == "." {
                if !block.discard {
                    self.lines
                        .push(format!("{}{}", block.head, block.body.join("\n")));
                }
            } else {
                if !block.discard {
                    // Leading dots are doubled on the wire
                    let unstuffed = line.strip_prefix('.').filter(|l| l.starts_with('.'));
                    block.body.push(unstuffed.unwrap_or(line).to_string());
                }
                self.data = Some(block);
            }
            return Ok(None);
        }

        let (code, sep, text) = split_status_line(line)?;

        if code / 100 == 6 {
            trace!("Skipping async event line: {}", line);
            match sep {
                '+' => {
                    self.data = Some(DataBlock {
                        discard: true,
                        head: String::new(),
                        body: Vec::new(),
                    });
                    self.in_event = true;
                },
                '-' => self.in_event = true,
                _ => self.in_event = false,
            }
            return Ok(None);
        }

        if self.in_event {
            return Err(Error::protocol(format!(
                "reply line inside unfinished async event: {:?}",
                line
            )));
        }

        match self.code {
            Some(expected) if expected != code => {
                return Err(Error::protocol(format!(
                    "status code changed mid-reply ({} then {})",
                    expected, code
                )));
            },
            _ => self.code = Some(code),
        }

        match sep {
            '-' => {
                self.lines.push(text.to_string());
                Ok(None)
            },
            '+' => {
                self.data = Some(DataBlock {
                    discard: false,
                    head: text.to_string(),
                    body: Vec::new(),
                });
                Ok(None)
            },
            _ => {
                self.lines.push(text.to_string());
                let reply = Reply {
                    code,
                    lines: std::mem::take(&mut self.lines),
                };
                self.code = None;
                Ok(Some(reply))
            },
        }
    }
}

/// Split `NNNx text` into code, separator and text
fn split_status_line(line: &str) -> Result<(u16, char, &str)> {
    let malformed = || Error::protocol(format!("malformed reply line: {:?}", line));

    if line.len() < 4 || !line.is_char_boundary(3) || !line.is_char_boundary(4) {
        return Err(malformed());
    }
    let (digits, rest) = line.split_at(3);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let code: u16 = digits.parse().map_err(|_| malformed())?;

    let sep = rest.chars().next().ok_or_else(malformed)?;
    if !matches!(sep, ' ' | '-' | '+') {
        return Err(malformed());
    }

    Ok((code, sep, &rest[1..]))
}

/// Read one complete reply from the stream
///
/// EOF before the final line is a protocol error.
pub(crate) async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut parser = ReplyParser::default();
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(Error::protocol("control connection closed mid-reply"));
        }
        debug!("<- {}", line.trim_end());

        if let Some(reply) = parser.feed(&line)? {
            return Ok(reply);
        }
    }
}

/// [`read_reply`] bounded by a deadline
pub(crate) async fn read_reply_timeout<R>(
    reader: &mut R,
    deadline: Duration,
    what: &str,
) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    tokio::time::timeout(deadline, read_reply(reader))
        .await
        .map_err(|_| Error::Timeout(what.to_string()))?
}
