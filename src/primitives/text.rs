//! Line cursor for the keyed text formats.

use std::io::BufRead;
use std::str::FromStr;

use crate::error::{CodecError, Format, Operation, Result};

pub struct LineReader<R> {
    inner: R,
    format: Format,
    line: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R, format: Format) -> Self {
        Self {
            inner,
            format,
            line: 0,
        }
    }

    /// One-based number of the last line returned.
    pub fn line_number(&self) -> usize {
        self.line
    }

    /// Next non-blank line with its line ending stripped, or `None` at end of input.
    pub fn try_next_line(&mut self) -> Result<Option<String>> {
        loop {
            let mut buf = String::new();
            let read = self.inner.read_line(&mut buf).map_err(|e| CodecError::Io {
                format: self.format,
                operation: Operation::Decode,
                source: e,
            })?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;
            let trimmed = buf.trim_end_matches(['\r', '\n']);
            if !trimmed.trim().is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    pub fn next_line(&mut self) -> Result<String> {
        match self.try_next_line()? {
            Some(line) => Ok(line),
            None => Err(self.syntax("unexpected end of file")),
        }
    }

    /// Reads a `Key= value...` line and returns the tokens after the key.
    ///
    /// The key compares case-insensitively and tokens split on spaces and tabs.
    pub fn keyed(&mut self, key: &str) -> Result<Vec<String>> {
        let line = self.next_line()?;
        self.expect_key(&line, key)
    }

    pub fn expect_key(&self, line: &str, key: &str) -> Result<Vec<String>> {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some(found) if found.eq_ignore_ascii_case(key) => {
                Ok(tokens.map(str::to_string).collect())
            }
            Some(found) => Err(self.syntax(format!("expected `{}`, found `{}`", key, found))),
            None => Err(self.syntax(format!("expected `{}`", key))),
        }
    }

    pub fn parse<T: FromStr>(&self, token: Option<&str>, what: &str) -> Result<T> {
        let token = token.ok_or_else(|| self.syntax(format!("missing {}", what)))?;
        token
            .parse()
            .map_err(|_| self.syntax(format!("invalid {} `{}`", what, token)))
    }

    pub fn syntax(&self, message: impl Into<String>) -> CodecError {
        CodecError::Syntax {
            format: self.format,
            line: self.line,
            message: message.into(),
        }
    }
}

/// First whitespace token of a line.
pub fn first_token(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}
