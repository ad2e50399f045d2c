//! Telegram tokenizer for inverter responses.
//!
//! Responses look like `(000.0 00.0 230.1 49.9 ...<crc>\r`. Everything but digits,
//! decimal points and spaces is thrown away (the `(` marker, status letters, CRC and
//! terminator bytes), then the remainder is split on spaces. This relies on numeric
//! fields never carrying letters, which holds for the PI30 family.

use crate::error::{AxpertError, Result};

/// Filter a raw response to digits, `.` and spaces, then split on spaces.
/// Empty tokens (runs of spaces) are dropped.
pub fn tokenize(raw: &str) -> Vec<String> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ' ')
        .collect();
    kept.split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Positional token sequence of one response
#[derive(Debug, Clone, PartialEq)]
pub struct Telegram {
    command: String,
    raw: String,
    tokens: Vec<String>,
}

impl Telegram {
    pub fn parse(command: &str, raw: &str) -> Self {
        Telegram {
            command: command.to_string(),
            raw: raw.to_string(),
            tokens: tokenize(raw),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Fail with a decode error unless at least `count` tokens are present.
    pub fn require(&self, count: usize) -> Result<()> {
        if self.tokens.len() < count {
            return Err(self.error(format!(
                "expected at least {} tokens, got {}",
                count,
                self.tokens.len()
            )));
        }
        Ok(())
    }

    pub fn text(&self, index: usize) -> Result<&str> {
        self.tokens
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.error(format!("missing token {}", index)))
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        let token = self.text(index)?;
        token
            .parse::<f64>()
            .map_err(|_| self.error(format!("token {} ({:?}) is not a number", index, token)))
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        let token = self.text(index)?;
        token
            .parse::<i64>()
            .map_err(|_| self.error(format!("token {} ({:?}) is not an integer", index, token)))
    }

    pub(crate) fn error(&self, reason: String) -> AxpertError {
        AxpertError::decode(&self.command, reason, &self.raw)
    }
}
