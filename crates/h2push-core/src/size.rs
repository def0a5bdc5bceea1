//! Human-readable byte sizes.
//!
//! Accepts bare integers ("2048") or a number with a binary unit suffix
//! ("100kb", "1.5 MB"). Units are powers of 1024:
//!   b, kb, mb, gb, tb, pb

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KB: f64 = 1024.0;

/// A byte count that can be written as "100kb" in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSize", into = "u64")]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Parse "100kb", "1.5mb", "512" etc.
    pub fn parse(text: &str) -> Result<Self, SizeParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SizeParseError::Empty);
        }

        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let value: f64 = number
            .parse()
            .map_err(|_| SizeParseError::InvalidNumber(text.to_string()))?;

        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1.0,
            "kb" => KB,
            "mb" => KB * KB,
            "gb" => KB * KB * KB,
            "tb" => KB * KB * KB * KB,
            "pb" => KB * KB * KB * KB * KB,
            other => return Err(SizeParseError::UnknownUnit(other.to_string())),
        };

        Ok(Self((value * multiplier).floor() as u64))
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> Self {
        size.0
    }
}

impl FromStr for ByteSize {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.0)
    }
}

/// Config files may hold either form.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawSize> for ByteSize {
    type Error = SizeParseError;

    fn try_from(raw: RawSize) -> Result<Self, Self::Error> {
        match raw {
            RawSize::Bytes(n) => Ok(Self(n)),
            RawSize::Text(s) => Self::parse(&s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeParseError {
    #[error("empty size string")]
    Empty,
    #[error("invalid size number: {0:?}")]
    InvalidNumber(String),
    #[error("unknown size unit: {0:?}")]
    UnknownUnit(String),
}
