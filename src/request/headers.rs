//! Ordered, case-preserving request header list.

use crate::config::EOL;
use crate::error_handling::ConfigurationError;

/// Request headers in insertion order.
///
/// Names keep the spelling they were given, but lookups and overrides compare
/// names case-insensitively, so `content-type` overrides `Content-type` in
/// place rather than producing a second header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value of the header `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Sets `name` to `value`, replacing any existing header with the same name
    /// in place (taking the new spelling), or appending it otherwise.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Appends `name` only if no header with that name is present yet.
    pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.entries.push((name, value.into()));
        }
    }

    /// Overlays every header from `other` onto this list.
    pub fn merge(&mut self, other: &HeaderList) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Writes each header as `Name: Value` followed by CRLF.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in self.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(EOL.as_bytes());
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

/// Checks that a header can be written on the wire verbatim.
///
/// Names must be non-empty RFC 7230 tokens; values must not contain line breaks.
pub fn validate_header(name: &str, value: &str) -> Result<(), ConfigurationError> {
    let valid_name = !name.is_empty() && name.bytes().all(is_token_byte);
    let valid_value = !value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0);
    if valid_name && valid_value {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidHeader(name.to_string()))
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
