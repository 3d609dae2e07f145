// ABOUTME: Validated git revision identifier.
// ABOUTME: A full 40-hex object id, carried as a label value for traceability.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("revision cannot be empty")]
    Empty,

    #[error("revision must be hexadecimal")]
    NotHex,

    #[error("revision must be a full 40-character object id, got {0} characters")]
    WrongLength(usize),
}

/// An immutable, content-derived revision identifier.
///
/// Produced by resolving a branch at deploy time. Inert after that: it is
/// attached as a label for traceability and gates no control-flow decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: &str) -> Result<Self, RevisionError> {
        if value.is_empty() {
            return Err(RevisionError::Empty);
        }

        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RevisionError::NotHex);
        }

        if value.len() != 40 {
            return Err(RevisionError::WrongLength(value.len()));
        }

        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for progress output.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
