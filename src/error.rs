use std::fmt;

use thiserror::Error;

/// Validation failures collected for a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub entity: &'static str,
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            messages: Vec::new(),
        }
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `Ok(())` when nothing was collected, otherwise the error itself.
    pub fn into_result(self) -> std::result::Result<(), ValidationError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages.join(", "))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("unknown category sentinel is missing; run 'jobboard init' first")]
    MissingUnknownCategory,
}

#[cfg(test)]
impl Error {
    pub fn validation_messages(&self) -> Option<&[String]> {
        match self {
            Error::Validation(v) => Some(&v.messages),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
