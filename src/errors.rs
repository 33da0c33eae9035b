use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Per-field problems with a medicine form submission, keyed by the
/// camelCase field name the frontend uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.fields {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Error)]
pub enum MedicineError {
    #[error("invalid medicine: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("medicine {0} not found")]
    NotFound(String),

    #[error("medicine list is not loaded yet")]
    NotReady,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlarmError {
    #[error("no alarm is ringing")]
    NothingRinging,

    #[error("alarm worker has stopped")]
    Stopped,
}
