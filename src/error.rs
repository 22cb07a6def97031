use std::sync::Arc;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Failure produced by a descriptor's loader.
///
/// A single failure is recorded in two places at once, under its key in
/// the aggregated batch result and in the status store, so the message
/// payload is shared and the whole error is cheap to clone.  Batches
/// themselves never fail; this type only ever appears as data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("loader failed: {message}")]
pub struct LoadError {
    message: Arc<str>,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Serialize for LoadError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.message)
    }
}
