use thiserror::Error;

/// The error returned by lookups that require a key to be present.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("key not found")]
pub struct KeyError;
