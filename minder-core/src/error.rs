//! Domain error taxonomy.
//!
//! Every variant here is expected to surface to the user as a clarification
//! acknowledgment at the router boundary, never as an unhandled failure.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    /// Bad or missing parameters in an otherwise well-formed command.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The entity already exists; `existing` carries its summary for display.
    #[error("already exists: {existing}")]
    Conflict { existing: String },

    /// A fuzzy name lookup matched more than one entity.
    #[error("ambiguous reference '{query}' (candidates: {})", candidates.join(", "))]
    AmbiguousReference {
        query: String,
        candidates: Vec<String>,
    },

    /// Referenced entity does not exist for this user.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistence layer unavailable after retries.
    #[error("storage unavailable: {0}")]
    Storage(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
