use std::borrow::Cow;

use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error type returned by every graph operation.
#[derive(Debug, Error)]
pub enum SocialError {
    /// A user, post, comment or reply the operation depends on does not exist.
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    /// The actor does not own the entity it tried to mutate.
    #[error("not allowed to {action}")]
    Forbidden { action: &'static str },

    /// A user tried to follow or unfollow themselves.
    #[error("a user cannot follow or unfollow themselves")]
    SelfReferenceNotAllowed,

    /// Unique index violation on create (email or username already taken).
    #[error("duplicate key: fields {fields:?} with values {values:?} already exist")]
    DuplicateKey { fields: Vec<String>, values: Vec<String> },

    /// The comment a reply targets belongs to a different post.
    #[error("comment `{reply_to}` does not belong to post `{post}`")]
    Mismatch { reply_to: String, post: String },

    /// The operation did not finish within its deadline. No state change is guaranteed either way.
    #[error("{operation} timed out; please retry")]
    Timeout { operation: &'static str },

    /// Concurrent writers kept invalidating the transaction until the attempt budget ran out.
    #[error("transaction aborted after {attempts} attempts; please retry")]
    TransactionAborted { attempts: u32 },

    /// Input was rejected before touching storage.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// Presigning upload URLs failed.
    #[error("upload signing failed: {message}")]
    Upload { message: String },

    /// Settings could not be resolved (for example an unset `${REDIS_URL}`).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(StoreError),
}

impl SocialError {
    pub(crate) fn not_found(kind: &'static str, id: impl AsRef<str>) -> Self {
        Self::NotFound {
            kind,
            id: id.as_ref().to_string(),
        }
    }

    /// Whether re-issuing the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::TransactionAborted { .. } => true,
            Self::Storage(StoreError::Redis(err)) => {
                err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal()
            }
            _ => false,
        }
    }
}

impl From<StoreError> for SocialError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { fields, values, .. } => Self::DuplicateKey { fields, values },
            other => Self::Storage(other),
        }
    }
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A key read by the transaction changed before commit.
    #[error("version conflict on `{key}` (expected {expected}, actual {actual})")]
    Conflict { key: String, expected: u64, actual: u64 },

    /// A unique claim is already held by another entity.
    #[error("unique constraint violation: fields {fields:?} with values {values:?} already exist on entity '{existing_entity_id}'")]
    UniqueViolation {
        fields: Vec<String>,
        values: Vec<String>,
        existing_entity_id: String,
    },

    /// A document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

/// Collection of validation issues encountered while preparing a mutation.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;
