//! Error taxonomy for booking and route operations.
//!
//! Three layers of errors exist:
//!
//! - [`BookingError`]: what callers see. Every variant carries a stable
//!   [`ErrorKind`] and a human-readable message.
//! - [`StoreError`]: what persistence backends report, already translated from
//!   raw driver error codes into semantic variants.
//! - [`CacheError`]: what cache backends report. Never surfaced to callers;
//!   the route cache treats it as a miss.

use thiserror::Error;

/// Result type alias for booking and route operations.
pub type Result<T> = std::result::Result<T, BookingError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Name of the unique constraint guarding booking reference ids.
pub const REF_ID_CONSTRAINT: &str = "bookings_ref_id_key";

/// Stable error classification, independent of message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input or guard violation.
    BadRequest,
    /// No such booking or entity.
    NotFound,
    /// Lock busy or unique-constraint collision. Transient for lock contention.
    Conflict,
    /// Unexpected store failure or invariant breach.
    Internal,
}

impl ErrorKind {
    /// Stable string code for clients.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
        }
    }

    /// HTTP-equivalent status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }
}

/// Errors returned by the booking engine and route search.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed input or a state-machine guard violation.
    #[error("{0}")]
    BadRequest(String),

    /// The referenced booking or entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The resource is busy or a uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// Unexpected failure; details are logged, not exposed.
    #[error("{0}")]
    Internal(String),
}

impl BookingError {
    /// Create a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Conflict raised when a distributed lock is held elsewhere.
    pub fn resource_busy(resource: &str) -> Self {
        Self::Conflict(format!(
            "Resource '{resource}' is currently being modified by another process. Please try again."
        ))
    }

    /// Stable classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m) | Self::NotFound(m) | Self::Conflict(m) | Self::Internal(m) => m,
        }
    }

    /// Returns `true` if a client may retry the same request later.
    ///
    /// # Examples
    ///
    /// ```
    /// # use freightline_core::BookingError;
    /// assert!(BookingError::resource_busy("booking:DEL_DXB_ABC123").is_retryable());
    /// assert!(!BookingError::not_found("missing").is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Errors reported by persistence backends.
///
/// Backends translate their driver errors into these variants so callers never
/// match on raw SQLSTATE codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint was violated.
    #[error("unique violation on {}", constraint.as_deref().unwrap_or("unknown constraint"))]
    UniqueViolation {
        /// Name of the violated constraint, if reported.
        constraint: Option<String>,
    },

    /// A foreign key constraint was violated.
    #[error("foreign key violation on {}", column.as_deref().or(constraint.as_deref()).unwrap_or("unknown column"))]
    ForeignKeyViolation {
        /// Name of the violated constraint, if reported.
        constraint: Option<String>,
        /// Offending column, if reported.
        column: Option<String>,
    },

    /// A NOT NULL constraint was violated.
    #[error("not-null violation on {}", column.as_deref().unwrap_or("unknown column"))]
    NotNullViolation {
        /// Offending column, if reported.
        column: Option<String>,
    },

    /// A CHECK constraint was violated.
    #[error("check violation on {}", constraint.as_deref().unwrap_or("unknown constraint"))]
    CheckViolation {
        /// Name of the violated constraint, if reported.
        constraint: Option<String>,
    },

    /// Serialization failure or deadlock; the transaction was rolled back.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// Connection, pool or timeout failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded into a domain type.
    #[error("corrupt row: {0}")]
    Decode(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Returns `true` if this is a collision on the booking reference id.
    #[must_use]
    pub fn is_ref_id_collision(&self) -> bool {
        matches!(self, Self::UniqueViolation { constraint: Some(c) } if c == REF_ID_CONSTRAINT)
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint } => {
                if constraint.as_deref() == Some(REF_ID_CONSTRAINT) {
                    Self::Conflict("Booking reference already in use".to_string())
                } else {
                    let entity = constraint
                        .as_deref()
                        .and_then(|c| c.split('_').next())
                        .unwrap_or("record");
                    Self::Conflict(format!("{entity} already exists"))
                }
            }
            StoreError::ForeignKeyViolation { constraint, column } => Self::BadRequest(format!(
                "Invalid reference in field '{}'",
                column.or(constraint).unwrap_or_else(|| "unknown".to_string())
            )),
            StoreError::NotNullViolation { column } => Self::BadRequest(format!(
                "Missing required field '{}'",
                column.unwrap_or_else(|| "unknown".to_string())
            )),
            StoreError::CheckViolation { constraint } => Self::BadRequest(format!(
                "Value rejected by constraint '{}'",
                constraint.unwrap_or_else(|| "unknown".to_string())
            )),
            StoreError::TransactionAborted(msg)
            | StoreError::Unavailable(msg)
            | StoreError::Decode(msg)
            | StoreError::Database(msg) => {
                tracing::error!(error = %msg, "Store failure");
                Self::Internal("Unexpected store failure".to_string())
            }
        }
    }
}

/// Errors reported by cache backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The backing store could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The backing store rejected the command.
    #[error("cache command failed: {0}")]
    Command(String),
}
