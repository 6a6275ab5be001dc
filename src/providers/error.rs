/// Store-specific error with retry classification
///
/// Stores return this error type from every collaborator call. The query
/// engine never retries on its own; it either degrades (lookups, entity
/// listing) or hands the error back to the caller, who can use
/// `is_retryable()` to decide what to do next.
///
/// # Error Classification
///
/// **Retryable (is_retryable = true)**:
/// - Store busy or throttled
/// - Connection timeouts
/// - Network failures
///
/// **Non-retryable (is_retryable = false)**:
/// - Operation not supported by this store (e.g. no entity support)
/// - Malformed rows
/// - Configuration errors
///
/// # Example Usage
///
/// ```rust
/// use duroscope::providers::ProviderError;
///
/// # fn example() -> Result<(), ProviderError> {
/// return Err(ProviderError::retryable("list_instances", "Table storage is throttling"));
/// # }
///
/// # fn example2() -> Result<(), ProviderError> {
/// return Err(ProviderError::permanent("list_entities", "Entities are not supported"));
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Operation that failed (e.g., "list_instances", "get_history")
    pub operation: String,
    /// Human-readable error message
    pub message: String,
    /// Whether this error should be retried
    pub retryable: bool,
}

impl ProviderError {
    /// Create a retryable (transient) error
    pub fn retryable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Create a non-retryable (permanent) error
    pub fn permanent(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Permanent error for collaborator calls a store does not implement.
    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::permanent(operation, "not supported by this store")
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Conversion from String for stores that surface plain error text
impl From<String> for ProviderError {
    /// String errors are treated as retryable.
    fn from(s: String) -> Self {
        Self {
            operation: "unknown".to_string(),
            message: s,
            retryable: true,
        }
    }
}

impl From<&str> for ProviderError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}
