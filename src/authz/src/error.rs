//! Error types for scope resolution and evaluation

use thiserror::Error;

/// Failure reported by a datastore lookup behind an attribute resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The referenced entity does not exist in the organization
    #[error("{resource} not found: {attribute} '{value}'")]
    NotFound {
        resource: String,
        attribute: String,
        value: String,
    },

    /// The lookup backend itself failed
    #[error("datastore lookup failed: {0}")]
    Backend(String),
}

impl LookupError {
    /// Create a not-found error for `<resource>:<attribute>:<value>`
    pub fn not_found(
        resource: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource: resource.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Authorization engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// No attribute resolver is registered for the scope's prefix
    #[error("no scope attribute resolver found for scope '{scope}'")]
    ResolverNotFound { scope: String },

    /// A registered resolver's lookup failed
    #[error(transparent)]
    LookupFailed(#[from] LookupError),

    /// A reserved keyword scope could not be substituted
    #[error("malformed keyword scope '{scope}': {reason}")]
    MalformedKeyword { scope: String, reason: String },

    /// Scope cannot be resolved because of its shape
    #[error("invalid scope '{scope}': {reason}")]
    InvalidScope { scope: String, reason: String },

    /// A resolver returned more scopes than the configured limit
    #[error("scope '{scope}' resolved to {count} scopes, limit is {limit}")]
    FanOutExceeded {
        scope: String,
        count: usize,
        limit: usize,
    },

    /// The request was canceled while resolving
    #[error("scope resolution canceled")]
    Canceled,

    /// The request deadline or resolver timeout elapsed
    #[error("scope resolution deadline exceeded")]
    DeadlineExceeded,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthzError {
    /// Create a resolver-not-found error for a scope
    pub fn resolver_not_found(scope: impl Into<String>) -> Self {
        Self::ResolverNotFound {
            scope: scope.into(),
        }
    }

    /// Create an invalid scope error
    pub fn invalid_scope(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScope {
            scope: scope.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means no resolver owns the scope
    pub fn is_resolver_not_found(&self) -> bool {
        matches!(self, Self::ResolverNotFound { .. })
    }

    /// Whether this error is a lookup miss for the referenced entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::LookupFailed(LookupError::NotFound { .. }))
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
