//! Common error types shared by the cache crates
//!
//! The error system has three parts:
//!
//! 1. **`CommonError`**: the error patterns that show up in every layer
//!    (configuration, serialization, backend failures in a shared cache,
//!    invariant violations).
//! 2. **`ErrorClassification`**: a trait for classifying errors by
//!    retryability and severity.
//! 3. **`ErrorSeverity`**: one severity scale for logging decisions.
//!
//! Module-specific errors compose with `CommonError` instead of duplicating
//! its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum CacheError {
//!     #[error("unknown cache '{0}'")]
//!     UnknownCache(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//!
//! impl_error_classification!(CacheError, Common,
//!     Self::UnknownCache(_) => {
//!         retryable: false,
//!         severity: ErrorSeverity::Error,
//!         critical: false,
//!     }
//! );
//! ```
//!
//! | Pattern | Variant | Typical source |
//! |---------|---------|----------------|
//! | Configuration | `Config` | invalid cache settings, missing config file |
//! | Serialization | `Serialization` | TOML/JSON parsing, clustered cache encoding |
//! | Persistence | `Persistence` | file I/O while loading configuration |
//! | Backend | `Backend` | a shared cache implementation refusing an operation |
//! | Validation | `Validation` | constraint violations on inputs |
//! | Internal | `Internal` | invariant violations |

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across the cache crates
#[derive(Debug, Clone)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String, field: Option<String> },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// File I/O errors
    Persistence { message: String, operation: Option<String> },

    /// Failure reported by a shared cache backend
    Backend { service: String, message: String, is_retryable: bool },

    /// Validation errors
    Validation { field: String, message: String, value: Option<String> },

    /// Internal errors that shouldn't normally occur
    Internal { message: String, context: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field } => match field {
                Some(field) => write!(f, "Configuration error in field '{}': {}", field, message),
                None => write!(f, "Configuration error: {}", message),
            },
            Self::Serialization { message, format } => match format {
                Some(format) => write!(f, "Serialization error ({}): {}", format, message),
                None => write!(f, "Serialization error: {}", message),
            },
            Self::Persistence { message, operation } => match operation {
                Some(op) => write!(f, "Persistence error during '{}': {}", op, message),
                None => write!(f, "Persistence error: {}", message),
            },
            Self::Backend { service, message, .. } => {
                write!(f, "Backend error from '{}': {}", service, message)
            }
            Self::Validation { field, message, value } => match value {
                Some(value) => write!(
                    f,
                    "Validation error for field '{}' (value: '{}'): {}",
                    field, value, message
                ),
                None => write!(f, "Validation error for field '{}': {}", field, message),
            },
            Self::Internal { message, context } => match context {
                Some(ctx) => write!(f, "Internal error in '{}': {}", ctx, message),
                None => write!(f, "Internal error: {}", message),
            },
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { is_retryable: true, .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Internal { .. } => ErrorSeverity::Critical,
            Self::Config { .. }
            | Self::Serialization { .. }
            | Self::Persistence { .. }
            | Self::Backend { .. }
            | Self::Validation { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    // Each pattern has a bare constructor and one that records the optional
    // context field.

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Configuration error attributed to one setting
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), format: None }
    }

    /// Serialization error tagged with the format (`"JSON"`, `"TOML"`, ...)
    pub fn serialization_format(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    pub fn persistence_op(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    /// Failure reported by a shared cache backend; `is_retryable` is the
    /// backend's own judgement
    pub fn backend(service: impl Into<String>, message: impl Into<String>, is_retryable: bool) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: None }
    }

    /// Validation error that echoes the rejected value
    pub fn validation_with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: Some(value.into()) }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), context: None }
    }

    /// Invariant violation, with the operation it was detected in
    pub fn internal_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), context: Some(context.into()) }
    }

    /// Short name of the error pattern, for the `error_kind` log field
    ///
    /// ```rust,ignore
    /// tracing::error!(error_kind = err.kind(), error = %err, "shared cache write failed");
    /// ```
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
            Self::Backend { .. } => "backend",
            Self::Validation { .. } => "validation",
            Self::Internal { .. } => "internal",
        }
    }
}

/// How callers should treat an error: retry it, and at what log level
pub trait ErrorClassification {
    /// Transient failures, such as a backend that said the failure was
    /// temporary
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// The shared cache may be left inconsistent; a post-commit flush
    /// failure is the typical case
    fn is_critical(&self) -> bool;

    /// Delay to wait before retrying, when the error knows one
    fn retry_after(&self) -> Option<Duration>;
}

/// Log level an error should be reported at, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    /// Cache contents can no longer be trusted
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

/// Creates the std error conversions for a module-specific error enum
///
/// `From<CommonError>` is normally provided by `#[from]` on the variant:
///
/// ```rust,ignore
/// #[derive(Debug, thiserror::Error)]
/// pub enum CacheError {
///     #[error(transparent)]
///     Common(#[from] CommonError),
/// }
///
/// impl_error_conversion!(CacheError, Common);
/// ```
///
/// This generates `From<serde_json::Error>`, `From<std::io::Error>` and
/// `From<toml::de::Error>`, each routed through `CommonError`.
#[macro_export]
macro_rules! impl_error_conversion {
    ($error_type:ty, $variant:ident) => {
        impl From<serde_json::Error> for $error_type {
            fn from(err: serde_json::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<std::io::Error> for $error_type {
            fn from(err: std::io::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<toml::de::Error> for $error_type {
            fn from(err: toml::de::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }
    };
}

/// Implements `ErrorClassification` by delegating to the embedded
/// `CommonError` and listing the module-specific variants explicitly.
///
/// ```rust,ignore
/// impl_error_classification!(CacheError, Common,
///     Self::UnknownCache(_) => {
///         retryable: false,
///         severity: ErrorSeverity::Error,
///         critical: false,
///     }
/// );
/// ```
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_retryable(),
                    $(
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => e.severity(),
                    $(
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_critical(),
                    $(
                        $variant => $critical,
                    )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => e.retry_after(),
                    $(
                        $(
                            $variant => $retry_after,
                        )?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}
