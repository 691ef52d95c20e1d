//! DOMException-lite and the crate error type.
//!
//! Every fallible operation in this crate returns [`DomError`]. Errors are
//! always handed back to the immediate caller; nothing here is fatal.
//!
//! [`DomException`] is the small value object used as the default abort
//! reason and as the host-facing rendering of an error. Its names carry the
//! legacy numeric codes from WebIDL so bindings can surface `code`.

use std::fmt;

use thiserror::Error;

use crate::abort::AbortReason;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DomError>;

/// Errors surfaced by event dispatch and abort signals.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomError {
    /// A container could not grow. Nothing was committed.
    #[error("out of memory")]
    OutOfMemory,

    /// The operation is not valid in the object's current state.
    #[error("InvalidStateError: {reason}")]
    InvalidState { reason: &'static str },

    /// The signal has been aborted. Carries the signal's reason.
    #[error("signal is aborted: {reason:?}")]
    Aborted { reason: AbortReason },

    /// A collaborator was handed a node of an unacceptable type.
    #[error("InvalidNodeTypeError: {message}")]
    InvalidNodeType { message: String },
}

impl DomError {
    pub(crate) fn invalid_state(reason: &'static str) -> Self {
        Self::InvalidState { reason }
    }

    /// The exception name a host would report for this error.
    #[must_use]
    pub fn name(&self) -> ExceptionName {
        match self {
            Self::OutOfMemory => ExceptionName::QuotaExceeded,
            Self::InvalidState { .. } => ExceptionName::InvalidState,
            Self::Aborted { .. } => ExceptionName::Abort,
            Self::InvalidNodeType { .. } => ExceptionName::InvalidNodeType,
        }
    }

    /// Render the error as a DOMException value.
    ///
    /// For `Aborted`, a reason that already is a DOMException is returned
    /// as-is so the original message survives.
    #[must_use]
    pub fn exception(&self) -> DomException {
        match self {
            Self::Aborted { reason } => reason.as_exception().cloned().unwrap_or_else(|| {
                DomException::new(ExceptionName::Abort, "The operation was aborted.")
            }),
            Self::InvalidState { reason } => {
                DomException::new(ExceptionName::InvalidState, *reason)
            }
            Self::InvalidNodeType { message } => {
                DomException::new(ExceptionName::InvalidNodeType, message.clone())
            }
            Self::OutOfMemory => DomException::from_name(ExceptionName::QuotaExceeded),
        }
    }
}

impl From<std::collections::TryReserveError> for DomError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

impl From<indexmap::TryReserveError> for DomError {
    fn from(_: indexmap::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

/// WebIDL exception names used by the DOM core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionName {
    IndexSize,
    HierarchyRequest,
    WrongDocument,
    InvalidCharacter,
    NoModificationAllowed,
    NotFound,
    NotSupported,
    InUseAttribute,
    InvalidState,
    Syntax,
    InvalidModification,
    Namespace,
    InvalidAccess,
    Abort,
    QuotaExceeded,
    Timeout,
    InvalidNodeType,
}

impl ExceptionName {
    const ALL: [ExceptionName; 17] = [
        Self::IndexSize,
        Self::HierarchyRequest,
        Self::WrongDocument,
        Self::InvalidCharacter,
        Self::NoModificationAllowed,
        Self::NotFound,
        Self::NotSupported,
        Self::InUseAttribute,
        Self::InvalidState,
        Self::Syntax,
        Self::InvalidModification,
        Self::Namespace,
        Self::InvalidAccess,
        Self::Abort,
        Self::QuotaExceeded,
        Self::Timeout,
        Self::InvalidNodeType,
    ];

    /// The name as it appears in `DOMException.name`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IndexSize => "IndexSizeError",
            Self::HierarchyRequest => "HierarchyRequestError",
            Self::WrongDocument => "WrongDocumentError",
            Self::InvalidCharacter => "InvalidCharacterError",
            Self::NoModificationAllowed => "NoModificationAllowedError",
            Self::NotFound => "NotFoundError",
            Self::NotSupported => "NotSupportedError",
            Self::InUseAttribute => "InUseAttributeError",
            Self::InvalidState => "InvalidStateError",
            Self::Syntax => "SyntaxError",
            Self::InvalidModification => "InvalidModificationError",
            Self::Namespace => "NamespaceError",
            Self::InvalidAccess => "InvalidAccessError",
            Self::Abort => "AbortError",
            Self::QuotaExceeded => "QuotaExceededError",
            Self::Timeout => "TimeoutError",
            Self::InvalidNodeType => "InvalidNodeTypeError",
        }
    }

    /// Legacy `DOMException.code` value.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::IndexSize => 1,
            Self::HierarchyRequest => 3,
            Self::WrongDocument => 4,
            Self::InvalidCharacter => 5,
            Self::NoModificationAllowed => 7,
            Self::NotFound => 8,
            Self::NotSupported => 9,
            Self::InUseAttribute => 10,
            Self::InvalidState => 11,
            Self::Syntax => 12,
            Self::InvalidModification => 13,
            Self::Namespace => 14,
            Self::InvalidAccess => 15,
            Self::Abort => 20,
            Self::QuotaExceeded => 22,
            Self::Timeout => 23,
            Self::InvalidNodeType => 24,
        }
    }

    /// Look a name up by its legacy code.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.code() == code)
    }

    /// Human-readable message used when no explicit message is given.
    #[must_use]
    pub fn default_message(self) -> &'static str {
        match self {
            Self::IndexSize => "Index or size is negative or greater than the allowed amount",
            Self::HierarchyRequest => "The operation would yield an incorrect node tree",
            Self::WrongDocument => "The object is in the wrong document",
            Self::InvalidCharacter => "The string contains invalid characters",
            Self::NoModificationAllowed => "The object can not be modified",
            Self::NotFound => "The object can not be found here",
            Self::NotSupported => "The operation is not supported",
            Self::InUseAttribute => "The attribute is in use by another element",
            Self::InvalidState => "The object is in an invalid state",
            Self::Syntax => "The string did not match the expected pattern",
            Self::InvalidModification => "The object can not be modified in this way",
            Self::Namespace => "The operation is not allowed by Namespaces in XML",
            Self::InvalidAccess => "The object does not support the operation or argument",
            Self::Abort => "signal is aborted without reason",
            Self::QuotaExceeded => "The quota has been exceeded",
            Self::Timeout => "The operation timed out",
            Self::InvalidNodeType => {
                "The supplied node is incorrect or has an incorrect ancestor for this operation"
            }
        }
    }
}

impl fmt::Display for ExceptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A minimal DOMException: a name plus a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomException {
    name: ExceptionName,
    message: String,
}

impl DomException {
    pub fn new(name: ExceptionName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }

    /// An exception carrying the name's default message.
    pub fn from_name(name: ExceptionName) -> Self {
        Self::new(name, name.default_message())
    }

    /// The value a signal stores when aborted without an explicit reason.
    pub fn abort_error() -> Self {
        Self::from_name(ExceptionName::Abort)
    }

    pub fn name(&self) -> ExceptionName {
        self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> u16 {
        self.name.code()
    }
}

impl fmt::Display for DomException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for DomException {}
