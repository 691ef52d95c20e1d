//! Abort reasons.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::exception::DomException;

/// The value a signal carries once aborted.
///
/// Clones share the same underlying value, and equality is identity: two
/// reasons are equal only if they are the same allocation.
#[derive(Clone)]
pub enum AbortReason {
    /// An `AbortError` DOMException, created when no reason was supplied.
    Exception(Rc<DomException>),
    /// A caller-supplied value.
    Value(Rc<dyn Any>),
}

impl AbortReason {
    /// A fresh default `AbortError`.
    pub fn abort_error() -> Self {
        Self::Exception(Rc::new(DomException::abort_error()))
    }

    /// Wrap a caller value.
    pub fn new<T: Any>(value: T) -> Self {
        Self::Value(Rc::new(value))
    }

    pub fn from_rc(value: Rc<dyn Any>) -> Self {
        Self::Value(value)
    }

    /// The reason as a DOMException, whether it was created by the signal or
    /// supplied by the caller.
    pub fn as_exception(&self) -> Option<&DomException> {
        match self {
            Self::Exception(exception) => Some(exception),
            Self::Value(value) => value.downcast_ref::<DomException>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Exception(exception) => (&**exception as &dyn Any).downcast_ref::<T>(),
            Self::Value(value) => value.downcast_ref::<T>(),
        }
    }

    /// Whether this is an `AbortError` DOMException.
    pub fn is_abort_error(&self) -> bool {
        self.as_exception()
            .is_some_and(|exception| exception.name() == crate::ExceptionName::Abort)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        match self {
            Self::Exception(exception) => Rc::as_ptr(exception).cast(),
            Self::Value(value) => Rc::as_ptr(value).cast(),
        }
    }
}

impl PartialEq for AbortReason {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exception(exception) => f.debug_tuple("Exception").field(&**exception).finish(),
            Self::Value(_) => f.write_str("Value(<opaque>)"),
        }
    }
}

/// Who is responsible for a signal's reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonOwnership {
    /// The signal created the default reason itself.
    Owned,
    /// The reason was handed in by the caller.
    Supplied,
    /// The reason came from a source signal or an already-aborted input.
    Inherited,
}
