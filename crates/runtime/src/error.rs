use crate::prelude::*;
use std::{error, fmt};
use thiserror::Error;

/// The different error types that can be thrown by the Wisp runtime
#[derive(Error, Clone)]
#[allow(missing_docs)]
pub enum ErrorKind {
    #[error("{0}")]
    StringError(String),
    /// A value thrown by a script, or produced by an error handler
    #[error("{0}")]
    ThrownValue(Value),
    /// An operation was applied to a value that doesn't support it
    #[error("attempt to {operation} a {type_name} value")]
    TypeError {
        operation: &'static str,
        type_name: &'static str,
    },
    /// The value stack can't grow any further
    #[error("stack overflow")]
    StackOverflow,
    /// Native calls are nested too deeply
    #[error("stack overflow")]
    NativeStackOverflow,
    /// An error was thrown while a previous error was being handled
    ///
    /// This error is fatal, error handlers aren't called and protected calls don't catch it.
    #[error("error in error handling")]
    ErrorInErrorHandling,
    /// The running thread has been suspended
    ///
    /// This isn't a failure, it's used to unwind native calls back to [Vm::resume].
    #[error("thread suspended")]
    Suspended,
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An error thrown by the Wisp runtime
#[derive(Clone, Debug)]
pub struct Error {
    pub(crate) error: ErrorKind,
    // Set once the error has been passed through the VM's error handler
    pub(crate) handled: bool,
}

impl Error {
    /// Initializes an error with the given internal error type
    pub(crate) fn new(error: ErrorKind) -> Self {
        Self {
            error,
            handled: false,
        }
    }

    /// Initializes an error from a thrown value
    pub fn from_value(thrown_value: Value) -> Self {
        match thrown_value {
            Value::Str(message) => Self::from(message.to_string()),
            other => Self::new(ErrorKind::ThrownValue(other)),
        }
    }

    /// Returns the error's kind
    pub fn kind(&self) -> &ErrorKind {
        &self.error
    }

    /// Returns the value that represents the error when it's caught by a script
    ///
    /// String errors are converted into string values, thrown values are returned unchanged.
    pub fn value(&self) -> Value {
        match &self.error {
            ErrorKind::ThrownValue(value) => value.clone(),
            other => Value::from(other.to_string()),
        }
    }

    /// True if the error can be caught by [Vm::protected_call]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.error,
            ErrorKind::ErrorInErrorHandling | ErrorKind::Suspended
        )
    }

    /// True if the error is the signal used to suspend a thread
    pub fn is_suspension(&self) -> bool {
        matches!(self.error, ErrorKind::Suspended)
    }

    /// True if the error was caused by either kind of stack overflow
    pub fn is_stack_overflow(&self) -> bool {
        matches!(
            self.error,
            ErrorKind::StackOverflow | ErrorKind::NativeStackOverflow
        )
    }

    /// Modifies string errors to include the given prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        use ErrorKind::StringError;

        self.error = match self.error {
            StringError(message) => StringError(format!("{prefix}: {message}")),
            other => other,
        };

        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl error::Error for Error {}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Self::new(ErrorKind::StringError(error))
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Self::new(ErrorKind::StringError(error.into()))
    }
}

impl From<ErrorKind> for Error {
    fn from(error: ErrorKind) -> Self {
        Self::new(error)
    }
}

/// The Result type used by the Wisp Runtime
pub type Result<T> = std::result::Result<T, Error>;

/// Creates a [crate::Error] from a message (with format-like behaviour), wrapped in `Err`
///
/// Wrapping the result in `Err` is a convenience for functions that need to return immediately when
/// an error has occured.
#[macro_export]
macro_rules! runtime_error {
    ($error:literal) => {
        Err($crate::Error::from(format!($error)))
    };
    ($error:expr) => {
        Err($crate::Error::from($error))
    };
    ($error:literal, $($y:expr),+ $(,)?) => {
        Err($crate::Error::from(format!($error, $($y),+)))
    };
}

/// Creates an error that describes an operation being applied to an unsupported value
///
/// e.g. `type_error("call", &Value::Nil)` produces 'attempt to call a nil value'.
pub fn type_error<T>(operation: &'static str, value: &Value) -> Result<T> {
    runtime_error!(ErrorKind::TypeError {
        operation,
        type_name: value.type_name(),
    })
}
