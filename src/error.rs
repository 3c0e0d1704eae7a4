//! Error types for the bridge.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bridge.
///
/// Script-side failures are exceptions; host-side failures are this enum.
/// The bridge maps between the two at the trap and call boundaries: an
/// `Error` raised inside a trap or a published function is thrown into the
/// script as an exception carrying its `Display` text, and a script
/// exception crossing into the host surfaces as [`Error::Script`] or
/// [`Error::Callback`].
#[derive(Debug, Error)]
pub enum Error {
    /// A script read or wrote a member the proxied host object does not have.
    #[error("undefined property: {name}")]
    UndefinedProperty { name: String },

    /// An object carried the reserved handle property, but the handle does
    /// not resolve in this context's registry (foreign or stale).
    #[error("object carries a handle that does not resolve")]
    UnexpectedHandle,

    /// `require` or `publish_module` named a key nothing was registered under.
    #[error("module not found: {key}")]
    ModuleNotFound { key: String },

    /// Structural (JSON) decoding of a script value failed. Fatal to the
    /// current call; values are never silently coerced.
    #[error("cannot decode script value into {expected}: {reason}")]
    Decode {
        expected: &'static str,
        reason: String,
    },

    /// A script callback invoked from the host threw.
    #[error("script callback failed: {message}")]
    Callback { message: String },

    /// Evaluation raised a script exception.
    #[error("script exception: {message}")]
    Script { message: String },

    /// A fallible host function reported an error. Thrown into the script
    /// verbatim when the call came from script code.
    #[error("{message}")]
    Function { message: String },

    /// The engine failed outside of script exception handling.
    #[error("engine: {0}")]
    Engine(#[from] rquickjs::Error),

    /// Reading script source from disk failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Error for a member lookup that found nothing.
    pub(crate) fn undefined(name: impl Into<String>) -> Self {
        Error::UndefinedProperty { name: name.into() }
    }

    /// Decode error with a target description and a failure reason.
    pub(crate) fn decode(expected: &'static str, reason: impl Into<String>) -> Self {
        Error::Decode {
            expected,
            reason: reason.into(),
        }
    }
}
