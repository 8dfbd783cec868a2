#![forbid(unsafe_code)]

use std::fmt;

use thiserror::Error as ThisError;

/// Classification of a failure reported by the transport.
///
/// The variants mirror the status classes of sftp v3 plus the
/// connection level failures of the ssh session itself.
#[non_exhaustive]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TransportErrorKind {
    /// `SSH_FX_NO_SUCH_FILE`
    NoSuchFile,
    /// `SSH_FX_PERMISSION_DENIED`
    PermissionDenied,
    /// `SSH_FX_FAILURE`
    Failure,
    /// The session or the channel is gone.
    ConnectionLost,
    /// `SSH_FX_OP_UNSUPPORTED`
    Unsupported,
    /// Anything the transport could not classify.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::NoSuchFile => "no such file",
            TransportErrorKind::PermissionDenied => "permission denied",
            TransportErrorKind::Failure => "failure",
            TransportErrorKind::ConnectionLost => "connection lost",
            TransportErrorKind::Unsupported => "operation unsupported",
            TransportErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Error reported by the underlying ssh/sftp transport.
#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
#[error("transport error ({kind}): {message}")]
pub struct TransportError {
    /// Class of the failure.
    pub kind: TransportErrorKind,
    /// Message reported by the transport, e.g. `ssh_get_error`.
    pub message: String,
}

impl TransportError {
    /// Create a new [`TransportError`].
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shortcut for an unclassified failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }
}

/// Error returned by the authentication negotiation.
///
/// The terminal variants ([`AuthError::Denied`],
/// [`AuthError::InsufficientFactors`], [`AuthError::RetryBudgetExhausted`]
/// and [`AuthError::Transport`]) are kept apart so that "wrong credentials"
/// can be presented differently from "server unreachable".
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum AuthError {
    /// Every configured method was tried and the last one was denied.
    #[error("all authentication methods exhausted, tried {methods:?}")]
    Denied {
        /// Names of the methods tried, in order.
        methods: Vec<&'static str>,
    },

    /// Some methods succeeded partially but the server still requires
    /// another factor and no method is left.
    #[error("not enough authentication factors, satisfied {satisfied:?}")]
    InsufficientFactors {
        /// Names of the methods accepted as partial success.
        satisfied: Vec<&'static str>,
    },

    /// The last method kept asking to be retried.
    #[error("method {method} still transient after {retries} retries")]
    RetryBudgetExhausted {
        /// Name of the method.
        method: &'static str,
        /// Number of retries performed.
        retries: u32,
    },

    /// Transient condition, the same step should be issued again.
    #[error("method {method} asked to be retried")]
    Again {
        /// Name of the method.
        method: &'static str,
    },

    /// The transport returned a code the method does not expect.
    #[error("method {method} received unexpected response {response}")]
    UnexpectedResponse {
        /// Name of the method.
        method: &'static str,
        /// Name of the response code.
        response: &'static str,
    },

    /// Key material could not be imported.
    #[error("failed to import key: {0}")]
    KeyImport(#[source] TransportError),

    /// The answers supplied for a keyboard-interactive prompt do not match
    /// the questions asked.
    #[error("expected {expected} answers, got {got}")]
    AnswerCountMismatch {
        /// Number of questions.
        expected: usize,
        /// Number of answers.
        got: usize,
    },

    /// The callback supplying keyboard-interactive answers failed.
    #[error("answer callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Fatal transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Error returned by the remote filesystem client and the file handles.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum FileError {
    /// Path does not exist.
    #[error("{path}: no such file or directory")]
    NotFound {
        /// Path that was resolved.
        path: String,
        /// Error reported by the transport.
        #[source]
        source: TransportError,
    },

    /// Operation is not valid for the entry type of the node.
    #[error("{path}: not a {expected}")]
    WrongType {
        /// Path of the node.
        path: String,
        /// Entry type the operation requires.
        expected: &'static str,
    },

    /// Access was refused.
    #[error("{path}: permission denied")]
    PermissionDenied {
        /// Path of the node.
        path: String,
        /// Error reported by the transport.
        #[source]
        source: TransportError,
    },

    /// Transport failure not covered by the other variants.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Closing a file or directory handle failed.
    #[error("failed to close handle: {0}")]
    CloseFailed(#[source] TransportError),

    /// Another read or write is still running on this handle.
    #[error("another operation is in flight on this handle")]
    Busy,

    /// The handle was closed while the operation was running.
    #[error("file handle closed while the operation was running")]
    Closed,

    /// The sink fed by a download failed.
    #[error("IO Error: {0}.")]
    IOError(#[from] std::io::Error),

    /// tokio join error
    #[error("Failed to join tokio task")]
    TaskJoinError(#[from] tokio::task::JoinError),

    /// Raised 2 errors when cleaning up.
    #[error(transparent)]
    RecursiveErrors(Box<RecursiveError>),
}

impl FileError {
    /// Classify a transport error raised while operating on `path`.
    pub fn at(path: impl Into<String>, source: TransportError) -> Self {
        let path = path.into();

        match source.kind {
            TransportErrorKind::NoSuchFile => FileError::NotFound { path, source },
            TransportErrorKind::PermissionDenied => FileError::PermissionDenied { path, source },
            _ => FileError::Transport(source),
        }
    }
}

#[derive(Debug, ThisError)]
#[error("OriginalError: {original_error}, curr err raised when cleaning up: {occuring_error}.")]
pub struct RecursiveError {
    /// Original error
    pub original_error: FileError,

    /// Current error raised when performing cleanup
    /// for original error.
    #[source]
    pub occuring_error: FileError,
}
