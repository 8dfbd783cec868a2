use super::{lowlevel::AuthCode, AuthError, Prompt};

use std::fmt;

/// Result of running one step of an [`super::Authenticator`].
#[derive(Debug)]
pub enum AuthOutcome<S> {
    /// The server accepted the method.
    Success,
    /// The server rejected the method.
    Denied,
    /// The method was accepted but the server requires another one.
    Partial,
    /// The method needs another step before it reaches a verdict.
    Continue(S),
}

impl<S> AuthOutcome<S> {
    /// Map the code of a single step method.
    pub(super) fn from_code(method: &'static str, code: AuthCode) -> Result<Self, AuthError> {
        match code {
            AuthCode::Success => Ok(AuthOutcome::Success),
            AuthCode::Denied => Ok(AuthOutcome::Denied),
            AuthCode::Partial => Ok(AuthOutcome::Partial),
            AuthCode::Again => Err(AuthError::Again { method }),
            AuthCode::Info => Err(AuthError::UnexpectedResponse {
                method,
                response: code.name(),
            }),
        }
    }
}

/// Resumable state of an authentication attempt.
///
/// `K` is the key handle of the transport.
pub enum Step<K> {
    /// First step of every method.
    Start,
    /// Keyboard-interactive: supply the answers to the challenge.
    Answer(Prompt),
    /// Keyboard-interactive: ask the server for the verdict on the answers,
    /// or for the next challenge.
    Poll,
    /// Publickey: the server would accept the key, sign with the private
    /// half.
    ///
    /// The accepted public key stays imported until the step is dropped.
    Sign(K),
}

impl<K> fmt::Debug for Step<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Start => f.write_str("Start"),
            Step::Answer(prompt) => f.debug_tuple("Answer").field(prompt).finish(),
            Step::Poll => f.write_str("Poll"),
            Step::Sign(_) => f.write_str("Sign(..)"),
        }
    }
}
