//! Every method is a small state machine: running a [`Step`] yields an
//! [`AuthOutcome`], and [`AuthOutcome::Continue`] carries the next step.
//! [`AuthNegotiator`] drives the steps in a loop, so a method may take any
//! number of rounds without recursion.

use super::{error::AuthError, lowlevel};

use lowlevel::AuthTransport;

pub use lowlevel::{Prompt, Question};

mod outcome;
pub use outcome::{AuthOutcome, Step};

mod none;
pub use none::AuthNone;

mod password;
pub use password::AuthPassword;

mod keyboard_interactive;
pub use keyboard_interactive::{AnswerFuture, AuthKeyboardInteractive};

mod publickey;
pub use publickey::AuthPublicKey;

mod negotiator;
pub use negotiator::{AuthNegotiator, AuthOptions};

/// A credential strategy.
#[derive(Debug)]
pub enum Authenticator {
    /// See [`AuthNone`].
    None(AuthNone),
    /// See [`AuthPassword`].
    Password(AuthPassword),
    /// See [`AuthKeyboardInteractive`].
    KeyboardInteractive(AuthKeyboardInteractive),
    /// See [`AuthPublicKey`].
    PublicKey(AuthPublicKey),
}

impl Authenticator {
    /// Name of the method as used by the ssh protocol.
    pub const fn name(&self) -> &'static str {
        match self {
            Authenticator::None(_) => "none",
            Authenticator::Password(_) => "password",
            Authenticator::KeyboardInteractive(_) => "keyboard-interactive",
            Authenticator::PublicKey(_) => "publickey",
        }
    }

    /// Forget the state left over by a previous negotiation.
    fn reset(&mut self) {
        if let Authenticator::KeyboardInteractive(kbdint) = self {
            kbdint.reset();
        }
    }

    /// Run `step` against `conn`.
    ///
    /// Every method starts with [`Step::Start`]; steps produced by another
    /// method are treated as [`Step::Start`].
    pub async fn run<T: AuthTransport>(
        &mut self,
        conn: &mut T,
        step: &Step<T::Key>,
    ) -> Result<AuthOutcome<Step<T::Key>>, AuthError> {
        match self {
            Authenticator::None(none) => none.attempt(conn),
            Authenticator::Password(password) => password.attempt(conn),
            Authenticator::KeyboardInteractive(kbdint) => match step {
                Step::Answer(prompt) => kbdint.answer(conn, prompt.clone()).await,
                _ => kbdint.poll(conn),
            },
            Authenticator::PublicKey(publickey) => match step {
                Step::Sign(_accepted) => publickey.sign(conn),
                _ => publickey.probe(conn),
            },
        }
    }
}

impl From<AuthNone> for Authenticator {
    fn from(none: AuthNone) -> Self {
        Authenticator::None(none)
    }
}

impl From<AuthPassword> for Authenticator {
    fn from(password: AuthPassword) -> Self {
        Authenticator::Password(password)
    }
}

impl From<AuthKeyboardInteractive> for Authenticator {
    fn from(kbdint: AuthKeyboardInteractive) -> Self {
        Authenticator::KeyboardInteractive(kbdint)
    }
}

impl From<AuthPublicKey> for Authenticator {
    fn from(publickey: AuthPublicKey) -> Self {
        Authenticator::PublicKey(publickey)
    }
}
