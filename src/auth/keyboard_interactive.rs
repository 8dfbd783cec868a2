use super::{
    lowlevel::{AuthCode, AuthTransport},
    AuthError, AuthOutcome, Prompt, Step,
};

use std::fmt;
use std::future::Future;
use std::pin::Pin;

const METHOD: &str = "keyboard-interactive";

/// Future returned by the answer callback of [`AuthKeyboardInteractive`].
pub type AnswerFuture = Pin<Box<dyn Future<Output = Result<Vec<String>, AuthError>> + Send>>;

type AnswerCallback = Box<dyn FnMut(Prompt) -> AnswerFuture + Send>;

/// The `keyboard-interactive` method.
///
/// Every challenge the server sends is handed to the answer callback, which
/// must return one answer per question, in order. The exchange may take
/// any number of rounds.
///
/// A wrong answer is retried with a fresh challenge, up to
/// [`AuthKeyboardInteractive::with_wrong_retries_allowed`] times, before the
/// method counts as denied.
pub struct AuthKeyboardInteractive {
    answer: AnswerCallback,
    wrong_retries_allowed: u32,
    wrong_retries_left: u32,
}

impl AuthKeyboardInteractive {
    /// Create a new [`AuthKeyboardInteractive`] that answers challenges
    /// with `answer`.
    ///
    /// To reject a challenge, return [`AuthError::Callback`].
    pub fn new<F, Fut>(mut answer: F) -> Self
    where
        F: FnMut(Prompt) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<String>, AuthError>> + Send + 'static,
    {
        Self {
            answer: Box::new(move |prompt| Box::pin(answer(prompt))),
            wrong_retries_allowed: 3,
            wrong_retries_left: 3,
        }
    }

    /// Set the number of wrong answers tolerated before the method is
    /// denied.
    ///
    /// It would be 3 by default.
    #[must_use]
    pub fn with_wrong_retries_allowed(mut self, wrong_retries_allowed: u32) -> Self {
        self.wrong_retries_allowed = wrong_retries_allowed;
        self.wrong_retries_left = wrong_retries_allowed;
        self
    }

    pub(super) fn reset(&mut self) {
        self.wrong_retries_left = self.wrong_retries_allowed;
    }

    /// Start the exchange, or ask for the verdict on the last answers.
    pub(super) fn poll<T: AuthTransport>(
        &mut self,
        conn: &mut T,
    ) -> Result<AuthOutcome<Step<T::Key>>, AuthError> {
        match conn.userauth_kbdint()? {
            AuthCode::Success => Ok(AuthOutcome::Success),
            AuthCode::Partial => Ok(AuthOutcome::Partial),
            AuthCode::Denied => match self.wrong_retries_left.checked_sub(1) {
                Some(left) => {
                    self.wrong_retries_left = left;
                    // Start over with a fresh challenge.
                    Ok(AuthOutcome::Continue(Step::Start))
                }
                None => Ok(AuthOutcome::Denied),
            },
            AuthCode::Info => Ok(AuthOutcome::Continue(Step::Answer(conn.kbdint_prompt()?))),
            AuthCode::Again => Err(AuthError::Again { method: METHOD }),
        }
    }

    pub(super) async fn answer<T: AuthTransport>(
        &mut self,
        conn: &mut T,
        prompt: Prompt,
    ) -> Result<AuthOutcome<Step<T::Key>>, AuthError> {
        let expected = prompt.questions.len();

        let answers = (self.answer)(prompt).await?;
        if answers.len() != expected {
            return Err(AuthError::AnswerCountMismatch {
                expected,
                got: answers.len(),
            });
        }

        for (index, answer) in answers.iter().enumerate() {
            conn.kbdint_set_answer(index, answer)?;
        }

        Ok(AuthOutcome::Continue(Step::Poll))
    }
}

impl fmt::Debug for AuthKeyboardInteractive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKeyboardInteractive")
            .field("wrong_retries_allowed", &self.wrong_retries_allowed)
            .field("wrong_retries_left", &self.wrong_retries_left)
            .finish_non_exhaustive()
    }
}
