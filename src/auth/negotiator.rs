use super::{AuthError, AuthNone, AuthOutcome, AuthTransport, Authenticator, Step};

/// Options of an [`AuthNegotiator`].
#[derive(Debug, Copy, Clone)]
pub struct AuthOptions {
    transient_retries: u32,
    probe_none_when_empty: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthOptions {
    /// Create a new [`AuthOptions`].
    pub const fn new() -> Self {
        Self {
            transient_retries: 3,
            probe_none_when_empty: true,
        }
    }

    /// Set `transient_retries`, how many times a step answered with
    /// [`AuthError::Again`] is issued again.
    ///
    /// A method still transient after that many retries counts as denied.
    ///
    /// It would be 3 by default.
    #[must_use]
    pub const fn transient_retries(mut self, transient_retries: u32) -> Self {
        self.transient_retries = transient_retries;
        self
    }

    /// Set `probe_none_when_empty`, whether to try the `none` method when
    /// no method is configured.
    ///
    /// It would be `true` by default.
    #[must_use]
    pub const fn probe_none_when_empty(mut self, probe_none_when_empty: bool) -> Self {
        self.probe_none_when_empty = probe_none_when_empty;
        self
    }

    pub(super) const fn get_transient_retries(&self) -> u32 {
        self.transient_retries
    }

    pub(super) const fn get_probe_none_when_empty(&self) -> bool {
        self.probe_none_when_empty
    }
}

/// Final outcome of one method.
#[derive(Debug, Copy, Clone)]
enum Verdict {
    Success,
    Partial,
    Denied,
    Exhausted { retries: u32 },
}

impl Verdict {
    #[cfg(feature = "tracing")]
    const fn name(self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::Partial => "partial",
            Verdict::Denied => "denied",
            Verdict::Exhausted { .. } => "retry budget exhausted",
        }
    }
}

/// Tries an ordered list of [`Authenticator`]s until the session is
/// authenticated.
///
/// Methods are tried strictly one after another. A method accepted while the
/// server still requires more (partial success) is recorded and the next
/// one is tried. A denied method moves on to the next one as well.
#[derive(Debug, Default)]
pub struct AuthNegotiator {
    authenticators: Vec<Authenticator>,
    options: AuthOptions,
}

impl AuthNegotiator {
    /// Create a new [`AuthNegotiator`] trying `authenticators` in order.
    pub fn new(authenticators: Vec<Authenticator>) -> Self {
        Self::with_options(authenticators, AuthOptions::new())
    }

    /// Create a new [`AuthNegotiator`] with custom [`AuthOptions`].
    pub fn with_options(authenticators: Vec<Authenticator>, options: AuthOptions) -> Self {
        Self {
            authenticators,
            options,
        }
    }

    /// Append a method to the list.
    pub fn push(&mut self, authenticator: impl Into<Authenticator>) -> &mut Self {
        self.authenticators.push(authenticator.into());
        self
    }

    /// Methods tried by [`AuthNegotiator::negotiate`], in order.
    pub fn authenticators(&self) -> &[Authenticator] {
        &self.authenticators
    }

    /// Authenticate `conn`, returning it once the server reports the session
    /// as authenticated.
    ///
    /// Transport failures end the negotiation immediately, as do errors
    /// of a method itself (unreadable key, failing answer callback).
    pub async fn negotiate<T: AuthTransport>(&mut self, mut conn: T) -> Result<T, AuthError> {
        let retry_budget = self.options.get_transient_retries();

        let mut implicit;
        let authenticators: &mut [Authenticator] = if !self.authenticators.is_empty() {
            &mut self.authenticators
        } else if self.options.get_probe_none_when_empty() {
            implicit = [Authenticator::None(AuthNone::new())];
            &mut implicit
        } else {
            return Err(AuthError::Denied {
                methods: Vec::new(),
            });
        };

        let mut tried = Vec::with_capacity(authenticators.len());
        let mut satisfied = Vec::new();
        let mut last = Verdict::Denied;

        for authenticator in authenticators.iter_mut() {
            let method = authenticator.name();
            tried.push(method);

            #[cfg(feature = "tracing")]
            tracing::debug!(method, "trying authentication method");

            authenticator.reset();
            let verdict = drive(authenticator, &mut conn, retry_budget).await?;

            #[cfg(feature = "tracing")]
            tracing::debug!(method, outcome = verdict.name(), "authentication method done");

            match verdict {
                Verdict::Success if conn.is_authenticated() => return Ok(conn),
                // The server accepted the method but wants more.
                Verdict::Success | Verdict::Partial => satisfied.push(method),
                Verdict::Denied | Verdict::Exhausted { .. } => (),
            }
            last = verdict;
        }

        Err(match last {
            Verdict::Success | Verdict::Partial => AuthError::InsufficientFactors { satisfied },
            Verdict::Exhausted { retries } => AuthError::RetryBudgetExhausted {
                method: tried.last().copied().unwrap_or("none"),
                retries,
            },
            Verdict::Denied => AuthError::Denied { methods: tried },
        })
    }
}

/// Run the steps of one method until it reaches a verdict.
async fn drive<T: AuthTransport>(
    authenticator: &mut Authenticator,
    conn: &mut T,
    retry_budget: u32,
) -> Result<Verdict, AuthError> {
    let mut step = Step::Start;
    let mut retries = 0;

    loop {
        match authenticator.run(conn, &step).await {
            Ok(AuthOutcome::Success) => break Ok(Verdict::Success),
            Ok(AuthOutcome::Partial) => break Ok(Verdict::Partial),
            Ok(AuthOutcome::Denied) => break Ok(Verdict::Denied),
            Ok(AuthOutcome::Continue(next)) => {
                step = next;
                retries = 0;
            }
            Err(AuthError::Again { .. }) if retries < retry_budget => {
                retries += 1;

                #[cfg(feature = "tracing")]
                tracing::debug!(method = authenticator.name(), retries, "retrying step");
            }
            Err(AuthError::Again { .. }) => break Ok(Verdict::Exhausted { retries }),
            Err(err) => break Err(err),
        }
    }
}
