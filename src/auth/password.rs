use super::{lowlevel::AuthTransport, AuthError, AuthOutcome};

use std::fmt;

/// The `password` method.
#[derive(Clone)]
pub struct AuthPassword {
    password: String,
}

impl AuthPassword {
    /// Create a new [`AuthPassword`].
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub(super) fn attempt<T: AuthTransport, S>(
        &self,
        conn: &mut T,
    ) -> Result<AuthOutcome<S>, AuthError> {
        let code = conn.userauth_password(&self.password)?;
        AuthOutcome::from_code("password", code)
    }
}

impl fmt::Debug for AuthPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthPassword").finish_non_exhaustive()
    }
}
