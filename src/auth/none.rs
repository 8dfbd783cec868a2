use super::{lowlevel::AuthTransport, AuthError, AuthOutcome};

/// The `none` method.
///
/// Lets the server authenticate the user by login alone, which some old
/// appliances rely on.
#[derive(Debug, Default, Clone)]
pub struct AuthNone(());

impl AuthNone {
    /// Create a new [`AuthNone`].
    pub const fn new() -> Self {
        Self(())
    }

    pub(super) fn attempt<T: AuthTransport, S>(
        &self,
        conn: &mut T,
    ) -> Result<AuthOutcome<S>, AuthError> {
        let code = conn.userauth_none()?;
        AuthOutcome::from_code("none", code)
    }
}
