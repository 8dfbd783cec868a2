use super::{
    lowlevel::{AuthCode, AuthTransport},
    AuthError, AuthOutcome, Step,
};

use std::fmt;

const METHOD: &str = "publickey";

/// The `publickey` method.
///
/// The key is tried in two phases: first the public half is offered, and
/// only if the server would accept it is the private key imported and used
/// to sign. Every key handle imported is released before the attempt
/// returns, or when its [`Step`] is dropped.
#[derive(Clone)]
pub struct AuthPublicKey {
    material: String,
    passphrase: Option<String>,
}

impl AuthPublicKey {
    /// Create a new [`AuthPublicKey`] from the private key `material`.
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            passphrase: None,
        }
    }

    /// Set the passphrase used to decrypt the private key.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Offer the public key.
    pub(super) fn probe<T: AuthTransport>(
        &self,
        conn: &mut T,
    ) -> Result<AuthOutcome<Step<T::Key>>, AuthError> {
        let key = conn
            .import_public_key(&self.material)
            .map_err(AuthError::KeyImport)?;

        match conn.userauth_try_publickey(&key)? {
            AuthCode::Success => Ok(AuthOutcome::Continue(Step::Sign(key))),
            code => AuthOutcome::from_code(METHOD, code),
        }
    }

    /// Sign with the private key.
    pub(super) fn sign<T: AuthTransport>(
        &self,
        conn: &mut T,
    ) -> Result<AuthOutcome<Step<T::Key>>, AuthError> {
        let key = conn
            .import_private_key(&self.material, self.passphrase.as_deref())
            .map_err(AuthError::KeyImport)?;

        let code = conn.userauth_publickey(&key)?;
        AuthOutcome::from_code(METHOD, code)
    }
}

impl fmt::Debug for AuthPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthPublicKey")
            .field("encrypted", &self.passphrase.is_some())
            .finish_non_exhaustive()
    }
}
