use super::TransportError;

/// Result code of one blocking user authentication call.
///
/// Transport level failures are reported through the `Err` side of the
/// call instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AuthCode {
    /// The server accepted the request.
    Success,
    /// The server rejected the request.
    Denied,
    /// The request succeeded but the server requires another method.
    Partial,
    /// Nothing happened yet, issue the same call again.
    Again,
    /// The server sent a keyboard-interactive info request.
    Info,
}

impl AuthCode {
    /// Name of the code, used in errors and logs.
    pub const fn name(self) -> &'static str {
        match self {
            AuthCode::Success => "success",
            AuthCode::Denied => "denied",
            AuthCode::Partial => "partial",
            AuthCode::Again => "again",
            AuthCode::Info => "info",
        }
    }
}

/// One question of a keyboard-interactive [`Prompt`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Question {
    /// Text shown to the user.
    pub text: String,
    /// Whether the answer may be echoed back while typing.
    pub echo: bool,
}

impl Question {
    /// Create a new [`Question`].
    pub fn new(text: impl Into<String>, echo: bool) -> Self {
        Self {
            text: text.into(),
            echo,
        }
    }
}

/// Challenge sent by the server during keyboard-interactive authentication.
///
/// Answers are submitted positionally, one per question.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Prompt {
    /// Title of the challenge, may be empty.
    pub name: String,
    /// Free text to show before the questions, may be empty.
    pub instruction: String,
    /// Questions to answer, in order.
    pub questions: Vec<Question>,
}

/// User authentication calls of an ssh session.
///
/// All methods block until the server replied, except that a transport may
/// return [`AuthCode::Again`] to ask for the same call to be repeated.
pub trait AuthTransport: Send {
    /// Transient key handle.
    ///
    /// The key is released when the handle is dropped.
    type Key: Send + Sync;

    fn userauth_none(&mut self) -> Result<AuthCode, TransportError>;

    fn userauth_password(&mut self, password: &str) -> Result<AuthCode, TransportError>;

    /// Start or continue a keyboard-interactive exchange.
    fn userauth_kbdint(&mut self) -> Result<AuthCode, TransportError>;

    /// Return the challenge of the pending [`AuthCode::Info`].
    fn kbdint_prompt(&mut self) -> Result<Prompt, TransportError>;

    /// Set the answer to question `index` of the pending challenge.
    fn kbdint_set_answer(&mut self, index: usize, answer: &str) -> Result<(), TransportError>;

    /// Import the public half of the private key `material`.
    ///
    /// This must not require the passphrase.
    fn import_public_key(&mut self, material: &str) -> Result<Self::Key, TransportError>;

    /// Import the private key `material`, decrypting it with `passphrase`.
    fn import_private_key(
        &mut self,
        material: &str,
        passphrase: Option<&str>,
    ) -> Result<Self::Key, TransportError>;

    /// Ask the server whether it would accept `key`.
    fn userauth_try_publickey(&mut self, key: &Self::Key) -> Result<AuthCode, TransportError>;

    /// Authenticate by signing with the private `key`.
    fn userauth_publickey(&mut self, key: &Self::Key) -> Result<AuthCode, TransportError>;

    /// Whether the server considers the session fully authenticated.
    fn is_authenticated(&self) -> bool;
}
