//! Scripted in-memory transports shared by the integration tests.

mod auth;
pub use auth::{AuthPolicy, MockAuth, MockKey};

mod sftp;
pub use sftp::MockSftp;

/// Key material understood by [`MockAuth`] for the unencrypted key `name`.
pub fn key_material(name: &str) -> String {
    format!("mock-key:{name}")
}

/// Key material understood by [`MockAuth`] for the key `name` encrypted
/// with `passphrase`.
pub fn encrypted_key_material(name: &str, passphrase: &str) -> String {
    format!("mock-key-enc:{name}:{passphrase}")
}

/// Deterministic, non-repeating test content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
