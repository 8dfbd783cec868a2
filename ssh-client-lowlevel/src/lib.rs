//! This crate describes the capabilities `ssh-client-core` consumes from an
//! ssh transport, without implementing any of them.
//!
//! The transport (key exchange, encryption, channel multiplexing, framing)
//! lives elsewhere, typically in a binding to libssh or in a pure Rust ssh
//! stack. It is exposed here as two traits:
//!  - [`AuthTransport`]: blocking user authentication calls returning an
//!    [`AuthCode`];
//!  - [`SftpTransport`]: sftp v3 metadata calls plus non-blocking
//!    [`SftpTransport::submit_read`]/[`SftpTransport::poll_read`] and
//!    [`SftpTransport::submit_write`]/[`SftpTransport::poll_write`] pairs.
//!
//! Responses to requests submitted on one file handle must complete in
//! submission order.

#![forbid(unsafe_code)]

pub use ssh_client_error::{TransportError, TransportErrorKind};

/// Default size of buffer for up/download in openssh-portable
pub const OPENSSH_PORTABLE_DEFAULT_COPY_BUFLEN: usize = 32768;

mod auth;
pub use auth::{AuthCode, AuthTransport, Prompt, Question};

mod file_attrs;
pub use file_attrs::{FileAttrs, FileType};

mod handle;
pub use handle::{HandleOwned, RequestId};

mod open_flags;
pub use open_flags::OpenFlags;

mod transport;
pub use transport::{ReadStatus, SftpTransport, WriteStatus};
