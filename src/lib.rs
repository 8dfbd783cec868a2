//! Client side core of an ssh connection: user authentication negotiation
//! and a pipelined sftp file transfer engine.
//!
//! The ssh transport itself is not part of this crate, it is consumed
//! through the traits of [`lowlevel`]:
//!  - [`auth::AuthNegotiator`] drives an ordered list of
//!    [`auth::Authenticator`]s against a [`lowlevel::AuthTransport`],
//!    following partial successes and multi-round keyboard-interactive
//!    challenges until the session is authenticated;
//!  - [`fs::RemoteFileSystemClient`] is a position in the remote file tree
//!    of a [`lowlevel::SftpTransport`], and [`file::RemoteFileHandle`] reads
//!    and writes an open remote file with many requests in flight.
//!
//! # Feature flags
//!
//!  - `tracing`: log negotiation steps and background failures via
//!    [`tracing`](https://docs.rs/tracing). Enabled by default.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links,
    rust_2018_idioms,
    unreachable_pub
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use ssh_client_lowlevel as lowlevel;

mod error;
pub use error::{AuthError, FileError, RecursiveError, TransportError, TransportErrorKind};

mod options;
pub use options::SftpOptions;

mod utils;

mod sftp;

mod tasks;

/// Module contains the authentication negotiator and its methods.
pub mod auth;

/// Module contains types for navigating the remote file tree.
pub mod fs;

/// Module contains types for reading and writing remote files.
pub mod file;

/// Module contains the attribute record of remote files.
pub mod metadata;
