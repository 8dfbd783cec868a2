pub use ssh_client_error::{
    AuthError, FileError, RecursiveError, TransportError, TransportErrorKind,
};
