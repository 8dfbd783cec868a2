use super::{lowlevel::SftpTransport, SftpOptions};

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

/// One sftp channel shared by every node and file handle opened from it.
///
/// The transport is not reentrant, so every call goes through the mutex and
/// each logical operation owns the session for the duration of its step.
pub(crate) struct Session<T> {
    transport: Arc<Mutex<T>>,
    options: SftpOptions,
}

impl<T> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            options: self.options,
        }
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T: SftpTransport> Session<T> {
    pub(crate) fn new(transport: T, options: SftpOptions) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            options,
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, T> {
        self.transport.lock().await
    }

    pub(crate) fn options(&self) -> &SftpOptions {
        &self.options
    }
}
