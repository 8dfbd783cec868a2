//! Pipelined reads and writes on an open remote file.
//!
//! Each transfer is driven by an engine running in its own task. The engine
//! keeps up to [`SftpOptions::max_concurrent_ops`] requests in flight and
//! reports through a bounded channel, so that a slow consumer slows the
//! transfer down instead of growing a buffer.
//!
//! [`SftpOptions::max_concurrent_ops`]: crate::SftpOptions::max_concurrent_ops

use crate::{
    error::FileError,
    lowlevel::{HandleOwned, SftpTransport},
    sftp::Session,
    tasks::{close_handle, create_close_task, create_read_task, create_write_task, EngineSlot},
};

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bytes::Bytes;
use derive_destructure2::destructure;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{mpsc, Mutex},
};
use tokio_util::sync::CancellationToken;

mod demand;
pub use demand::Demand;
use demand::Credit;

mod inflight;
use inflight::{InFlight, Token};

mod stream;
pub use stream::{ReadStream, WriteProgress};

mod read_engine;
pub(crate) use read_engine::ReadEngine;

mod write_engine;
pub(crate) use write_engine::WriteEngine;

/// An open remote file.
///
/// At most one read or write runs on a handle at a time, starting another
/// one meanwhile fails with [`FileError::Busy`].
///
/// The handle should be closed with [`RemoteFileHandle::close`], which
/// interrupts the running operation. If it is dropped instead, it is closed
/// in the background once the running operation, if any, stops.
#[derive(Debug, destructure)]
pub struct RemoteFileHandle<T: SftpTransport> {
    session: Session<T>,
    handle: HandleOwned,
    path: String,
    /// Where the next read or write starts.
    offset: Arc<AtomicU64>,
    op_lock: Arc<Mutex<EngineSlot>>,
    /// Cancelled on close, interrupts the running engine.
    cancel: CancellationToken,
}

impl<T: SftpTransport> RemoteFileHandle<T> {
    pub(crate) fn new(session: Session<T>, handle: HandleOwned, path: String) -> Self {
        Self {
            session,
            handle,
            path,
            offset: Arc::new(AtomicU64::new(0)),
            op_lock: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
        }
    }

    /// Path the file was opened at.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Offset the next read or write starts at.
    ///
    /// Reads advance it by the bytes delivered, writes by the bytes
    /// confirmed.
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Relaxed)
    }

    fn start_operation(&self) -> Result<tokio::sync::OwnedMutexGuard<EngineSlot>, FileError> {
        Arc::clone(&self.op_lock)
            .try_lock_owned()
            .map_err(|_| FileError::Busy)
    }

    /// Read up to `max` bytes from the current offset, with unlimited
    /// demand.
    ///
    /// Must be called within a tokio runtime.
    pub fn read(&self, max: u64) -> Result<ReadStream, FileError> {
        self.read_with_demand(max, Demand::Unlimited)
    }

    /// Read up to `max` bytes from the current offset.
    ///
    /// Nothing is delivered beyond the `demand` granted here and through
    /// [`ReadStream::request`], though up to
    /// [`SftpOptions::max_concurrent_ops`] blocks are read ahead.
    ///
    /// The stream ends early at the end of the file.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// [`SftpOptions::max_concurrent_ops`]: crate::SftpOptions::max_concurrent_ops
    pub fn read_with_demand(&self, max: u64, demand: Demand) -> Result<ReadStream, FileError> {
        let slot = self.start_operation()?;

        let (tx, rx) = mpsc::channel(self.session.options().get_channel_capacity());
        let credit = Arc::new(Credit::new(demand));

        let engine = ReadEngine::new(
            self.session.clone(),
            self.handle.clone(),
            Arc::clone(&self.offset),
            max,
            Arc::clone(&credit),
            self.cancel.clone(),
        );
        let task = create_read_task(engine, tx, slot, self.cancel.clone());

        Ok(ReadStream::new(rx, task, credit))
    }

    /// Write `data` at the current offset.
    ///
    /// Empty `data` completes with a single progress report of 0.
    ///
    /// Must be called within a tokio runtime.
    pub fn write(&self, data: impl Into<Bytes>) -> Result<WriteProgress, FileError> {
        let slot = self.start_operation()?;

        let (tx, rx) = mpsc::channel(self.session.options().get_channel_capacity());

        let engine = WriteEngine::new(
            self.session.clone(),
            self.handle.clone(),
            Arc::clone(&self.offset),
            data.into(),
            self.cancel.clone(),
        );
        let task = create_write_task(engine, tx, slot, self.cancel.clone());

        Ok(WriteProgress::new(rx, task))
    }

    /// Copy the rest of the file into `sink`, return the number of bytes
    /// copied.
    ///
    /// The sink is flushed once everything has been written.
    pub async fn write_to<W>(&self, sink: &mut W) -> Result<u64, FileError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut stream = self.read(u64::MAX)?;
        let mut copied = 0;

        while let Some(chunk) = stream.next_chunk().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            copied += chunk.len() as u64;
        }
        sink.flush().await?;

        Ok(copied)
    }

    /// Close the handle.
    ///
    /// The running operation, if any, is interrupted as soon as it waits on
    /// its consumer or on the server: its outstanding requests are
    /// abandoned and its consumer gets [`FileError::Closed`]. An error the
    /// operation could not deliver to its consumer is returned here.
    pub async fn close(self) -> Result<(), FileError> {
        let (session, handle, _path, _offset, op_lock, cancel) = self.destructure();

        cancel.cancel();
        close_handle(session, handle, op_lock).await
    }
}

impl<T: SftpTransport> Drop for RemoteFileHandle<T> {
    fn drop(&mut self) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                create_close_task(
                    &runtime,
                    self.session.clone(),
                    self.handle.clone(),
                    Arc::clone(&self.op_lock),
                );
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    ?_err,
                    path = %self.path,
                    "remote file handle dropped outside of a tokio runtime, it is leaked"
                );
            }
        }
    }
}
