use super::{InFlight, Token};
use crate::{
    error::FileError,
    lowlevel::{HandleOwned, SftpTransport, WriteStatus},
    sftp::Session,
    utils::ErrorExt,
};

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bytes::Bytes;
use tokio::{sync::mpsc::Sender, time::sleep};
use tokio_util::sync::CancellationToken;

/// Pipelined write of a byte sequence.
///
/// Every pass confirms completed requests in submission order, submits new
/// block-sized requests while the transport window has room for them, then
/// reports the cumulative number of bytes confirmed if it changed.
#[derive(Debug)]
pub(crate) struct WriteEngine<T> {
    session: Session<T>,
    handle: HandleOwned,
    /// Shared with the file handle, advanced by the bytes confirmed.
    offset: Arc<AtomicU64>,
    cancel: CancellationToken,

    next_offset: u64,
    unsent: Bytes,
    inflight: InFlight,
    confirmed: u64,
}

impl<T: SftpTransport> WriteEngine<T> {
    pub(crate) fn new(
        session: Session<T>,
        handle: HandleOwned,
        offset: Arc<AtomicU64>,
        data: Bytes,
        cancel: CancellationToken,
    ) -> Self {
        let next_offset = offset.load(Ordering::Relaxed);
        let inflight = InFlight::new(session.options().get_max_concurrent_ops());

        Self {
            session,
            handle,
            offset,
            cancel,

            next_offset,
            unsent: data,
            inflight,
            confirmed: 0,
        }
    }

    /// Run until every byte is confirmed, the consumer is gone or an error
    /// occurs.
    ///
    /// Requests still outstanding when it returns have been abandoned.
    pub(crate) async fn run(mut self, tx: &Sender<Result<u64, FileError>>) -> Result<(), FileError> {
        let res = self.pump(tx).await;

        match (res, self.abandon_all().await) {
            (Ok(()), cleanup) => cleanup,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => Err(err.error_on_cleanup(cleanup_err)),
        }
    }

    async fn pump(&mut self, tx: &Sender<Result<u64, FileError>>) -> Result<(), FileError> {
        if self.unsent.is_empty() {
            let _ = tx.send(Ok(0)).await;
            return Ok(());
        }

        let poll_interval = self.session.options().get_poll_interval();

        loop {
            let confirmed = self.confirm().await?;
            let submitted = self.refill().await?;

            if confirmed > 0 {
                self.offset.fetch_add(confirmed, Ordering::Relaxed);
                self.confirmed += confirmed;

                tokio::select! {
                    biased;
                    res = tx.send(Ok(self.confirmed)) => {
                        if res.is_err() {
                            return Ok(());
                        }
                    }
                    _ = self.cancel.cancelled() => return Err(FileError::Closed),
                }
            }

            if self.unsent.is_empty() && self.inflight.is_empty() {
                return Ok(());
            }

            if confirmed > 0 || submitted > 0 {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    biased;
                    _ = tx.closed() => return Ok(()),
                    _ = self.cancel.cancelled() => return Err(FileError::Closed),
                    _ = sleep(poll_interval) => (),
                }
            }
        }
    }

    /// Confirm completed requests, oldest first, stopping at the first
    /// pending one.
    async fn confirm(&mut self) -> Result<u64, FileError> {
        if self.inflight.is_empty() {
            return Ok(0);
        }

        let mut transport = self.session.lock().await;
        let mut confirmed = 0;

        while let Some(token) = self.inflight.front() {
            match transport.poll_write(&self.handle, token.id)? {
                WriteStatus::Pending => break,
                WriteStatus::Done => {
                    self.inflight.pop_front();
                    confirmed += token.len as u64;
                }
            }
        }

        Ok(confirmed)
    }

    /// Submit new requests while below the concurrency limit and within the
    /// transport window.
    async fn refill(&mut self) -> Result<usize, FileError> {
        let block_size = self.session.options().get_block_size() as usize;

        let mut transport = self.session.lock().await;
        let mut submitted = 0;

        while !self.unsent.is_empty() && !self.inflight.is_full() {
            let len = block_size.min(self.unsent.len());
            if transport.window_size() < len {
                break;
            }

            let chunk = self.unsent.split_to(len);
            let id = transport.submit_write(&self.handle, self.next_offset, chunk)?;

            self.inflight.push(Token {
                id,
                offset: self.next_offset,
                len,
            });
            self.next_offset += len as u64;
            submitted += 1;
        }

        Ok(submitted)
    }

    async fn abandon_all(&mut self) -> Result<(), FileError> {
        if self.inflight.is_empty() {
            return Ok(());
        }

        let mut transport = self.session.lock().await;
        for token in self.inflight.drain() {
            transport.abandon(&self.handle, token.id)?;
        }

        Ok(())
    }
}
