use super::{Credit, InFlight, Token};
use crate::{
    error::FileError,
    lowlevel::{HandleOwned, ReadStatus, SftpTransport},
    sftp::Session,
    utils::ErrorExt,
};

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use tokio::{sync::mpsc::Sender, time::sleep};
use tokio_util::sync::CancellationToken;

/// Pipelined read of up to `remaining` bytes.
///
/// Every pass harvests completed requests in submission order, hands the
/// buffered data to the consumer as far as its credit allows, then submits
/// new requests while the read-ahead allows.
#[derive(Debug)]
pub(crate) struct ReadEngine<T> {
    session: Session<T>,
    handle: HandleOwned,
    /// Shared with the file handle, advanced by the bytes delivered.
    offset: Arc<AtomicU64>,
    credit: Arc<Credit>,
    /// Cancelled when the handle is closed.
    cancel: CancellationToken,

    next_offset: u64,
    /// Bytes not requested yet.
    remaining: u64,
    inflight: InFlight,
    ready: VecDeque<Bytes>,
    buffered: usize,
    eof: bool,
}

impl<T: SftpTransport> ReadEngine<T> {
    pub(crate) fn new(
        session: Session<T>,
        handle: HandleOwned,
        offset: Arc<AtomicU64>,
        max: u64,
        credit: Arc<Credit>,
        cancel: CancellationToken,
    ) -> Self {
        let next_offset = offset.load(Ordering::Relaxed);
        let inflight = InFlight::new(session.options().get_max_concurrent_ops());

        Self {
            session,
            handle,
            offset,
            credit,
            cancel,

            next_offset,
            remaining: max,
            inflight,
            ready: VecDeque::new(),
            buffered: 0,
            eof: false,
        }
    }

    /// Run until the read is complete, the consumer is gone or an error
    /// occurs.
    ///
    /// Once the handle is closed, waiting on the consumer or on the server
    /// fails with [`FileError::Closed`].
    ///
    /// Requests still outstanding when it returns have been abandoned.
    pub(crate) async fn run(mut self, tx: &Sender<Result<Bytes, FileError>>) -> Result<(), FileError> {
        let res = self.pump(tx).await;

        match (res, self.abandon_all().await) {
            (Ok(()), cleanup) => cleanup,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => Err(err.error_on_cleanup(cleanup_err)),
        }
    }

    async fn pump(&mut self, tx: &Sender<Result<Bytes, FileError>>) -> Result<(), FileError> {
        let poll_interval = self.session.options().get_poll_interval();

        loop {
            let harvested = self.harvest().await?;

            let Some(emitted) = self.emit(tx).await? else {
                return Ok(());
            };

            if self.is_done() {
                return Ok(());
            }

            let submitted = self.refill().await?;

            if !self.ready.is_empty() && self.credit.is_exhausted() {
                tokio::select! {
                    biased;
                    _ = tx.closed() => return Ok(()),
                    _ = self.cancel.cancelled() => return Err(FileError::Closed),
                    _ = self.credit.granted() => (),
                }
            } else if harvested + emitted + submitted > 0 {
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

    fn is_done(&self) -> bool {
        self.ready.is_empty() && (self.eof || (self.remaining == 0 && self.inflight.is_empty()))
    }

    /// Collect completed requests, oldest first, stopping at the first
    /// pending one.
    ///
    /// Nothing is collected past the end of the file.
    async fn harvest(&mut self) -> Result<usize, FileError> {
        if self.eof || self.inflight.is_empty() {
            return Ok(0);
        }

        let mut transport = self.session.lock().await;
        let mut harvested = 0;

        while let Some(token) = self.inflight.front() {
            match transport.poll_read(&self.handle, token.id)? {
                ReadStatus::Pending => break,
                ReadStatus::Data(data) if !data.is_empty() => {
                    self.inflight.pop_front();

                    let len = data.len();
                    harvested += len;
                    self.buffered += len;
                    self.ready.push_back(data);

                    if len < token.len {
                        // Later requests no longer line up with the data
                        // received: re-request everything after it.
                        for stale in self.inflight.drain() {
                            transport.abandon(&self.handle, stale.id)?;
                            self.remaining += stale.len as u64;
                        }
                        self.remaining += (token.len - len) as u64;
                        self.next_offset = token.offset + len as u64;
                        break;
                    }
                }
                ReadStatus::Eof | ReadStatus::Data(_) => {
                    self.inflight.pop_front();
                    self.eof = true;
                    break;
                }
            }
        }

        Ok(harvested)
    }

    /// Hand buffered data to the consumer within its credit.
    ///
    /// Return `None` if the consumer is gone.
    async fn emit(
        &mut self,
        tx: &Sender<Result<Bytes, FileError>>,
    ) -> Result<Option<usize>, FileError> {
        let mut emitted = 0;

        while let Some(chunk) = self.ready.front_mut() {
            let granted = self.credit.take(chunk.len());
            if granted == 0 {
                break;
            }

            let out = if granted == chunk.len() {
                match self.ready.pop_front() {
                    Some(chunk) => chunk,
                    None => break,
                }
            } else {
                chunk.split_to(granted)
            };

            self.buffered -= granted;
            tokio::select! {
                biased;
                res = tx.send(Ok(out)) => {
                    if res.is_err() {
                        return Ok(None);
                    }
                }
                _ = self.cancel.cancelled() => return Err(FileError::Closed),
            }

            self.offset.fetch_add(granted as u64, Ordering::Relaxed);
            emitted += granted;
        }

        Ok(Some(emitted))
    }

    /// Submit new requests while below both the concurrency limit and the
    /// read-ahead.
    async fn refill(&mut self) -> Result<usize, FileError> {
        let options = *self.session.options();
        let block_size = u64::from(options.get_block_size());
        let read_ahead = options.get_read_ahead();

        let mut transport = self.session.lock().await;
        let mut submitted = 0;

        while !self.eof
            && self.remaining > 0
            && !self.inflight.is_full()
            && self.buffered + self.inflight.bytes() < read_ahead
        {
            let len = block_size.min(self.remaining);
            // `len` is at most the block size, a u32.
            let id = transport.submit_read(&self.handle, self.next_offset, len as u32)?;

            self.inflight.push(Token {
                id,
                offset: self.next_offset,
                len: len as usize,
            });
            self.next_offset += len;
            self.remaining -= len;
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
