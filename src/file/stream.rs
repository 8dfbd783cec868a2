use super::{Credit, Demand};
use crate::error::FileError;

use std::{
    future::{poll_fn, Future},
    pin::Pin,
    sync::Arc,
    task::{ready, Context, Poll},
};

use bytes::Bytes;
use futures_core::{FusedStream, Stream};
use tokio::{sync::mpsc, task::JoinHandle};

/// Receiving end of a running engine.
#[derive(Debug)]
struct EngineOutput<I> {
    rx: mpsc::Receiver<Result<I, FileError>>,
    /// `None` once the engine has been joined.
    task: Option<JoinHandle<Result<(), FileError>>>,
}

impl<I> EngineOutput<I> {
    fn new(
        rx: mpsc::Receiver<Result<I, FileError>>,
        task: JoinHandle<Result<(), FileError>>,
    ) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<I, FileError>>> {
        if let Some(item) = ready!(self.rx.poll_recv(cx)) {
            return Poll::Ready(Some(item));
        }

        // The engine dropped its sender. It is either done, was interrupted
        // with an error still to deliver, or panicked.
        let Some(task) = self.task.as_mut() else {
            return Poll::Ready(None);
        };
        let res = ready!(Pin::new(task).poll(cx));
        self.task = None;

        Poll::Ready(match res {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(Err(err)),
            Err(join_err) => Some(Err(FileError::TaskJoinError(join_err))),
        })
    }

    fn is_terminated(&self) -> bool {
        self.task.is_none()
    }
}

/// Data read from a remote file, in order, without gaps.
///
/// Data is only produced as long as the consumer grants [`Demand`] for it,
/// see [`ReadStream::request`]. Dropping the stream stops the read; requests
/// still outstanding are abandoned in the background.
#[derive(Debug)]
pub struct ReadStream {
    output: EngineOutput<Bytes>,
    credit: Arc<Credit>,
}

impl ReadStream {
    pub(super) fn new(
        rx: mpsc::Receiver<Result<Bytes, FileError>>,
        task: JoinHandle<Result<(), FileError>>,
        credit: Arc<Credit>,
    ) -> Self {
        Self {
            output: EngineOutput::new(rx, task),
            credit,
        }
    }

    /// Grant more demand.
    ///
    /// [`Demand::Limited`] adds to whatever credit is left,
    /// [`Demand::Unlimited`] lifts the limit for good.
    pub fn request(&self, demand: Demand) {
        self.credit.grant(demand);
    }

    /// Wait for the next chunk, `None` once the read is complete.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, FileError>> {
        poll_fn(|cx| self.output.poll_next(cx)).await
    }
}

impl Stream for ReadStream {
    type Item = Result<Bytes, FileError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().output.poll_next(cx)
    }
}

impl FusedStream for ReadStream {
    fn is_terminated(&self) -> bool {
        self.output.is_terminated()
    }
}

/// Progress of a write: the cumulative number of bytes confirmed by the
/// server.
///
/// Dropping it aborts the write.
#[derive(Debug)]
pub struct WriteProgress {
    output: EngineOutput<u64>,
}

impl WriteProgress {
    pub(super) fn new(
        rx: mpsc::Receiver<Result<u64, FileError>>,
        task: JoinHandle<Result<(), FileError>>,
    ) -> Self {
        Self {
            output: EngineOutput::new(rx, task),
        }
    }

    /// Wait for the next progress report, `None` once the write is
    /// complete.
    pub async fn next_progress(&mut self) -> Option<Result<u64, FileError>> {
        poll_fn(|cx| self.output.poll_next(cx)).await
    }

    /// Wait for the write to complete, return the number of bytes written.
    pub async fn wait(mut self) -> Result<u64, FileError> {
        let mut written = 0;
        while let Some(progress) = self.next_progress().await {
            written = progress?;
        }
        Ok(written)
    }
}

impl Stream for WriteProgress {
    type Item = Result<u64, FileError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().output.poll_next(cx)
    }
}

impl FusedStream for WriteProgress {
    fn is_terminated(&self) -> bool {
        self.output.is_terminated()
    }
}
