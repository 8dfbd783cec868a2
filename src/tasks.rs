use crate::{
    error::FileError,
    file::{ReadEngine, WriteEngine},
    lowlevel::{HandleOwned, SftpTransport},
    sftp::Session,
    utils::ErrorExt,
};

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc::Sender, Mutex, OwnedMutexGuard};
use tokio::task::{spawn, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Slot of the per-handle operation lock.
///
/// It holds the error an engine failed to hand to its consumer, so that
/// it can be reported on close.
pub(crate) type EngineSlot = Option<FileError>;

fn stash(slot: &mut EngineSlot, err: FileError) {
    *slot = Some(match slot.take() {
        Some(prev) => prev.error_on_cleanup(err),
        None => err,
    });
}

/// Hand `err` to the consumer, or stash it if the consumer is gone.
///
/// Once the handle is closed, an error the consumer has no room for is
/// returned instead, the consumer gets it after the buffered output.
async fn report<I>(
    tx: &Sender<Result<I, FileError>>,
    slot: &mut EngineSlot,
    cancel: &CancellationToken,
    err: FileError,
) -> Result<(), FileError> {
    #[cfg(feature = "tracing")]
    tracing::debug!(?err, "file engine stopped with an error");

    tokio::select! {
        biased;
        permit = tx.reserve() => match permit {
            Ok(permit) => permit.send(Err(err)),
            Err(_) => stash(slot, err),
        },
        _ = cancel.cancelled() => return Err(err),
    }

    Ok(())
}

/// Spawn `engine`, which keeps the operation lock until it stops.
pub(crate) fn create_read_task<T: SftpTransport>(
    engine: ReadEngine<T>,
    tx: Sender<Result<Bytes, FileError>>,
    mut slot: OwnedMutexGuard<EngineSlot>,
    cancel: CancellationToken,
) -> JoinHandle<Result<(), FileError>> {
    spawn(async move {
        match engine.run(&tx).await {
            Ok(()) => Ok(()),
            Err(err) => report(&tx, &mut slot, &cancel, err).await,
        }
    })
}

/// Spawn `engine`, which keeps the operation lock until it stops.
pub(crate) fn create_write_task<T: SftpTransport>(
    engine: WriteEngine<T>,
    tx: Sender<Result<u64, FileError>>,
    mut slot: OwnedMutexGuard<EngineSlot>,
    cancel: CancellationToken,
) -> JoinHandle<Result<(), FileError>> {
    spawn(async move {
        match engine.run(&tx).await {
            Ok(()) => Ok(()),
            Err(err) => report(&tx, &mut slot, &cancel, err).await,
        }
    })
}

/// Wait for the running engine, if any, to stop, then close `handle`.
///
/// An error stashed by the engine is returned even if the close succeeds.
pub(crate) async fn close_handle<T: SftpTransport>(
    session: Session<T>,
    handle: HandleOwned,
    op_lock: Arc<Mutex<EngineSlot>>,
) -> Result<(), FileError> {
    let engine_err = op_lock.lock().await.take();
    let res = session
        .lock()
        .await
        .close(handle)
        .map_err(FileError::CloseFailed);

    match (engine_err, res) {
        (None, res) => res,
        (Some(err), Ok(())) => Err(err),
        (Some(err), Err(close_err)) => Err(err.error_on_cleanup(close_err)),
    }
}

/// Close `handle` in the background.
pub(crate) fn create_close_task<T: SftpTransport>(
    runtime: &tokio::runtime::Handle,
    session: Session<T>,
    handle: HandleOwned,
    op_lock: Arc<Mutex<EngineSlot>>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        if let Err(_err) = close_handle(session, handle, op_lock).await {
            #[cfg(feature = "tracing")]
            tracing::error!(?_err, "failed to close remote file handle");
        }
    })
}
