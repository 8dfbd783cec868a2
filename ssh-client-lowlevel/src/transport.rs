use super::{FileAttrs, HandleOwned, OpenFlags, RequestId, TransportError};

use bytes::Bytes;

/// State of a submitted read request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ReadStatus {
    /// The response has not arrived yet.
    Pending,
    /// At least one byte was read.
    Data(Bytes),
    /// End of file, nothing was read.
    Eof,
}

/// State of a submitted write request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WriteStatus {
    /// The response has not arrived yet.
    Pending,
    /// The server confirmed the write.
    Done,
}

/// Sftp v3 operations over one channel of an authenticated session.
///
/// Metadata calls block until the server replied. Reads and writes are split
/// into a non-blocking submit and a non-blocking poll; responses to
/// requests on the same handle complete in submission order.
///
/// Implementations are not required to be reentrant, callers serialize
/// every call on one session.
pub trait SftpTransport: Send + 'static {
    /// Start the sftp subsystem on the channel.
    fn init(&mut self) -> Result<(), TransportError>;

    /// Resolve `path` to an absolute, canonical path.
    ///
    /// Servers speaking early protocol revisions do not check that the path
    /// exists.
    fn canonicalize(&mut self, path: &str) -> Result<String, TransportError>;

    fn stat(&mut self, path: &str) -> Result<FileAttrs, TransportError>;

    fn setstat(&mut self, path: &str, attrs: &FileAttrs) -> Result<(), TransportError>;

    fn opendir(&mut self, path: &str) -> Result<HandleOwned, TransportError>;

    /// Return the next entry, or `None` once the directory is exhausted.
    fn readdir(&mut self, dir: &HandleOwned) -> Result<Option<FileAttrs>, TransportError>;

    fn closedir(&mut self, dir: HandleOwned) -> Result<(), TransportError>;

    fn open(
        &mut self,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<HandleOwned, TransportError>;

    fn close(&mut self, file: HandleOwned) -> Result<(), TransportError>;

    fn mkdir(&mut self, path: &str, mode: u32) -> Result<(), TransportError>;

    fn rmdir(&mut self, path: &str) -> Result<(), TransportError>;

    fn unlink(&mut self, path: &str) -> Result<(), TransportError>;

    /// Submit a read of at most `len` bytes at `offset`.
    fn submit_read(
        &mut self,
        file: &HandleOwned,
        offset: u64,
        len: u32,
    ) -> Result<RequestId, TransportError>;

    /// Check whether the read `id` has completed.
    ///
    /// Once `Data` or `Eof` is returned, `id` is consumed.
    fn poll_read(&mut self, file: &HandleOwned, id: RequestId)
        -> Result<ReadStatus, TransportError>;

    /// Submit a write of `data` at `offset`.
    fn submit_write(
        &mut self,
        file: &HandleOwned,
        offset: u64,
        data: Bytes,
    ) -> Result<RequestId, TransportError>;

    /// Check whether the write `id` has completed.
    ///
    /// Once `Done` is returned, `id` is consumed.
    fn poll_write(
        &mut self,
        file: &HandleOwned,
        id: RequestId,
    ) -> Result<WriteStatus, TransportError>;

    /// Discard the response of a request whose completion will never be
    /// polled.
    fn abandon(&mut self, file: &HandleOwned, id: RequestId) -> Result<(), TransportError>;

    /// Number of bytes the channel can currently carry before the peer
    /// has to grant more.
    ///
    /// The window is shared by every request on the channel.
    fn window_size(&self) -> usize;
}
