use super::lowlevel;

use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

const fn nonzero_u32(value: u32) -> NonZeroU32 {
    match NonZeroU32::new(value) {
        Some(value) => value,
        None => panic!("value must not be zero"),
    }
}

const fn nonzero_usize(value: usize) -> NonZeroUsize {
    match NonZeroUsize::new(value) {
        Some(value) => value,
        None => panic!("value must not be zero"),
    }
}

const DEFAULT_BLOCK_SIZE: NonZeroU32 =
    nonzero_u32(lowlevel::OPENSSH_PORTABLE_DEFAULT_COPY_BUFLEN as u32);
const DEFAULT_MAX_CONCURRENT_OPS: NonZeroUsize = nonzero_usize(20);
const DEFAULT_CHANNEL_CAPACITY: NonZeroUsize = nonzero_usize(4);

/// Options when opening a [`crate::fs::RemoteFileSystemClient`].
#[derive(Debug, Copy, Clone)]
pub struct SftpOptions {
    block_size: NonZeroU32,
    max_concurrent_ops: NonZeroUsize,
    poll_interval: Duration,
    channel_capacity: NonZeroUsize,
}

impl Default for SftpOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SftpOptions {
    /// Create a new [`SftpOptions`].
    pub const fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_concurrent_ops: DEFAULT_MAX_CONCURRENT_OPS,
            poll_interval: Duration::from_millis(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set `block_size`, the largest number of bytes a single read or write
    /// request covers.
    ///
    /// It would be 32 KiB by default.
    #[must_use]
    pub const fn block_size(mut self, block_size: NonZeroU32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set `max_concurrent_ops`, the number of read or write requests a
    /// file handle keeps in flight.
    ///
    /// It would be 20 by default.
    #[must_use]
    pub const fn max_concurrent_ops(mut self, max_concurrent_ops: NonZeroUsize) -> Self {
        self.max_concurrent_ops = max_concurrent_ops;
        self
    }

    /// Set `poll_interval`, how long an engine waits before polling again
    /// after a pass that made no progress.
    ///
    /// It would be 1 ms by default.
    #[must_use]
    pub const fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set `channel_capacity`, the number of chunks or progress events
    /// buffered between an engine and its consumer.
    ///
    /// It would be 4 by default.
    #[must_use]
    pub const fn channel_capacity(mut self, channel_capacity: NonZeroUsize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }
}

impl SftpOptions {
    pub(crate) const fn get_block_size(&self) -> u32 {
        self.block_size.get()
    }

    pub(crate) const fn get_max_concurrent_ops(&self) -> usize {
        self.max_concurrent_ops.get()
    }

    pub(crate) const fn get_poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub(crate) const fn get_channel_capacity(&self) -> usize {
        self.channel_capacity.get()
    }

    /// Upper bound of bytes buffered plus in flight for one read.
    pub(crate) const fn get_read_ahead(&self) -> usize {
        self.get_max_concurrent_ops() * self.get_block_size() as usize
    }
}
