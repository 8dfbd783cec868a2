use std::fmt;

use bytes::Bytes;

/// Opaque file or directory handle returned by the server.
///
/// Cloning is cheap, all clones refer to the same remote handle.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct HandleOwned(Bytes);

impl HandleOwned {
    /// Wrap the raw handle.
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self(raw.into())
    }

    /// Raw bytes of the handle.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HandleOwned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleOwned(")?;
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Id of an asynchronous request that has been submitted but whose
/// completion has not been observed yet.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u32);
