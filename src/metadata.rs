use super::lowlevel::{FileAttrs, FileType};

/// Type of a remote entry.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EntryType {
    /// The server did not report a type, or reported one we do not know.
    #[default]
    Unknown,
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Device, fifo or socket.
    Special,
}

impl EntryType {
    /// Human readable name, used in errors.
    pub const fn name(self) -> &'static str {
        match self {
            EntryType::Unknown => "entry of unknown type",
            EntryType::Regular => "regular file",
            EntryType::Directory => "directory",
            EntryType::Symlink => "symbolic link",
            EntryType::Special => "special file",
        }
    }
}

impl From<FileType> for EntryType {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Regular => EntryType::Regular,
            FileType::Directory => EntryType::Directory,
            FileType::Symlink => EntryType::Symlink,
            FileType::Special => EntryType::Special,
            FileType::Unknown => EntryType::Unknown,
        }
    }
}

/// Attribute record of a remote entry.
///
/// Every field but the type and the name is optional, servers only report
/// what they know about. When writing the record back with
/// [`crate::fs::RemoteFileSystemClient::setstat`], `None` fields are left
/// untouched on the server, `uid`/`gid` and `atime`/`mtime` are only sent in
/// pairs.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FileAttributes {
    /// Type of the entry.
    pub entry_type: EntryType,
    /// Name of the entry.
    pub name: String,
    /// Size in bytes.
    pub size: Option<u64>,
    /// Permission bits, without the file type bits.
    pub posix_permissions: Option<u32>,
    /// Owner.
    pub uid: Option<u32>,
    /// Group.
    pub gid: Option<u32>,
    /// Last access time, in seconds since the unix epoch.
    pub atime: Option<u32>,
    /// Last modification time, in seconds since the unix epoch.
    pub mtime: Option<u32>,
}

impl FileAttributes {
    /// Decode the wire record, naming the entry `fallback_name` if the record
    /// does not carry a name.
    pub(crate) fn decode(attrs: &FileAttrs, fallback_name: &str) -> Self {
        let (uid, gid) = attrs.get_id().unzip();
        let (atime, mtime) = attrs.get_time().unzip();

        Self {
            entry_type: attrs
                .get_filetype()
                .map(EntryType::from)
                .unwrap_or_default(),
            name: attrs.get_name().unwrap_or(fallback_name).to_owned(),
            size: attrs.get_size(),
            posix_permissions: attrs.get_permissions().map(|perm| perm & 0o7777),
            uid,
            gid,
            atime,
            mtime,
        }
    }

    pub(crate) fn encode(&self) -> FileAttrs {
        let mut attrs = FileAttrs::new();

        if let Some(size) = self.size {
            attrs.set_size(size);
        }
        if let Some(perm) = self.posix_permissions {
            attrs.set_permissions(perm & 0o7777);
        }
        if let (Some(uid), Some(gid)) = (self.uid, self.gid) {
            attrs.set_id(uid, gid);
        }
        if let (Some(atime), Some(mtime)) = (self.atime, self.mtime) {
            attrs.set_time(atime, mtime);
        }

        attrs
    }
}
