/// `SSH_FILEXFER_ATTR_SIZE`
const ATTR_SIZE: u32 = 0x0000_0001;
/// `SSH_FILEXFER_ATTR_UIDGID`
const ATTR_UIDGID: u32 = 0x0000_0002;
/// `SSH_FILEXFER_ATTR_PERMISSIONS`
const ATTR_PERMISSIONS: u32 = 0x0000_0004;
/// `SSH_FILEXFER_ATTR_ACMODTIME`
const ATTR_ACMODTIME: u32 = 0x0000_0008;

const S_IFMT: u32 = 0o170_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFREG: u32 = 0o100_000;
const S_IFLNK: u32 = 0o120_000;

/// File type as reported in the attribute record, using the numbering of
/// `SSH_FILEXFER_TYPE_*`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum FileType {
    Regular = 1,
    Directory = 2,
    Symlink = 3,
    Special = 4,
    Unknown = 5,
}

impl FileType {
    /// Decode the `SSH_FILEXFER_TYPE_*` byte.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => FileType::Regular,
            2 => FileType::Directory,
            3 => FileType::Symlink,
            4 => FileType::Special,
            _ => FileType::Unknown,
        }
    }

    /// Classify the `S_IFMT` bits of an sftp v3 `permissions` field.
    pub const fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFDIR => FileType::Directory,
            S_IFREG => FileType::Regular,
            S_IFLNK => FileType::Symlink,
            0 => FileType::Unknown,
            _ => FileType::Special,
        }
    }
}

/// Attribute record exchanged with the server.
///
/// Every field is optional on the wire, the getters return `None` when the
/// server did not send it.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FileAttrs {
    flags: u32,
    size: u64,
    uid: u32,
    gid: u32,
    permissions: u32,
    atime: u32,
    mtime: u32,
    file_type: Option<FileType>,
    name: Option<Box<str>>,
}

impl FileAttrs {
    pub const fn new() -> Self {
        Self {
            flags: 0,
            size: 0,
            uid: 0,
            gid: 0,
            permissions: 0,
            atime: 0,
            mtime: 0,
            file_type: None,
            name: None,
        }
    }

    /// Raw `flags` field.
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    pub fn set_size(&mut self, size: u64) {
        self.flags |= ATTR_SIZE;
        self.size = size;
    }

    pub const fn get_size(&self) -> Option<u64> {
        if self.flags & ATTR_SIZE != 0 {
            Some(self.size)
        } else {
            None
        }
    }

    pub fn set_id(&mut self, uid: u32, gid: u32) {
        self.flags |= ATTR_UIDGID;
        self.uid = uid;
        self.gid = gid;
    }

    pub const fn get_id(&self) -> Option<(u32, u32)> {
        if self.flags & ATTR_UIDGID != 0 {
            Some((self.uid, self.gid))
        } else {
            None
        }
    }

    /// Set the `permissions` field, including the `S_IFMT` bits if any.
    pub fn set_permissions(&mut self, permissions: u32) {
        self.flags |= ATTR_PERMISSIONS;
        self.permissions = permissions;
    }

    pub const fn get_permissions(&self) -> Option<u32> {
        if self.flags & ATTR_PERMISSIONS != 0 {
            Some(self.permissions)
        } else {
            None
        }
    }

    pub fn set_time(&mut self, atime: u32, mtime: u32) {
        self.flags |= ATTR_ACMODTIME;
        self.atime = atime;
        self.mtime = mtime;
    }

    pub const fn get_time(&self) -> Option<(u32, u32)> {
        if self.flags & ATTR_ACMODTIME != 0 {
            Some((self.atime, self.mtime))
        } else {
            None
        }
    }

    pub fn set_filetype(&mut self, file_type: FileType) {
        self.file_type = Some(file_type);
    }

    /// The explicit type if the transport reported one, otherwise the type
    /// derived from the permission bits.
    pub fn get_filetype(&self) -> Option<FileType> {
        self.file_type
            .or_else(|| self.get_permissions().map(FileType::from_mode))
    }

    /// Set the name of a directory entry.
    pub fn set_name(&mut self, name: impl Into<Box<str>>) {
        self.name = Some(name.into());
    }

    /// Name of a directory entry, only present in readdir responses.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
