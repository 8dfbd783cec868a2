use crate::{
    error::FileError,
    file::RemoteFileHandle,
    lowlevel::{OpenFlags, SftpTransport},
    metadata::{EntryType, FileAttributes},
    sftp::Session,
    utils::{absolute_path, child_path, file_name},
    SftpOptions,
};

use std::fmt;

mod dir;

/// A position in the remote file tree.
///
/// The node always knows the type of the entry it points at, as found by the
/// last stat. Operations that only make sense for one type of entry fail
/// with [`FileError::WrongType`] without contacting the server.
///
/// Cloning gives an independent node sharing the same session.
pub struct RemoteFileSystemClient<T> {
    session: Session<T>,
    path: String,
    entry_type: EntryType,
    root: String,
}

impl<T> Clone for RemoteFileSystemClient<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            path: self.path.clone(),
            entry_type: self.entry_type,
            root: self.root.clone(),
        }
    }
}

impl<T> fmt::Debug for RemoteFileSystemClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFileSystemClient")
            .field("path", &self.path)
            .field("entry_type", &self.entry_type)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<T: SftpTransport> RemoteFileSystemClient<T> {
    /// Initialise the sftp subsystem of `transport` and position the node at
    /// the directory the server starts sessions in.
    pub async fn start(mut transport: T, options: SftpOptions) -> Result<Self, FileError> {
        transport.init()?;
        let (root, entry_type) = locate(&mut transport, "")?;

        Ok(Self {
            session: Session::new(transport, options),
            path: root.clone(),
            entry_type,
            root,
        })
    }

    /// Canonical path of the node.
    pub fn current(&self) -> &str {
        &self.path
    }

    /// Path the session started in.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Type of the entry, as found by the last stat.
    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Return `true` if the node is a directory.
    pub fn is_directory(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    fn expect(&self, expected: EntryType) -> Result<(), FileError> {
        if self.entry_type == expected {
            Ok(())
        } else {
            Err(FileError::WrongType {
                path: self.path.clone(),
                expected: expected.name(),
            })
        }
    }

    /// Move the node to `path`.
    ///
    /// A relative `path` is resolved against the current path. The node is
    /// left untouched on failure.
    pub async fn walk(&mut self, path: &str) -> Result<(), FileError> {
        let path = absolute_path(&self.path, path);
        let (canonical, entry_type) = locate(&mut *self.session.lock().await, &path)?;

        self.path = canonical;
        self.entry_type = entry_type;

        Ok(())
    }

    /// Return a new node at `path`, resolved against this one.
    pub async fn resolve(&self, path: &str) -> Result<Self, FileError> {
        let mut node = self.clone();
        node.walk(path).await?;
        Ok(node)
    }

    /// List the entries of the directory.
    pub async fn list(&self) -> Result<Vec<FileAttributes>, FileError> {
        self.expect(EntryType::Directory)?;

        let mut transport = self.session.lock().await;
        dir::list(&mut *transport, &self.path)
    }

    /// Open the regular file.
    pub async fn open(&self, flags: OpenFlags) -> Result<RemoteFileHandle<T>, FileError> {
        self.expect(EntryType::Regular)?;

        self.open_at(self.path.clone(), flags, 0).await
    }

    /// Create `name` in the directory and open it.
    ///
    /// `flags` always gets [`OpenFlags::CREATE`] added. The node stays on
    /// the directory.
    pub async fn create(
        &self,
        name: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<RemoteFileHandle<T>, FileError> {
        self.expect(EntryType::Directory)?;

        self.open_at(child_path(&self.path, name), flags | OpenFlags::CREATE, mode)
            .await
    }

    async fn open_at(
        &self,
        path: String,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<RemoteFileHandle<T>, FileError> {
        let handle = self
            .session
            .lock()
            .await
            .open(&path, flags, mode)
            .map_err(|err| FileError::at(path.as_str(), err))?;

        Ok(RemoteFileHandle::new(self.session.clone(), handle, path))
    }

    /// Create the directory `name` in the directory, then move the node
    /// into it.
    pub async fn mkdir(&mut self, name: &str, mode: u32) -> Result<(), FileError> {
        self.expect(EntryType::Directory)?;

        let path = child_path(&self.path, name);
        self.session
            .lock()
            .await
            .mkdir(&path, mode)
            .map_err(|err| FileError::at(path.as_str(), err))?;

        self.path = path;
        self.entry_type = EntryType::Directory;

        Ok(())
    }

    /// Remove the file the node points at.
    ///
    /// The node is not moved.
    pub async fn remove(&self) -> Result<(), FileError> {
        if self.is_directory() {
            return Err(FileError::WrongType {
                path: self.path.clone(),
                expected: "file",
            });
        }

        self.session
            .lock()
            .await
            .unlink(&self.path)
            .map_err(|err| FileError::at(self.path.as_str(), err))
    }

    /// Remove the directory the node points at.
    ///
    /// The node is not moved.
    pub async fn rmdir(&self) -> Result<(), FileError> {
        self.expect(EntryType::Directory)?;

        self.session
            .lock()
            .await
            .rmdir(&self.path)
            .map_err(|err| FileError::at(self.path.as_str(), err))
    }

    /// Fetch fresh attributes of the entry.
    pub async fn stat(&self) -> Result<FileAttributes, FileError> {
        let attrs = self
            .session
            .lock()
            .await
            .stat(&self.path)
            .map_err(|err| FileError::at(self.path.as_str(), err))?;

        Ok(FileAttributes::decode(&attrs, file_name(&self.path)))
    }

    /// Change the attributes of the entry.
    ///
    /// Only `size`, `posix_permissions`, `uid`/`gid` and `atime`/`mtime` are
    /// sent.
    pub async fn setstat(&self, attrs: &FileAttributes) -> Result<(), FileError> {
        self.session
            .lock()
            .await
            .setstat(&self.path, &attrs.encode())
            .map_err(|err| FileError::at(self.path.as_str(), err))
    }
}

/// Canonicalize `path` and find out what it points at.
///
/// Directories must also be readable.
fn locate<T: SftpTransport>(
    transport: &mut T,
    path: &str,
) -> Result<(String, EntryType), FileError> {
    let canonical = transport
        .canonicalize(path)
        .map_err(|err| FileError::at(path, err))?;

    let attrs = transport
        .stat(&canonical)
        .map_err(|source| FileError::NotFound {
            path: canonical.clone(),
            source,
        })?;
    let entry_type = FileAttributes::decode(&attrs, file_name(&canonical)).entry_type;

    if entry_type == EntryType::Directory {
        dir::probe(transport, &canonical)?;
    }

    Ok((canonical, entry_type))
}
