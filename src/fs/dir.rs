use crate::{
    error::FileError,
    lowlevel::{HandleOwned, SftpTransport},
    metadata::FileAttributes,
    utils::file_name,
};

use scopeguard::ScopeGuard;

/// Read every entry of the directory at `path`.
///
/// The directory handle is closed on every path; a failure to close it
/// after a successful listing is reported as [`FileError::CloseFailed`].
pub(super) fn list<T: SftpTransport>(
    transport: &mut T,
    path: &str,
) -> Result<Vec<FileAttributes>, FileError> {
    let dir = transport
        .opendir(path)
        .map_err(|err| FileError::at(path, err))?;

    // Close the directory if reading it fails.
    let mut guard = scopeguard::guard((transport, dir), |(transport, dir)| {
        if let Err(_err) = transport.closedir(dir) {
            #[cfg(feature = "tracing")]
            tracing::error!(?_err, "failed to close remote directory after an error");
        }
    });

    let fallback_name = file_name(path);
    let mut entries = Vec::new();
    {
        let (transport, dir) = &mut *guard;
        while let Some(attrs) = transport
            .readdir(dir)
            .map_err(|err| FileError::at(path, err))?
        {
            entries.push(FileAttributes::decode(&attrs, fallback_name));
        }
    }

    let (transport, dir) = ScopeGuard::into_inner(guard);
    transport.closedir(dir).map_err(FileError::CloseFailed)?;

    Ok(entries)
}

/// Check that the directory at `path` can be opened.
pub(super) fn probe<T: SftpTransport>(transport: &mut T, path: &str) -> Result<(), FileError> {
    let dir: HandleOwned = transport
        .opendir(path)
        .map_err(|source| FileError::PermissionDenied {
            path: path.to_owned(),
            source,
        })?;

    transport.closedir(dir).map_err(FileError::CloseFailed)
}
