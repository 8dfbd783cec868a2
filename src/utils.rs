use crate::error::{FileError, RecursiveError};

pub(crate) trait ErrorExt {
    fn error_on_cleanup(self, occuring_error: FileError) -> Self;
}

impl ErrorExt for FileError {
    fn error_on_cleanup(self, occuring_error: FileError) -> Self {
        FileError::RecursiveErrors(Box::new(RecursiveError {
            original_error: self,
            occuring_error,
        }))
    }
}

/// Resolve `path` against the absolute path `base`.
///
/// `.`, `..` and repeated separators are collapsed, `..` at the root stays at
/// the root. The result always starts with `/` and never ends with one,
/// except for the root itself.
pub(crate) fn absolute_path(base: &str, path: &str) -> String {
    let joined;
    let path = if path.starts_with('/') {
        path
    } else {
        joined = format!("{base}/{path}");
        &joined
    };

    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => (),
            ".." => {
                components.pop();
            }
            component => components.push(component),
        }
    }

    let mut absolute = String::with_capacity(path.len());
    for component in components {
        absolute.push('/');
        absolute.push_str(component);
    }
    if absolute.is_empty() {
        absolute.push('/');
    }
    absolute
}

/// Path of the entry `name` inside the directory `dir`.
pub(crate) fn child_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Last component of `path`, or `/` for the root.
pub(crate) fn file_name(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit('/').next() {
        Some("") | None => "/",
        Some(name) => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::TransportError;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_absolute_path() {
        assert_eq!(absolute_path("/home/user", "docs"), "/home/user/docs");
        assert_eq!(absolute_path("/home/user", "./docs//a.txt"), "/home/user/docs/a.txt");
        assert_eq!(absolute_path("/home/user", "../other/./x"), "/home/other/x");
        assert_eq!(absolute_path("/home/user", "/etc/../var/"), "/var");
        assert_eq!(absolute_path("/home/user", "../../../.."), "/");
        assert_eq!(absolute_path("/home/user", ""), "/home/user");
        assert_eq!(absolute_path("/", "."), "/");
    }

    #[test]
    fn test_child_path_and_file_name() {
        assert_eq!(child_path("/", "a"), "/a");
        assert_eq!(child_path("/home/user", "a"), "/home/user/a");

        assert_eq!(file_name("/home/user/a.txt"), "a.txt");
        assert_eq!(file_name("/home/user/"), "user");
        assert_eq!(file_name("/"), "/");
    }

    #[test]
    fn test_error_on_cleanup() {
        let err = FileError::Busy.error_on_cleanup(FileError::CloseFailed(TransportError::other(
            "gone",
        )));

        match err {
            FileError::RecursiveErrors(err) => {
                assert!(matches!(err.original_error, FileError::Busy));
                assert!(matches!(err.occuring_error, FileError::CloseFailed(_)));
            }
            err => panic!("unexpected error {err}"),
        }
    }
}
