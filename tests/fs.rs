use ssh_client_core::{
    fs::RemoteFileSystemClient,
    lowlevel::OpenFlags,
    metadata::{EntryType, FileAttributes},
    FileError, SftpOptions,
};
use ssh_test_common::MockSftp;

use pretty_assertions::assert_eq;

async fn start(server: &MockSftp) -> RemoteFileSystemClient<MockSftp> {
    RemoteFileSystemClient::start(server.clone(), SftpOptions::new())
        .await
        .unwrap()
}

fn populated() -> MockSftp {
    let server = MockSftp::default();
    server.insert_dir("/home/user/docs");
    server.insert_file("/home/user/docs/a.txt", b"hello");
    server.insert_file("/home/user/docs/b.txt", b"world!");
    server.insert_dir("/home/user/docs/sub");
    server.insert_symlink("/home/user/docs/link");
    server.insert_special("/home/user/fifo");
    server
}

#[tokio::test]
async fn test_start() {
    let server = MockSftp::default();
    let client = start(&server).await;

    assert_eq!(client.current(), "/home/user");
    assert_eq!(client.root(), "/home/user");
    assert!(client.is_directory());
    assert_eq!(
        server.events(),
        [
            "init",
            "canonicalize ",
            "stat /home/user",
            "opendir /home/user",
            "closedir /home/user"
        ]
    );
}

#[tokio::test]
async fn test_start_unreadable_home() {
    let server = MockSftp::default();
    server.deny_opendir("/home/user");

    let err = RemoteFileSystemClient::start(server.clone(), SftpOptions::new())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, FileError::PermissionDenied { path, .. } if path == "/home/user"),
        "{err:?}"
    );
    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_walk() {
    let server = populated();
    let mut client = start(&server).await;
    server.clear_events();

    client.walk("docs/./a.txt").await.unwrap();
    assert_eq!(client.current(), "/home/user/docs/a.txt");
    assert_eq!(client.entry_type(), EntryType::Regular);
    assert_eq!(
        server.events(),
        [
            "canonicalize /home/user/docs/a.txt",
            "stat /home/user/docs/a.txt"
        ]
    );
    server.clear_events();

    // Directories are probed.
    client.walk("..//sub/").await.unwrap();
    assert_eq!(client.current(), "/home/user/docs/sub");
    assert!(client.is_directory());
    assert_eq!(
        server.events(),
        [
            "canonicalize /home/user/docs/sub",
            "stat /home/user/docs/sub",
            "opendir /home/user/docs/sub",
            "closedir /home/user/docs/sub"
        ]
    );

    client.walk("/home/user/docs/link").await.unwrap();
    assert_eq!(client.entry_type(), EntryType::Symlink);

    client.walk("../../fifo").await.unwrap();
    assert_eq!(client.current(), "/home/user/fifo");
    assert_eq!(client.entry_type(), EntryType::Special);

    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_walk_not_found() {
    let server = populated();
    let mut client = start(&server).await;

    let err = client.walk("missing").await.unwrap_err();
    match err {
        FileError::NotFound { path, .. } => assert_eq!(path, "/home/user/missing"),
        err => panic!("unexpected error {err:?}"),
    }

    // The node did not move.
    assert_eq!(client.current(), "/home/user");
    assert!(client.is_directory());
}

#[tokio::test]
async fn test_walk_permission_denied() {
    let server = populated();
    server.deny_opendir("/home/user/docs");
    let mut client = start(&server).await;

    let err = client.walk("docs").await.unwrap_err();
    assert!(
        matches!(&err, FileError::PermissionDenied { path, .. } if path == "/home/user/docs"),
        "{err:?}"
    );
    assert_eq!(client.current(), "/home/user");
}

#[tokio::test]
async fn test_walk_close_failed() {
    let server = populated();
    let mut client = start(&server).await;
    server.fail_closedir();

    let err = client.walk("docs").await.unwrap_err();
    assert!(matches!(err, FileError::CloseFailed(_)), "{err:?}");
    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_resolve() {
    let server = populated();
    let client = start(&server).await;

    let docs = client.resolve("docs").await.unwrap();
    assert_eq!(docs.current(), "/home/user/docs");
    assert_eq!(client.current(), "/home/user");

    let file = docs.resolve("b.txt").await.unwrap();
    assert_eq!(file.current(), "/home/user/docs/b.txt");
    assert_eq!(file.root(), "/home/user");
}

#[tokio::test]
async fn test_list() {
    let server = populated();
    let client = start(&server).await.resolve("docs").await.unwrap();
    server.clear_events();

    let entries = client.list().await.unwrap();
    let summary: Vec<_> = entries
        .iter()
        .map(|entry| (entry.name.as_str(), entry.entry_type, entry.size))
        .collect();

    assert_eq!(
        summary,
        [
            ("a.txt", EntryType::Regular, Some(5)),
            ("b.txt", EntryType::Regular, Some(6)),
            ("link", EntryType::Symlink, Some(0)),
            ("sub", EntryType::Directory, Some(4096)),
        ]
    );
    assert_eq!(entries[0].posix_permissions, Some(0o644));

    assert_eq!(
        server.events(),
        ["opendir /home/user/docs", "closedir /home/user/docs"]
    );
    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_list_close_failed() {
    let server = populated();
    let client = start(&server).await.resolve("docs").await.unwrap();
    server.fail_closedir();

    let err = client.list().await.unwrap_err();
    assert!(matches!(err, FileError::CloseFailed(_)), "{err:?}");
    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_wrong_type_issues_no_request() {
    let server = populated();
    let client = start(&server).await;
    let mut file = client.resolve("docs/a.txt").await.unwrap();
    server.clear_events();

    let err = file.list().await.unwrap_err();
    assert!(
        matches!(
            &err,
            FileError::WrongType { path, expected: "directory" } if path == "/home/user/docs/a.txt"
        ),
        "{err:?}"
    );
    assert!(matches!(
        file.create("x", OpenFlags::WRITE, 0o644).await,
        Err(FileError::WrongType { .. })
    ));
    assert!(matches!(
        file.mkdir("x", 0o755).await,
        Err(FileError::WrongType { .. })
    ));
    assert!(matches!(
        file.rmdir().await,
        Err(FileError::WrongType { .. })
    ));

    assert!(matches!(
        client.open(OpenFlags::READ).await,
        Err(FileError::WrongType {
            expected: "regular file",
            ..
        })
    ));
    assert!(matches!(
        client.remove().await,
        Err(FileError::WrongType { .. })
    ));

    assert_eq!(server.events(), Vec::<String>::new());
    assert_eq!(file.current(), "/home/user/docs/a.txt");
}

#[tokio::test]
async fn test_mkdir_repoints() {
    let server = populated();
    let mut client = start(&server).await;
    server.clear_events();

    client.mkdir("new", 0o750).await.unwrap();

    assert_eq!(client.current(), "/home/user/new");
    assert!(client.is_directory());
    assert!(server.is_dir("/home/user/new"));
    assert_eq!(server.mode("/home/user/new"), Some(0o750));
    assert_eq!(server.events(), ["mkdir /home/user/new"]);

    // The new node is a directory like any other.
    client.mkdir("nested", 0o700).await.unwrap();
    assert_eq!(client.current(), "/home/user/new/nested");

    let err = client.resolve("..").await.unwrap().mkdir("nested", 0o700).await;
    assert!(matches!(err, Err(FileError::Transport(_))), "{err:?}");
}

#[tokio::test]
async fn test_create() {
    let server = populated();
    let client = start(&server).await;
    server.clear_events();

    let handle = client
        .create("new.txt", OpenFlags::WRITE, 0o600)
        .await
        .unwrap();
    assert_eq!(handle.path(), "/home/user/new.txt");
    handle.close().await.unwrap();

    assert_eq!(client.current(), "/home/user");
    assert_eq!(server.file_content("/home/user/new.txt"), Some(Vec::new()));
    assert_eq!(server.mode("/home/user/new.txt"), Some(0o600));
    assert_eq!(
        server.events(),
        ["open /home/user/new.txt 0xa", "close /home/user/new.txt"]
    );
    assert_eq!(server.open_handles(), 0);

    let err = client
        .create("new.txt", OpenFlags::WRITE | OpenFlags::EXCLUSIVE, 0o600)
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn test_open() {
    let server = populated();
    let client = start(&server).await;

    let file = client.resolve("docs/a.txt").await.unwrap();
    let handle = file.open(OpenFlags::READ).await.unwrap();
    assert_eq!(handle.path(), "/home/user/docs/a.txt");
    assert_eq!(handle.offset(), 0);
    handle.close().await.unwrap();

    server.insert_file("/home/user/gone.txt", b"");
    let gone = client.resolve("gone.txt").await.unwrap();
    gone.remove().await.unwrap();
    let err = gone.open(OpenFlags::READ).await.unwrap_err();
    assert!(
        matches!(&err, FileError::NotFound { path, .. } if path == "/home/user/gone.txt"),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_remove_and_rmdir() {
    let server = populated();
    let client = start(&server).await;

    let file = client.resolve("docs/a.txt").await.unwrap();
    file.remove().await.unwrap();
    assert!(!server.exists("/home/user/docs/a.txt"));

    let sub = client.resolve("docs/sub").await.unwrap();
    sub.rmdir().await.unwrap();
    assert!(!server.exists("/home/user/docs/sub"));

    // Not empty.
    let docs = client.resolve("docs").await.unwrap();
    assert!(matches!(docs.rmdir().await, Err(FileError::Transport(_))));
}

#[tokio::test]
async fn test_stat_and_setstat() {
    let server = populated();
    let client = start(&server).await;
    let file = client.resolve("docs/b.txt").await.unwrap();

    let attrs = file.stat().await.unwrap();
    assert_eq!(attrs.name, "b.txt");
    assert_eq!(attrs.entry_type, EntryType::Regular);
    assert_eq!(attrs.size, Some(6));
    assert_eq!(attrs.posix_permissions, Some(0o644));
    assert_eq!((attrs.uid, attrs.gid), (Some(1000), Some(1000)));

    file.setstat(&FileAttributes {
        size: Some(3),
        posix_permissions: Some(0o600),
        atime: Some(10),
        mtime: Some(20),
        ..Default::default()
    })
    .await
    .unwrap();

    assert_eq!(server.file_content("/home/user/docs/b.txt").unwrap(), b"wor");
    assert_eq!(server.mode("/home/user/docs/b.txt"), Some(0o600));

    let attrs = file.stat().await.unwrap();
    assert_eq!(attrs.size, Some(3));
    assert_eq!((attrs.atime, attrs.mtime), (Some(10), Some(20)));
}
