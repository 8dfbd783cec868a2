use ssh_client_core::{
    file::{Demand, ReadStream, RemoteFileHandle},
    fs::RemoteFileSystemClient,
    lowlevel::OpenFlags,
    FileError, SftpOptions,
};
use ssh_test_common::{content, MockSftp};

use std::io;
use std::num::{NonZeroU32, NonZeroUsize};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use tokio::io::AsyncWrite;
use tokio::time::{sleep, timeout};

const BLOCK: usize = 1024;
const OPS: usize = 4;

fn options() -> SftpOptions {
    SftpOptions::new()
        .block_size(NonZeroU32::new(BLOCK as u32).unwrap())
        .max_concurrent_ops(NonZeroUsize::new(OPS).unwrap())
}

async fn client(server: &MockSftp) -> RemoteFileSystemClient<MockSftp> {
    RemoteFileSystemClient::start(server.clone(), options())
        .await
        .unwrap()
}

async fn open(server: &MockSftp, path: &str, flags: OpenFlags) -> RemoteFileHandle<MockSftp> {
    client(server)
        .await
        .resolve(path)
        .await
        .unwrap()
        .open(flags)
        .await
        .unwrap()
}

async fn drain(stream: &mut ReadStream) -> Vec<u8> {
    let mut data = Vec::new();
    while let Some(chunk) = stream.next_chunk().await {
        let chunk = chunk.unwrap();
        assert!(!chunk.is_empty() && chunk.len() <= BLOCK);
        data.extend_from_slice(&chunk);
    }
    data
}

fn count_events(server: &MockSftp, prefix: &str) -> usize {
    server
        .events()
        .iter()
        .filter(|event| event.starts_with(prefix))
        .count()
}

#[tokio::test]
async fn test_read_whole_file() {
    let server = MockSftp::default();
    let data = content(10_000);
    server.insert_file("/home/user/data", &data);

    let handle = open(&server, "data", OpenFlags::READ).await;
    let mut stream = handle.read(u64::MAX).unwrap();

    assert_eq!(drain(&mut stream).await, data);
    assert_eq!(handle.offset(), 10_000);
    assert!(server.max_in_flight() <= OPS);
    assert_eq!(server.out_of_order_polls(), 0);

    handle.close().await.unwrap();
    assert_eq!(server.outstanding(), 0);
    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_read_is_reproducible() {
    let server = MockSftp::default();
    let data = content(10_000);
    server.insert_file("/home/user/data", &data);

    let handle = open(&server, "data", OpenFlags::READ).await;
    assert_eq!(drain(&mut handle.read(3000).unwrap()).await, &data[..3000]);
    assert_eq!(handle.offset(), 3000);

    // The next read continues where the last one stopped.
    assert_eq!(drain(&mut handle.read(2000).unwrap()).await, &data[3000..5000]);
    handle.close().await.unwrap();

    let handle = open(&server, "data", OpenFlags::READ).await;
    assert_eq!(drain(&mut handle.read(3000).unwrap()).await, &data[..3000]);
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_read_empty_file() {
    let server = MockSftp::default();
    server.insert_file("/home/user/empty", b"");

    let handle = open(&server, "empty", OpenFlags::READ).await;
    assert_eq!(drain(&mut handle.read(u64::MAX).unwrap()).await, b"");
    assert_eq!(drain(&mut handle.read(0).unwrap()).await, b"");
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_read_harvests_in_order() {
    let server = MockSftp::default();
    let data = content(8 * BLOCK);
    server.insert_file("/home/user/data", &data);

    // Later requests complete before earlier ones.
    server.push_latencies([5, 0, 3, 0, 1, 4, 0, 2]);

    let handle = open(&server, "data", OpenFlags::READ).await;
    assert_eq!(drain(&mut handle.read(u64::MAX).unwrap()).await, data);

    assert_eq!(server.out_of_order_polls(), 0);
    assert!(server.max_in_flight() <= OPS);
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_read_without_demand_stops_at_read_ahead() {
    let server = MockSftp::default();
    server.insert_file("/home/user/data", &content(20 * BLOCK));

    let handle = open(&server, "data", OpenFlags::READ).await;
    server.clear_events();

    let mut stream = handle.read_with_demand(u64::MAX, Demand::None).unwrap();
    assert!(timeout(Duration::from_millis(50), stream.next_chunk())
        .await
        .is_err());

    assert_eq!(count_events(&server, "submit_read"), OPS);
    assert_eq!(handle.offset(), 0);

    drop(stream);
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_read_limited_demand() {
    let server = MockSftp::default();
    let data = content(10_000);
    server.insert_file("/home/user/data", &data);

    let handle = open(&server, "data", OpenFlags::READ).await;
    let mut stream = handle
        .read_with_demand(u64::MAX, Demand::Limited(1500))
        .unwrap();

    let mut received = Vec::new();
    while received.len() < 1500 {
        received.extend_from_slice(&stream.next_chunk().await.unwrap().unwrap());
    }
    assert_eq!(received, &data[..1500]);

    // Not a single byte more than was asked for.
    assert!(timeout(Duration::from_millis(50), stream.next_chunk())
        .await
        .is_err());
    assert_eq!(handle.offset(), 1500);

    stream.request(Demand::Limited(100));
    while received.len() < 1600 {
        received.extend_from_slice(&stream.next_chunk().await.unwrap().unwrap());
    }
    assert_eq!(received.len(), 1600);
    assert!(timeout(Duration::from_millis(50), stream.next_chunk())
        .await
        .is_err());

    stream.request(Demand::Unlimited);
    received.extend(drain(&mut stream).await);
    assert_eq!(received, data);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_read_error() {
    let server = MockSftp::default();
    let data = content(10 * BLOCK);
    server.insert_file("/home/user/data", &data);
    server.fail_read_at(2 * BLOCK as u64);

    let handle = open(&server, "data", OpenFlags::READ).await;
    let mut stream = handle.read(u64::MAX).unwrap();

    let mut received = Vec::new();
    let err = loop {
        match stream.next_chunk().await.unwrap() {
            Ok(chunk) => received.extend_from_slice(&chunk),
            Err(err) => break err,
        }
    };
    assert!(matches!(err, FileError::Transport(_)), "{err:?}");
    assert!(received.len() < 2 * BLOCK);
    assert_eq!(received, &data[..received.len()]);

    assert!(stream.next_chunk().await.is_none());
    assert_eq!(server.outstanding(), 0);

    // The error was delivered, closing is clean.
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_read_submit_error() {
    let server = MockSftp::default();
    server.insert_file("/home/user/data", &content(100));
    server.fail_submit_read();

    let handle = open(&server, "data", OpenFlags::READ).await;
    let items: Vec<_> = handle.read(u64::MAX).unwrap().collect().await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(FileError::Transport(_))));
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_read_stops_at_first_eof() {
    let server = MockSftp::default();
    let data = content(2 * BLOCK);
    server.insert_file("/home/user/data", &data);

    let handle = open(&server, "data", OpenFlags::READ).await;
    let mut stream = handle
        .read_with_demand(u64::MAX, Demand::Limited(10))
        .unwrap();
    let chunk = stream.next_chunk().await.unwrap().unwrap();
    assert_eq!(&chunk[..], &data[..10]);

    // The file grows past the end already seen, requests still in flight
    // beyond it must not be picked up.
    server.insert_file("/home/user/data", &content(5 * BLOCK));
    stream.request(Demand::Unlimited);

    let mut received = chunk.to_vec();
    received.extend(drain(&mut stream).await);
    assert_eq!(received, data);

    handle.close().await.unwrap();
    assert_eq!(server.outstanding(), 0);
}

#[tokio::test]
async fn test_busy() {
    let server = MockSftp::default();
    let data = content(5000);
    server.insert_file("/home/user/data", &data);

    let handle = open(&server, "data", OpenFlags::READ | OpenFlags::WRITE).await;
    let mut stream = handle.read(u64::MAX).unwrap();

    assert!(matches!(handle.read(10), Err(FileError::Busy)));
    assert!(matches!(handle.write(&b"x"[..]), Err(FileError::Busy)));

    assert_eq!(drain(&mut stream).await, data);

    // Released once the read is complete.
    let mut stream = handle.read(10).unwrap();
    assert_eq!(drain(&mut stream).await, b"");
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_abandoned_read() {
    let server = MockSftp::default();
    server.insert_file("/home/user/data", &content(20 * BLOCK));
    server.set_default_latency(2);

    let handle = open(&server, "data", OpenFlags::READ).await;
    let mut stream = handle
        .read_with_demand(u64::MAX, Demand::Limited(10))
        .unwrap();
    assert_eq!(stream.next_chunk().await.unwrap().unwrap().len(), 10);

    drop(stream);
    handle.close().await.unwrap();

    assert!(count_events(&server, "abandon") > 0);
    assert_eq!(server.outstanding(), 0);
    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_concurrent_handles() {
    let server = MockSftp::default();
    let first = content(7000);
    let second: Vec<u8> = content(9000).into_iter().rev().collect();
    server.insert_file("/home/user/first", &first);
    server.insert_file("/home/user/second", &second);
    server.set_default_latency(1);

    let a = open(&server, "first", OpenFlags::READ).await;
    let b = open(&server, "second", OpenFlags::READ).await;

    let mut a_stream = a.read(u64::MAX).unwrap();
    let mut b_stream = b.read(u64::MAX).unwrap();
    let (a_data, b_data) = tokio::join!(drain(&mut a_stream), drain(&mut b_stream));

    assert_eq!(a_data, first);
    assert_eq!(b_data, second);
    assert_eq!(server.out_of_order_polls(), 0);

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn test_write() {
    let server = MockSftp::default();
    let data = content(5000);

    let handle = client(&server)
        .await
        .create("out", OpenFlags::WRITE, 0o644)
        .await
        .unwrap();
    server.push_latencies([2, 0, 1]);

    let progress: Vec<u64> = handle
        .write(data.clone())
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    assert!(progress.windows(2).all(|pair| pair[0] < pair[1]), "{progress:?}");
    assert_eq!(progress.last(), Some(&5000));
    assert_eq!(handle.offset(), 5000);

    assert_eq!(server.file_content("/home/user/out").unwrap(), data);
    assert_eq!(server.window_violations(), 0);
    assert!(server.max_in_flight() <= OPS);
    assert_eq!(server.out_of_order_polls(), 0);

    // Appended at the offset.
    let written = handle.write(&b"tail"[..]).unwrap().wait().await.unwrap();
    assert_eq!(written, 4);
    assert_eq!(
        &server.file_content("/home/user/out").unwrap()[5000..],
        b"tail"
    );

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_write_empty() {
    let server = MockSftp::default();
    let handle = client(&server)
        .await
        .create("out", OpenFlags::WRITE, 0o644)
        .await
        .unwrap();

    let progress: Vec<_> = handle
        .write(Vec::<u8>::new())
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;
    assert_eq!(progress, [0]);
    assert_eq!(count_events(&server, "submit_write"), 0);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_write_waits_for_window() {
    let server = MockSftp::default();
    let handle = client(&server)
        .await
        .create("out", OpenFlags::WRITE, 0o644)
        .await
        .unwrap();

    server.set_window(0);
    let mut progress = handle.write(content(100)).unwrap();
    assert!(timeout(Duration::from_millis(50), progress.next_progress())
        .await
        .is_err());
    assert_eq!(count_events(&server, "submit_write"), 0);

    server.set_window(1 << 20);
    assert_eq!(progress.wait().await.unwrap(), 100);
    assert_eq!(server.file_content("/home/user/out").unwrap(), content(100));

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_write_small_window() {
    let server = MockSftp::default();
    let handle = client(&server)
        .await
        .create("out", OpenFlags::WRITE, 0o644)
        .await
        .unwrap();

    // Room for one block at a time.
    server.set_window(BLOCK + BLOCK / 2);
    let data = content(3000);
    assert_eq!(handle.write(data.clone()).unwrap().wait().await.unwrap(), 3000);

    assert_eq!(server.file_content("/home/user/out").unwrap(), data);
    assert_eq!(server.window_violations(), 0);
    assert_eq!(server.max_in_flight(), 1);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_write_to() {
    let server = MockSftp::default();
    let data = content(12_345);
    server.insert_file("/home/user/data", &data);

    let handle = open(&server, "data", OpenFlags::READ).await;
    let mut sink = Vec::new();
    assert_eq!(handle.write_to(&mut sink).await.unwrap(), 12_345);
    assert_eq!(sink, data);

    handle.close().await.unwrap();
}

struct BrokenSink;

impl AsyncWrite for BrokenSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_write_to_broken_sink() {
    let server = MockSftp::default();
    server.insert_file("/home/user/data", &content(10 * BLOCK));

    let handle = open(&server, "data", OpenFlags::READ).await;
    let err = handle.write_to(&mut BrokenSink).await.unwrap_err();
    assert!(matches!(err, FileError::IOError(_)), "{err:?}");

    handle.close().await.unwrap();
    assert_eq!(server.outstanding(), 0);
}

#[tokio::test]
async fn test_close_reports_undelivered_error() {
    let server = MockSftp::default();
    server.insert_file("/home/user/data", &content(10 * BLOCK));
    server.fail_read_at(0);

    let handle = open(&server, "data", OpenFlags::READ).await;
    drop(handle.read(u64::MAX).unwrap());

    let err = handle.close().await.unwrap_err();
    assert!(matches!(err, FileError::Transport(_)), "{err:?}");
    assert_eq!(server.open_handles(), 0);
    assert_eq!(server.outstanding(), 0);
}

#[tokio::test]
async fn test_close_interrupts_idle_read() {
    let server = MockSftp::default();
    server.insert_file("/home/user/data", &content(1 << 20));
    server.set_default_latency(2);

    let handle = open(&server, "data", OpenFlags::READ).await;
    let mut stream = handle.read_with_demand(u64::MAX, Demand::None).unwrap();
    sleep(Duration::from_millis(10)).await;

    timeout(Duration::from_secs(2), handle.close())
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(
        stream.next_chunk().await,
        Some(Err(FileError::Closed))
    ));
    assert!(stream.next_chunk().await.is_none());
    assert_eq!(server.outstanding(), 0);
    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_close_interrupts_unpolled_write() {
    let server = MockSftp::default();
    server.insert_file("/home/user/data", b"");

    let handle = open(&server, "data", OpenFlags::WRITE).await;
    let progress = handle.write(content(1 << 20)).unwrap();
    sleep(Duration::from_millis(10)).await;

    timeout(Duration::from_secs(2), handle.close())
        .await
        .unwrap()
        .unwrap();

    let items: Vec<_> = progress.collect().await;
    let (last, reports) = items.split_last().unwrap();
    assert!(matches!(last, Err(FileError::Closed)), "{last:?}");
    assert!(reports.iter().all(Result::is_ok));

    assert!(server.file_content("/home/user/data").unwrap().len() < 1 << 20);
    assert_eq!(server.outstanding(), 0);
    assert_eq!(server.open_handles(), 0);
}

#[tokio::test]
async fn test_close_failed() {
    let server = MockSftp::default();
    server.insert_file("/home/user/data", &content(10));
    server.fail_close();

    let handle = open(&server, "data", OpenFlags::READ).await;
    let err = handle.close().await.unwrap_err();
    assert!(matches!(err, FileError::CloseFailed(_)), "{err:?}");

    // Both errors are reported.
    server.fail_read_at(0);
    let handle = open(&server, "data", OpenFlags::READ).await;
    drop(handle.read(u64::MAX).unwrap());

    match handle.close().await.unwrap_err() {
        FileError::RecursiveErrors(errors) => {
            assert!(matches!(errors.original_error, FileError::Transport(_)));
            assert!(matches!(errors.occuring_error, FileError::CloseFailed(_)));
        }
        err => panic!("unexpected error {err:?}"),
    }
}

#[tokio::test]
async fn test_drop_closes_in_background() {
    let server = MockSftp::default();
    let data = content(10_000);
    server.insert_file("/home/user/data", &data);

    let handle = open(&server, "data", OpenFlags::READ).await;
    drop(handle);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(server.open_handles(), 0);
    assert_eq!(count_events(&server, "close /home/user/data"), 1);

    // A running read keeps the handle open until it is done.
    let handle = open(&server, "data", OpenFlags::READ).await;
    let mut stream = handle.read(u64::MAX).unwrap();
    drop(handle);

    assert_eq!(drain(&mut stream).await, data);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(server.open_handles(), 0);
}
