//! End-to-end sessions over loopback TCP.

use std::path::Path;
use std::time::Duration;

use tether::{Checksum, Config, Event, Session, TransferError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.dest_dir = dir.to_path_buf();
    config
}

/// A listening session plus the raw client socket connected to it.
async fn listener_with_raw_peer(dir: &Path) -> (Session, TcpStream) {
    let listener = tether::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
    let (stream, _) = tether::accept_one(listener).await.unwrap();
    let session = Session::start(stream, config(dir)).unwrap();
    (session, client.await.unwrap())
}

/// Two connected sessions, each writing into its own directory.
async fn session_pair(a: &Path, b: &Path) -> (Session, Session) {
    let listener = tether::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dial = tokio::spawn(tether::connect(addr));
    let (accepted, _) = tether::accept_one(listener).await.unwrap();
    let dialed = dial.await.unwrap().unwrap();
    (
        Session::start(accepted, config(a)).unwrap(),
        Session::start(dialed, config(b)).unwrap(),
    )
}

async fn next(session: &mut Session) -> Event {
    timeout(WAIT, session.next_event())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn text_both_directions() {
    let (a, b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let (mut server, mut client) = session_pair(a.path(), b.path()).await;

    client.sender().send_text("hello\nworld").await.unwrap();
    server.sender().send_text("héllo back").await.unwrap();

    assert!(matches!(next(&mut server).await, Event::Text { text } if text == "hello\nworld"));
    assert!(matches!(next(&mut client).await, Event::Text { text } if text == "héllo back"));

    client.close().await.unwrap();
    assert!(matches!(next(&mut server).await, Event::Closed { reason: None }));
    server.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_transfer_commits() {
    let (a, b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let (mut server, mut client) = session_pair(a.path(), b.path()).await;

    let src = b.path().join("report.pdf");
    let data = pattern(10_000);
    std::fs::write(&src, &data).unwrap();

    let sent = client.sender().send_file(&src).await.unwrap();
    assert_eq!(sent.size, 10_000);
    assert_eq!(sent.checksum, Checksum::of(&data));

    match next(&mut server).await {
        Event::FileStarted {
            name,
            size,
            checksum,
        } => {
            assert_eq!(name, "report.pdf");
            assert_eq!(size, 10_000);
            assert_eq!(checksum, sent.checksum);
        }
        other => panic!("unexpected {other:?}"),
    }
    match next(&mut server).await {
        Event::FileReceived { path, size, .. } => {
            assert_eq!(path, a.path().join("report.pdf"));
            assert_eq!(size, 10_000);
            assert_eq!(std::fs::read(&path).unwrap(), data);
        }
        other => panic!("unexpected {other:?}"),
    }

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interleaved_text_and_files_stay_ordered() {
    let (a, b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let (mut server, mut client) = session_pair(a.path(), b.path()).await;

    for len in [0usize, 1, 4095, 4096, 4097] {
        std::fs::write(b.path().join(format!("f{len}")), pattern(len)).unwrap();
    }
    for len in [0usize, 1, 4095, 4096, 4097] {
        client.sender().send_text(&format!("next: {len}")).await.unwrap();
        client
            .sender()
            .send_file(b.path().join(format!("f{len}")))
            .await
            .unwrap();
    }

    for len in [0usize, 1, 4095, 4096, 4097] {
        let expected = format!("next: {len}");
        assert!(matches!(next(&mut server).await, Event::Text { text } if text == expected));
        assert!(matches!(next(&mut server).await, Event::FileStarted { .. }));
        match next(&mut server).await {
            Event::FileReceived { path, .. } => {
                assert_eq!(std::fs::read(path).unwrap(), pattern(len));
            }
            other => panic!("size {len}: unexpected {other:?}"),
        }
    }

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn severed_after_header_is_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, mut raw) = listener_with_raw_peer(dir.path()).await;

    let header =
        tether_proto::encode_file_header("report.pdf", 10_000, &Checksum::of(b"x")).unwrap();
    raw.write_all(&header).await.unwrap();
    drop(raw);

    assert!(matches!(next(&mut session).await, Event::FileStarted { .. }));
    match next(&mut session).await {
        Event::FileFailed { name, error } => {
            assert_eq!(name, "report.pdf");
            assert!(matches!(
                error,
                TransferError::Incomplete {
                    received: 0,
                    size: 10_000
                }
            ));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(next(&mut session).await, Event::Closed { reason: None }));
    assert!(!dir.path().join("report.pdf").exists());
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn severed_mid_payload_reports_received_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, mut raw) = listener_with_raw_peer(dir.path()).await;

    let data = pattern(10_000);
    let mut frame =
        tether_proto::encode_file_header("part.bin", 10_000, &Checksum::of(&data)).unwrap();
    frame.extend_from_slice(&data[..6000]);
    raw.write_all(&frame).await.unwrap();
    drop(raw);

    assert!(matches!(next(&mut session).await, Event::FileStarted { .. }));
    assert!(matches!(
        next(&mut session).await,
        Event::FileFailed {
            error: TransferError::Incomplete {
                received: 6000,
                size: 10_000
            },
            ..
        }
    ));
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_mid_payload_removes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, mut raw) = listener_with_raw_peer(dir.path()).await;

    let data = pattern(10_000);
    let mut frame =
        tether_proto::encode_file_header("report.pdf", 10_000, &Checksum::of(&data)).unwrap();
    frame.extend_from_slice(&data[..6000]);
    raw.write_all(&frame).await.unwrap();

    assert!(matches!(next(&mut session).await, Event::FileStarted { .. }));
    session.close().await.unwrap();
    assert!(!dir.path().join("report.pdf").exists());
    drop(raw);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn corrupted_payload_is_mismatch_and_connection_survives() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, mut raw) = listener_with_raw_peer(dir.path()).await;

    let data = pattern(5000);
    let mut frame =
        tether_proto::encode_file_header("c.bin", 5000, &Checksum::of(&data)).unwrap();
    let mut corrupt = data.clone();
    corrupt[1234] ^= 0x80;
    frame.extend_from_slice(&corrupt);
    frame.extend(tether_proto::encode_text("after").unwrap());
    raw.write_all(&frame).await.unwrap();

    assert!(matches!(next(&mut session).await, Event::FileStarted { .. }));
    assert!(matches!(
        next(&mut session).await,
        Event::FileFailed {
            error: TransferError::ChecksumMismatch { .. },
            ..
        }
    ));
    assert!(matches!(next(&mut session).await, Event::Text { text } if text == "after"));
    assert!(dir.path().join("c.bin").exists());

    drop(raw);
    assert!(matches!(next(&mut session).await, Event::Closed { reason: None }));
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_discriminant_closes_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, mut raw) = listener_with_raw_peer(dir.path()).await;

    raw.write_all(&[0x00, 1, 2, 3]).await.unwrap();
    match next(&mut session).await {
        Event::Closed { reason: Some(reason) } => {
            assert!(reason.contains("unknown frame discriminant 0x00"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(session.close().await.is_err());

    let mut buf = [0u8; 1];
    let read = timeout(WAIT, raw.read(&mut buf)).await.unwrap();
    assert!(!matches!(read, Ok(n) if n > 0), "peer should see the connection end");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_timeout_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    let listener = tether::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
    let (stream, _) = tether::accept_one(listener).await.unwrap();
    let _raw = client.await.unwrap();

    let mut cfg = config(dir.path());
    cfg.idle_timeout = Some(Duration::from_millis(100));
    let mut session = Session::start(stream, cfg).unwrap();

    assert!(matches!(next(&mut session).await, Event::Closed { reason: Some(_) }));
    assert!(session.close().await.is_err());
}
