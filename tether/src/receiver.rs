//! The receive duty: decodes frames until the connection ends.

use tether_proto::Kind;
use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::deadline::{Timed, within};
use crate::transfer;
use crate::{Config, Destination, Error, Event, Result};

/// Sole reader of a connection.
///
/// Per-file failures are reported as [`Event::FileFailed`] and the loop moves
/// on to the next frame. Decoding failures end the loop, because without a
/// resync marker the rest of the stream cannot be trusted.
#[derive(Debug)]
pub struct Receiver<R> {
    reader: R,
    dest: Destination,
    config: Config,
    events: UnboundedSender<Event>,
}

impl<R: AsyncRead + Unpin> Receiver<R> {
    /// Creates a receiver that reports to `events`.
    pub fn new(reader: R, config: Config, events: UnboundedSender<Event>) -> Self {
        Self {
            reader,
            dest: Destination::new(&config.dest_dir, config.on_collision),
            config,
            events,
        }
    }

    /// Runs until the peer disconnects or the stream fails.
    ///
    /// Always finishes with an [`Event::Closed`]. Returns `Ok(())` when the
    /// peer closed cleanly between frames.
    pub async fn run(mut self) -> Result<()> {
        let result = self.serve().await;
        match &result {
            Ok(()) => info!("peer closed the connection"),
            Err(e) => warn!(error = %e, "receive loop stopped"),
        }
        self.emit(Event::Closed {
            reason: result.as_ref().err().map(ToString::to_string),
        });
        result
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            let kind = within(self.config.idle_timeout, tether_proto::read_kind(&mut self.reader));
            let Some(kind) = kind.await? else {
                return Ok(());
            };

            match kind {
                Kind::Text => self.text().await?,
                Kind::File => self.file().await?,
            }
        }
    }

    async fn text(&mut self) -> Result<()> {
        let mut r = Timed::new(&mut self.reader, self.config.read_timeout);
        let length = tether_proto::read_text_header(&mut r).await?;
        let text = tether_proto::read_text(&mut r, length).await?;
        debug!(bytes = length, "text received");
        self.emit(Event::Text { text });
        Ok(())
    }

    async fn file(&mut self) -> Result<()> {
        let events = &self.events;
        let outcome = transfer::receive_file(&mut self.reader, &self.dest, &self.config, |h| {
            post(
                events,
                Event::FileStarted {
                    name: h.name.clone(),
                    size: h.size,
                    checksum: h.checksum,
                },
            );
        })
        .await?;

        let name = outcome.header.name;
        self.emit(match outcome.result {
            Ok(done) => Event::FileReceived {
                name,
                path: done.path,
                size: done.size,
                elapsed: done.elapsed,
            },
            Err(error) => Event::FileFailed { name, error },
        });

        match outcome.stream_error {
            Some(e) => Err(Error::Io(e)),
            None => Ok(()),
        }
    }

    fn emit(&self, event: Event) {
        post(&self.events, event);
    }
}

/// Posts an event. A dropped consumer is not an error for the reader.
fn post(events: &UnboundedSender<Event>, event: Event) {
    if events.send(event).is_err() {
        debug!("event consumer gone");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tether_proto::{Checksum, encode_file_header, encode_text};
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;

    use super::*;
    use crate::TransferError;

    async fn run(input: &[u8], dir: &std::path::Path) -> (Result<()>, Vec<Event>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = Config {
            dest_dir: dir.to_path_buf(),
            ..Config::default()
        };
        let result = Receiver::new(input, config, tx).run().await;
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        (result, events)
    }

    fn file_frame(name: &str, data: &[u8]) -> Vec<u8> {
        let mut f = encode_file_header(name, data.len() as u64, &Checksum::of(data)).unwrap();
        f.extend_from_slice(data);
        f
    }

    #[tokio::test]
    async fn mixed_frames_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let mut input = encode_text("hello\nworld").unwrap();
        input.extend(file_frame("a.txt", b"abc"));
        input.extend(encode_text("").unwrap());

        let (result, events) = run(&input, tmp.path()).await;
        assert!(result.is_ok());
        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], Event::Text { text } if text == "hello\nworld"));
        assert!(matches!(&events[1], Event::FileStarted { name, size: 3, .. } if name == "a.txt"));
        assert!(matches!(&events[2], Event::FileReceived { size: 3, .. }));
        assert!(matches!(&events[3], Event::Text { text } if text.is_empty()));
        assert!(matches!(&events[4], Event::Closed { reason: None }));
    }

    #[tokio::test]
    async fn failed_file_keeps_loop_running() {
        let tmp = tempfile::tempdir().unwrap();
        let mut bad = file_frame("bad.bin", b"payload");
        let last = bad.len() - 1;
        bad[last] = b'!';
        let mut input = bad;
        input.extend(encode_text("still here").unwrap());

        let (result, events) = run(&input, tmp.path()).await;
        assert!(result.is_ok());
        assert!(matches!(
            &events[1],
            Event::FileFailed {
                error: TransferError::ChecksumMismatch { .. },
                ..
            }
        ));
        assert!(matches!(&events[2], Event::Text { text } if text == "still here"));
    }

    #[tokio::test]
    async fn unknown_discriminant_stops() {
        let tmp = tempfile::tempdir().unwrap();
        let mut input = encode_text("first").unwrap();
        input.push(0x00);
        input.extend(encode_text("never seen").unwrap());

        let (result, events) = run(&input, tmp.path()).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(tether_proto::ProtocolError::UnknownDiscriminant(0)))
        ));
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            Event::Closed { reason: Some(r) } if r.contains("unknown frame discriminant")
        ));
    }

    #[tokio::test]
    async fn truncated_text_header_stops() {
        let tmp = tempfile::tempdir().unwrap();
        let (result, events) = run(&[b'T', 0, 0], tmp.path()).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(tether_proto::ProtocolError::Truncated { .. }))
        ));
        assert!(matches!(&events[0], Event::Closed { reason: Some(_) }));
    }

    #[tokio::test]
    async fn slow_text_within_read_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let frame = encode_text("0123456789").unwrap();
        let (mut tx, rx) = tokio::io::duplex(64);
        tokio::spawn(async move {
            for b in frame {
                tokio::time::sleep(Duration::from_millis(20)).await;
                tx.write_all(&[b]).await.unwrap();
            }
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let config = Config {
            dest_dir: tmp.path().to_path_buf(),
            read_timeout: Some(Duration::from_millis(150)),
            ..Config::default()
        };
        let result = Receiver::new(rx, config, events_tx).run().await;
        assert!(result.is_ok(), "{result:?}");
        let first = events_rx.recv().await.unwrap();
        assert!(matches!(first, Event::Text { text } if text == "0123456789"));
        assert!(matches!(events_rx.recv().await, Some(Event::Closed { reason: None })));
    }

    #[tokio::test]
    async fn dropped_consumer_does_not_stop_reader() {
        let tmp = tempfile::tempdir().unwrap();
        let mut input = file_frame("a.txt", b"abc");
        input.extend(encode_text("hi").unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let config = Config {
            dest_dir: tmp.path().to_path_buf(),
            ..Config::default()
        };
        let result = Receiver::new(&input[..], config, tx).run().await;
        assert!(result.is_ok());
        assert!(tmp.path().join("a.txt").exists());
    }
}
