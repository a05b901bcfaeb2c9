//! Peer-to-peer text chat and file transfer over a single TCP stream.
//!
//! Two symmetric peers run the same engine; only connection setup differs.
//! Each [`Session`] runs two duties over one connection:
//!
//! - a receive task that decodes frames and reports them as [`Event`]s,
//!   writing incoming files into a [`Destination`] directory and verifying
//!   their MD5 digests;
//! - a [`Sender`] driven by the caller that writes text and file frames.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> tether::Result<()> {
//! use tether::{Config, Event, Session};
//!
//! let stream = tether::connect("192.168.1.20:12345").await?;
//! let mut session = Session::start(stream, Config::default())?;
//! session.sender().send_text("hello\nworld").await?;
//! session.sender().send_file("report.pdf").await?;
//!
//! while let Some(event) = session.next_event().await {
//!     if let Event::Text { text } = event {
//!         println!("{text}");
//!     }
//! }
//! session.close().await
//! # }
//! ```

mod config;
mod deadline;
mod error;
mod event;
mod receiver;
mod sender;
mod session;
mod storage;
mod transfer;

pub use config::{Config, DEFAULT_DEST_DIR};
pub use error::{Error, Result, TransferError};
pub use event::Event;
pub use receiver::Receiver;
pub use sender::{SentFile, Sender};
pub use session::{Session, accept_one, bind, connect};
pub use storage::{CollisionPolicy, Destination};
pub use tether_proto::{CHUNK_SIZE, Checksum, DEFAULT_PORT};
pub use transfer::{Outcome, Received, TransferState, receive_file};
