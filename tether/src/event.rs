//! Notifications from the receive duty to whoever owns the console.
//!
//! The receive task never prints. It posts [`Event`]s to a channel, and the
//! single consumer of that channel decides how to render them.

use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tether_proto::Checksum;

use crate::TransferError;

/// Something the peer did, in stream order.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Event {
    /// A text message arrived.
    Text {
        /// Message body, verbatim.
        text: String,
    },

    /// A file header arrived; the payload follows.
    FileStarted {
        /// Name as declared by the sender.
        name: String,
        /// Declared payload size.
        size: u64,
        /// Declared digest.
        #[serde(serialize_with = "display")]
        checksum: Checksum,
    },

    /// A file was received and verified.
    FileReceived {
        /// Name as declared by the sender.
        name: String,
        /// Where it was written.
        path: PathBuf,
        /// Payload size.
        size: u64,
        /// Time from header to verified file.
        #[serde(serialize_with = "seconds")]
        elapsed: Duration,
    },

    /// A file transfer failed. The connection may still be open.
    FileFailed {
        /// Name as declared by the sender.
        name: String,
        /// Why it failed.
        #[serde(serialize_with = "display")]
        error: TransferError,
    },

    /// The receive duty has stopped; no further events follow.
    Closed {
        /// `None` when the peer closed the connection cleanly.
        reason: Option<String>,
    },
}

fn display<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

fn seconds<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
