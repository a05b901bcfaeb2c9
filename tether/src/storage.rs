//! Destination directory for received files.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::fs::{self, File, OpenOptions};

use crate::TransferError;

/// Highest numeric suffix tried by [`CollisionPolicy::Rename`].
const MAX_RENAME: u32 = 9999;

/// How to handle a received file whose name already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum CollisionPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Keep both: `name (1).ext`, `name (2).ext`, ...
    #[default]
    Rename,
    /// Fail the transfer with [`TransferError::Exists`].
    Reject,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "rename" => Ok(Self::Rename),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown collision policy {other:?} (expected overwrite, rename or reject)"
            )),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Overwrite => "overwrite",
            Self::Rename => "rename",
            Self::Reject => "reject",
        })
    }
}

/// Where incoming files are written.
#[derive(Debug, Clone)]
pub struct Destination {
    /// Target directory, created on demand.
    dir: PathBuf,
    /// Collision handling for existing names.
    policy: CollisionPolicy,
}

impl Destination {
    /// Creates a destination rooted at `dir`. Nothing touches the disk yet.
    pub fn new(dir: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reduces a sender-declared name to its last path component.
    ///
    /// Both `/` and `\` count as separators so a peer on any platform cannot
    /// climb out of the destination directory.
    pub fn sanitize(name: &str) -> Result<&str, TransferError> {
        let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
        if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
            return Err(TransferError::InvalidName(name.to_owned()));
        }
        Ok(base)
    }

    /// Creates the directory if needed and opens a fresh file for `name`.
    pub async fn create(&self, name: &str) -> Result<(PathBuf, File), TransferError> {
        let base = Self::sanitize(name)?;
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(base);

        match self.policy {
            CollisionPolicy::Overwrite => {
                let file = File::create(&path).await?;
                Ok((path, file))
            }
            CollisionPolicy::Reject => match create_new(&path).await {
                Ok(file) => Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Err(TransferError::Exists(path))
                }
                Err(e) => Err(e.into()),
            },
            CollisionPolicy::Rename => {
                let mut candidate = path.clone();
                for n in 1..=MAX_RENAME {
                    match create_new(&candidate).await {
                        Ok(file) => return Ok((candidate, file)),
                        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                            candidate = self.dir.join(numbered(base, n));
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(TransferError::Exists(path))
            }
        }
    }
}

/// Opens `path` for writing, failing if it already exists.
async fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

/// `report.pdf` -> `report (n).pdf`; `.bashrc` -> `.bashrc (n)`.
fn numbered(name: &str, n: u32) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map_or_else(|| name.into(), |s| s.to_string_lossy());
    match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    }
}
