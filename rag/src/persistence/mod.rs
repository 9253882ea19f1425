//! On-disk format of an [`HnswIndex`].
//!
//! ```text
//! +----------+-------------+---------------------+------------------+
//! | QADEXANN | version u32 | xxh3 checksum u64   | rkyv payload ... |
//! +----------+-------------+---------------------+------------------+
//! ```
//!
//! Integers are little-endian. The checksum covers the payload only.

mod rkyv_backend;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use crate::config::IndexConfig;
use crate::error::{RagError, Result};
use crate::index::HnswIndex;

use rkyv_backend::IndexSnapshot;

const MAGIC: &[u8; 8] = b"QADEXANN";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 8;

fn temporary_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "index".into(), |name| name.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

fn write_file(path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(MAGIC)?;
    file.write_all(&VERSION.to_le_bytes())?;
    file.write_all(&xxh3_64(payload).to_le_bytes())?;
    file.write_all(payload)?;
    file.sync_all()
}

fn decode(path: &Path, bytes: &[u8]) -> Result<IndexSnapshot> {
    if bytes.len() < HEADER_LEN {
        return Err(RagError::format(path, "truncated header"));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[..8] != MAGIC {
        return Err(RagError::format(path, "not a qadex index file"));
    }

    let mut version = [0; 4];
    version.copy_from_slice(&header[8..12]);
    let version = u32::from_le_bytes(version);
    if version != VERSION {
        return Err(RagError::format(
            path,
            format!("unsupported format version {version}"),
        ));
    }

    let mut checksum = [0; 8];
    checksum.copy_from_slice(&header[12..20]);
    if u64::from_le_bytes(checksum) != xxh3_64(payload) {
        return Err(RagError::format(path, "checksum mismatch"));
    }

    // rkyv needs the archive aligned; the slice after the header is not.
    let mut aligned = AlignedVec::<16>::with_capacity(payload.len());
    aligned.extend_from_slice(payload);
    rkyv::from_bytes::<IndexSnapshot, RkyvError>(&aligned)
        .map_err(|e| RagError::format(path, format!("invalid archive: {e}")))
}

impl HnswIndex {
    /// Writes the index to `path`.
    ///
    /// The file is written next to `path` and renamed over it once complete, so a
    /// failed save never leaves a partial index behind.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Storage`] if the destination cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RagError::storage(parent, e))?;
        }

        let snapshot = IndexSnapshot::capture(self);
        let payload = rkyv::to_bytes::<RkyvError>(&snapshot)
            .map_err(|e| RagError::storage(path, io::Error::other(e.to_string())))?;

        let temporary = temporary_path(path);
        let written = write_file(&temporary, &payload).and_then(|()| fs::rename(&temporary, path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temporary);
            return Err(RagError::storage(path, e));
        }

        debug!(bytes = payload.len(), "encoded vector index");
        info!(path = %path.display(), vectors = self.len(), "saved vector index");
        Ok(())
    }

    /// Reads an index from `path`, restoring the configuration it was saved with.
    ///
    /// # Errors
    ///
    /// - [`RagError::Format`] if the file is missing, truncated, corrupt or of an
    ///   unknown version.
    /// - [`RagError::Storage`] if reading fails for another reason.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = read_snapshot(path)?;
        let config = snapshot.config().map_err(|e| RagError::format(path, e))?;
        let index = snapshot
            .restore(config)
            .map_err(|e| RagError::format(path, e))?;
        info!(path = %path.display(), vectors = index.len(), "loaded vector index");
        Ok(index)
    }

    /// Like [`load`](Self::load), but also requires the stored configuration to equal
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Everything [`load`](Self::load) returns, plus [`RagError::Format`] when the
    /// stored configuration differs. A dimension difference is reported first.
    pub fn load_with(path: impl AsRef<Path>, expected: &IndexConfig) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = read_snapshot(path)?;
        let config = snapshot.config().map_err(|e| RagError::format(path, e))?;

        if config.dimension != expected.dimension {
            return Err(RagError::format(
                path,
                format!(
                    "dimension mismatch: expected {}, found {}",
                    expected.dimension, config.dimension
                ),
            ));
        }
        if &config != expected {
            return Err(RagError::format(
                path,
                format!("configuration mismatch: expected {expected:?}, found {config:?}"),
            ));
        }

        let index = snapshot
            .restore(config)
            .map_err(|e| RagError::format(path, e))?;
        info!(path = %path.display(), vectors = index.len(), "loaded vector index");
        Ok(index)
    }
}

fn read_snapshot(path: &Path) -> Result<IndexSnapshot> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RagError::format(path, "index file not found"));
        }
        Err(e) => return Err(RagError::storage(path, e)),
    };
    decode(path, &bytes)
}
