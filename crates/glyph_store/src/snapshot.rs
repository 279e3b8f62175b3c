//! Snapshot-file relation store backend.
//!
//! Each store instance owns one file under the caches root. The whole map
//! is loaded on open and rewritten on flush, framed with a validated
//! binary header: magic bytes, a format version, and a checksum of the
//! payload. A missing file opens as an empty store; a file that exists
//! but fails validation is a consistency error and propagates, leaving
//! the round unable to commit.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glyph_common::ContentHash;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::relation::RelationStore;

/// Magic bytes identifying a glyph snapshot store file.
const SNAPSHOT_MAGIC: [u8; 4] = *b"GLYS";

/// Current snapshot format version. Increment on breaking changes to the
/// header or payload encoding.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Header prepended to every snapshot file for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    /// Magic bytes: must be `b"GLYS"`.
    magic: [u8; 4],

    /// Snapshot format version.
    format_version: u32,

    /// Content hash of the payload (for corruption detection).
    checksum: ContentHash,
}

/// A relation store persisted as a single snapshot file.
///
/// Mutations happen on the in-memory map; [`flush`](RelationStore::flush)
/// rewrites the file.
#[derive(Debug)]
pub struct SnapshotStore<K, V> {
    /// The snapshot file path.
    path: PathBuf,

    /// Current contents.
    map: BTreeMap<K, BTreeSet<V>>,

    /// Set by `close`; any later mutation is rejected.
    closed: bool,
}

impl<K, V> SnapshotStore<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Ord + Clone + Serialize + DeserializeOwned,
{
    /// Opens the store at `path`, loading and validating an existing
    /// snapshot if one is present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let map = match std::fs::read(&path) {
            Ok(raw) => Self::decode(&path, &raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StoreError::Io {
                    path,
                    source: e,
                })
            }
        };
        Ok(Self {
            path,
            map,
            closed: false,
        })
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(path: &Path, raw: &[u8]) -> Result<BTreeMap<K, BTreeSet<V>>, StoreError> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        // Framing: 4-byte header length (little-endian) + header + payload.
        if raw.len() < 4 {
            return Err(corrupt("file shorter than header length field"));
        }
        let header_len =
            u32::from_le_bytes(raw[..4].try_into().map_err(|_| corrupt("bad length field"))?)
                as usize;
        if raw.len() < 4 + header_len {
            return Err(corrupt("truncated header"));
        }

        let header: SnapshotHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .map_err(|e| corrupt(&format!("undecodable header: {e}")))?
                .0;

        if header.magic != SNAPSHOT_MAGIC {
            return Err(corrupt("bad magic"));
        }
        if header.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(corrupt("format version mismatch"));
        }

        let payload = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload) != header.checksum {
            return Err(corrupt("checksum mismatch"));
        }

        Ok(
            bincode::serde::decode_from_slice(payload, bincode::config::standard())
                .map_err(|e| corrupt(&format!("undecodable payload: {e}")))?
                .0,
        )
    }

    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        let payload = bincode::serde::encode_to_vec(&self.map, bincode::config::standard())
            .map_err(|e| StoreError::Serialization {
                reason: e.to_string(),
            })?;

        let header = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            format_version: SNAPSHOT_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| StoreError::Serialization {
                reason: e.to_string(),
            })?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&payload);
        Ok(output)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

impl<K, V> RelationStore<K, V> for SnapshotStore<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Ord + Clone + Serialize + DeserializeOwned,
{
    fn get(&self, key: &K) -> Option<&BTreeSet<V>> {
        self.map.get(key)
    }

    fn put(&mut self, key: K, values: BTreeSet<V>) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.map.insert(key, values);
        Ok(())
    }

    fn remove(&mut self, key: &K) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.map.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<K> {
        self.map.keys().cloned().collect()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let bytes = self.encode()?;
        std::fs::write(&self.path, &bytes).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.closed = true;
        Ok(())
    }
}
