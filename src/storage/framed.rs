//! Framed file storage
//!
//! Like `JsonStorage`, but the JSON payload sits behind a fixed header that
//! lets a reader reject truncated or tampered files instead of decoding them.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (18 bytes, bincode fixed-int little endian)           │
//! │   Magic: "ADOC" (4) | Version: u16 (2) | PayloadLen: u64 (8) │
//! │   PayloadCRC: u32 (4)                                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (PayloadLen bytes)                                   │
//! │   JSON-encoded snapshot                                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//! An empty file is a fresh database.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

use super::{
    encode_json, prepare_file, read_file, write_file_atomic, FileOptions, Snapshot, Storage,
};

/// Magic bytes identifying an AtlasDoc framed snapshot
pub const MAGIC: [u8; 4] = *b"ADOC";

/// Current framed format version
pub const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + PayloadLen (8) + CRC (4) = 18 bytes
pub const HEADER_SIZE: usize = 18;

/// Fixed-size header preceding the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub payload_len: u64,
    pub crc: u32,
}

impl FrameHeader {
    /// Header describing `payload`
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            payload_len: payload.len() as u64,
            crc: crc32fast::hash(payload),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Check this header against the payload that followed it
    pub fn validate(&self, payload: &[u8]) -> Result<()> {
        if self.magic != MAGIC {
            return Err(AtlasError::SnapshotCorruption(format!(
                "invalid magic: expected ADOC, got {:?}",
                self.magic
            )));
        }

        if self.version != VERSION {
            return Err(AtlasError::SnapshotCorruption(format!(
                "unsupported version: {}",
                self.version
            )));
        }

        if self.payload_len != payload.len() as u64 {
            return Err(AtlasError::SnapshotCorruption(format!(
                "payload length mismatch: header says {}, file has {}",
                self.payload_len,
                payload.len()
            )));
        }

        let actual = crc32fast::hash(payload);
        if actual != self.crc {
            return Err(AtlasError::SnapshotCorruption(format!(
                "checksum mismatch: expected {:08x}, got {:08x}",
                self.crc, actual
            )));
        }

        Ok(())
    }
}

/// Storage backed by a checksummed framed file
#[derive(Debug)]
pub struct FramedStorage {
    path: PathBuf,
    options: FileOptions,

    /// Serializes file access within this process
    io_lock: Mutex<()>,

    closed: AtomicBool,
}

impl FramedStorage {
    /// Open (creating if needed) a framed snapshot file
    pub fn open(path: impl AsRef<Path>, options: FileOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        prepare_file(&path, &options)?;

        tracing::debug!(path = %path.display(), "opened framed storage");

        Ok(Self {
            path,
            options,
            io_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Frame a snapshot into the on-disk byte layout
    fn encode(&self, snapshot: &Snapshot) -> Result<Bytes> {
        let payload = encode_json(snapshot, self.options.pretty)?;
        let header = FrameHeader::for_payload(&payload).encode()?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_slice(&header);
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Validate and unframe the on-disk bytes
    fn decode(bytes: Vec<u8>) -> Result<Snapshot> {
        if bytes.len() < HEADER_SIZE {
            return Err(AtlasError::SnapshotCorruption(format!(
                "file too short for header: {} bytes",
                bytes.len()
            )));
        }

        let mut bytes = Bytes::from(bytes);
        let header_bytes = bytes.split_to(HEADER_SIZE);
        let header = FrameHeader::decode(&header_bytes)?;
        header.validate(&bytes)?;

        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl Storage for FramedStorage {
    fn read(&self) -> Result<Option<Snapshot>> {
        let _guard = self.io_lock.lock();

        match read_file(&self.path)? {
            Some(bytes) => {
                tracing::trace!(bytes = bytes.len(), "read framed snapshot");
                Self::decode(bytes).map(Some)
            }
            None => Ok(None),
        }
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let framed = self.encode(snapshot)?;

        let _guard = self.io_lock.lock();
        write_file_atomic(&self.path, &framed, self.options.sync_on_write)?;

        tracing::trace!(bytes = framed.len(), "wrote framed snapshot");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!(path = %self.path.display(), "closed framed storage");
        Ok(())
    }
}
