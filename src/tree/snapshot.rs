//! Tree snapshots
//!
//! Persistent nodes only; ephemeral nodes belong to live sessions and are
//! never written out.
//!
//! ## File Format
//! ```text
//! ┌───────────┬─────────┬─────────┬──────────────────────┐
//! │ Magic (4) │ CRC (4) │ Len (4) │ bincode(Snapshot)    │
//! └───────────┴─────────┴─────────┴──────────────────────┘
//! ```

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::state::{Node, TreeState, ROOT};
use super::MemoryTree;
use crate::error::{KvError, Result};

const MAGIC: &[u8; 4] = b"TKVS";

/// Header size: magic + crc + payload length
pub const HEADER_SIZE: usize = 12;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    nodes: Vec<SnapshotNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotNode {
    path: String,
    data: Vec<u8>,
    version: i64,
}

/// `<target>.tmp`, in the same directory so the rename stays on one filesystem
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

impl MemoryTree {
    /// Write every persistent node to `path`, replacing the file
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut nodes: Vec<SnapshotNode> = {
            let state = self.state().lock();
            state
                .iter()
                .filter(|(p, node)| p.as_str() != ROOT && node.ephemeral_owner.is_none())
                .map(|(p, node)| SnapshotNode {
                    path: p.clone(),
                    data: node.data.to_vec(),
                    version: node.version,
                })
                .collect()
        };
        // parents before children
        nodes.sort_by(|a, b| depth(&a.path).cmp(&depth(&b.path)).then(a.path.cmp(&b.path)));

        let payload = bincode::serialize(&Snapshot { nodes })
            .map_err(|e| KvError::Snapshot(format!("encode failed: {}", e)))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| KvError::Snapshot("snapshot too large".to_string()))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&payload);

        // write beside the target, then swap it in
        let target = path.as_ref();
        let tmp = temp_path(target);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, target)?;
        tracing::debug!("Wrote snapshot to {}", target.display());
        Ok(())
    }

    /// Build a new tree from a snapshot file
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let buf = fs::read(path.as_ref())?;
        if buf.len() < HEADER_SIZE || &buf[..4] != MAGIC {
            return Err(KvError::Snapshot("not a snapshot file".to_string()));
        }

        let crc = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let len = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
        let payload = &buf[HEADER_SIZE..];
        if payload.len() != len {
            return Err(KvError::Snapshot(format!(
                "truncated payload: expected {} bytes, found {}",
                len,
                payload.len()
            )));
        }
        if crc32fast::hash(payload) != crc {
            return Err(KvError::Snapshot("checksum mismatch".to_string()));
        }

        let snapshot: Snapshot = bincode::deserialize(payload)
            .map_err(|e| KvError::Snapshot(format!("decode failed: {}", e)))?;

        let mut state = TreeState::default();
        for entry in snapshot.nodes {
            let mut node = Node::new(Bytes::from(entry.data), None);
            node.version = entry.version;
            let path = entry.path;
            state
                .insert_restored(path.clone(), node)
                .map_err(|e| KvError::Snapshot(format!("bad node {:?}: {}", path, e)))?;
        }

        tracing::debug!(
            "Loaded snapshot from {} ({} nodes)",
            path.as_ref().display(),
            state.len()
        );
        Ok(MemoryTree::from_state(state))
    }
}
