//! Path Mapper
//!
//! Flat keys look like `/a/b/c`. Each key maps to the node
//! `/<prefix segments>/a/b/c` in the coordination service.

use crate::error::{KvError, Result};
use crate::service::{Coordinator, CreateMode, ServiceError};

/// Hierarchy separator used both in keys and node paths
pub const SEPARATOR: char = '/';

/// Segment name the underlying service keeps for itself
const RESERVED_SEGMENT: &str = "zookeeper";

/// Split a key into its segments.
///
/// The key must start with `/`, must not end with `/`, and every segment must
/// be non-empty, printable, not `.`/`..`, and not the reserved name.
pub fn disassemble_key(key: &str) -> Result<Vec<String>> {
    let rest = key
        .strip_prefix(SEPARATOR)
        .ok_or_else(|| malformed(key, "must start with '/'"))?;

    if rest.is_empty() {
        return Err(malformed(key, "must name at least one segment"));
    }

    rest.split(SEPARATOR)
        .map(|segment| check_segment(key, segment).map(|_| segment.to_string()))
        .collect()
}

/// Split a namespace prefix into its segments. Unlike keys, the empty prefix
/// (`""` or `"/"`) is allowed and yields no segments.
pub fn disassemble_prefix(prefix: &str) -> Result<Vec<String>> {
    if prefix.is_empty() || prefix == "/" {
        return Ok(Vec::new());
    }
    disassemble_key(prefix)
}

fn check_segment(key: &str, segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(malformed(key, "empty segment"));
    }
    if segment == "." || segment == ".." {
        return Err(malformed(key, "relative segment"));
    }
    if segment == RESERVED_SEGMENT {
        return Err(malformed(key, "reserved segment"));
    }
    if segment.chars().any(char::is_control) {
        return Err(malformed(key, "control character"));
    }
    Ok(())
}

fn malformed(key: &str, reason: &str) -> KvError {
    KvError::MalformedKey(format!("{:?}: {}", key, reason))
}

/// Joins the namespace prefix with key segments into node paths
#[derive(Debug, Clone)]
pub struct PathMapper {
    prefix_segments: Vec<String>,
}

impl PathMapper {
    pub fn new(prefix_segments: Vec<String>) -> Self {
        Self { prefix_segments }
    }

    /// Build a mapper from a raw prefix string
    pub fn from_prefix(prefix: &str) -> Result<Self> {
        Ok(Self::new(disassemble_prefix(prefix)?))
    }

    pub fn prefix_segments(&self) -> &[String] {
        &self.prefix_segments
    }

    /// Node path for the given key segments
    pub fn assemble<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut path = String::new();
        for segment in self
            .prefix_segments
            .iter()
            .map(String::as_str)
            .chain(segments.iter().map(AsRef::as_ref))
        {
            path.push(SEPARATOR);
            path.push_str(segment);
        }
        path
    }

    /// Node path for a flat key
    pub fn node_path(&self, key: &str) -> Result<String> {
        Ok(self.assemble(&disassemble_key(key)?))
    }

    /// Node path of the namespace root (`/` when there is no prefix)
    pub fn root(&self) -> String {
        if self.prefix_segments.is_empty() {
            SEPARATOR.to_string()
        } else {
            self.assemble::<String>(&[])
        }
    }

    /// Create every prefix node that is missing, outermost first
    pub fn ensure_namespace<S: Coordinator>(&self, service: &S) -> Result<()> {
        let mut path = String::new();
        for segment in &self.prefix_segments {
            path.push(SEPARATOR);
            path.push_str(segment);

            match service.create(&path, Default::default(), CreateMode::Persistent) {
                Ok(_) => tracing::info!("Created namespace node {}", path),
                Err(ServiceError::NodeExists) => {}
                Err(e) => return Err(KvError::from(e)),
            }
        }
        Ok(())
    }
}
