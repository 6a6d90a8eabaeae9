//! Value types carried by the protocol: shared-file descriptors and byte ranges.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Descriptor of a shared file: name, content hash, size, and the peers known
/// to hold it. Hash format and size bounds are not validated; wire values pass
/// through as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerFile {
    pub filename: String,
    /// Content digest as a hex string (MD5 in the deployed protocol).
    pub md5: String,
    pub size_bytes: u64,
    /// Peers holding the file, in tracker order. Empty for local descriptors.
    pub peers: Vec<IpAddr>,
}

impl PeerFile {
    pub fn new(filename: &str, md5: &str, size_bytes: u64) -> Self {
        PeerFile {
            filename: filename.to_string(),
            md5: md5.to_string(),
            size_bytes,
            peers: Vec::new(),
        }
    }

    pub fn with_peers(filename: &str, md5: &str, size_bytes: u64, peers: Vec<IpAddr>) -> Self {
        PeerFile {
            filename: filename.to_string(),
            md5: md5.to_string(),
            size_bytes,
            peers,
        }
    }

    /// Universal "not found" sentinel returned by accessors when no
    /// fully-populated record is present. Callers check [`is_empty`](Self::is_empty).
    pub fn empty() -> Self {
        PeerFile::default()
    }

    pub fn is_empty(&self) -> bool {
        self.filename.is_empty() && self.md5.is_empty() && self.size_bytes == 0
    }
}

/// Byte-offset request window into a file. `end >= start` is expected but not
/// enforced; range semantics belong to the file-transfer layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Empty range at offset 0, returned when a requested range section is absent.
    pub fn empty() -> Self {
        ByteRange::default()
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sentinel() {
        assert!(PeerFile::empty().is_empty());
        assert!(!PeerFile::new("a.txt", "d41d8", 1).is_empty());
        // A zero-size file with a name is still a real record.
        assert!(!PeerFile::new("a.txt", "d41d8", 0).is_empty());
    }

    #[test]
    fn byte_range_sentinel_and_len() {
        let empty = ByteRange::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.start, 0);
        assert_eq!(empty.len(), 0);

        let r = ByteRange::new(0, 511);
        assert!(!r.is_empty());
        assert_eq!(r.len(), 511);
    }

    #[test]
    fn serde_roundtrip_for_host_persistence() {
        let file = PeerFile::with_peers(
            "ubuntu.iso",
            "d41d8cd98f00b204e9800998ecf8427e",
            1024,
            vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()],
        );
        let json = serde_json::to_string(&file).unwrap();
        let back: PeerFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, file);

        let r = ByteRange::new(5, 9);
        let back: ByteRange = serde_json::from_str(&serde_json::to_string(&r).unwrap()).unwrap();
        assert_eq!(back, r);
    }
}
