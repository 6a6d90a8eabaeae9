//! PimpMessage envelope: typed constructors and accessors over the message tree.
//!
//! A message is one tree rooted at `PimpMessage`. The `Command` child carries
//! the command as a decimal integer in its `Value` attribute; every other
//! first-level child is an optional named section. Sections and command are
//! independent axes: accessors are purely presence-driven and never require
//! the command to match, which keeps the wire forward-compatible with peers
//! that attach new optional sections.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::peer_file::{ByteRange, PeerFile};
use crate::tree::{ParseError, TreeNode};

/// Command enumerant. Wire values are the decimal discriminants below and
/// must match across all peers in a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    Error = 0,
    PeerGetFile = 1,
    PeerSearch = 2,
    TrackerSearchResult = 3,
    PeerRefresh = 4,
    PeerSignOut = 5,
    /// Internal sentinel for an envelope with no command yet. Never
    /// transmitted as a recognized peer command; unknown wire values also
    /// decode to this.
    Unset = 6,
}

impl CommandType {
    pub fn from_wire_value(value: i64) -> CommandType {
        match value {
            0 => CommandType::Error,
            1 => CommandType::PeerGetFile,
            2 => CommandType::PeerSearch,
            3 => CommandType::TrackerSearchResult,
            4 => CommandType::PeerRefresh,
            5 => CommandType::PeerSignOut,
            _ => CommandType::Unset,
        }
    }

    pub fn wire_value(self) -> i64 {
        self as i64
    }
}

/// Typed per-command view of an envelope, built on the raw accessors. The
/// permissive wire model stays authoritative; this is the ergonomic read path
/// for call sites that dispatch on command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandView {
    GetFile {
        file: PeerFile,
        range: Option<ByteRange>,
    },
    Search {
        query: String,
    },
    SearchResult {
        files: Vec<PeerFile>,
    },
    Refresh {
        files: Vec<PeerFile>,
    },
    SignOut,
    Error {
        detail: Option<String>,
    },
    Unset,
}

/// One protocol message. Exclusively owned by a single send or receive flow;
/// all operations are synchronous and in-memory.
#[derive(Debug, Clone, PartialEq)]
pub struct PimpMessage {
    root: TreeNode,
}

impl PimpMessage {
    /// Fresh envelope carrying only a `SourceIp` section. The command stays
    /// [`CommandType::Unset`] until a factory sets it.
    pub fn from_source(source: IpAddr) -> Self {
        let mut root = TreeNode::new("PimpMessage");
        let mut src = TreeNode::new("SourceIp");
        src.set_attribute("Value", &source.to_string());
        root.add_child(src);
        PimpMessage { root }
    }

    /// Decode received wire text. Malformed input is a genuine decode
    /// failure; the caller decides whether to map it onto an outbound
    /// [`CommandType::Error`] reply.
    pub fn from_wire(text: &str) -> Result<Self, ParseError> {
        Ok(PimpMessage {
            root: TreeNode::parse(text)?,
        })
    }

    /// Legacy decode: on parse failure the result is an envelope forced into
    /// the `Error` command, indistinguishable from a peer-reported error.
    /// Kept for wire compatibility with peers that expect that fold; new
    /// call sites should use [`from_wire`](Self::from_wire).
    pub fn from_wire_lossy(text: &str) -> Self {
        match TreeNode::parse(text) {
            Ok(root) => PimpMessage { root },
            Err(_) => {
                let mut msg = PimpMessage {
                    root: TreeNode::new("PimpMessage"),
                };
                msg.set_command(CommandType::Error);
                msg
            }
        }
    }

    /// Full envelope as wire text. No framing or length prefix; the transport
    /// must already know where one message ends.
    pub fn to_wire(&self) -> String {
        self.root.serialize()
    }

    // -- command --

    pub fn set_command(&mut self, cmd: CommandType) {
        if let Some(node) = self.root.child_mut("Command") {
            node.set_int_attribute("Value", cmd.wire_value());
            return;
        }
        let mut node = TreeNode::new("Command");
        node.set_int_attribute("Value", cmd.wire_value());
        self.root.add_child(node);
    }

    /// Current command; a missing or value-less `Command` section reads as
    /// [`CommandType::Unset`].
    pub fn command(&self) -> CommandType {
        match self.root.child("Command") {
            Some(node) if node.has_attribute("Value") => {
                CommandType::from_wire_value(node.int_attribute("Value"))
            }
            _ => CommandType::Unset,
        }
    }

    /// A missing `Command` section matches no command at all.
    pub fn is_command(&self, cmd: CommandType) -> bool {
        match self.root.child("Command") {
            Some(node) => {
                node.has_attribute("Value")
                    && CommandType::from_wire_value(node.int_attribute("Value")) == cmd
            }
            None => false,
        }
    }

    // -- factories --
    //
    // Each factory sets the command and appends exactly its sections.
    // Repeated factory calls accumulate sections; the convention is one
    // envelope = one factory call.

    /// Request a whole file from a peer.
    pub fn create_peer_get_file(&mut self, file: &PeerFile) {
        self.set_command(CommandType::PeerGetFile);
        self.root.add_child(file_entry(file));
    }

    /// Request a byte range of a file from a peer.
    pub fn create_peer_get_file_range(&mut self, file: &PeerFile, range: ByteRange) {
        self.create_peer_get_file(file);
        let mut node = TreeNode::new("Range");
        node.set_int_attribute("Start", clamp_u64(range.start));
        node.set_int_attribute("End", clamp_u64(range.end));
        self.root.add_child(node);
    }

    /// Ask the tracker to search shared files by keystring.
    pub fn create_peer_search(&mut self, keystring: &str) {
        self.set_command(CommandType::PeerSearch);
        let mut node = TreeNode::new("SearchString");
        node.set_attribute("Value", keystring);
        self.root.add_child(node);
    }

    /// Report an error to the remote side, with a detail string.
    pub fn create_error_message(&mut self, detail: &str) {
        self.set_command(CommandType::Error);
        let mut node = TreeNode::new("ErrorMessage");
        node.set_attribute("Value", detail);
        self.root.add_child(node);
    }

    /// Tracker reply to a search: every matching file with the peers holding it.
    pub fn create_tracker_search_result(&mut self, files: &[PeerFile]) {
        self.set_command(CommandType::TrackerSearchResult);
        let mut results = TreeNode::new("SearchResults");
        for file in files {
            let mut entry = file_entry(file);
            let mut peers = TreeNode::new("PeersList");
            for addr in &file.peers {
                let mut peer = TreeNode::new("Peer");
                peer.set_attribute("Value", &addr.to_string());
                peers.add_child(peer);
            }
            entry.add_child(peers);
            results.add_child(entry);
        }
        self.root.add_child(results);
    }

    /// Advertise the local shared-file list to the tracker. An empty list
    /// omits the `LocalFileList` section entirely.
    pub fn create_peer_refresh(&mut self, local_files: &[PeerFile]) {
        self.set_command(CommandType::PeerRefresh);
        if local_files.is_empty() {
            return;
        }
        let mut list = TreeNode::new("LocalFileList");
        for file in local_files {
            list.add_child(file_entry(file));
        }
        self.root.add_child(list);
    }

    /// Leave the network. No payload sections.
    pub fn create_peer_sign_out(&mut self) {
        self.set_command(CommandType::PeerSignOut);
    }

    // -- section accessors --

    pub fn source(&self) -> Option<IpAddr> {
        self.root
            .child("SourceIp")
            .and_then(|n| n.attribute("Value"))
            .and_then(|v| v.parse().ok())
    }

    /// True only when the `PeerFile` section carries all three scalar fields;
    /// partial records are treated as absent.
    pub fn has_peer_file(&self) -> bool {
        match self.root.child("PeerFile") {
            Some(file) => {
                file.has_attribute("Name")
                    && file.has_attribute("MD5")
                    && file.has_attribute("Size")
            }
            None => false,
        }
    }

    /// The `PeerFile` section, or the empty sentinel when absent or partial.
    pub fn peer_file(&self) -> PeerFile {
        self.root
            .child("PeerFile")
            .and_then(|n| scalar_file(n))
            .unwrap_or_else(PeerFile::empty)
    }

    pub fn has_byte_range(&self) -> bool {
        match self.root.child("Range") {
            Some(range) => range.has_attribute("Start") && range.has_attribute("End"),
            None => false,
        }
    }

    /// The requested byte range, or the empty range at offset 0 when absent.
    pub fn byte_range(&self) -> ByteRange {
        match self.root.child("Range") {
            Some(range) if range.has_attribute("Start") && range.has_attribute("End") => {
                ByteRange::new(
                    range.int_attribute("Start").max(0) as u64,
                    range.int_attribute("End").max(0) as u64,
                )
            }
            _ => ByteRange::empty(),
        }
    }

    pub fn has_search_string(&self) -> bool {
        self.root.child("SearchString").is_some()
    }

    pub fn search_string(&self) -> String {
        self.root
            .child("SearchString")
            .and_then(|n| n.attribute("Value"))
            .unwrap_or_default()
            .to_string()
    }

    pub fn has_search_results(&self) -> bool {
        self.root.child("SearchResults").is_some()
    }

    /// Search results in document order. An entry missing any of
    /// Name/MD5/Size or its `PeersList` is skipped, not an error; partial
    /// corruption never fails the batch.
    pub fn search_results(&self) -> Vec<PeerFile> {
        let Some(results) = self.root.child("SearchResults") else {
            return Vec::new();
        };
        results
            .children()
            .iter()
            .filter_map(|entry| {
                let mut file = scalar_file(entry)?;
                let peers = entry.child("PeersList")?;
                file.peers = peers
                    .children()
                    .iter()
                    .filter_map(|p| p.attribute("Value"))
                    .filter_map(|v| v.parse().ok())
                    .collect();
                Some(file)
            })
            .collect()
    }

    pub fn has_local_file_list(&self) -> bool {
        self.root.child("LocalFileList").is_some()
    }

    /// Local file list in document order; entries missing Name/MD5/Size are
    /// skipped.
    pub fn local_file_list(&self) -> Vec<PeerFile> {
        let Some(list) = self.root.child("LocalFileList") else {
            return Vec::new();
        };
        list.children()
            .iter()
            .filter_map(|entry| scalar_file(entry))
            .collect()
    }

    pub fn error_message(&self) -> Option<String> {
        self.root
            .child("ErrorMessage")
            .and_then(|n| n.attribute("Value"))
            .map(str::to_string)
    }

    /// Tagged per-command view built from whatever sections are present.
    pub fn view(&self) -> CommandView {
        match self.command() {
            CommandType::PeerGetFile => CommandView::GetFile {
                file: self.peer_file(),
                range: if self.has_byte_range() {
                    Some(self.byte_range())
                } else {
                    None
                },
            },
            CommandType::PeerSearch => CommandView::Search {
                query: self.search_string(),
            },
            CommandType::TrackerSearchResult => CommandView::SearchResult {
                files: self.search_results(),
            },
            CommandType::PeerRefresh => CommandView::Refresh {
                files: self.local_file_list(),
            },
            CommandType::PeerSignOut => CommandView::SignOut,
            CommandType::Error => CommandView::Error {
                detail: self.error_message(),
            },
            CommandType::Unset => CommandView::Unset,
        }
    }
}

/// Encode a file's scalar fields as attributes of a `PeerFile` node.
/// Size/Start/End are decimal integer attributes on both paths.
fn file_entry(file: &PeerFile) -> TreeNode {
    let mut node = TreeNode::new("PeerFile");
    node.set_attribute("Name", &file.filename);
    node.set_attribute("MD5", &file.md5);
    node.set_int_attribute("Size", clamp_u64(file.size_bytes));
    node
}

/// Decode the scalar fields of a file entry; `None` if any is missing.
fn scalar_file(entry: &TreeNode) -> Option<PeerFile> {
    let name = entry.attribute("Name")?;
    let md5 = entry.attribute("MD5")?;
    if !entry.has_attribute("Size") {
        return None;
    }
    Some(PeerFile::new(
        name,
        md5,
        entry.int_attribute("Size").max(0) as u64,
    ))
}

fn clamp_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
