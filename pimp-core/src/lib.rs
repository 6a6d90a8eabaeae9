//! PimpMyP2P control protocol reference implementation.
//! Pure message core: hosts own the sockets and pass wire text in and out.

pub mod message;
pub mod peer_file;
pub mod transport;
pub mod tree;

pub use message::{CommandType, CommandView, PimpMessage};
pub use peer_file::{ByteRange, PeerFile};
pub use transport::MessageSink;
pub use tree::{ParseError, TreeNode};
