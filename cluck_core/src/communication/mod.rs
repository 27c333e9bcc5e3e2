//! # The bus itself
//!
//! [`CluckNode`] routes `/`-separated paths across named links;
//! [`NullLink`] wires two in-process nodes together; the subscriber layer
//! decodes payloads once and dispatches them to attached handlers; the
//! bridges publish the channel primitives over the bus; [`rpc`] and
//! [`discovery`] build request/reply and enumeration on top.

pub mod bridges;
pub mod discovery;
pub mod link;
pub mod node;
pub mod null_link;
pub mod rpc;
pub mod subscriber;
pub mod wire;

pub use discovery::{RemoteListener, RemoteSearch};
pub use link::{CluckLink, LinkEntry, LinkId};
pub use node::CluckNode;
pub use null_link::NullLink;
pub use rpc::{spawn_rpc_timeout_sweeper, RemoteProcedure, ReplyOutput};
pub use subscriber::CluckHandler;
pub use wire::{CluckMessage, MessageTag, WireError};
