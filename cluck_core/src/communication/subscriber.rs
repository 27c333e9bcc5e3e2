//! The dispatch contract between the router and everything above it.
//!
//! A handler attaches to a node under a local address and sees incoming
//! traffic split three ways:
//!
//! - **direct**: addressed exactly to the local name, no path remainder
//! - **broadcast**: arrived via `*`
//! - **other**: addressed to a sub-path under the local name (used by RPC to
//!   demultiplex per-call reply sinks)
//!
//! Payloads are decoded once here; handlers work on [`CluckMessage`] values
//! and a bad payload can never take the dispatch loop down.

use crate::communication::link::CluckLink;
use crate::communication::node::CluckNode;
use crate::communication::wire::{CluckMessage, MessageTag};
use crate::error::CluckResult;
use log::warn;
use std::sync::{Arc, Weak};

/// A listener for traffic addressed to one local name.
pub trait CluckHandler: Send + Sync {
    /// A message addressed exactly to this local name.
    fn receive(&self, source: Option<&str>, msg: &CluckMessage);

    /// A message that arrived via broadcast.
    fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage);

    /// A message addressed to `local_name/dest`. Most handlers have no
    /// sub-addresses.
    fn handle_other(&self, dest: &str, source: Option<&str>, msg: &CluckMessage) {
        let _ = source;
        warn!(
            "unhandled sub-addressed {} message for '{}'",
            msg.tag().name(),
            dest
        );
    }
}

/// Adapter registering a handler as a link in the node's table.
struct HandlerLink {
    local_name: String,
    handler: Arc<dyn CluckHandler>,
}

impl CluckLink for HandlerLink {
    fn send(&self, rest: Option<&str>, source: Option<&str>, data: &[u8]) -> bool {
        let msg = match CluckMessage::decode(data) {
            Ok(msg) => msg,
            Err(err) => {
                warn!("dropping undecodable message for '{}': {}", self.local_name, err);
                return true;
            }
        };
        match rest {
            None => self.handler.receive(source, &msg),
            Some("*") => self.handler.receive_broadcast(source, &msg),
            Some(dest) => self.handler.handle_other(dest, source, &msg),
        }
        true
    }
}

impl CluckNode {
    /// Attach a handler at a local address. Fails if the name is occupied by
    /// a live link.
    pub fn attach(&self, name: &str, handler: Arc<dyn CluckHandler>) -> CluckResult<()> {
        self.add_link(
            name,
            Arc::new(HandlerLink {
                local_name: name.to_string(),
                handler,
            }),
        )
    }
}

/// Guard an inbound message against the tag a handler expects.
///
/// A negative-ack is a routine cancellation and is swallowed silently; any
/// other mismatch is logged and dropped.
pub fn expect_tag(msg: &CluckMessage, expected: MessageTag, local_name: &str) -> bool {
    let tag = msg.tag();
    if tag == expected {
        true
    } else {
        if tag != MessageTag::NegativeAck {
            warn!(
                "'{}' expected {} but received {}",
                local_name,
                expected.name(),
                tag.name()
            );
        }
        false
    }
}

/// Standard broadcast behavior for a published object: answer a ping probe
/// directly to its source with this object's role tag so discovery can
/// enumerate it.
pub fn answer_ping(
    node: &Weak<CluckNode>,
    local_name: &str,
    source: Option<&str>,
    msg: &CluckMessage,
    role: MessageTag,
) {
    if let (CluckMessage::Ping, Some(source)) = (msg, source) {
        if let Some(node) = node.upgrade() {
            node.transmit(
                Some(source),
                Some(local_name),
                &CluckMessage::PingReply { role: role as u8 }.encode(),
            );
        }
    }
}
