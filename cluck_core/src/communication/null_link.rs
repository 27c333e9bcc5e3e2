//! An in-process link pairing two nodes directly.
//!
//! This is the reference transport: no framing, no sockets, just a call into
//! the peer node. Real transports implement the same [`CluckLink`] contract
//! and behave the way this one does with respect to source prefixing and
//! broadcast loop avoidance.

use crate::communication::link::{CluckLink, LinkId};
use crate::communication::node::CluckNode;
use crate::error::CluckResult;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// One end of an in-process node-to-node connection.
pub struct NullLink {
    node: Weak<CluckNode>,
    link_name: String,
    paired: Mutex<Option<Arc<NullLink>>>,
}

impl NullLink {
    /// Wire two nodes together. `a_name` is the name of the link as seen from
    /// `a` (messages from `a` to `b` start with it), and vice versa.
    ///
    /// ```no_run
    /// # use cluck_core::communication::{CluckNode, NullLink};
    /// let alpha = CluckNode::new();
    /// let beta = CluckNode::new();
    /// NullLink::pair(&alpha, "to-beta", &beta, "to-alpha").unwrap();
    /// // alpha can now reach anything on beta under the "to-beta/" prefix.
    /// ```
    pub fn pair(
        a: &Arc<CluckNode>,
        a_name: &str,
        b: &Arc<CluckNode>,
        b_name: &str,
    ) -> CluckResult<(Arc<NullLink>, Arc<NullLink>)> {
        let left = Arc::new(NullLink {
            node: Arc::downgrade(a),
            link_name: a_name.to_string(),
            paired: Mutex::new(None),
        });
        let right = Arc::new(NullLink {
            node: Arc::downgrade(b),
            link_name: b_name.to_string(),
            paired: Mutex::new(None),
        });
        *left.paired.lock() = Some(right.clone());
        *right.paired.lock() = Some(left.clone());
        a.add_link(a_name, left.clone())?;
        if let Err(err) = b.add_link(b_name, right.clone()) {
            // Roll back the half-wired side.
            a.retire_link(a_name);
            return Err(err);
        }
        Ok((left, right))
    }

    /// The name this end is registered under on its own node.
    pub fn link_name(&self) -> &str {
        &self.link_name
    }

    /// Receive a message from the paired end and inject it into the local
    /// node, extending the return path with this end's link name and denying
    /// re-broadcast back through this link.
    fn deliver(&self, rest: Option<&str>, source: Option<&str>, data: &[u8]) -> bool {
        let Some(node) = self.node.upgrade() else {
            return false;
        };
        let source = match source {
            Some(source) => format!("{}/{}", self.link_name, source),
            None => self.link_name.clone(),
        };
        node.transmit_with_deny(rest, Some(&source), data, Some(LinkId::of(self)));
        true
    }
}

impl CluckLink for NullLink {
    fn send(&self, rest: Option<&str>, source: Option<&str>, data: &[u8]) -> bool {
        let peer = self.paired.lock().clone();
        match peer {
            Some(peer) => peer.deliver(rest, source, data),
            // Not yet paired: swallow traffic but stay alive.
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recording {
        seen: Mutex<Vec<(Option<String>, Option<String>, Vec<u8>)>>,
    }

    impl CluckLink for Recording {
        fn send(&self, rest: Option<&str>, source: Option<&str>, data: &[u8]) -> bool {
            self.seen.lock().push((
                rest.map(str::to_string),
                source.map(str::to_string),
                data.to_vec(),
            ));
            true
        }
    }

    #[test]
    fn test_pair_routes_and_prefixes_source() {
        let alpha = CluckNode::new();
        let beta = CluckNode::new();
        NullLink::pair(&alpha, "to-beta", &beta, "to-alpha").unwrap();

        let sink = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        beta.add_link("sensor", sink.clone()).unwrap();

        alpha.transmit(Some("to-beta/sensor"), Some("ctrl"), &[7, 1]);
        let seen = sink.seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, None);
        // Return path gained the receiving end's link name.
        assert_eq!(seen[0].1, Some("to-alpha/ctrl".to_string()));
        assert_eq!(seen[0].2, vec![7, 1]);
    }

    #[test]
    fn test_none_source_becomes_bare_link_name() {
        let alpha = CluckNode::new();
        let beta = CluckNode::new();
        NullLink::pair(&alpha, "ab", &beta, "ba").unwrap();

        let sink = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        beta.add_link("x", sink.clone()).unwrap();

        alpha.transmit(Some("ab/x"), None, &[1]);
        assert_eq!(sink.seen.lock()[0].1, Some("ba".to_string()));
    }

    #[test]
    fn test_broadcast_does_not_bounce_between_nodes() {
        let alpha = CluckNode::new();
        let beta = CluckNode::new();
        NullLink::pair(&alpha, "ab", &beta, "ba").unwrap();

        let sink = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        beta.add_link("x", sink.clone()).unwrap();

        alpha.transmit(Some("*"), Some("probe"), &[0]);
        // One delivery on beta, and the broadcast did not loop back to alpha
        // and out again.
        assert_eq!(sink.seen.lock().len(), 1);
    }

    #[test]
    fn test_pair_rolls_back_when_second_name_is_taken() {
        let alpha = CluckNode::new();
        let beta = CluckNode::new();
        let sink = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        beta.add_link("busy", sink.clone()).unwrap();

        assert!(NullLink::pair(&alpha, "ok", &beta, "busy").is_err());
        // The half-registered "ok" end must not deliver anywhere.
        alpha.transmit(Some("ok/x"), None, &[1]);
        assert!(sink.seen.lock().is_empty());
    }
}
