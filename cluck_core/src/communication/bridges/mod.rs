//! # Typed channel bridges
//!
//! Paired publish/subscribe functions over the router, one family per
//! payload kind:
//!
//! - **event**: fire-and-forget notifications
//! - **boolean / float**: signals, in push-on-subscribe and producer-only
//!   variants plus one-way writes
//! - **logging**: leveled log records
//! - **stream**: raw byte chunks
//!
//! All fan-out families share one pattern: the publisher keeps a remote
//! registry of subscriber return addresses; a subscriber sends a one-shot
//! subscribe request (eagerly or on first listener) and is dropped from the
//! registry when a negative-ack arrives from its address; on a
//! topology-notify broadcast a subscriber that had subscribed re-asserts its
//! interest.

pub mod boolean;
pub mod event;
pub mod float;
pub mod logging;
pub mod stream;

use crate::communication::node::CluckNode;
use crate::communication::wire::MessageTag;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Remove a registrant on receipt of a negative-ack from its address.
fn remove_on_nack(remotes: &Mutex<HashSet<String>>, source: Option<&str>, name: &str) {
    let Some(source) = source else {
        warn!("cancellation with no source on '{}'", name);
        return;
    };
    if remotes.lock().remove(source) {
        info!("subscription from '{}' on '{}' cancelled", source, name);
    } else {
        warn!("cancellation for unknown subscriber '{}' on '{}'", source, name);
    }
}

/// Fan a payload out to every registered remote.
fn fan_out(
    node: &Weak<CluckNode>,
    remotes: &Mutex<HashSet<String>>,
    local_name: &str,
    payload: &[u8],
) {
    let Some(node) = node.upgrade() else {
        return;
    };
    let targets: Vec<String> = remotes.lock().iter().cloned().collect();
    for target in targets {
        node.transmit(Some(&target), Some(local_name), payload);
    }
}

/// Client-side subscription bookkeeping shared by all bridge families: a
/// generated local return address, the subscribe request to (re)send, and
/// whether it has been sent yet.
struct Subscription {
    node: Weak<CluckNode>,
    path: String,
    link_name: String,
    request: MessageTag,
    sent: AtomicBool,
}

impl Subscription {
    fn new(node: &Arc<CluckNode>, kind: &str, path: &str, request: MessageTag) -> Subscription {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        let link_name = format!(
            "sub-{}-{:x}-{}",
            kind,
            hasher.finish() as u32,
            node.next_local_id()
        );
        Subscription {
            node: Arc::downgrade(node),
            path: path.to_string(),
            link_name,
            request,
            sent: AtomicBool::new(false),
        }
    }

    /// Send the subscribe request if it has not gone out yet.
    fn ensure_sent(&self) {
        if !self.sent.swap(true, Ordering::SeqCst) {
            self.send_request();
        }
    }

    fn send_request(&self) {
        if let Some(node) = self.node.upgrade() {
            node.transmit(
                Some(&self.path),
                Some(&self.link_name),
                &[self.request as u8],
            );
        }
    }

    /// Topology changed: re-assert interest, but only if we had asserted it
    /// in the first place.
    fn resend_if_sent(&self) {
        if self.sent.load(Ordering::SeqCst) {
            self.send_request();
        }
    }
}
