//! Remote discovery: enumerate published objects reachable from a node.
//!
//! A search broadcasts a ping; every published bridge answers directly to
//! the search's return address with its role tag. The answering path, as
//! seen from this node, is exactly the path a subscriber would use to reach
//! the object.

use crate::communication::node::CluckNode;
use crate::communication::subscriber::CluckHandler;
use crate::communication::wire::{CluckMessage, MessageTag};
use crate::error::CluckResult;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

/// Receives discovery answers as they arrive.
pub trait RemoteListener: Send + Sync {
    /// `remote` is the reachable path of the object, `role` its subscribe
    /// tag byte.
    fn handle(&self, remote: &str, role: u8);
}

impl<F: Fn(&str, u8) + Send + Sync> RemoteListener for F {
    fn handle(&self, remote: &str, role: u8) {
        self(remote, role)
    }
}

struct SearchHandler {
    listener: Arc<dyn RemoteListener>,
}

impl CluckHandler for SearchHandler {
    fn receive(&self, source: Option<&str>, msg: &CluckMessage) {
        if let (CluckMessage::PingReply { role }, Some(source)) = (msg, source) {
            self.listener.handle(source, *role);
        }
    }
    // Our own probe comes back through here; nothing to do with it.
    fn receive_broadcast(&self, _source: Option<&str>, _msg: &CluckMessage) {}
}

/// An ongoing discovery round. Dropping it detaches the return address.
pub struct RemoteSearch {
    node: Weak<CluckNode>,
    link_name: String,
}

impl RemoteSearch {
    /// Broadcast another probe. Answers keep flowing to the same listener,
    /// so a long-lived search can track topology as it changes.
    pub fn cycle(&self) {
        if let Some(node) = self.node.upgrade() {
            node.transmit(Some("*"), Some(&self.link_name), &[MessageTag::Ping as u8]);
        }
    }
}

impl Drop for RemoteSearch {
    fn drop(&mut self) {
        if let Some(node) = self.node.upgrade() {
            node.retire_link(&self.link_name);
        }
    }
}

impl CluckNode {
    /// Start a discovery round: attach a return address for answers and send
    /// the first probe.
    pub fn start_search_remotes(
        self: &Arc<Self>,
        listener: Arc<dyn RemoteListener>,
    ) -> CluckResult<RemoteSearch> {
        let link_name = format!("rsch-{:x}", self.next_local_id());
        self.attach(&link_name, Arc::new(SearchHandler { listener }))?;
        let search = RemoteSearch {
            node: Arc::downgrade(self),
            link_name,
        };
        search.cycle();
        Ok(search)
    }

    /// Collect the objects reachable within `timeout`, optionally filtered
    /// by role tag. Blocks the calling thread for the whole window.
    pub fn search_remotes(
        self: &Arc<Self>,
        role: Option<u8>,
        timeout: Duration,
    ) -> CluckResult<Vec<String>> {
        let found: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = found.clone();
        let search = self.start_search_remotes(Arc::new(move |remote: &str, answered: u8| {
            if role.is_none() || role == Some(answered) {
                sink.lock().push(remote.to_string());
            }
        }))?;
        thread::sleep(timeout);
        drop(search);
        let mut remotes = found.lock().clone();
        remotes.sort();
        remotes.dedup();
        Ok(remotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::BooleanCell;
    use crate::communication::wire::MessageTag;

    #[test]
    fn test_search_finds_published_objects() {
        let node = CluckNode::new();
        node.publish_bool_output("led", Arc::new(BooleanCell::new(false)))
            .unwrap();
        node.publish_bool_input("flag", Arc::new(BooleanCell::new(false)))
            .unwrap();

        let remotes = node.search_remotes(None, Duration::from_millis(1)).unwrap();
        assert_eq!(remotes, vec!["flag".to_string(), "led".to_string()]);
    }

    #[test]
    fn test_role_filter_excludes_other_kinds() {
        let node = CluckNode::new();
        node.publish_bool_output("led", Arc::new(BooleanCell::new(false)))
            .unwrap();
        node.publish_bool_input("flag", Arc::new(BooleanCell::new(false)))
            .unwrap();

        let remotes = node
            .search_remotes(
                Some(MessageTag::BoolSubscribe as u8),
                Duration::from_millis(1),
            )
            .unwrap();
        assert_eq!(remotes, vec!["flag".to_string()]);
    }

    #[test]
    fn test_cycle_repeats_the_probe_and_drop_detaches() {
        let node = CluckNode::new();
        node.publish_bool_output("led", Arc::new(BooleanCell::new(false)))
            .unwrap();

        let found: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = found.clone();
        let search = node
            .start_search_remotes(Arc::new(move |remote: &str, _role: u8| {
                sink.lock().push(remote.to_string());
            }))
            .unwrap();
        search.cycle();
        assert_eq!(found.lock().len(), 2);

        drop(search);
        // Detached: published objects answering a fresh probe from elsewhere
        // cannot reach the old address anymore, and nothing accumulates.
        node.notify_topology_changed();
        assert_eq!(found.lock().len(), 2);
    }
}
