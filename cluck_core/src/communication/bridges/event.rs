//! Event bridges: fire-and-forget notifications across the bus.

use super::{fan_out, remove_on_nack, Subscription};
use crate::channel::{EventCell, EventInput, EventOutput};
use crate::communication::node::CluckNode;
use crate::communication::subscriber::{answer_ping, expect_tag, CluckHandler};
use crate::communication::wire::{CluckMessage, MessageTag};
use crate::error::CluckResult;
use log::error;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

impl CluckNode {
    /// Publish a fireable event under a name. Remote subscribers firing the
    /// path fire the local output.
    pub fn publish_event_output(
        self: &Arc<Self>,
        name: &str,
        output: Arc<dyn EventOutput>,
    ) -> CluckResult<()> {
        struct Publisher {
            node: Weak<CluckNode>,
            name: String,
            output: Arc<dyn EventOutput>,
        }
        impl CluckHandler for Publisher {
            fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
                if expect_tag(msg, MessageTag::EventFire, &self.name) {
                    self.output.fire();
                }
            }
            fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
                answer_ping(&self.node, &self.name, source, msg, MessageTag::EventFire);
            }
        }
        self.attach(
            name,
            Arc::new(Publisher {
                node: Arc::downgrade(self),
                name: name.to_string(),
                output,
            }),
        )
    }

    /// Get a fireable proxy for a remote event output.
    pub fn subscribe_event_output(self: &Arc<Self>, path: &str) -> Arc<dyn EventOutput> {
        struct Proxy {
            node: Weak<CluckNode>,
            path: String,
        }
        impl EventOutput for Proxy {
            fn fire(&self) {
                if let Some(node) = self.node.upgrade() {
                    node.transmit(Some(&self.path), None, &CluckMessage::EventFire.encode());
                }
            }
        }
        Arc::new(Proxy {
            node: Arc::downgrade(self),
            path: path.to_string(),
        })
    }

    /// Publish an event source under a name: every occurrence is fanned out
    /// to the registered remote subscribers.
    pub fn publish_event_input(
        self: &Arc<Self>,
        name: &str,
        input: Arc<dyn EventInput>,
    ) -> CluckResult<()> {
        let remotes: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        struct FanOut {
            node: Weak<CluckNode>,
            name: String,
            remotes: Arc<Mutex<HashSet<String>>>,
        }
        impl EventOutput for FanOut {
            fn fire(&self) {
                fan_out(
                    &self.node,
                    &self.remotes,
                    &self.name,
                    &CluckMessage::EventResponse.encode(),
                );
            }
        }
        input.listen(Arc::new(FanOut {
            node: Arc::downgrade(self),
            name: name.to_string(),
            remotes: remotes.clone(),
        }));

        struct Registry {
            node: Weak<CluckNode>,
            name: String,
            remotes: Arc<Mutex<HashSet<String>>>,
        }
        impl CluckHandler for Registry {
            fn receive(&self, source: Option<&str>, msg: &CluckMessage) {
                if matches!(msg, CluckMessage::NegativeAck) {
                    remove_on_nack(&self.remotes, source, &self.name);
                } else if expect_tag(msg, MessageTag::EventSubscribe, &self.name) {
                    if let Some(source) = source {
                        self.remotes.lock().insert(source.to_string());
                    }
                }
            }
            fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
                answer_ping(
                    &self.node,
                    &self.name,
                    source,
                    msg,
                    MessageTag::EventSubscribe,
                );
            }
        }
        self.attach(
            name,
            Arc::new(Registry {
                node: Arc::downgrade(self),
                name: name.to_string(),
                remotes,
            }),
        )
    }

    /// Subscribe to a remote event source. The subscribe request goes out
    /// lazily, when the first listener attaches.
    pub fn subscribe_event_input(self: &Arc<Self>, path: &str) -> Arc<dyn EventInput> {
        struct Sub {
            subscription: Subscription,
            cell: EventCell,
        }
        impl EventInput for Sub {
            fn listen(&self, listener: Arc<dyn EventOutput>) {
                self.cell.listen(listener);
                self.subscription.ensure_sent();
            }
        }
        impl CluckHandler for Sub {
            fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
                if expect_tag(msg, MessageTag::EventResponse, &self.subscription.link_name) {
                    self.cell.fire_all();
                }
            }
            fn receive_broadcast(&self, _source: Option<&str>, msg: &CluckMessage) {
                if matches!(msg, CluckMessage::TopologyNotify) {
                    self.subscription.resend_if_sent();
                }
            }
        }

        let sub = Arc::new(Sub {
            subscription: Subscription::new(self, "event", path, MessageTag::EventSubscribe),
            cell: EventCell::new(),
        });
        if let Err(err) = self.attach(&sub.subscription.link_name, sub.clone()) {
            error!("could not attach event subscription for '{}': {}", path, err);
        }
        sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fire_proxy_reaches_published_output() {
        let node = CluckNode::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        node.publish_event_output(
            "beep",
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        let proxy = node.subscribe_event_output("beep");
        proxy.fire();
        proxy.fire();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_source_fanout_requires_subscription() {
        let node = CluckNode::new();
        let source = Arc::new(EventCell::new());
        node.publish_event_input("tick", source.clone()).unwrap();

        let remote = node.subscribe_event_input("tick");
        let count = Arc::new(AtomicUsize::new(0));

        // Nobody listening yet, so no subscribe went out.
        source.fire_all();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let c = count.clone();
        remote.listen(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        source.fire_all();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resubscribes_after_topology_notify() {
        let node = CluckNode::new();
        let source = Arc::new(EventCell::new());
        node.publish_event_input("tick", source.clone()).unwrap();

        let remote = node.subscribe_event_input("tick");
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        remote.listen(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        // Simulate the publisher losing its registry across a reconnect: a
        // fresh publisher takes over the name with an empty registry.
        let fresh = Arc::new(EventCell::new());
        node.retire_link("tick");
        node.publish_event_input("tick", fresh.clone()).unwrap();
        fresh.fire_all();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        node.notify_topology_changed();
        fresh.fire_all();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
