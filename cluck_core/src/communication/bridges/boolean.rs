//! Boolean bridges: readable/watchable signals and one-way writes.

use super::{fan_out, remove_on_nack, Subscription};
use crate::channel::{BooleanCell, BooleanInput, BooleanOutput, BooleanSource};
use crate::communication::node::CluckNode;
use crate::communication::subscriber::{answer_ping, expect_tag, CluckHandler};
use crate::communication::wire::{CluckMessage, MessageTag};
use crate::error::CluckResult;
use log::error;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// Publisher-side registry handler shared by the two input variants. When
/// `push_current` is set, a new registrant immediately receives the current
/// value, before any subsequent update.
struct Registry {
    node: Weak<CluckNode>,
    name: String,
    remotes: Arc<Mutex<HashSet<String>>>,
    push_current: Option<Arc<dyn BooleanInput>>,
}

impl CluckHandler for Registry {
    fn receive(&self, source: Option<&str>, msg: &CluckMessage) {
        if matches!(msg, CluckMessage::NegativeAck) {
            remove_on_nack(&self.remotes, source, &self.name);
        } else if expect_tag(msg, MessageTag::BoolSubscribe, &self.name) {
            let Some(source) = source else {
                return;
            };
            self.remotes.lock().insert(source.to_string());
            if let Some(input) = &self.push_current {
                if let Some(node) = self.node.upgrade() {
                    node.transmit(
                        Some(source),
                        Some(&self.name),
                        &CluckMessage::BoolResponse(input.get()).encode(),
                    );
                }
            }
        }
    }
    fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
        answer_ping(&self.node, &self.name, source, msg, MessageTag::BoolSubscribe);
    }
}

/// Fan-out watcher wired onto the published signal.
struct FanOut {
    node: Weak<CluckNode>,
    name: String,
    remotes: Arc<Mutex<HashSet<String>>>,
}

impl BooleanOutput for FanOut {
    fn set(&self, value: bool) {
        fan_out(
            &self.node,
            &self.remotes,
            &self.name,
            &CluckMessage::BoolResponse(value).encode(),
        );
    }
}

impl CluckNode {
    /// Publish a readable boolean signal. New subscribers are pushed the
    /// current value as soon as they register.
    pub fn publish_bool_input(
        self: &Arc<Self>,
        name: &str,
        input: Arc<dyn BooleanInput>,
    ) -> CluckResult<()> {
        let remotes: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        input.watch(Arc::new(FanOut {
            node: Arc::downgrade(self),
            name: name.to_string(),
            remotes: remotes.clone(),
        }));
        self.attach(
            name,
            Arc::new(Registry {
                node: Arc::downgrade(self),
                name: name.to_string(),
                remotes,
                push_current: Some(input),
            }),
        )
    }

    /// Publish a producer-only boolean signal: subscribers receive changes
    /// from the moment they register, with no initial push.
    pub fn publish_bool_source(
        self: &Arc<Self>,
        name: &str,
        source: Arc<dyn BooleanSource>,
    ) -> CluckResult<()> {
        let remotes: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        source.watch(Arc::new(FanOut {
            node: Arc::downgrade(self),
            name: name.to_string(),
            remotes: remotes.clone(),
        }));
        self.attach(
            name,
            Arc::new(Registry {
                node: Arc::downgrade(self),
                name: name.to_string(),
                remotes,
                push_current: None,
            }),
        )
    }

    /// Subscribe to a remote boolean signal. With `subscribe_by_default` the
    /// request goes out immediately; otherwise `get` returns the default
    /// until the first watcher attaches and triggers the subscription.
    pub fn subscribe_bool_input(
        self: &Arc<Self>,
        path: &str,
        subscribe_by_default: bool,
    ) -> Arc<dyn BooleanInput> {
        struct Sub {
            subscription: Subscription,
            cell: BooleanCell,
        }
        impl BooleanSource for Sub {
            fn watch(&self, target: Arc<dyn BooleanOutput>) {
                self.cell.watch(target);
                self.subscription.ensure_sent();
            }
        }
        impl BooleanInput for Sub {
            fn get(&self) -> bool {
                self.cell.get()
            }
        }
        impl CluckHandler for Sub {
            fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
                if let CluckMessage::BoolResponse(value) = msg {
                    self.cell.set(*value);
                } else {
                    expect_tag(msg, MessageTag::BoolResponse, &self.subscription.link_name);
                }
            }
            fn receive_broadcast(&self, _source: Option<&str>, msg: &CluckMessage) {
                if matches!(msg, CluckMessage::TopologyNotify) {
                    self.subscription.resend_if_sent();
                }
            }
        }

        let sub = Arc::new(Sub {
            subscription: Subscription::new(self, "bool", path, MessageTag::BoolSubscribe),
            cell: BooleanCell::new(false),
        });
        // Attach before any request goes out so the response cannot race
        // ahead of the local registration.
        if let Err(err) = self.attach(&sub.subscription.link_name, sub.clone()) {
            error!("could not attach boolean subscription for '{}': {}", path, err);
        }
        if subscribe_by_default {
            sub.subscription.ensure_sent();
        }
        sub
    }

    /// Publish a writable boolean signal.
    pub fn publish_bool_output(
        self: &Arc<Self>,
        name: &str,
        output: Arc<dyn BooleanOutput>,
    ) -> CluckResult<()> {
        struct Publisher {
            node: Weak<CluckNode>,
            name: String,
            output: Arc<dyn BooleanOutput>,
        }
        impl CluckHandler for Publisher {
            fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
                if let CluckMessage::BoolWrite(value) = msg {
                    self.output.set(*value);
                } else {
                    expect_tag(msg, MessageTag::BoolWrite, &self.name);
                }
            }
            fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
                answer_ping(&self.node, &self.name, source, msg, MessageTag::BoolWrite);
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

    /// Get a writable proxy for a remote boolean output.
    pub fn subscribe_bool_output(self: &Arc<Self>, path: &str) -> Arc<dyn BooleanOutput> {
        struct Proxy {
            node: Weak<CluckNode>,
            path: String,
        }
        impl BooleanOutput for Proxy {
            fn set(&self, value: bool) {
                if let Some(node) = self.node.upgrade() {
                    node.transmit(
                        Some(&self.path),
                        None,
                        &CluckMessage::BoolWrite(value).encode(),
                    );
                }
            }
        }
        Arc::new(Proxy {
            node: Arc::downgrade(self),
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_on_subscribe_delivers_current_value_first() {
        let node = CluckNode::new();
        let cell = Arc::new(BooleanCell::new(true));
        node.publish_bool_input("armed", cell.clone()).unwrap();

        let remote = node.subscribe_bool_input("armed", true);
        // The current value arrived with the subscription, before any write.
        assert!(remote.get());

        cell.set(false);
        assert!(!remote.get());
    }

    #[test]
    fn test_producer_variant_never_pushes_on_subscribe() {
        let node = CluckNode::new();
        let cell = Arc::new(BooleanCell::new(true));
        node.publish_bool_source("raw", cell.clone()).unwrap();

        let remote = node.subscribe_bool_input("raw", true);
        // No push: the subscriber still holds its default.
        assert!(!remote.get());

        cell.set(false);
        cell.set(true);
        assert!(remote.get());
    }

    #[test]
    fn test_lazy_subscription_waits_for_first_watcher() {
        let node = CluckNode::new();
        let cell = Arc::new(BooleanCell::new(true));
        node.publish_bool_input("armed", cell.clone()).unwrap();

        let remote = node.subscribe_bool_input("armed", false);
        assert!(!remote.get());

        remote.watch(Arc::new(|_: bool| {}));
        assert!(remote.get());
    }

    #[test]
    fn test_write_proxy_reaches_published_output() {
        let node = CluckNode::new();
        let cell = Arc::new(BooleanCell::new(false));
        node.publish_bool_output("led", cell.clone()).unwrap();

        let proxy = node.subscribe_bool_output("led");
        proxy.set(true);
        assert!(cell.get());
    }

    #[test]
    fn test_negative_ack_unsubscribes_dead_remote() {
        use crate::communication::link::CluckLink;
        use crate::communication::wire::{CluckMessage, MessageTag};

        struct Recording {
            seen: Mutex<Vec<Vec<u8>>>,
        }
        impl CluckLink for Recording {
            fn send(&self, _rest: Option<&str>, _source: Option<&str>, data: &[u8]) -> bool {
                self.seen.lock().push(data.to_vec());
                true
            }
        }

        let node = CluckNode::new();
        let cell = Arc::new(BooleanCell::new(false));
        node.publish_bool_source("flag", cell.clone()).unwrap();

        let sink = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        node.add_link("return-addr", sink.clone()).unwrap();
        node.transmit(Some("flag"), Some("return-addr"), &[
            MessageTag::BoolSubscribe as u8,
        ]);

        cell.set(true);
        assert_eq!(
            sink.seen.lock().as_slice(),
            &[CluckMessage::BoolResponse(true).encode()]
        );

        // Kill the return address; the next fan-out bounces and the
        // resulting negative-ack drops the registrant.
        node.retire_link("return-addr");
        cell.set(false);

        // A fresh link under the same name sees nothing: the registry no
        // longer carries that address.
        let fresh = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        node.add_link("return-addr", fresh.clone()).unwrap();
        cell.set(true);
        assert!(fresh.seen.lock().is_empty());
    }
}
