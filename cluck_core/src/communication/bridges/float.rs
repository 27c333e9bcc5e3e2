//! Float bridges. Same shape as the boolean family, for f32 signals.

use super::{fan_out, remove_on_nack, Subscription};
use crate::channel::{FloatCell, FloatInput, FloatOutput, FloatSource};
use crate::communication::node::CluckNode;
use crate::communication::subscriber::{answer_ping, expect_tag, CluckHandler};
use crate::communication::wire::{CluckMessage, MessageTag};
use crate::error::CluckResult;
use log::error;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

struct Registry {
    node: Weak<CluckNode>,
    name: String,
    remotes: Arc<Mutex<HashSet<String>>>,
    push_current: Option<Arc<dyn FloatInput>>,
}

impl CluckHandler for Registry {
    fn receive(&self, source: Option<&str>, msg: &CluckMessage) {
        if matches!(msg, CluckMessage::NegativeAck) {
            remove_on_nack(&self.remotes, source, &self.name);
        } else if expect_tag(msg, MessageTag::FloatSubscribe, &self.name) {
            let Some(source) = source else {
                return;
            };
            self.remotes.lock().insert(source.to_string());
            if let Some(input) = &self.push_current {
                if let Some(node) = self.node.upgrade() {
                    node.transmit(
                        Some(source),
                        Some(&self.name),
                        &CluckMessage::FloatResponse(input.get()).encode(),
                    );
                }
            }
        }
    }
    fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
        answer_ping(
            &self.node,
            &self.name,
            source,
            msg,
            MessageTag::FloatSubscribe,
        );
    }
}

struct FanOut {
    node: Weak<CluckNode>,
    name: String,
    remotes: Arc<Mutex<HashSet<String>>>,
}

impl FloatOutput for FanOut {
    fn set(&self, value: f32) {
        fan_out(
            &self.node,
            &self.remotes,
            &self.name,
            &CluckMessage::FloatResponse(value).encode(),
        );
    }
}

impl CluckNode {
    /// Publish a readable float signal. New subscribers are pushed the
    /// current value as soon as they register.
    pub fn publish_float_input(
        self: &Arc<Self>,
        name: &str,
        input: Arc<dyn FloatInput>,
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

    /// Publish a producer-only float signal: no push on subscribe.
    pub fn publish_float_source(
        self: &Arc<Self>,
        name: &str,
        source: Arc<dyn FloatSource>,
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

    /// Subscribe to a remote float signal. With `subscribe_by_default` the
    /// request goes out immediately; otherwise it waits for the first
    /// watcher.
    pub fn subscribe_float_input(
        self: &Arc<Self>,
        path: &str,
        subscribe_by_default: bool,
    ) -> Arc<dyn FloatInput> {
        struct Sub {
            subscription: Subscription,
            cell: FloatCell,
        }
        impl FloatSource for Sub {
            fn watch(&self, target: Arc<dyn FloatOutput>) {
                self.cell.watch(target);
                self.subscription.ensure_sent();
            }
        }
        impl FloatInput for Sub {
            fn get(&self) -> f32 {
                self.cell.get()
            }
        }
        impl CluckHandler for Sub {
            fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
                if let CluckMessage::FloatResponse(value) = msg {
                    self.cell.set(*value);
                } else {
                    expect_tag(msg, MessageTag::FloatResponse, &self.subscription.link_name);
                }
            }
            fn receive_broadcast(&self, _source: Option<&str>, msg: &CluckMessage) {
                if matches!(msg, CluckMessage::TopologyNotify) {
                    self.subscription.resend_if_sent();
                }
            }
        }

        let sub = Arc::new(Sub {
            subscription: Subscription::new(self, "float", path, MessageTag::FloatSubscribe),
            cell: FloatCell::new(0.0),
        });
        // Attach before any request goes out so the response cannot race
        // ahead of the local registration.
        if let Err(err) = self.attach(&sub.subscription.link_name, sub.clone()) {
            error!("could not attach float subscription for '{}': {}", path, err);
        }
        if subscribe_by_default {
            sub.subscription.ensure_sent();
        }
        sub
    }

    /// Publish a writable float signal.
    pub fn publish_float_output(
        self: &Arc<Self>,
        name: &str,
        output: Arc<dyn FloatOutput>,
    ) -> CluckResult<()> {
        struct Publisher {
            node: Weak<CluckNode>,
            name: String,
            output: Arc<dyn FloatOutput>,
        }
        impl CluckHandler for Publisher {
            fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
                if let CluckMessage::FloatWrite(value) = msg {
                    self.output.set(*value);
                } else {
                    expect_tag(msg, MessageTag::FloatWrite, &self.name);
                }
            }
            fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
                answer_ping(&self.node, &self.name, source, msg, MessageTag::FloatWrite);
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

    /// Get a writable proxy for a remote float output.
    pub fn subscribe_float_output(self: &Arc<Self>, path: &str) -> Arc<dyn FloatOutput> {
        struct Proxy {
            node: Weak<CluckNode>,
            path: String,
        }
        impl FloatOutput for Proxy {
            fn set(&self, value: f32) {
                if let Some(node) = self.node.upgrade() {
                    node.transmit(
                        Some(&self.path),
                        None,
                        &CluckMessage::FloatWrite(value).encode(),
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
    use approx::assert_relative_eq;

    #[test]
    fn test_push_on_subscribe_delivers_current_value() {
        let node = CluckNode::new();
        let cell = Arc::new(FloatCell::new(2.5));
        node.publish_float_input("speed", cell.clone()).unwrap();

        let remote = node.subscribe_float_input("speed", true);
        assert_relative_eq!(remote.get(), 2.5);

        cell.set(-1.25);
        assert_relative_eq!(remote.get(), -1.25);
    }

    #[test]
    fn test_producer_variant_starts_at_default() {
        let node = CluckNode::new();
        let cell = Arc::new(FloatCell::new(2.5));
        node.publish_float_source("raw", cell.clone()).unwrap();

        let remote = node.subscribe_float_input("raw", true);
        assert_relative_eq!(remote.get(), 0.0);

        cell.set(3.0);
        assert_relative_eq!(remote.get(), 3.0);
    }

    #[test]
    fn test_write_proxy_reaches_published_output() {
        let node = CluckNode::new();
        let cell = Arc::new(FloatCell::new(0.0));
        node.publish_float_output("motor", cell.clone()).unwrap();

        let proxy = node.subscribe_float_output("motor");
        proxy.set(0.75);
        assert_relative_eq!(cell.get(), 0.75);
    }

    #[test]
    fn test_lazy_subscription_triggers_on_first_watcher() {
        let node = CluckNode::new();
        let cell = Arc::new(FloatCell::new(9.0));
        node.publish_float_input("speed", cell.clone()).unwrap();

        let remote = node.subscribe_float_input("speed", false);
        assert_relative_eq!(remote.get(), 0.0);

        remote.watch(Arc::new(|_: f32| {}));
        assert_relative_eq!(remote.get(), 9.0);
    }
}
