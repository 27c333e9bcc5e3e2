//! Logging bridges: ship leveled log records to a remote sink.

use crate::channel::{LogLevel, LogTarget};
use crate::communication::node::CluckNode;
use crate::communication::subscriber::{answer_ping, expect_tag, CluckHandler};
use crate::communication::wire::{CluckMessage, MessageTag};
use crate::error::CluckResult;
use std::sync::{Arc, Weak};

impl CluckNode {
    /// Publish a log sink under a name. Remote writers send records to the
    /// path and they land in `target`.
    pub fn publish_log_target(
        self: &Arc<Self>,
        name: &str,
        target: Arc<dyn LogTarget>,
    ) -> CluckResult<()> {
        struct Publisher {
            node: Weak<CluckNode>,
            name: String,
            target: Arc<dyn LogTarget>,
        }
        impl CluckHandler for Publisher {
            fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
                if let CluckMessage::Log {
                    level,
                    message,
                    extended,
                } = msg
                {
                    self.target.log(*level, message, extended.as_deref());
                } else {
                    expect_tag(msg, MessageTag::Log, &self.name);
                }
            }
            fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
                answer_ping(&self.node, &self.name, source, msg, MessageTag::Log);
            }
        }
        self.attach(
            name,
            Arc::new(Publisher {
                node: Arc::downgrade(self),
                name: name.to_string(),
                target,
            }),
        )
    }

    /// Get a [`LogTarget`] forwarding to a remote sink. Records below
    /// `minimum` are dropped locally and never touch the wire.
    pub fn subscribe_log_target(
        self: &Arc<Self>,
        path: &str,
        minimum: LogLevel,
    ) -> Arc<dyn LogTarget> {
        struct Proxy {
            node: Weak<CluckNode>,
            path: String,
            minimum: LogLevel,
        }
        impl LogTarget for Proxy {
            fn log(&self, level: LogLevel, message: &str, extended: Option<&str>) {
                if !level.at_least(self.minimum) {
                    return;
                }
                if let Some(node) = self.node.upgrade() {
                    node.transmit(
                        Some(&self.path),
                        None,
                        &CluckMessage::Log {
                            level,
                            message: message.to_string(),
                            extended: extended.map(str::to_string),
                        }
                        .encode(),
                    );
                }
            }
        }
        Arc::new(Proxy {
            node: Arc::downgrade(self),
            path: path.to_string(),
            minimum,
        })
    }
}
