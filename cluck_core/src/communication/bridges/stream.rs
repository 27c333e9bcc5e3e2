//! Stream bridges: raw byte chunks to a remote sink.

use crate::channel::StreamSink;
use crate::communication::node::CluckNode;
use crate::communication::subscriber::{answer_ping, expect_tag, CluckHandler};
use crate::communication::wire::{CluckMessage, MessageTag};
use crate::error::CluckResult;
use std::sync::{Arc, Weak};

impl CluckNode {
    /// Publish a byte sink under a name.
    pub fn publish_stream(
        self: &Arc<Self>,
        name: &str,
        sink: Arc<dyn StreamSink>,
    ) -> CluckResult<()> {
        struct Publisher {
            node: Weak<CluckNode>,
            name: String,
            sink: Arc<dyn StreamSink>,
        }
        impl CluckHandler for Publisher {
            fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
                if let CluckMessage::StreamChunk(bytes) = msg {
                    self.sink.write(bytes);
                } else {
                    expect_tag(msg, MessageTag::StreamChunk, &self.name);
                }
            }
            fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
                answer_ping(&self.node, &self.name, source, msg, MessageTag::StreamChunk);
            }
        }
        self.attach(
            name,
            Arc::new(Publisher {
                node: Arc::downgrade(self),
                name: name.to_string(),
                sink,
            }),
        )
    }

    /// Get a sink forwarding chunks to a remote stream. Empty writes are
    /// dropped locally.
    pub fn subscribe_stream(self: &Arc<Self>, path: &str) -> Arc<dyn StreamSink> {
        struct Proxy {
            node: Weak<CluckNode>,
            path: String,
        }
        impl StreamSink for Proxy {
            fn write(&self, data: &[u8]) {
                if data.is_empty() {
                    return;
                }
                if let Some(node) = self.node.upgrade() {
                    node.transmit(
                        Some(&self.path),
                        None,
                        &CluckMessage::StreamChunk(data.to_vec()).encode(),
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
