//! Remote procedure calls over the bus.
//!
//! A server publishes a [`RemoteProcedure`] under a name. A client gets a
//! proxy for the path; each invocation carries a generated correlation
//! address under the client's per-node reply endpoint, and the server's
//! reply (or a negative-ack, or a timeout sweep) resolves it. Replies are
//! streamed into a [`ReplyOutput`] and finished with a consuming `close`, so
//! a reply cannot be completed twice.

use crate::communication::node::CluckNode;
use crate::communication::subscriber::{answer_ping, expect_tag, CluckHandler};
use crate::communication::wire::{CluckMessage, MessageTag};
use crate::error::CluckResult;
use log::warn;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Streaming sink for one procedure reply. Data written before `close` is
/// delivered as a single reply body.
pub trait ReplyOutput: Send {
    fn write(&mut self, data: &[u8]);

    /// Finish the reply. Consuming `self` makes a double-close impossible.
    fn close(self: Box<Self>);
}

/// A procedure invokable across the bus. The implementation must eventually
/// close `reply`, even on failure, or the caller waits for its timeout.
pub trait RemoteProcedure: Send + Sync {
    fn invoke(&self, args: &[u8], reply: Box<dyn ReplyOutput>);
}

impl<F: Fn(&[u8], Box<dyn ReplyOutput>) + Send + Sync> RemoteProcedure for F {
    fn invoke(&self, args: &[u8], reply: Box<dyn ReplyOutput>) {
        self(args, reply)
    }
}

/// Per-node client-side call state, owned by the node.
#[derive(Default)]
pub(crate) struct RpcState {
    /// Local address of the reply endpoint, once one exists.
    binding: Mutex<Option<String>>,
    /// In-flight calls keyed by correlation name.
    pending: Mutex<HashMap<String, PendingCall>>,
}

struct PendingCall {
    sink: Box<dyn ReplyOutput>,
    deadline: Instant,
}

/// Server-side reply sink sending the accumulated body back to the caller's
/// correlation address when closed.
struct NetworkReply {
    node: Weak<CluckNode>,
    target: String,
    local_name: String,
    buf: Vec<u8>,
    closed: bool,
}

impl ReplyOutput for NetworkReply {
    fn write(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn close(mut self: Box<Self>) {
        self.closed = true;
        if let Some(node) = self.node.upgrade() {
            node.transmit(
                Some(&self.target),
                Some(&self.local_name),
                &CluckMessage::InvokeReply(std::mem::take(&mut self.buf)).encode(),
            );
        }
    }
}

impl Drop for NetworkReply {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "reply for '{}' toward '{}' dropped without being closed",
                self.local_name, self.target
            );
        }
    }
}

/// Client-side reply endpoint demultiplexing per-call replies by the
/// sub-address they arrive under.
struct Endpoint {
    node: Weak<CluckNode>,
    name: String,
}

impl Endpoint {
    fn resolve(&self, corr: &str) -> Option<PendingCall> {
        let node = self.node.upgrade()?;
        node.sweep_rpc_timeouts();
        let pending = node.rpc.pending.lock().remove(corr);
        pending
    }
}

impl CluckHandler for Endpoint {
    fn receive(&self, _source: Option<&str>, msg: &CluckMessage) {
        expect_tag(msg, MessageTag::InvokeReply, &self.name);
    }

    fn receive_broadcast(&self, _source: Option<&str>, _msg: &CluckMessage) {}

    fn handle_other(&self, dest: &str, _source: Option<&str>, msg: &CluckMessage) {
        match msg {
            CluckMessage::InvokeReply(body) => {
                if let Some(mut call) = self.resolve(dest) {
                    call.sink.write(body);
                    call.sink.close();
                } else {
                    warn!("reply for unknown or expired call '{}'", dest);
                }
            }
            // The callee vanished: resolve the call empty.
            CluckMessage::NegativeAck => {
                if let Some(call) = self.resolve(dest) {
                    call.sink.close();
                }
            }
            other => {
                warn!("unexpected {} for call '{}'", other.tag().name(), dest);
            }
        }
    }
}

/// Client proxy for one remote procedure path.
struct RemoteProxy {
    node: Weak<CluckNode>,
    path: String,
    timeout: Duration,
}

impl RemoteProcedure for RemoteProxy {
    fn invoke(&self, args: &[u8], reply: Box<dyn ReplyOutput>) {
        let Some(node) = self.node.upgrade() else {
            reply.close();
            return;
        };
        // Expired calls from earlier traffic get resolved opportunistically.
        node.sweep_rpc_timeouts();
        let binding = match node.rpc_binding() {
            Ok(binding) => binding,
            Err(err) => {
                warn!("cannot invoke '{}': {}", self.path, err);
                reply.close();
                return;
            }
        };
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64 & 0xffff)
            .unwrap_or(0);
        let corr = format!(
            "{}-{:x}-{:x}",
            self.path.replace('/', "-"),
            node.next_local_id(),
            stamp
        );
        node.rpc.pending.lock().insert(
            corr.clone(),
            PendingCall {
                sink: reply,
                deadline: Instant::now() + self.timeout,
            },
        );
        node.transmit(
            Some(&self.path),
            Some(&format!("{}/{}", binding, corr)),
            &CluckMessage::Invoke(args.to_vec()).encode(),
        );
    }
}

impl CluckNode {
    /// Publish a procedure under a name.
    pub fn publish_rpc(
        self: &Arc<Self>,
        name: &str,
        procedure: Arc<dyn RemoteProcedure>,
    ) -> CluckResult<()> {
        struct Publisher {
            node: Weak<CluckNode>,
            name: String,
            procedure: Arc<dyn RemoteProcedure>,
        }
        impl CluckHandler for Publisher {
            fn receive(&self, source: Option<&str>, msg: &CluckMessage) {
                let CluckMessage::Invoke(args) = msg else {
                    expect_tag(msg, MessageTag::Invoke, &self.name);
                    return;
                };
                if let Some(node) = self.node.upgrade() {
                    node.sweep_rpc_timeouts();
                }
                let Some(source) = source else {
                    warn!("invocation of '{}' with no reply address", self.name);
                    return;
                };
                self.procedure.invoke(
                    args,
                    Box::new(NetworkReply {
                        node: self.node.clone(),
                        target: source.to_string(),
                        local_name: self.name.clone(),
                        buf: Vec::new(),
                        closed: false,
                    }),
                );
            }
            fn receive_broadcast(&self, source: Option<&str>, msg: &CluckMessage) {
                answer_ping(&self.node, &self.name, source, msg, MessageTag::Invoke);
            }
        }
        self.attach(
            name,
            Arc::new(Publisher {
                node: Arc::downgrade(self),
                name: name.to_string(),
                procedure,
            }),
        )
    }

    /// Get a proxy invoking a remote procedure at a path. A call that sees
    /// neither a reply nor a negative-ack within `timeout` is resolved empty
    /// by a later sweep.
    pub fn subscribe_rpc(
        self: &Arc<Self>,
        path: &str,
        timeout: Duration,
    ) -> Arc<dyn RemoteProcedure> {
        Arc::new(RemoteProxy {
            node: Arc::downgrade(self),
            path: path.to_string(),
            timeout,
        })
    }

    /// Lazily attach the per-node reply endpoint and return its address.
    fn rpc_binding(self: &Arc<Self>) -> CluckResult<String> {
        let mut binding = self.rpc.binding.lock();
        if let Some(name) = &*binding {
            return Ok(name.clone());
        }
        let name = format!("rpc-endpoint-{:x}", self.next_local_id());
        self.attach(
            &name,
            Arc::new(Endpoint {
                node: Arc::downgrade(self),
                name: name.clone(),
            }),
        )?;
        *binding = Some(name.clone());
        Ok(name)
    }

    /// Resolve every in-flight call whose deadline has passed by closing its
    /// sink empty. Runs opportunistically on call traffic; a deployment with
    /// sparse traffic can run [`spawn_rpc_timeout_sweeper`] instead.
    pub fn sweep_rpc_timeouts(&self) {
        let now = Instant::now();
        let expired: Vec<PendingCall> = {
            let mut pending = self.rpc.pending.lock();
            let keys: Vec<String> = pending
                .iter()
                .filter(|(_, call)| call.deadline <= now)
                .map(|(corr, _)| corr.clone())
                .collect();
            keys.into_iter()
                .filter_map(|corr| {
                    warn!("call '{}' timed out", corr);
                    pending.remove(&corr)
                })
                .collect()
        };
        // Sinks may re-enter the node, so close them with no lock held.
        for call in expired {
            call.sink.close();
        }
    }
}

/// Background thread sweeping RPC timeouts every `period`, exiting once the
/// node is gone.
pub fn spawn_rpc_timeout_sweeper(
    node: &Arc<CluckNode>,
    period: Duration,
) -> thread::JoinHandle<()> {
    let weak = Arc::downgrade(node);
    thread::spawn(move || loop {
        thread::sleep(period);
        match weak.upgrade() {
            Some(node) => node.sweep_rpc_timeouts(),
            None => break,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct CollectSink {
        data: Arc<Mutex<Vec<u8>>>,
        closed: Arc<AtomicBool>,
    }

    impl ReplyOutput for CollectSink {
        fn write(&mut self, data: &[u8]) {
            self.data.lock().extend_from_slice(data);
        }
        fn close(self: Box<Self>) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn collector() -> (Box<CollectSink>, Arc<Mutex<Vec<u8>>>, Arc<AtomicBool>) {
        let data = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        (
            Box::new(CollectSink {
                data: data.clone(),
                closed: closed.clone(),
            }),
            data,
            closed,
        )
    }

    #[test]
    fn test_roundtrip_on_one_node() {
        let node = CluckNode::new();
        node.publish_rpc(
            "double",
            Arc::new(|args: &[u8], mut reply: Box<dyn ReplyOutput>| {
                let doubled: Vec<u8> = args.iter().map(|b| b * 2).collect();
                reply.write(&doubled);
                reply.close();
            }),
        )
        .unwrap();

        let proxy = node.subscribe_rpc("double", Duration::from_secs(1));
        let (sink, data, closed) = collector();
        proxy.invoke(&[1, 2, 3], sink);

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(data.lock().as_slice(), &[2, 4, 6]);
    }

    #[test]
    fn test_missing_procedure_resolves_call_empty() {
        let node = CluckNode::new();
        let proxy = node.subscribe_rpc("nowhere", Duration::from_secs(1));
        let (sink, data, closed) = collector();
        proxy.invoke(&[9], sink);

        // The negative-ack came straight back and closed the call.
        assert!(closed.load(Ordering::SeqCst));
        assert!(data.lock().is_empty());
        assert!(node.rpc.pending.lock().is_empty());
    }

    #[test]
    fn test_sweep_times_out_unanswered_call() {
        let node = CluckNode::new();
        // A procedure that parks the reply and never answers.
        let parked: Arc<Mutex<Vec<Box<dyn ReplyOutput>>>> = Arc::new(Mutex::new(Vec::new()));
        let p = parked.clone();
        node.publish_rpc(
            "void",
            Arc::new(move |_: &[u8], reply: Box<dyn ReplyOutput>| {
                p.lock().push(reply);
            }),
        )
        .unwrap();

        let proxy = node.subscribe_rpc("void", Duration::from_millis(5));
        let (sink, data, closed) = collector();
        proxy.invoke(&[], sink);
        assert!(!closed.load(Ordering::SeqCst));

        thread::sleep(Duration::from_millis(20));
        node.sweep_rpc_timeouts();
        assert!(closed.load(Ordering::SeqCst));
        assert!(data.lock().is_empty());

        // Unpark so the server sink drops in the test rather than at exit.
        for reply in parked.lock().drain(..) {
            reply.close();
        }
    }

    #[test]
    fn test_late_reply_after_timeout_is_discarded() {
        let node = CluckNode::new();
        let parked: Arc<Mutex<Vec<Box<dyn ReplyOutput>>>> = Arc::new(Mutex::new(Vec::new()));
        let p = parked.clone();
        node.publish_rpc(
            "slow",
            Arc::new(move |_: &[u8], reply: Box<dyn ReplyOutput>| {
                p.lock().push(reply);
            }),
        )
        .unwrap();

        let proxy = node.subscribe_rpc("slow", Duration::from_millis(5));
        let (sink, data, closed) = collector();
        proxy.invoke(&[], sink);

        thread::sleep(Duration::from_millis(20));
        node.sweep_rpc_timeouts();
        assert!(closed.load(Ordering::SeqCst));

        // The server finally answers; the resolved call must not reopen.
        for mut reply in parked.lock().drain(..) {
            reply.write(&[1, 2]);
            reply.close();
        }
        assert!(data.lock().is_empty());
    }

    #[test]
    fn test_background_sweeper_resolves_timeouts() {
        let node = CluckNode::new();
        let parked: Arc<Mutex<Vec<Box<dyn ReplyOutput>>>> = Arc::new(Mutex::new(Vec::new()));
        let p = parked.clone();
        node.publish_rpc(
            "void",
            Arc::new(move |_: &[u8], reply: Box<dyn ReplyOutput>| {
                p.lock().push(reply);
            }),
        )
        .unwrap();
        spawn_rpc_timeout_sweeper(&node, Duration::from_millis(10));

        let proxy = node.subscribe_rpc("void", Duration::from_millis(5));
        let (sink, _data, closed) = collector();
        proxy.invoke(&[], sink);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !closed.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(closed.load(Ordering::SeqCst));

        for reply in parked.lock().drain(..) {
            reply.close();
        }
    }
}
