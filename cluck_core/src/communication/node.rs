//! The routing node. Every other component sends and receives through here.
//!
//! A node owns a set of named links and aliases and resolves `/`-separated
//! target paths one segment at a time: the first segment picks a link (or
//! `*` for broadcast), the remainder is handed to that link. The node never
//! interprets payload semantics beyond peeking at the tag byte for its drop
//! rules; decoding belongs to the subscriber layer.

use crate::communication::link::{CluckLink, LinkEntry, LinkId};
use crate::communication::rpc::RpcState;
use crate::communication::wire::{describe_payload, MessageTag};
use crate::error::{CluckError, CluckResult};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Estimated framing overhead per message of a representative wire
/// transport, added on top of the address and payload bytes.
const FRAME_OVERHEAD: u64 = 24;

/// The core routing hub of the Cluck bus on one device.
pub struct CluckNode {
    links: Mutex<HashMap<String, LinkEntry>>,
    aliases: Mutex<HashMap<String, String>>,
    /// Running estimate of serialized traffic through this node.
    estimated_bytes: AtomicU64,
    /// Trace every message as it passes through. For debugging.
    trace_all: AtomicBool,
    /// Throttle window for missing-link warnings: last missing base and when
    /// it was last reported. The negative-ack reply shares this window.
    missing_link: Mutex<Option<(String, Instant)>>,
    missing_link_warn_interval_ms: AtomicU64,
    /// Counter feeding locally-unique generated names.
    local_ids: AtomicU32,
    pub(crate) rpc: RpcState,
}

impl CluckNode {
    /// Create a new, unwired node. Returned as `Arc` because links, bridges
    /// and handlers all hold (weak) references back to it.
    pub fn new() -> Arc<CluckNode> {
        Arc::new(CluckNode {
            links: Mutex::new(HashMap::new()),
            aliases: Mutex::new(HashMap::new()),
            estimated_bytes: AtomicU64::new(0),
            trace_all: AtomicBool::new(false),
            missing_link: Mutex::new(None),
            missing_link_warn_interval_ms: AtomicU64::new(1000),
            local_ids: AtomicU32::new(0),
            rpc: RpcState::default(),
        })
    }

    /// Attach a link under a name. Fails while a live link occupies the name;
    /// a dead entry may be re-occupied.
    pub fn add_link(&self, name: &str, link: Arc<dyn CluckLink>) -> CluckResult<()> {
        let mut links = self.links.lock();
        if matches!(links.get(name), Some(LinkEntry::Live(_))) {
            return Err(CluckError::LinkNameInUse(name.to_string()));
        }
        links.insert(name.to_string(), LinkEntry::Live(link));
        Ok(())
    }

    /// Attach a link under a name, displacing any current occupant.
    pub fn add_or_replace_link(&self, name: &str, link: Arc<dyn CluckLink>) {
        let mut links = self.links.lock();
        if matches!(links.get(name), Some(LinkEntry::Live(_))) {
            info!("replaced current link on '{}'", name);
        }
        links.insert(name.to_string(), LinkEntry::Live(link));
    }

    /// Mark a link as dead without forgetting it ever existed.
    pub fn retire_link(&self, name: &str) {
        debug!("retiring link '{}'", name);
        self.links.lock().insert(name.to_string(), LinkEntry::Dead);
    }

    /// Register an alias: a message whose first path segment is `from` is
    /// rewritten to start with `to` instead. Aliases are immutable once set.
    pub fn add_alias(&self, from: &str, to: &str) -> CluckResult<()> {
        let to = to.trim_end_matches('/');
        let mut aliases = self.aliases.lock();
        if aliases.contains_key(from) {
            return Err(CluckError::AliasInUse(from.to_string()));
        }
        aliases.insert(from.to_string(), to.to_string());
        Ok(())
    }

    /// Broadcast a topology-notify so subscribers that lazily subscribed can
    /// re-assert interest after reconnects.
    pub fn notify_topology_changed(&self) {
        self.transmit(
            Some("*"),
            Some("#topology"),
            &[MessageTag::TopologyNotify as u8],
        );
    }

    /// Transmit a message to the target path, with the given return path.
    /// Fire-and-forget: transport failures retire the failing link and are
    /// never surfaced to the caller.
    pub fn transmit(&self, target: Option<&str>, source: Option<&str>, data: &[u8]) {
        self.transmit_with_deny(target, source, data, None);
    }

    /// Like [`transmit`](Self::transmit), but a broadcast will skip the
    /// denied link so a message never bounces back out the link it arrived
    /// through.
    pub fn transmit_with_deny(
        &self,
        target: Option<&str>,
        source: Option<&str>,
        data: &[u8],
        deny: Option<LinkId>,
    ) {
        if self.trace_all.load(Ordering::Relaxed) {
            debug!(
                "route {:?} <- {:?}: {} ({} bytes)",
                target,
                source,
                describe_payload(data),
                data.len()
            );
        }
        let cost = FRAME_OVERHEAD
            + target.map_or(0, |t| t.len() as u64)
            + source.map_or(0, |s| s.len() as u64)
            + data.len() as u64;
        self.estimated_bytes.fetch_add(cost, Ordering::Relaxed);

        let Some(target) = target else {
            // A negative-ack with nowhere to go is routine; anything else is
            // a misaddressed message worth a line.
            if !is_negative_ack(data) {
                warn!("dropping message with no target (source: {:?})", source);
            }
            return;
        };

        if target == "*" {
            self.broadcast(source, data, deny);
            return;
        }

        let (base, rest) = match target.split_once('/') {
            Some((base, rest)) => (base, Some(rest)),
            None => (target, None),
        };

        let alias = self.aliases.lock().get(base).cloned();
        if let Some(alias) = alias {
            // Local rewrite, not a forward, so the deny link does not carry.
            let rewritten = match rest {
                Some(rest) => format!("{}/{}", alias, rest),
                None => alias,
            };
            self.transmit(Some(&rewritten), source, data);
            return;
        }

        let entry = {
            let links = self.links.lock();
            links.get(base).map(|e| e.live().cloned())
        };
        match entry {
            Some(Some(link)) => {
                if !link.send(rest, source, data) {
                    debug!("link '{}' reported death, retiring", base);
                    self.links.lock().insert(base.to_string(), LinkEntry::Dead);
                }
            }
            // Dead entry or never-attached name: same recovery either way.
            Some(None) | None => self.handle_missing_link(target, base, source, data),
        }
    }

    fn broadcast(&self, source: Option<&str>, data: &[u8], deny: Option<LinkId>) {
        // Snapshot the live links so handlers can re-enter the node (and even
        // mutate the table) while fan-out is in progress.
        let targets: Vec<(String, Arc<dyn CluckLink>)> = {
            let links = self.links.lock();
            links
                .iter()
                .filter_map(|(name, entry)| entry.live().map(|l| (name.clone(), l.clone())))
                .filter(|(_, link)| deny != Some(LinkId::of(link.as_ref())))
                .collect()
        };
        let mut died = Vec::new();
        for (name, link) in targets {
            if !link.send(Some("*"), source, data) {
                died.push(name);
            }
        }
        if !died.is_empty() {
            let mut links = self.links.lock();
            for name in died {
                debug!("link '{}' reported death during broadcast, retiring", name);
                links.insert(name, LinkEntry::Dead);
            }
        }
    }

    /// Unresolvable target. Reply with a negative-ack when the sender could
    /// plausibly be waiting on us: the payload is not itself a negative-ack
    /// (those must never provoke another) and there is a source to reply to.
    /// Both the warning and the reply share a one-per-interval-per-base
    /// throttle to bound noise under topology churn.
    fn handle_missing_link(
        &self,
        target: &str,
        base: &str,
        source: Option<&str>,
        data: &[u8],
    ) {
        if is_negative_ack(data) {
            return;
        }
        let interval =
            Duration::from_millis(self.missing_link_warn_interval_ms.load(Ordering::Relaxed));
        let now = Instant::now();
        {
            let mut window = self.missing_link.lock();
            if let Some((last_base, at)) = &*window {
                if last_base == base && now < *at + interval {
                    return;
                }
            }
            *window = Some((base.to_string(), now));
        }
        warn!(
            "no link for '{}' ('{}') from {:?}",
            target, base, source
        );
        if let Some(source) = source.filter(|s| !s.is_empty()) {
            self.transmit(
                Some(source),
                Some(target),
                &[MessageTag::NegativeAck as u8],
            );
        }
    }

    /// Estimated total bytes routed through this node, as if every message
    /// were serialized by a framing wire transport.
    pub fn estimated_byte_count(&self) -> u64 {
        self.estimated_bytes.load(Ordering::Relaxed)
    }

    /// Trace every message through this node at debug level.
    pub fn set_trace_all(&self, enabled: bool) {
        self.trace_all.store(enabled, Ordering::Relaxed);
    }

    /// Change the missing-link warn/negative-ack throttle window.
    pub fn set_missing_link_warn_interval(&self, interval: Duration) {
        self.missing_link_warn_interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    /// Next value of the locally-unique ID counter, for generated link and
    /// correlation names.
    pub(crate) fn next_local_id(&self) -> u32 {
        self.local_ids.fetch_add(1, Ordering::Relaxed)
    }
}

fn is_negative_ack(data: &[u8]) -> bool {
    data.first() == Some(&(MessageTag::NegativeAck as u8))
}
