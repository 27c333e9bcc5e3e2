//! The transport boundary of the bus.

use std::sync::Arc;

/// A transport endpoint attached to a node under a name.
///
/// Implementations forward a message toward "the other side" and report
/// liveness through the return value. A `false` return makes the owning node
/// retire the link; transports must translate local failures into `false`
/// instead of panicking or blocking.
pub trait CluckLink: Send + Sync {
    /// Forward a message. `rest` is the target path relative to the far side
    /// (`None` when the message terminates there, `Some("*")` for broadcast),
    /// `source` is the return path relative to this node.
    fn send(&self, rest: Option<&str>, source: Option<&str>, data: &[u8]) -> bool;
}

/// Identity token for a link, used to avoid re-entering the link a broadcast
/// arrived through. Compares the trait object's data pointer, so it is stable
/// for as long as the `Arc` allocation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkId(usize);

impl LinkId {
    pub fn of(link: &dyn CluckLink) -> LinkId {
        LinkId(link as *const dyn CluckLink as *const () as usize)
    }
}

/// A link-table slot. `Dead` records a link that existed and reported death,
/// which is distinct from a name that was never attached; dead names may be
/// re-occupied.
pub enum LinkEntry {
    Live(Arc<dyn CluckLink>),
    Dead,
}

impl LinkEntry {
    pub fn live(&self) -> Option<&Arc<dyn CluckLink>> {
        match self {
            LinkEntry::Live(link) => Some(link),
            LinkEntry::Dead => None,
        }
    }
}
