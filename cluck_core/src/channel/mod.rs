//! # Local signal primitives
//!
//! The typed bridges in [`crate::communication::bridges`] move values between
//! nodes; these are the objects they publish and hand back to subscribers:
//!
//! - **Event**: fire-and-forget notifications ([`EventOutput`] / [`EventInput`])
//! - **Boolean / Float**: readable and watchable signals with cell
//!   implementations ([`BooleanCell`], [`FloatCell`])
//! - **Log**: leveled log sinks ([`LogTarget`])
//! - **Stream**: raw byte sinks ([`StreamSink`])
//!
//! Cells notify their watchers only when the stored value actually changes,
//! so cross-wired cells cannot ping-pong updates forever.

pub mod boolean;
pub mod event;
pub mod float;
pub mod logging;

pub use boolean::{BooleanCell, BooleanInput, BooleanOutput, BooleanSource};
pub use event::{EventCell, EventInput, EventOutput};
pub use float::{FloatCell, FloatInput, FloatOutput, FloatSource};
pub use logging::{LogLevel, LogTarget};

use parking_lot::Mutex;

/// A sink for an ordered sequence of byte chunks.
///
/// Chunk boundaries are best-effort and may not survive transport framing;
/// consumers must not rely on them.
pub trait StreamSink: Send + Sync {
    /// Append a chunk to the stream.
    fn write(&self, data: &[u8]);
}

impl StreamSink for Mutex<Vec<u8>> {
    fn write(&self, data: &[u8]) {
        self.lock().extend_from_slice(data);
    }
}
