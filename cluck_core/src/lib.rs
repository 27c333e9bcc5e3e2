//! # Cluck Core
//!
//! The core of the Cluck message bus for embedded robot networks.
//!
//! Cluck connects the devices of one robot network (a robot controller, a
//! driver station, laptops) into a single namespace of `/`-separated paths.
//! This crate provides the fundamental building blocks:
//!
//! - **Channel**: local signal primitives (events, booleans, floats, logs,
//!   byte streams)
//! - **Communication**: the routing node, links between nodes, and the typed
//!   bridges that publish channel objects over the bus
//! - **RPC**: request/reply calls across nodes
//! - **Discovery**: enumeration of published objects on reachable nodes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cluck_core::{BooleanCell, BooleanInput, BooleanOutput, CluckNode, NullLink};
//! use std::sync::Arc;
//!
//! let robot = CluckNode::new();
//! let laptop = CluckNode::new();
//! NullLink::pair(&robot, "to-laptop", &laptop, "robot").unwrap();
//!
//! let armed = Arc::new(BooleanCell::new(false));
//! robot.publish_bool_input("armed", armed.clone()).unwrap();
//!
//! let seen = laptop.subscribe_bool_input("robot/armed", true);
//! armed.set(true);
//! assert!(seen.get());
//! ```

pub mod channel;
pub mod communication;
pub mod config;
pub mod error;

// Re-export commonly used types for easy access
pub use channel::{
    BooleanCell, BooleanInput, BooleanOutput, BooleanSource, EventCell, EventInput, EventOutput,
    FloatCell, FloatInput, FloatOutput, FloatSource, LogLevel, LogTarget, StreamSink,
};
pub use communication::{
    spawn_rpc_timeout_sweeper, CluckHandler, CluckLink, CluckMessage, CluckNode, MessageTag,
    NullLink, RemoteListener, RemoteProcedure, RemoteSearch, ReplyOutput, WireError,
};
pub use config::CluckConfig;
pub use error::{CluckError, CluckResult};
