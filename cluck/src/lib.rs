//! # Cluck
//!
//! Cluck is a pub/sub message bus with RPC for the devices of one embedded
//! robot network. This is the unified crate; the implementation lives in
//! [`cluck_core`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cluck::prelude::*;
//! use std::sync::Arc;
//!
//! let robot = CluckNode::new();
//! let laptop = CluckNode::new();
//! NullLink::pair(&robot, "to-laptop", &laptop, "robot").unwrap();
//!
//! let armed = Arc::new(BooleanCell::new(false));
//! robot.publish_bool_input("armed", armed.clone()).unwrap();
//! let seen = laptop.subscribe_bool_input("robot/armed", true);
//! ```

// Re-export core components
pub use cluck_core::{self, *};

// Re-export commonly used dependencies
pub use anyhow;
pub use serde;
pub use thiserror;

/// Everything most applications need, in one import.
pub mod prelude {
    pub use cluck_core::{
        BooleanCell, BooleanInput, BooleanOutput, BooleanSource, CluckConfig, CluckError,
        CluckHandler, CluckLink, CluckMessage, CluckNode, CluckResult, EventCell, EventInput,
        EventOutput, FloatCell, FloatInput, FloatOutput, FloatSource, LogLevel, LogTarget,
        MessageTag, NullLink, RemoteListener, RemoteProcedure, ReplyOutput, StreamSink,
    };
}
