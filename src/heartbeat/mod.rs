//! Periodic liveness checks that wake the agent to look for work.

mod service;

pub use service::{
    CallbackFuture, ExecuteFn, HEARTBEAT_FILE, HeartbeatAction, HeartbeatDecision,
    HeartbeatService, NotifyFn,
};
