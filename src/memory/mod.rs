//! Long-term memory: append-only history plus a replaceable snapshot.

mod store;

pub use store::{ConsolidationDisposition, MemoryStore};
