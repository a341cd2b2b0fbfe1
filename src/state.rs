//! State management module - device variables mirrored for the host
//!
//! The store is owned by the sync engine; the host only reads it (feedback
//! evaluation, cycling commands) and receives change batches.

pub mod catalog;
mod store;

pub use catalog::{standard_definitions, HEARTBEAT_KEY};
pub use store::{
    is_sentinel, Variable, VariableDefinition, VariableStore, VariableUpdate, SENTINEL_LEVEL,
    SENTINEL_UNKNOWN,
};
