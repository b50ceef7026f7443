//! Shared primitive types.

pub mod id;

pub use id::{JobId, SlaveId};
