//! Convenience result type alias for netrender.

use crate::error::NetError;

/// A specialized `Result` type for netrender operations.
///
/// This is defined as a convenience so that every crate does not need to
/// write `Result<T, NetError>` explicitly.
pub type NetResult<T> = Result<T, NetError>;
