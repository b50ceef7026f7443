//! # netrender-core
//!
//! Core crate for netrender. Contains configuration schemas, typed
//! identifiers, and the unified error system shared by the client, slave,
//! and CLI crates.
//!
//! This crate has **no** internal dependencies on other netrender crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::NetError;
pub use result::NetResult;
