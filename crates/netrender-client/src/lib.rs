//! # netrender-client
//!
//! HTTP access to the render master: the shared [`MasterClient`] connection
//! helper (used by both the CLI operators and the slave daemon), the
//! client command set, and the [`ClientSession`] that owns the local
//! job/slave/blacklist lists.

pub mod connection;
pub mod operators;
pub mod session;

pub use connection::{headers, MasterClient};
pub use operators::DownloadReport;
pub use session::{ClientSession, SubmittedJob};
