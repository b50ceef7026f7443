//! # netrender-slave
//!
//! The slave daemon: polls the master for render jobs, stages their input
//! files through a content-addressed cache, runs the render subprocess
//! while streaming its output back as a log, and reports per-frame
//! results. One tokio task runs the loop; one auxiliary task per active
//! job drains subprocess output into a channel.

pub mod backoff;
pub mod cache;
pub mod process;
pub mod runner;

pub use backoff::IncrementalBackoff;
pub use cache::FileCache;
pub use runner::SlaveRunner;
