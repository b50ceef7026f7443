//! # netrender-model
//!
//! The wire data model exchanged between clients, slaves, and the master:
//! render jobs, frames, input files, slave registrations, and log streams.
//! All entities are plain serde records; serde is the single
//! (de)serialization boundary, so malformed payloads fail with a typed
//! decode error instead of surfacing later as a missing field.

pub mod job;
pub mod log;
pub mod range;
pub mod signature;
pub mod slave;

pub use job::{CreateJob, FrameStatus, JobSubType, JobType, RenderFile, RenderFrame, RenderJob, Resolution};
pub use log::LogFile;
pub use range::{frame_ranges, ranges_header, FrameRange};
pub use slave::{RenderSlave, SlaveRegistration};
