//! Render job domain entities.

pub mod model;
pub mod status;

pub use model::{CreateJob, RenderFile, RenderFrame, RenderJob, Resolution};
pub use status::{FrameStatus, JobSubType, JobType};
