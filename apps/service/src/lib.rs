//! Service monitor: runs configured checks on their own intervals, debounces
//! failures and slowness, and sends escalating notifications until the
//! condition recovers.

pub mod config;
pub mod error;
pub mod monitoring;
pub mod notify;
pub mod pipeline;
pub mod processor;
pub mod template;

pub use error::{AppError, PipelineError};
pub use pipeline::Pipeline;
