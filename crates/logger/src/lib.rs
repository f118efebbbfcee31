mod subscriber;

pub use subscriber::{DEFAULT_LEVEL, LogHandle, init};
