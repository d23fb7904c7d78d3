//! Small ambient utilities shared across the node: logging setup, timestamps,
//! timeouts, and graceful-shutdown signal handling.

pub mod logging;
pub mod signal;
pub mod time;
pub mod timeout;

pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use signal::{create_shutdown_receiver, wait_for_shutdown_signal};
pub use time::{current_timestamp, current_timestamp_duration};
pub use timeout::{with_custom_timeout, with_timeout};
