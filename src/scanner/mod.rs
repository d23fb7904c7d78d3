//! Scanner: watch-item model (C8), scan request queue (C9), and the
//! scanner engine (C10) that walks new blocks against queued watch items.

pub mod engine;
pub mod queue;
pub mod watch_item;

pub use engine::{
    DescriptorSource, Report, Scanner, ScannerError, WatchEventType, WatchOptions,
};
pub use queue::{ScanRequest, ScanRequestQueue};
pub use watch_item::WatchItem;
