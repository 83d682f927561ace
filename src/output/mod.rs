//! Flat-file outputs: HTML snapshots and the order log.

pub mod order_log;
pub mod snapshot;

pub use order_log::{format_entry, print_summary, OrderEntry, OrderLog};
pub use snapshot::{capture_page_html, strip_active_content, SnapshotStore};
