//! Order watching: find new cards, click them, parse their detail panels.

pub mod adapter;
pub mod discovery;
pub mod extractor;
pub mod fingerprint;
pub mod parser;
pub mod poll;

pub use adapter::{CardCandidate, CardTarget, CssPageAdapter, PageAdapter};
pub use discovery::{click_card, discover_new_cards, NewCard};
pub use extractor::{extract_card, panel_changed, Extraction};
pub use fingerprint::{DedupTracker, Fingerprint};
pub use parser::{parse_detail_markup, PanelSelectors};
pub use poll::{LoopState, PollLoop, PollStats, SnapshotSchedule};
