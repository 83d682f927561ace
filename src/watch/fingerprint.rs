use std::collections::HashSet;
use std::fmt;

use sha2::{Digest, Sha256};

/// Dedup key for an order card: SHA-256 over the page URL and the first
/// characters of the card's visible text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint `text` as seen on `url`, using at most `prefix_len` characters.
    ///
    /// Returns `None` for cards without visible text; those cannot be told apart.
    pub fn of(url: &str, text: &str, prefix_len: usize) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let prefix: String = text.chars().take(prefix_len).collect();

        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"@@");
        hasher.update(prefix.as_bytes());
        Some(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-lifetime memory of what was already handled.
///
/// Owned by the poll loop and never persisted: a restart starts empty.
#[derive(Debug, Default)]
pub struct DedupTracker {
    clicked_cards: HashSet<Fingerprint>,
    processed_details: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clicked(&self, fingerprint: &Fingerprint) -> bool {
        self.clicked_cards.contains(fingerprint)
    }

    /// Record a clicked card. Returns false if it was already recorded.
    pub fn mark_clicked(&mut self, fingerprint: Fingerprint) -> bool {
        self.clicked_cards.insert(fingerprint)
    }

    pub fn is_detail_processed(&self, url: &str) -> bool {
        self.processed_details.contains(url)
    }

    /// Record a processed detail page URL. Returns false if it was already recorded.
    pub fn mark_detail_processed(&mut self, url: &str) -> bool {
        self.processed_details.insert(url.to_string())
    }

    pub fn clicked_count(&self) -> usize {
        self.clicked_cards.len()
    }

    pub fn processed_detail_count(&self) -> usize {
        self.processed_details.len()
    }
}
