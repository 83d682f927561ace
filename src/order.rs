//! Structured order data extracted from a detail panel.
//!
//! Quantities and prices stay display strings: the page formats them per
//! locale and not always consistently, so nothing is parsed to numbers.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// One ordered product row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

impl LineItem {
    /// Rows with neither a name nor a price are decorative noise
    pub fn is_noise(&self) -> bool {
        self.name.is_none() && self.price.is_none()
    }
}

/// Label to value mapping that keeps document order.
///
/// Inserting an existing label replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap(Vec<(String, String)>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.0.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Everything extracted from one detail panel. Absent fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedOrder {
    pub items: Vec<LineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub totals: FieldMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<FieldMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

impl ParsedOrder {
    /// Nothing at all was recognised
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.note.is_none()
            && self.totals.is_empty()
            && self.customer.is_none()
            && self.delivery_type.is_none()
            && self.payment_method.is_none()
    }
}

/// Expected panel structure that was missing or malformed.
///
/// An anomaly downgrades the record to a partial one; it never fails the
/// extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAnomaly {
    #[error("detail panel element not found, parsed the whole document")]
    PanelMissing,

    #[error("no line items found")]
    NoLineItems,

    #[error("{0} line item rows without name or price were discarded")]
    DiscardedItems(usize),

    #[error("no totals rows found")]
    NoTotals,

    #[error("totals row without a label/value pair: {0:?}")]
    UnlabeledTotal(String),
}

/// Parser result: the (possibly partial) order plus what was off about it
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub order: ParsedOrder,
    pub anomalies: Vec<ParseAnomaly>,
}

impl ParseOutcome {
    pub fn is_partial(&self) -> bool {
        !self.anomalies.is_empty()
    }
}
