use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::error::Result;
use crate::order::ParseOutcome;

const HEADER_RULE: &str = "====================";
const SEPARATOR: &str = "------------------------------------------------------------";

/// One parsed order, ready to be logged
#[derive(Debug, Clone)]
pub struct OrderEntry {
    pub recorded_at: DateTime<Local>,
    /// Page the order was read from
    pub url: String,
    /// Short card fingerprint, or a label for detail pages
    pub source: String,
    pub outcome: ParseOutcome,
}

impl OrderEntry {
    pub fn new(url: impl Into<String>, source: impl Into<String>, outcome: ParseOutcome) -> Self {
        Self {
            recorded_at: Local::now(),
            url: url.into(),
            source: source.into(),
            outcome,
        }
    }
}

/// Render an entry as the plain-text block appended to the log
pub fn format_entry(entry: &OrderEntry) -> String {
    let order = &entry.outcome.order;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {} {}",
        HEADER_RULE,
        entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        HEADER_RULE
    );
    let _ = writeln!(out, "URL: {}", entry.url);
    let _ = writeln!(out, "Source: {}", entry.source);
    if entry.outcome.is_partial() {
        let _ = writeln!(out, "Status: partial");
    }
    if let Some(delivery) = &order.delivery_type {
        let _ = writeln!(out, "Delivery: {}", delivery);
    }
    if let Some(payment) = &order.payment_method {
        let _ = writeln!(out, "Payment: {}", payment);
    }

    if let Some(customer) = &order.customer {
        let _ = writeln!(out, "Customer:");
        for (label, value) in customer.iter() {
            let _ = writeln!(out, "  {}: {}", label, value);
        }
    }

    let _ = writeln!(out, "Items:");
    for item in &order.items {
        let fields: Vec<&str> = [&item.name, &item.quantity, &item.price]
            .into_iter()
            .map(|f| f.as_deref().unwrap_or("-"))
            .collect();
        let _ = writeln!(out, "  - {}", fields.join(" | "));
    }

    if let Some(note) = &order.note {
        let _ = writeln!(out, "Note: {}", note);
    }

    if !order.totals.is_empty() {
        let _ = writeln!(out, "Totals:");
        for (label, value) in order.totals.iter() {
            let _ = writeln!(out, "  {}: {}", label, value);
        }
    }

    if entry.outcome.is_partial() {
        let _ = writeln!(out, "Anomalies:");
        for anomaly in &entry.outcome.anomalies {
            let _ = writeln!(out, "  - {}", anomaly);
        }
    }

    let _ = writeln!(out, "{}", SEPARATOR);
    out
}

/// Append-only text log of parsed orders
#[derive(Debug, Clone)]
pub struct OrderLog {
    path: PathBuf,
}

impl OrderLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &OrderEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format_entry(entry).as_bytes())?;
        tracing::debug!("Order appended to {}", self.path.display());
        Ok(())
    }
}

/// One-line colored summary for the console
pub fn print_summary(entry: &OrderEntry) {
    let order = &entry.outcome.order;
    let total = order
        .totals
        .iter()
        .last()
        .map(|(label, value)| format!("{} {}", label, value))
        .unwrap_or_else(|| "no totals".to_string());
    let customer = order
        .customer
        .as_ref()
        .and_then(|c| c.iter().next().map(|(_, value)| value.to_string()))
        .unwrap_or_default();

    let status = if entry.outcome.is_partial() {
        "!".yellow()
    } else {
        "✓".green()
    };

    println!(
        "{} {} {} {} {}",
        status,
        entry.recorded_at.format("%H:%M:%S").to_string().dimmed(),
        format!("{} item(s)", order.items.len()).bold(),
        total.cyan(),
        customer
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{FieldMap, LineItem, ParseAnomaly, ParsedOrder};

    fn entry() -> OrderEntry {
        let mut totals = FieldMap::new();
        totals.insert("Ara Toplam", "240,00 TL");
        totals.insert("Toplam", "240,00 TL");
        let mut customer = FieldMap::new();
        customer.insert("Müşteri", "Ayşe K.");

        let order = ParsedOrder {
            items: vec![
                LineItem {
                    name: Some("Lahmacun".to_string()),
                    quantity: Some("2 adet".to_string()),
                    price: Some("120,00 TL".to_string()),
                },
                LineItem {
                    name: Some("Künefe".to_string()),
                    quantity: None,
                    price: Some("95,00 TL".to_string()),
                },
            ],
            note: Some("Zili çalmayın".to_string()),
            totals,
            customer: Some(customer),
            delivery_type: Some("Restoran Teslimatı".to_string()),
            payment_method: None,
        };

        OrderEntry::new(
            "https://partner.example/meal/1/order/list",
            "3fa9c01be2d4",
            ParseOutcome {
                order,
                anomalies: vec![ParseAnomaly::DiscardedItems(1)],
            },
        )
    }

    #[test]
    fn entry_has_header_fields_and_separator() {
        let text = format_entry(&entry());
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with(HEADER_RULE));
        assert_eq!(lines[1], "URL: https://partner.example/meal/1/order/list");
        assert!(text.contains("Delivery: Restoran Teslimatı\n"));
        assert!(!text.contains("Payment:"));
        assert!(text.contains("  Müşteri: Ayşe K.\n"));
        assert!(text.contains("  - Lahmacun | 2 adet | 120,00 TL\n"));
        assert!(text.contains("  - Künefe | - | 95,00 TL\n"));
        assert!(text.contains("Note: Zili çalmayın\n"));
        assert!(text.contains("  Toplam: 240,00 TL\n"));
        assert!(text.contains("Status: partial\n"));
        assert_eq!(*lines.last().unwrap(), SEPARATOR);
    }

    #[test]
    fn append_keeps_previous_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = OrderLog::new(dir.path().join("out").join("orders.log"));

        log.append(&entry()).unwrap();
        log.append(&entry()).unwrap();

        let written = fs::read_to_string(log.path()).unwrap();
        assert_eq!(written.matches(SEPARATOR).count(), 2);
        assert_eq!(written.matches("URL: ").count(), 2);
    }
}
