use scraper::{ElementRef, Html, Selector};

use crate::config::SelectorConfig;
use crate::error::{Result, WatchError};
use crate::order::{FieldMap, LineItem, ParseAnomaly, ParseOutcome, ParsedOrder};

/// Detail panel selectors, compiled once when the adapter is built
#[derive(Debug, Clone)]
pub struct PanelSelectors {
    panel: Selector,
    note: Selector,
    item: Selector,
    item_name: Selector,
    item_quantity: Selector,
    item_price: Selector,
    totals_row: Selector,
    customer_item: Selector,
    delivery_type: Selector,
    payment_method: Selector,
}

fn compile(key: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| WatchError::ConfigError(format!("selectors.{} {:?}: {}", key, css, e)))
}

impl PanelSelectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            panel: compile("detail_panel", &config.detail_panel)?,
            note: compile("note", &config.note)?,
            item: compile("item", &config.item)?,
            item_name: compile("item_name", &config.item_name)?,
            item_quantity: compile("item_quantity", &config.item_quantity)?,
            item_price: compile("item_price", &config.item_price)?,
            totals_row: compile("totals_row", &config.totals_row)?,
            customer_item: compile("customer_item", &config.customer_item)?,
            delivery_type: compile("delivery_type", &config.delivery_type)?,
            payment_method: compile("payment_method", &config.payment_method)?,
        })
    }
}

/// Visible text of an element with whitespace collapsed
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Split a row into (label, value).
///
/// Rows made of two or more child elements use the first as label and the
/// rest as value; flat rows fall back to a `Label: value` split.
fn label_value(el: ElementRef<'_>) -> Option<(String, String)> {
    let parts: Vec<String> = el
        .children()
        .filter_map(ElementRef::wrap)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();

    let (label, value) = if parts.len() >= 2 {
        (parts[0].clone(), parts[1..].join(" "))
    } else {
        let text = element_text(el);
        let (label, value) = text.split_once(':')?;
        (label.to_string(), value.to_string())
    };

    let label = label.trim().trim_end_matches(':').trim().to_string();
    let value = value.trim().to_string();
    if label.is_empty() {
        return None;
    }
    Some((label, value))
}

/// Extract an order from detail panel markup.
///
/// Accepts either the panel's own markup or a whole page; when the panel
/// element is absent the whole document is searched and the result is flagged.
pub fn parse_detail_markup(html: &str, selectors: &PanelSelectors) -> ParseOutcome {
    let document = Html::parse_document(html);
    let mut anomalies = Vec::new();

    let root = match document.select(&selectors.panel).next() {
        Some(panel) => panel,
        None => {
            anomalies.push(ParseAnomaly::PanelMissing);
            document.root_element()
        }
    };

    let mut items = Vec::new();
    let mut discarded = 0;
    for row in root.select(&selectors.item) {
        let item = LineItem {
            name: first_text(row, &selectors.item_name),
            quantity: first_text(row, &selectors.item_quantity),
            price: first_text(row, &selectors.item_price),
        };
        if item.is_noise() {
            discarded += 1;
            continue;
        }
        items.push(item);
    }
    if discarded > 0 {
        anomalies.push(ParseAnomaly::DiscardedItems(discarded));
    }
    if items.is_empty() {
        anomalies.push(ParseAnomaly::NoLineItems);
    }

    let mut totals = FieldMap::new();
    for row in root.select(&selectors.totals_row) {
        match label_value(row) {
            Some((label, value)) => totals.insert(label, value),
            None => anomalies.push(ParseAnomaly::UnlabeledTotal(element_text(row))),
        }
    }
    if totals.is_empty() {
        anomalies.push(ParseAnomaly::NoTotals);
    }

    let mut customer = FieldMap::new();
    for entry in root.select(&selectors.customer_item) {
        if let Some((label, value)) = label_value(entry) {
            customer.insert(label, value);
        }
    }

    let order = ParsedOrder {
        items,
        note: first_text(root, &selectors.note),
        totals,
        customer: (!customer.is_empty()).then_some(customer),
        delivery_type: first_text(root, &selectors.delivery_type),
        payment_method: first_text(root, &selectors.payment_method),
    };

    ParseOutcome { order, anomalies }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors() -> PanelSelectors {
        PanelSelectors::compile(&SelectorConfig::default()).unwrap()
    }

    const PANEL: &str = r#"
        <div class="order-detail">
          <div class="order-note">Zili çalmayın, kapıya bırakın</div>
          <ul>
            <li class="order-item">
              <span class="order-item__name">Lahmacun</span>
              <span class="order-item__quantity">2 adet</span>
              <span class="order-item__price">120,00 TL</span>
            </li>
            <li class="order-item">
              <span class="order-item__name">Ayran</span>
              <span class="order-item__quantity">1 adet</span>
              <span class="order-item__price">25,00 TL</span>
            </li>
            <li class="order-item"><span class="order-item__quantity"></span></li>
            <li class="order-item">
              <span class="order-item__name">Künefe</span>
              <span class="order-item__price">95,00   TL</span>
            </li>
          </ul>
          <table class="order-totals">
            <tr><td>Ara Toplam</td><td>240,00 TL</td></tr>
            <tr><td>Toplam:</td><td>240,00 TL</td></tr>
          </table>
          <div class="customer-info">
            <div class="info-content-column__item"><span>Müşteri</span><span>Ayşe K.</span></div>
            <div class="info-content-column__item">Telefon: 0555 000 00 00</div>
            <div class="info-content-column__item">no label here</div>
          </div>
          <div class="delivery-type">Restoran Teslimatı</div>
          <div class="payment-method">Online Ödeme</div>
        </div>
    "#;

    #[test]
    fn parses_items_in_document_order_and_totals_by_label() {
        let outcome = parse_detail_markup(PANEL, &selectors());
        let order = &outcome.order;

        assert_eq!(order.items.len(), 3);
        let names: Vec<_> = order.items.iter().map(|i| i.name.as_deref().unwrap()).collect();
        assert_eq!(names, ["Lahmacun", "Ayran", "Künefe"]);
        assert_eq!(order.items[0].quantity.as_deref(), Some("2 adet"));
        assert_eq!(order.items[2].quantity, None);
        assert_eq!(order.items[2].price.as_deref(), Some("95,00 TL"));

        assert_eq!(order.totals.len(), 2);
        assert_eq!(order.totals.get("Ara Toplam"), Some("240,00 TL"));
        assert_eq!(order.totals.get("Toplam"), Some("240,00 TL"));
    }

    #[test]
    fn parses_note_customer_and_metadata() {
        let order = parse_detail_markup(PANEL, &selectors()).order;

        assert_eq!(order.note.as_deref(), Some("Zili çalmayın, kapıya bırakın"));
        let customer = order.customer.expect("customer block");
        assert_eq!(customer.len(), 2);
        assert_eq!(customer.get("Müşteri"), Some("Ayşe K."));
        assert_eq!(customer.get("Telefon"), Some("0555 000 00 00"));
        assert_eq!(order.delivery_type.as_deref(), Some("Restoran Teslimatı"));
        assert_eq!(order.payment_method.as_deref(), Some("Online Ödeme"));
    }

    #[test]
    fn noise_rows_are_discarded_and_reported() {
        let outcome = parse_detail_markup(PANEL, &selectors());
        assert_eq!(outcome.anomalies, vec![ParseAnomaly::DiscardedItems(1)]);
    }

    #[test]
    fn missing_blocks_leave_fields_unset() {
        let html = r#"<div class="order-detail"><li class="order-item">
            <span class="order-item__name">Pide</span></li></div>"#;
        let outcome = parse_detail_markup(html, &selectors());

        assert_eq!(outcome.order.items.len(), 1);
        assert_eq!(outcome.order.note, None);
        assert_eq!(outcome.order.customer, None);
        assert_eq!(outcome.order.delivery_type, None);
        assert!(outcome.order.totals.is_empty());
        assert!(outcome.anomalies.contains(&ParseAnomaly::NoTotals));
        assert!(!outcome.anomalies.contains(&ParseAnomaly::PanelMissing));
    }

    #[test]
    fn whole_page_without_panel_is_flagged() {
        let html = "<html><body><p>Giriş yapın</p></body></html>";
        let outcome = parse_detail_markup(html, &selectors());

        assert!(outcome.order.is_empty());
        assert!(outcome.anomalies.contains(&ParseAnomaly::PanelMissing));
        assert!(outcome.anomalies.contains(&ParseAnomaly::NoLineItems));
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let config = SelectorConfig {
            item_price: "..price[".to_string(),
            ..Default::default()
        };
        let result = PanelSelectors::compile(&config);
        assert!(matches!(
            result,
            Err(WatchError::ConfigError(msg)) if msg.contains("item_price")
        ));
    }
}
