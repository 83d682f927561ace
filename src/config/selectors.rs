use serde::{Deserialize, Serialize};

/// CSS selectors describing the order page markup.
///
/// The target page is not under our control and changes without notice, so
/// every selector can be overridden from the config file or environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectorConfig {
    /// Clickable order card in the list view
    pub card: String,

    /// Region that renders the order detail after a card click
    pub detail_panel: String,

    /// Free-text customer note
    pub note: String,

    /// One line item block
    pub item: String,

    /// Line item name, relative to `item`
    pub item_name: String,

    /// Line item quantity, relative to `item`
    pub item_quantity: String,

    /// Line item price, relative to `item`
    pub item_price: String,

    /// One row of the totals table
    pub totals_row: String,

    /// One label/value entry of the customer info block
    pub customer_item: String,

    /// Delivery type value
    pub delivery_type: String,

    /// Payment method value
    pub payment_method: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: ".order-card".to_string(),
            detail_panel: ".order-detail".to_string(),
            note: ".order-note".to_string(),
            item: ".order-item".to_string(),
            item_name: ".order-item__name".to_string(),
            item_quantity: ".order-item__quantity".to_string(),
            item_price: ".order-item__price".to_string(),
            totals_row: ".order-totals tr, .order-totals__row".to_string(),
            customer_item: ".info-content-column__item".to_string(),
            delivery_type: ".delivery-type".to_string(),
            payment_method: ".payment-method".to_string(),
        }
    }
}

impl SelectorConfig {
    /// All selectors paired with their config key, for validation messages
    pub fn entries(&self) -> [(&'static str, &str); 11] {
        [
            ("card", &self.card),
            ("detail_panel", &self.detail_panel),
            ("note", &self.note),
            ("item", &self.item),
            ("item_name", &self.item_name),
            ("item_quantity", &self.item_quantity),
            ("item_price", &self.item_price),
            ("totals_row", &self.totals_row),
            ("customer_item", &self.customer_item),
            ("delivery_type", &self.delivery_type),
            ("payment_method", &self.payment_method),
        ]
    }
}
