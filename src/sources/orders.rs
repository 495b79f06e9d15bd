//! Commerce order export
//!
//! Only registered when commerce is enabled. Order statuses arrive from the
//! admin screen with the `wc-` prefix (`wc-completed`); the store is queried
//! with the bare status.

use std::sync::Arc;

use async_trait::async_trait;

use super::{join_distinct, Described, EntityKind, ExporterDescriptor, RecordSource};
use crate::error::Result;
use crate::export::encoder::{Cell, Row};
use crate::request::FilterSet;
use crate::store::{format_date, Order, OrderQuery, OrderStore, ShippingLine};

const STATUS_PREFIX: &str = "wc-";

/// Human label for an order status. Unknown statuses pass through.
pub fn status_label(status: &str) -> &str {
    match status {
        "pending" => "Pending payment",
        "processing" => "Processing",
        "on-hold" => "On hold",
        "completed" => "Completed",
        "cancelled" => "Cancelled",
        "refunded" => "Refunded",
        "failed" => "Failed",
        "checkout-draft" => "Draft",
        other => other,
    }
}

/// How an order's payment method is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Gateway title as shown to the customer.
    Titled(String),
    /// No title recorded; the gateway id is shown instead.
    RawId(String),
    None,
}

impl PaymentMethod {
    pub fn resolve(order: &Order) -> Self {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(title) = non_empty(&order.payment_method_title) {
            PaymentMethod::Titled(title)
        } else if let Some(id) = non_empty(&order.payment_method) {
            PaymentMethod::RawId(id)
        } else {
            PaymentMethod::None
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PaymentMethod::Titled(s) | PaymentMethod::RawId(s) => s,
            PaymentMethod::None => "",
        }
    }
}

/// Display name of a shipping line. A missing title contributes nothing.
fn shipping_title(line: &ShippingLine) -> Option<&str> {
    line.method_title
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Exports orders, optionally narrowed to one status.
pub struct OrdersExporter {
    orders: Arc<dyn OrderStore>,
    descriptor: ExporterDescriptor,
}

impl OrdersExporter {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self {
            orders,
            descriptor: EntityKind::Orders.descriptor(),
        }
    }

    /// Order query for a filter set.
    ///
    /// `post_status` of `all` or empty means no status constraint.
    pub fn query_for(filters: &FilterSet) -> OrderQuery {
        let status = filters
            .text("post_status")
            .filter(|s| *s != "all")
            .map(|s| s.strip_prefix(STATUS_PREFIX).unwrap_or(s).to_string())
            .filter(|s| !s.is_empty());
        OrderQuery { status }
    }
}

impl Described for OrdersExporter {
    fn descriptor(&self) -> &ExporterDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl RecordSource for OrdersExporter {
    type Record = Order;

    async fn fetch_all(&self, filters: &FilterSet) -> Result<Vec<Order>> {
        self.orders.query_orders(&Self::query_for(filters)).await
    }

    async fn project(&self, order: &Order) -> Row {
        let customer = format!("{} {}", order.billing_first_name, order.billing_last_name);
        let shipping = join_distinct(order.shipping_lines.iter().filter_map(shipping_title));

        vec![
            Cell::from(order.id),
            Cell::from(order.order_number()),
            Cell::from(format_date(order.date_created.as_ref())),
            Cell::from(status_label(&order.status)),
            Cell::from(order.total.as_str()),
            Cell::from(customer.trim()),
            Cell::from(order.billing_email.as_str()),
            Cell::from(PaymentMethod::resolve(order).label()),
            Cell::from(shipping),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FixtureStore;

    fn order(json: &str) -> Order {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_query_for_status() {
        let q = |v: &str| OrdersExporter::query_for(&FilterSet::new().with("post_status", v));
        assert_eq!(q("wc-completed").status.as_deref(), Some("completed"));
        assert_eq!(q("completed").status.as_deref(), Some("completed"));
        assert_eq!(q("all").status, None);
        assert_eq!(q("").status, None);
        assert_eq!(q("wc-").status, None);
        assert_eq!(OrdersExporter::query_for(&FilterSet::new()).status, None);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label("pending"), "Pending payment");
        assert_eq!(status_label("on-hold"), "On hold");
        assert_eq!(status_label("checkout-draft"), "Draft");
        assert_eq!(status_label("custom-status"), "custom-status");
    }

    #[test]
    fn test_payment_method_resolution() {
        let titled = order(
            r#"{"id": 1, "status": "completed", "payment_method": "bacs",
                "payment_method_title": "Direct bank transfer"}"#,
        );
        assert_eq!(
            PaymentMethod::resolve(&titled),
            PaymentMethod::Titled("Direct bank transfer".to_string())
        );

        let raw = order(
            r#"{"id": 2, "status": "completed", "payment_method": "cod",
                "payment_method_title": ""}"#,
        );
        assert_eq!(PaymentMethod::resolve(&raw).label(), "cod");

        let none = order(r#"{"id": 3, "status": "completed"}"#);
        assert_eq!(PaymentMethod::resolve(&none), PaymentMethod::None);
        assert_eq!(PaymentMethod::None.label(), "");
    }

    #[tokio::test]
    async fn test_project_order() {
        let exporter = OrdersExporter::new(Arc::new(FixtureStore::default()));
        let order = order(
            r#"{"id": 1042, "number": "A-1042", "status": "processing",
                "date_created": "2024-06-10T09:15:00+02:00", "total": "59.90",
                "billing_first_name": "Ann", "billing_last_name": "",
                "billing_email": "ann@example.com",
                "payment_method": "stripe", "payment_method_title": "Card",
                "shipping_lines": [
                    {"method_title": "Flat rate"},
                    {"method_title": "Flat rate"},
                    {"method_title": " Local pickup "},
                    {}
                ]}"#,
        );

        let row = exporter.project(&order).await;
        let text: Vec<String> = row.iter().map(Cell::to_text).collect();
        assert_eq!(
            text,
            vec![
                "1042",
                "A-1042",
                "2024-06-10 09:15:00",
                "Processing",
                "59.90",
                "Ann",
                "ann@example.com",
                "Card",
                "Flat rate, Local pickup",
            ]
        );
    }

    #[tokio::test]
    async fn test_untitled_shipping_line_contributes_nothing() {
        let exporter = OrdersExporter::new(Arc::new(FixtureStore::default()));
        let order = order(
            r#"{"id": 7, "status": "completed",
                "shipping_lines": [
                    {"name": "Local pickup"},
                    {"method_title": "", "name": "Courier"}
                ]}"#,
        );
        let row = exporter.project(&order).await;
        assert_eq!(row[8].to_text(), "");
    }

    #[tokio::test]
    async fn test_order_without_shipping_or_name() {
        let exporter = OrdersExporter::new(Arc::new(FixtureStore::default()));
        let row = exporter
            .project(&order(r#"{"id": 9, "status": "failed"}"#))
            .await;
        assert_eq!(row[1].to_text(), "9");
        assert_eq!(row[3].to_text(), "Failed");
        assert_eq!(row[5].to_text(), "");
        assert_eq!(row[8].to_text(), "");
    }
}
