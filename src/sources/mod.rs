//! Record source adapters
//!
//! Each entity kind (users, products, categories, orders) is exported by an
//! adapter that knows how to turn a [`FilterSet`] into a store query and how
//! to project one record into a row of cells. Adapters implement
//! [`RecordSource`]; the blanket [`Exporter`] impl turns any record source
//! into the object-safe interface the export job drives.

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::export::encoder::Row;
use crate::export::progress::ProgressTracker;
use crate::export::streaming::{self, RecordStream};
use crate::export::writers::FormatWriter;
use crate::request::FilterSet;

pub mod categories;
pub mod orders;
pub mod products;
pub mod users;

pub use categories::CategoriesExporter;
pub use orders::{OrdersExporter, PaymentMethod};
pub use products::ProductsExporter;
pub use users::UsersExporter;

/// The four exportable record categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Users,
    Products,
    Categories,
    Orders,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Users,
        EntityKind::Products,
        EntityKind::Categories,
        EntityKind::Orders,
    ];

    /// Identifier used in `exporter_id` and token scopes.
    pub fn id(self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Products => "products",
            EntityKind::Categories => "categories",
            EntityKind::Orders => "orders",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            EntityKind::Users => "Users",
            EntityKind::Products => "Products",
            EntityKind::Categories => "Categories",
            EntityKind::Orders => "Orders",
        }
    }

    /// Permission a caller needs to export this kind.
    pub fn capability(self) -> &'static str {
        match self {
            EntityKind::Users => "list_users",
            EntityKind::Products => "edit_products",
            EntityKind::Categories => "manage_categories",
            EntityKind::Orders => "edit_shop_orders",
        }
    }

    /// Header row, in output order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::Users => &[
                "ID",
                "Username",
                "Email",
                "Role(s)",
                "Registration date",
                "First name",
                "Last name",
                "Website",
            ],
            EntityKind::Products => &[
                "ID",
                "Name",
                "SKU",
                "Price",
                "Stock",
                "Categories",
                "Type",
                "Created",
            ],
            EntityKind::Categories => &["ID", "Name", "Slug", "Description", "Parent", "Product count"],
            EntityKind::Orders => &[
                "ID",
                "Order number",
                "Date",
                "Status",
                "Total",
                "Customer",
                "Email",
                "Payment method",
                "Shipping method",
            ],
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub fn descriptor(self) -> ExporterDescriptor {
        ExporterDescriptor {
            id: self.id().to_string(),
            title: self.title().to_string(),
            capability: self.capability().to_string(),
            columns: self.columns().iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Identity and schema of an exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterDescriptor {
    pub id: String,
    pub title: String,
    pub capability: String,
    pub columns: Vec<String>,
}

impl ExporterDescriptor {
    /// Reject descriptors without an id or a title.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() || self.title.trim().is_empty() {
            return Err(ExportError::MisconfiguredExporter(format!(
                "exporter must define an id and a title (id: '{}', title: '{}')",
                self.id, self.title
            ))
            .into());
        }
        if self.columns.is_empty() {
            return Err(ExportError::MisconfiguredExporter(format!(
                "exporter '{}' has no columns",
                self.id
            ))
            .into());
        }
        Ok(())
    }
}

/// Access to an exporter's descriptor.
pub trait Described {
    fn descriptor(&self) -> &ExporterDescriptor;
}

/// Entity-specific retrieval and projection
#[async_trait]
pub trait RecordSource: Described + Send + Sync {
    type Record: Send + Sync + 'static;

    /// Fetch every record matching the filters, in store order.
    async fn fetch_all(&self, filters: &FilterSet) -> Result<Vec<Self::Record>>;

    /// Lazy sequence over the same records as [`RecordSource::fetch_all`].
    ///
    /// The default defers one bulk fetch until the stream is first polled.
    fn records<'a>(&'a self, filters: &'a FilterSet) -> RecordStream<'a, Self::Record> {
        streaming::deferred(self.fetch_all(filters))
    }

    /// Project a record into one cell per column.
    ///
    /// Lookups that fail here degrade the affected cell to empty text.
    async fn project(&self, record: &Self::Record) -> Row;
}

/// Object-safe exporter driven by the export job
#[async_trait]
pub trait Exporter: Described + Send + Sync {
    /// Whether the streamed path is available.
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Buffered entry point: every matching record, projected.
    async fn fetch_rows(&self, filters: &FilterSet) -> Result<Vec<Row>>;

    /// Streamed entry point: header line, then one line per record.
    ///
    /// # Returns
    /// * `Result<u64>` - Number of data rows written
    async fn stream_rows(&self, filters: &FilterSet, writer: &mut dyn FormatWriter) -> Result<u64>;
}

#[async_trait]
impl<S: RecordSource> Exporter for S {
    async fn fetch_rows(&self, filters: &FilterSet) -> Result<Vec<Row>> {
        let records = self.fetch_all(filters).await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            rows.push(self.project(record).await);
        }
        debug!("[{}] Fetched {} rows", self.descriptor().id, rows.len());
        Ok(rows)
    }

    async fn stream_rows(&self, filters: &FilterSet, writer: &mut dyn FormatWriter) -> Result<u64> {
        let descriptor = self.descriptor();
        writer.write_header(&descriptor.columns).await?;

        let mut tracker = ProgressTracker::new(&descriptor.id);
        let mut records = self.records(filters);
        while let Some(record) = records.try_next().await? {
            let row = self.project(&record).await;
            writer.write_row(&row).await?;
            tracker.tick();
        }
        tracker.finish();

        Ok(tracker.processed())
    }
}

/// Join non-empty text values with `", "`, dropping repeats.
pub(crate) fn join_distinct<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        let value = value.as_ref().trim();
        if !value.is_empty() && !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_round_trip_ids() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_id(kind.id()), Some(kind));
            assert!(kind.descriptor().validate().is_ok());
        }
        assert_eq!(EntityKind::from_id("pages"), None);
    }

    #[test]
    fn test_column_arity() {
        assert_eq!(EntityKind::Users.columns().len(), 8);
        assert_eq!(EntityKind::Products.columns().len(), 8);
        assert_eq!(EntityKind::Categories.columns().len(), 6);
        assert_eq!(EntityKind::Orders.columns().len(), 9);
    }

    #[test]
    fn test_descriptor_validation() {
        let mut descriptor = EntityKind::Users.descriptor();
        descriptor.title = "  ".to_string();
        assert!(descriptor.validate().is_err());

        let mut descriptor = EntityKind::Users.descriptor();
        descriptor.id.clear();
        let err = descriptor.validate().unwrap_err();
        assert!(err.to_string().contains("Misconfigured exporter"));
    }

    #[test]
    fn test_join_distinct() {
        assert_eq!(join_distinct(["Flat rate", "Flat rate", "Pickup"]), "Flat rate, Pickup");
        assert_eq!(join_distinct(["", " "]), "");
        assert_eq!(join_distinct(Vec::<String>::new()), "");
    }
}
