//! Exporter registry and trigger links
//!
//! Exporters are registered once at startup. A request is offered to the
//! registry, which hands it to the exporter it is addressed to; every other
//! exporter stays a no-op.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::auth::{AuthorizationGate, Caller};
use crate::error::{ExportError, Result};
use crate::export::{ExportJob, ExportOutcome, ExportSettings, ResponseTransport};
use crate::request::{ExportRequest, FilterSet, FilterValue, EXPORT_ACTION, TOKEN_PARAM};
use crate::sources::{
    CategoriesExporter, Described, EntityKind, Exporter, OrdersExporter, ProductsExporter,
    UsersExporter,
};
use crate::store::{OrderStore, ProductCatalog, TaxonomyStore, UserDirectory};

/// Visible text of a trigger link.
pub const TRIGGER_LABEL: &str = "Export to CSV";

/// Admin list screens that render an export trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSurface {
    Users,
    Products,
    ProductCategories,
    Orders,
    /// Orders screen backed by the dedicated order tables.
    OrdersHpos,
}

impl AdminSurface {
    pub const ALL: [AdminSurface; 5] = [
        AdminSurface::Users,
        AdminSurface::Products,
        AdminSurface::ProductCategories,
        AdminSurface::Orders,
        AdminSurface::OrdersHpos,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdminSurface::Users => "users",
            AdminSurface::Products => "products",
            AdminSurface::ProductCategories => "categories",
            AdminSurface::Orders => "orders",
            AdminSurface::OrdersHpos => "orders-hpos",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Exporter whose trigger the surface shows.
    pub fn exporter_id(self) -> &'static str {
        match self {
            AdminSurface::Users => EntityKind::Users.id(),
            AdminSurface::Products => EntityKind::Products.id(),
            AdminSurface::ProductCategories => EntityKind::Categories.id(),
            AdminSurface::Orders | AdminSurface::OrdersHpos => EntityKind::Orders.id(),
        }
    }

    /// Admin path the trigger link points at.
    pub fn target_path(self) -> &'static str {
        match self {
            AdminSurface::Users => "users.php",
            AdminSurface::Products => "edit.php?post_type=product",
            AdminSurface::ProductCategories => {
                "edit-tags.php?taxonomy=product_cat&post_type=product"
            }
            AdminSurface::Orders | AdminSurface::OrdersHpos => "edit.php?post_type=shop_order",
        }
    }

    /// Screen filters copied from the current view into the link.
    pub fn carried_filters(self) -> &'static [&'static str] {
        match self {
            AdminSurface::Products => &["product_cat", "product_type", "stock_status"],
            _ => &[],
        }
    }
}

impl fmt::Display for AdminSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Table navigation slot a list screen renders controls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePosition {
    Top,
    Bottom,
}

/// A rendered export trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerLink {
    pub exporter_id: String,
    pub label: String,
    pub url: String,
}

/// Build the URL of a trigger link
///
/// # Arguments
/// * `admin_url` - Admin base URL
/// * `surface` - Screen the link is rendered on
/// * `token` - Anti-forgery token for the surface's exporter
/// * `current` - Filters of the screen's current view
pub fn trigger_url(admin_url: &str, surface: AdminSurface, token: &str, current: &FilterSet) -> String {
    let path = surface.target_path();
    let mut url = format!("{}/{}", admin_url.trim_end_matches('/'), path);
    url.push(if path.contains('?') { '&' } else { '?' });
    url.push_str(&format!(
        "action={}&exporter_id={}",
        EXPORT_ACTION,
        surface.exporter_id()
    ));

    for key in surface.carried_filters() {
        match current.get(key) {
            Some(FilterValue::Single(value)) if !value.is_empty() => {
                url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
            }
            Some(FilterValue::List(values)) => {
                for value in values.iter().filter(|v| !v.is_empty()) {
                    url.push_str(&format!("&{}[]={}", key, urlencoding::encode(value)));
                }
            }
            _ => {}
        }
    }

    url.push_str(&format!("&{}={}", TOKEN_PARAM, urlencoding::encode(token)));
    url
}

/// Registered exporters, in registration order
#[derive(Default)]
pub struct ExportRegistry {
    exporters: Vec<Box<dyn Exporter>>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in exporters over one store
    ///
    /// The orders exporter is only registered when commerce is enabled.
    pub fn with_store<S>(store: Arc<S>, commerce_enabled: bool) -> Result<Self>
    where
        S: UserDirectory + ProductCatalog + TaxonomyStore + OrderStore + 'static,
    {
        let mut registry = Self::new();
        registry.register(Box::new(UsersExporter::new(store.clone())))?;
        registry.register(Box::new(ProductsExporter::new(store.clone())))?;
        registry.register(Box::new(CategoriesExporter::new(store.clone())))?;
        if commerce_enabled {
            registry.register(Box::new(OrdersExporter::new(store)))?;
        } else {
            debug!("Commerce disabled; orders exporter not registered");
        }
        Ok(registry)
    }

    /// Add an exporter. Ids must be unique and titles non-empty.
    pub fn register(&mut self, exporter: Box<dyn Exporter>) -> Result<()> {
        let descriptor = exporter.descriptor();
        descriptor.validate()?;
        if self.get(&descriptor.id).is_some() {
            return Err(ExportError::MisconfiguredExporter(format!(
                "duplicate exporter id '{}'",
                descriptor.id
            ))
            .into());
        }
        debug!("Registered exporter '{}'", descriptor.id);
        self.exporters.push(exporter);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&dyn Exporter> {
        self.exporters
            .iter()
            .find(|e| e.descriptor().id == id)
            .map(|e| e.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Exporter> {
        self.exporters.iter().map(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }

    /// Offer a request to the registered exporters
    ///
    /// # Returns
    /// * `Result<ExportOutcome>` - `NotAddressed` when no registered exporter
    ///   is addressed, including triggers naming an unregistered exporter
    pub async fn dispatch<T: ResponseTransport>(
        &self,
        request: &ExportRequest,
        gate: &AuthorizationGate,
        settings: ExportSettings,
        transport: &mut T,
        now: DateTime<Utc>,
    ) -> Result<ExportOutcome> {
        for exporter in self.iter() {
            let mut job = ExportJob::new(exporter, gate, settings);
            match job.run(request, transport, now).await? {
                ExportOutcome::NotAddressed => continue,
                completed => return Ok(completed),
            }
        }

        if let (true, Some(id)) = (request.is_export_action(), request.exporter_id.as_deref()) {
            info!("No exporter registered for '{}'", id);
        }
        Ok(ExportOutcome::NotAddressed)
    }

    /// Trigger links for an admin surface
    ///
    /// Only the top table-navigation slot renders a trigger; surfaces whose
    /// exporter is not registered render none.
    pub fn trigger_links(
        &self,
        surface: AdminSurface,
        position: TablePosition,
        admin_url: &str,
        gate: &AuthorizationGate,
        caller: &Caller,
        current: &FilterSet,
        now_secs: u64,
    ) -> Vec<TriggerLink> {
        if position != TablePosition::Top {
            return Vec::new();
        }
        let Some(exporter) = self.get(surface.exporter_id()) else {
            return Vec::new();
        };

        let descriptor = exporter.descriptor();
        let token = gate.issue_token(caller, &descriptor.id, now_secs);
        vec![TriggerLink {
            exporter_id: descriptor.id.clone(),
            label: TRIGGER_LABEL.to_string(),
            url: trigger_url(admin_url, surface, &token, current),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenAuthority;
    use crate::export::MemoryTransport;
    use crate::store::FixtureStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    fn gate() -> AuthorizationGate {
        AuthorizationGate::new(TokenAuthority::new("registry-secret", 86_400))
    }

    fn registry(commerce: bool) -> ExportRegistry {
        ExportRegistry::with_store(Arc::new(FixtureStore::default()), commerce).unwrap()
    }

    #[test]
    fn test_orders_only_with_commerce() {
        assert_eq!(registry(true).len(), 4);
        let without = registry(false);
        assert_eq!(without.len(), 3);
        assert!(without.get("orders").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = registry(false);
        let err = registry
            .register(Box::new(UsersExporter::new(Arc::new(FixtureStore::default()))))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate exporter id 'users'"));
    }

    #[test]
    fn test_trigger_links_top_only() {
        let registry = registry(true);
        let gate = gate();
        let caller = Caller::new(1, "s");
        let now_secs = now().timestamp() as u64;

        let bottom = registry.trigger_links(
            AdminSurface::Users,
            TablePosition::Bottom,
            "https://shop.test/wp-admin",
            &gate,
            &caller,
            &FilterSet::new(),
            now_secs,
        );
        assert!(bottom.is_empty());

        let top = registry.trigger_links(
            AdminSurface::Users,
            TablePosition::Top,
            "https://shop.test/wp-admin/",
            &gate,
            &caller,
            &FilterSet::new(),
            now_secs,
        );
        let token = gate.issue_token(&caller, "users", now_secs);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].label, TRIGGER_LABEL);
        assert_eq!(
            top[0].url,
            format!(
                "https://shop.test/wp-admin/users.php?action=export_csv&exporter_id=users&_token={token}"
            )
        );
    }

    #[test]
    fn test_trigger_links_need_registered_exporter() {
        let links = registry(false).trigger_links(
            AdminSurface::OrdersHpos,
            TablePosition::Top,
            "https://shop.test/wp-admin",
            &gate(),
            &Caller::new(1, "s"),
            &FilterSet::new(),
            0,
        );
        assert!(links.is_empty());
    }

    #[test]
    fn test_product_link_carries_screen_filters() {
        let mut current = FilterSet::new()
            .with("product_type", "simple")
            .with("paged", "2");
        current.push("product_cat", "tools");
        current.push("product_cat", "garden tools");

        let url = trigger_url("https://a.test/wp-admin", AdminSurface::Products, "tok", &current);
        assert_eq!(
            url,
            "https://a.test/wp-admin/edit.php?post_type=product&action=export_csv&exporter_id=products\
             &product_cat[]=tools&product_cat[]=garden%20tools&product_type=simple&_token=tok"
        );
    }

    #[test]
    fn test_category_and_hpos_targets() {
        let url = trigger_url("https://a.test/wp-admin", AdminSurface::ProductCategories, "t", &FilterSet::new());
        assert!(url.starts_with(
            "https://a.test/wp-admin/edit-tags.php?taxonomy=product_cat&post_type=product&action=export_csv"
        ));
        assert_eq!(
            trigger_url("x", AdminSurface::OrdersHpos, "t", &FilterSet::new()),
            trigger_url("x", AdminSurface::Orders, "t", &FilterSet::new())
        );
        assert_eq!(AdminSurface::from_name("orders-hpos"), Some(AdminSurface::OrdersHpos));
    }

    #[tokio::test]
    async fn test_dispatch_unregistered_exporter_is_a_no_op() {
        let registry = registry(false);
        for id in ["orders", "pages"] {
            let request = ExportRequest::from_query(
                &format!("action=export_csv&exporter_id={id}"),
                Caller::anonymous(),
            );
            let mut transport = MemoryTransport::new();
            let outcome = registry
                .dispatch(&request, &gate(), ExportSettings::default(), &mut transport, now())
                .await
                .unwrap();
            assert_eq!(outcome, ExportOutcome::NotAddressed);
            assert_eq!(transport.open_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_dispatch_ignores_non_export_requests() {
        let registry = registry(true);
        let request = ExportRequest::from_query("page=1", Caller::anonymous());
        let mut transport = MemoryTransport::new();
        let outcome = registry
            .dispatch(&request, &gate(), ExportSettings::default(), &mut transport, now())
            .await
            .unwrap();
        assert_eq!(outcome, ExportOutcome::NotAddressed);
    }

    #[tokio::test]
    async fn test_dispatch_runs_addressed_exporter() {
        let registry = registry(true);
        let gate = gate();
        let caller = Caller::new(1, "s").with_capability("manage_categories");
        let token = gate.issue_token(&caller, "categories", now().timestamp() as u64);
        let request = ExportRequest::from_query(
            &format!("action=export_csv&exporter_id=categories&_token={token}"),
            caller,
        );

        let mut transport = MemoryTransport::new();
        let outcome = registry
            .dispatch(&request, &gate, ExportSettings::default(), &mut transport, now())
            .await
            .unwrap();
        let ExportOutcome::Completed(summary) = outcome else {
            panic!("expected a completed export");
        };
        assert_eq!(summary.exporter_id, "categories");
        assert_eq!(summary.rows, 0);
        assert_eq!(transport.open_count(), 1);
    }
}
