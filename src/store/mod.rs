//! Record-store read interfaces
//!
//! The exporters only consume these traits; the content-management platform
//! (or [`FixtureStore`] in the binary and tests) provides the implementation.
//! Record structs carry exactly the fields the exporters project.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::utils::time::TIMESTAMP_FORMAT;

pub mod fixture;

pub use fixture::{FixtureData, FixtureStore};

/// Taxonomy holding product categories.
pub const PRODUCT_CATEGORY_TAXONOMY: &str = "product_cat";

/// Taxonomy holding product types (simple, variable, ...).
pub const PRODUCT_TYPE_TAXONOMY: &str = "product_type";

/// Post status of products visible in exports.
pub const PUBLISHED: &str = "publish";

/// A date value as handed out by a store.
///
/// Stores return either a zone-aware date (rendered in its own offset, the
/// site's local time) or a plain wall-clock date. Both normalize to the same
/// fixed-width `YYYY-MM-DD HH:MM:SS` text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreDate {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl StoreDate {
    /// Parse RFC 3339 (zoned) or `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` (naive).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(StoreDate::Zoned(dt));
        }
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
            .ok()
            .map(StoreDate::Naive)
    }

    /// Fixed-width timestamp text.
    pub fn to_timestamp(&self) -> String {
        match self {
            StoreDate::Zoned(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
            StoreDate::Naive(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for StoreDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_timestamp())
    }
}

impl Serialize for StoreDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            StoreDate::Zoned(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            StoreDate::Naive(dt) => {
                serializer.serialize_str(&dt.format(TIMESTAMP_FORMAT).to_string())
            }
        }
    }
}

impl<'de> Deserialize<'de> for StoreDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StoreDate::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date: {raw}")))
    }
}

/// Normalize an optional store date; absent dates become empty text.
pub fn format_date(date: Option<&StoreDate>) -> String {
    date.map(StoreDate::to_timestamp).unwrap_or_default()
}

/// A user directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub registered: Option<StoreDate>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub website: String,
}

/// User directory query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub role: Option<String>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub price: String,
    /// Raw stock state: `instock`, `outofstock`, `onbackorder`, ...
    #[serde(default)]
    pub stock_status: String,
    #[serde(rename = "type", default = "default_product_type")]
    pub product_type: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub date_created: Option<StoreDate>,
    #[serde(default)]
    pub category_ids: Vec<u64>,
}

fn default_product_type() -> String {
    "simple".to_string()
}

fn default_status() -> String {
    PUBLISHED.to_string()
}

/// Taxonomy constraint: the item must carry one of `slugs` in `taxonomy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyFilter {
    pub taxonomy: String,
    pub slugs: Vec<String>,
}

/// Content-item query for products. All taxonomy filters must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub status: String,
    pub taxonomy_filters: Vec<TaxonomyFilter>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            status: PUBLISHED.to_string(),
            taxonomy_filters: Vec::new(),
        }
    }
}

/// A taxonomy term (product category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTerm {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    /// Parent term id, 0 for a top-level term.
    #[serde(default)]
    pub parent: u64,
    /// Number of products in the term.
    #[serde(default)]
    pub count: u64,
}

/// Taxonomy listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermQuery {
    pub taxonomy: String,
    pub hide_empty: bool,
}

/// One shipping line item of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingLine {
    #[serde(default)]
    pub method_title: Option<String>,
}

/// A commerce order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    /// Display number; defaults to the id when the store has none.
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub date_created: Option<StoreDate>,
    /// Status without the `wc-` prefix.
    pub status: String,
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub billing_first_name: String,
    #[serde(default)]
    pub billing_last_name: String,
    #[serde(default)]
    pub billing_email: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_method_title: Option<String>,
    #[serde(default)]
    pub shipping_lines: Vec<ShippingLine>,
}

impl Order {
    pub fn order_number(&self) -> String {
        self.number
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Order query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<String>,
}

/// Read access to the user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn query_users(&self, query: &UserQuery) -> Result<Vec<UserAccount>>;
}

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Ids of the products matching the query, in listing order.
    async fn query_products(&self, query: &ProductQuery) -> Result<Vec<u64>>;

    /// Load one product; `None` when it no longer resolves.
    async fn get_product(&self, id: u64) -> Result<Option<Product>>;

    /// Names of the categories assigned to a product, ordered by name.
    async fn product_category_names(&self, id: u64) -> Result<Vec<String>>;
}

/// Read access to the taxonomy store.
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    async fn list_terms(&self, query: &TermQuery) -> Result<Vec<CategoryTerm>>;

    /// Look up one term by id; `None` when it does not exist.
    async fn get_term(&self, id: u64) -> Result<Option<CategoryTerm>>;
}

/// Read access to the order store.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn query_orders(&self, query: &OrderQuery) -> Result<Vec<Order>>;
}
