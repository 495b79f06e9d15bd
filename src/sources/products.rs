//! Product catalog export

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Described, EntityKind, ExporterDescriptor, RecordSource};
use crate::error::Result;
use crate::export::encoder::{Cell, Row};
use crate::request::FilterSet;
use crate::store::{
    format_date, Product, ProductCatalog, ProductQuery, TaxonomyFilter, PRODUCT_CATEGORY_TAXONOMY,
    PRODUCT_TYPE_TAXONOMY,
};

/// Display label for a raw stock state.
///
/// Only `instock` counts as in stock; backorders and unknown states do not.
pub fn stock_label(stock_status: &str) -> &'static str {
    if stock_status == "instock" {
        "In stock"
    } else {
        "Out of stock"
    }
}

/// Exports published products, optionally narrowed by category or type.
pub struct ProductsExporter {
    catalog: Arc<dyn ProductCatalog>,
    descriptor: ExporterDescriptor,
}

impl ProductsExporter {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self {
            catalog,
            descriptor: EntityKind::Products.descriptor(),
        }
    }

    /// Catalog query for a filter set.
    ///
    /// `product_cat` and `product_type` each accept one slug or a list; a
    /// list matches any of its slugs.
    pub fn query_for(filters: &FilterSet) -> ProductQuery {
        let taxonomy_filters = [PRODUCT_CATEGORY_TAXONOMY, PRODUCT_TYPE_TAXONOMY]
            .into_iter()
            .filter_map(|taxonomy| {
                let slugs = filters.values(taxonomy);
                (!slugs.is_empty()).then(|| TaxonomyFilter {
                    taxonomy: taxonomy.to_string(),
                    slugs: slugs.into_iter().map(str::to_string).collect(),
                })
            })
            .collect();

        ProductQuery {
            taxonomy_filters,
            ..ProductQuery::default()
        }
    }
}

impl Described for ProductsExporter {
    fn descriptor(&self) -> &ExporterDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl RecordSource for ProductsExporter {
    type Record = Product;

    async fn fetch_all(&self, filters: &FilterSet) -> Result<Vec<Product>> {
        let ids = self.catalog.query_products(&Self::query_for(filters)).await?;
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            match self.catalog.get_product(id).await? {
                Some(product) => products.push(product),
                None => debug!("Skipping product {} that no longer resolves", id),
            }
        }
        Ok(products)
    }

    async fn project(&self, product: &Product) -> Row {
        let categories = match self.catalog.product_category_names(product.id).await {
            Ok(names) => names.join(", "),
            Err(e) => {
                warn!("Category lookup failed for product {}: {}", product.id, e);
                String::new()
            }
        };

        vec![
            Cell::from(product.id),
            Cell::from(product.name.as_str()),
            Cell::from(product.sku.as_str()),
            Cell::from(product.price.as_str()),
            Cell::from(stock_label(&product.stock_status)),
            Cell::from(categories),
            Cell::from(product.product_type.as_str()),
            Cell::from(format_date(product.date_created.as_ref())),
        ]
    }
}
