//! JSON-backed record store
//!
//! Loads every record kind from one JSON document and answers the read
//! interfaces with the platform's default orderings: users by login, products
//! and orders newest first, terms by name.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoreError};

use super::{
    CategoryTerm, Order, OrderQuery, OrderStore, Product, ProductCatalog, ProductQuery,
    TaxonomyStore, TermQuery, UserAccount, UserDirectory, UserQuery, PRODUCT_CATEGORY_TAXONOMY,
    PRODUCT_TYPE_TAXONOMY,
};

/// Raw fixture document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureData {
    #[serde(default)]
    pub users: Vec<UserAccount>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub categories: Vec<CategoryTerm>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// In-memory store over a [`FixtureData`] document.
#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    data: FixtureData,
}

impl FixtureStore {
    pub fn new(data: FixtureData) -> Self {
        Self { data }
    }

    /// Parse a fixture document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let data: FixtureData = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        Ok(Self::new(data))
    }

    /// Load a fixture document from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let store = Self::from_json(&json)?;
        debug!(
            "Loaded fixture store from {}: {} users, {} products, {} categories, {} orders",
            path.display(),
            store.data.users.len(),
            store.data.products.len(),
            store.data.categories.len(),
            store.data.orders.len()
        );
        Ok(store)
    }

    pub fn data(&self) -> &FixtureData {
        &self.data
    }

    fn term(&self, id: u64) -> Option<&CategoryTerm> {
        self.data.categories.iter().find(|t| t.id == id)
    }

    /// Ids of the categories with one of `slugs`, plus all their descendants.
    fn category_ids_with_descendants(&self, slugs: &[String]) -> HashSet<u64> {
        let mut ids: HashSet<u64> = self
            .data
            .categories
            .iter()
            .filter(|t| slugs.iter().any(|s| s == &t.slug))
            .map(|t| t.id)
            .collect();

        let children: HashMap<u64, Vec<u64>> =
            self.data
                .categories
                .iter()
                .fold(HashMap::new(), |mut acc, t| {
                    acc.entry(t.parent).or_default().push(t.id);
                    acc
                });

        let mut frontier: Vec<u64> = ids.iter().copied().collect();
        while let Some(id) = frontier.pop() {
            for child in children.get(&id).into_iter().flatten() {
                if ids.insert(*child) {
                    frontier.push(*child);
                }
            }
        }
        ids
    }

    fn product_matches(&self, product: &Product, query: &ProductQuery) -> bool {
        if product.status != query.status {
            return false;
        }
        query.taxonomy_filters.iter().all(|filter| {
            match filter.taxonomy.as_str() {
                PRODUCT_CATEGORY_TAXONOMY => {
                    let allowed = self.category_ids_with_descendants(&filter.slugs);
                    product.category_ids.iter().any(|id| allowed.contains(id))
                }
                PRODUCT_TYPE_TAXONOMY => filter.slugs.iter().any(|s| s == &product.product_type),
                _ => false,
            }
        })
    }
}

#[async_trait]
impl UserDirectory for FixtureStore {
    async fn query_users(&self, query: &UserQuery) -> Result<Vec<UserAccount>> {
        let mut users: Vec<UserAccount> = self
            .data
            .users
            .iter()
            .filter(|u| match &query.role {
                Some(role) => u.roles.iter().any(|r| r == role),
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(users)
    }
}

#[async_trait]
impl ProductCatalog for FixtureStore {
    async fn query_products(&self, query: &ProductQuery) -> Result<Vec<u64>> {
        let mut products: Vec<&Product> = self
            .data
            .products
            .iter()
            .filter(|p| self.product_matches(p, query))
            .collect();
        // Newest first; undated products last, ties by descending id.
        products.sort_by(|a, b| {
            let ka = a.date_created.as_ref().map(|d| d.to_timestamp());
            let kb = b.date_created.as_ref().map(|d| d.to_timestamp());
            kb.cmp(&ka).then(b.id.cmp(&a.id))
        });
        Ok(products.into_iter().map(|p| p.id).collect())
    }

    async fn get_product(&self, id: u64) -> Result<Option<Product>> {
        Ok(self.data.products.iter().find(|p| p.id == id).cloned())
    }

    async fn product_category_names(&self, id: u64) -> Result<Vec<String>> {
        let Some(product) = self.data.products.iter().find(|p| p.id == id) else {
            return Ok(Vec::new());
        };
        let mut names: Vec<String> = product
            .category_ids
            .iter()
            .filter_map(|cid| self.term(*cid))
            .map(|t| t.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl TaxonomyStore for FixtureStore {
    async fn list_terms(&self, query: &TermQuery) -> Result<Vec<CategoryTerm>> {
        if query.taxonomy != PRODUCT_CATEGORY_TAXONOMY {
            return Ok(Vec::new());
        }
        let mut terms: Vec<CategoryTerm> = self
            .data
            .categories
            .iter()
            .filter(|t| !query.hide_empty || t.count > 0)
            .cloned()
            .collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(terms)
    }

    async fn get_term(&self, id: u64) -> Result<Option<CategoryTerm>> {
        Ok(self.term(id).cloned())
    }
}

#[async_trait]
impl OrderStore for FixtureStore {
    async fn query_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .data
            .orders
            .iter()
            .filter(|o| match &query.status {
                Some(status) => &o.status == status,
                None => true,
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            let ka = a.date_created.as_ref().map(|d| d.to_timestamp());
            let kb = b.date_created.as_ref().map(|d| d.to_timestamp());
            kb.cmp(&ka).then(b.id.cmp(&a.id))
        });
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaxonomyFilter;

    const FIXTURE: &str = r#"{
        "users": [
            {"id": 2, "login": "zoe", "roles": ["editor"]},
            {"id": 1, "login": "adam", "roles": ["administrator", "editor"]},
            {"id": 3, "login": "mia", "roles": ["subscriber"]}
        ],
        "categories": [
            {"id": 10, "name": "Tools", "slug": "tools", "count": 2},
            {"id": 11, "name": "Hammers", "slug": "hammers", "parent": 10, "count": 1},
            {"id": 12, "name": "Empty", "slug": "empty"}
        ],
        "products": [
            {"id": 100, "name": "Claw hammer", "type": "simple", "category_ids": [11],
             "date_created": "2024-01-02 10:00:00"},
            {"id": 101, "name": "Saw", "type": "variable", "category_ids": [10],
             "date_created": "2024-03-01T09:00:00+00:00"},
            {"id": 102, "name": "Draft", "status": "draft", "category_ids": [10]}
        ],
        "orders": [
            {"id": 7, "status": "completed", "date_created": "2024-02-01 08:00:00"},
            {"id": 8, "status": "processing", "date_created": "2024-02-03 08:00:00"}
        ]
    }"#;

    fn store() -> FixtureStore {
        FixtureStore::from_json(FIXTURE).unwrap()
    }

    #[tokio::test]
    async fn test_users_by_role_sorted_by_login() {
        let users = store()
            .query_users(&UserQuery {
                role: Some("editor".to_string()),
            })
            .await
            .unwrap();
        let logins: Vec<&str> = users.iter().map(|u| u.login.as_str()).collect();
        assert_eq!(logins, vec!["adam", "zoe"]);
    }

    #[tokio::test]
    async fn test_products_only_published_newest_first() {
        let ids = store().query_products(&ProductQuery::default()).await.unwrap();
        assert_eq!(ids, vec![101, 100]);
    }

    #[tokio::test]
    async fn test_category_filter_includes_children() {
        let query = ProductQuery {
            taxonomy_filters: vec![TaxonomyFilter {
                taxonomy: PRODUCT_CATEGORY_TAXONOMY.to_string(),
                slugs: vec!["tools".to_string()],
            }],
            ..ProductQuery::default()
        };
        let ids = store().query_products(&query).await.unwrap();
        assert_eq!(ids, vec![101, 100]);

        let query = ProductQuery {
            taxonomy_filters: vec![TaxonomyFilter {
                taxonomy: PRODUCT_TYPE_TAXONOMY.to_string(),
                slugs: vec!["variable".to_string()],
            }],
            ..ProductQuery::default()
        };
        assert_eq!(store().query_products(&query).await.unwrap(), vec![101]);
    }

    #[tokio::test]
    async fn test_terms_sorted_by_name_including_empty() {
        let terms = store()
            .list_terms(&TermQuery {
                taxonomy: PRODUCT_CATEGORY_TAXONOMY.to_string(),
                hide_empty: false,
            })
            .await
            .unwrap();
        let names: Vec<&str> = terms.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Empty", "Hammers", "Tools"]);
    }

    #[tokio::test]
    async fn test_orders_by_status() {
        let orders = store()
            .query_orders(&OrderQuery {
                status: Some("completed".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, 7);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = FixtureStore::load(Path::new("/no/such/fixture.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Store unavailable"));
    }
}
