//! Product category export

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{Described, EntityKind, ExporterDescriptor, RecordSource};
use crate::error::Result;
use crate::export::encoder::{Cell, Row};
use crate::request::FilterSet;
use crate::store::{CategoryTerm, TaxonomyStore, TermQuery, PRODUCT_CATEGORY_TAXONOMY};

/// Exports every product category, including empty ones. Takes no filters.
pub struct CategoriesExporter {
    taxonomy: Arc<dyn TaxonomyStore>,
    descriptor: ExporterDescriptor,
}

impl CategoriesExporter {
    pub fn new(taxonomy: Arc<dyn TaxonomyStore>) -> Self {
        Self {
            taxonomy,
            descriptor: EntityKind::Categories.descriptor(),
        }
    }

    /// Name of the parent term; empty for top-level or unresolvable parents.
    async fn parent_name(&self, parent: u64) -> String {
        if parent == 0 {
            return String::new();
        }
        match self.taxonomy.get_term(parent).await {
            Ok(Some(term)) => term.name,
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Parent lookup failed for term {}: {}", parent, e);
                String::new()
            }
        }
    }
}

impl Described for CategoriesExporter {
    fn descriptor(&self) -> &ExporterDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl RecordSource for CategoriesExporter {
    type Record = CategoryTerm;

    async fn fetch_all(&self, _filters: &FilterSet) -> Result<Vec<CategoryTerm>> {
        self.taxonomy
            .list_terms(&TermQuery {
                taxonomy: PRODUCT_CATEGORY_TAXONOMY.to_string(),
                hide_empty: false,
            })
            .await
    }

    async fn project(&self, term: &CategoryTerm) -> Row {
        vec![
            Cell::from(term.id),
            Cell::from(term.name.as_str()),
            Cell::from(term.slug.as_str()),
            Cell::from(term.description.as_str()),
            Cell::from(self.parent_name(term.parent).await),
            Cell::from(term.count),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FixtureStore;

    const FIXTURE: &str = r#"{
        "categories": [
            {"id": 5, "name": "Tools", "slug": "tools", "count": 3},
            {"id": 6, "name": "Saws", "slug": "saws", "parent": 5, "count": 1},
            {"id": 7, "name": "Orphan", "slug": "orphan", "parent": 99}
        ]
    }"#;

    fn exporter() -> CategoriesExporter {
        CategoriesExporter::new(Arc::new(FixtureStore::from_json(FIXTURE).unwrap()))
    }

    fn texts(row: &Row) -> Vec<String> {
        row.iter().map(Cell::to_text).collect()
    }

    #[tokio::test]
    async fn test_includes_empty_terms() {
        let terms = exporter().fetch_all(&FilterSet::new()).await.unwrap();
        assert_eq!(terms.len(), 3);
    }

    #[tokio::test]
    async fn test_parent_resolution() {
        let exporter = exporter();
        let terms = exporter.fetch_all(&FilterSet::new()).await.unwrap();
        let by_id = |id: u64| terms.iter().find(|t| t.id == id).unwrap();

        assert_eq!(
            texts(&exporter.project(by_id(5)).await),
            vec!["5", "Tools", "tools", "", "", "3"]
        );
        assert_eq!(exporter.project(by_id(6)).await[4].to_text(), "Tools");
        assert_eq!(exporter.project(by_id(7)).await[4].to_text(), "");
    }
}
