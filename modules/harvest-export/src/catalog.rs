use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One WARC the catalog knows about for a given collection, resolved to a
/// path on this worker's local filesystem (or a shared mount it can read).
#[derive(Debug, Clone)]
pub struct WarcDescriptor {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CollectionDescriptor {
    pub id: String,
    pub name: String,
}

/// The exporter's only external collaborator: a service that knows which
/// WARCs belong to a collection and can look collections up by prefix. No
/// concrete implementation ships against a real cataloging service — see
/// [`ReqwestCatalogClient`] and module docs.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn warcs(
        &self,
        collection_id: &str,
        seed_ids: &[String],
        harvest_date_start: Option<DateTime<Utc>>,
        harvest_date_end: Option<DateTime<Utc>>,
        created_date_start: Option<DateTime<Utc>>,
        created_date_end: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<WarcDescriptor>>;

    async fn collections(&self, collection_id_startswith: &str) -> anyhow::Result<Vec<CollectionDescriptor>>;
}

/// Same-process fake used in tests: WARCs and collections are registered up
/// front and every date/seed filter is ignored.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    warcs_by_collection: HashMap<String, Vec<WarcDescriptor>>,
    collections: Vec<CollectionDescriptor>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warcs(mut self, collection_id: impl Into<String>, warcs: Vec<WarcDescriptor>) -> Self {
        self.warcs_by_collection.insert(collection_id.into(), warcs);
        self
    }

    pub fn with_collection(mut self, collection: CollectionDescriptor) -> Self {
        self.collections.push(collection);
        self
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn warcs(
        &self,
        collection_id: &str,
        _seed_ids: &[String],
        _harvest_date_start: Option<DateTime<Utc>>,
        _harvest_date_end: Option<DateTime<Utc>>,
        _created_date_start: Option<DateTime<Utc>>,
        _created_date_end: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<WarcDescriptor>> {
        Ok(self
            .warcs_by_collection
            .get(collection_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn collections(&self, collection_id_startswith: &str) -> anyhow::Result<Vec<CollectionDescriptor>> {
        Ok(self
            .collections
            .iter()
            .filter(|c| c.id.starts_with(collection_id_startswith))
            .cloned()
            .collect())
    }
}

/// External HTTP-backed collaborator sketch. Wiring this against a real
/// cataloging service is out of scope; both methods return an error naming
/// the gap rather than silently returning empty results.
pub struct ReqwestCatalogClient {
    base_url: String,
    client: reqwest::Client,
}

impl ReqwestCatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CatalogClient for ReqwestCatalogClient {
    async fn warcs(
        &self,
        _collection_id: &str,
        _seed_ids: &[String],
        _harvest_date_start: Option<DateTime<Utc>>,
        _harvest_date_end: Option<DateTime<Utc>>,
        _created_date_start: Option<DateTime<Utc>>,
        _created_date_end: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<WarcDescriptor>> {
        let _ = &self.client;
        anyhow::bail!(
            "ReqwestCatalogClient ({}) is a collaborator sketch, not wired to a real cataloging service",
            self.base_url
        )
    }

    async fn collections(&self, _collection_id_startswith: &str) -> anyhow::Result<Vec<CollectionDescriptor>> {
        anyhow::bail!(
            "ReqwestCatalogClient ({}) is a collaborator sketch, not wired to a real cataloging service",
            self.base_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_catalog_returns_registered_warcs() {
        let catalog = InMemoryCatalog::new().with_warcs(
            "c1",
            vec![WarcDescriptor {
                id: "w1".to_string(),
                path: PathBuf::from("/tmp/w1.warc.gz"),
            }],
        );

        let warcs = catalog.warcs("c1", &[], None, None, None, None).await.unwrap();
        assert_eq!(warcs.len(), 1);
        assert_eq!(warcs[0].id, "w1");

        let none = catalog.warcs("missing", &[], None, None, None, None).await.unwrap();
        assert!(none.is_empty());
    }
}
