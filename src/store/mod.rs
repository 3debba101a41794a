//! Page store collaborator contract
//!
//! Persistence proper (relational schema, object storage) lives outside the
//! crawl core; this trait is the only surface the core consumes. `load`
//! answers cache lookups keyed on the normalized URL, `store` takes
//! ownership of a processed page. The in-memory implementation backs tests
//! and single-shot runs.

use crate::page::FetchedPage;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// The persistence seam consumed by the crawl core
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Returns the stored page for a normalized URL, if any. Freshness
    /// windows are the caller's concern.
    async fn load(&self, normalized_url: &str) -> Result<Option<FetchedPage>>;

    /// Persists a page, replacing any stored copy for the same URL.
    async fn store(&self, page: &FetchedPage) -> Result<()>;
}

/// Keeps pages in a map for tests and one-off runs
#[derive(Default)]
pub struct MemoryPageStore {
    pages: RwLock<HashMap<String, FetchedPage>>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pages.
    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pages.read().await.is_empty()
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn load(&self, normalized_url: &str) -> Result<Option<FetchedPage>> {
        Ok(self.pages.read().await.get(normalized_url).cloned())
    }

    async fn store(&self, page: &FetchedPage) -> Result<()> {
        self.pages
            .write()
            .await
            .insert(page.normalized_url.to_string(), page.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ScraperUrl;

    fn sample_page(url: &str) -> FetchedPage {
        let target = ScraperUrl::parse(url, 0).unwrap();
        FetchedPage::new(&target, 200, HashMap::new(), b"<html></html>".to_vec())
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let store = MemoryPageStore::new();
        assert!(store.load("https://example.com/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let store = MemoryPageStore::new();
        let page = sample_page("https://example.com/page");
        store.store(&page).await.unwrap();

        let loaded = store
            .load(page.normalized_url.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.hash, page.hash);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_replaces() {
        let store = MemoryPageStore::new();
        let mut page = sample_page("https://example.com/page");
        store.store(&page).await.unwrap();

        page.visible_text = "updated".to_string();
        store.store(&page).await.unwrap();

        let loaded = store
            .load(page.normalized_url.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.visible_text, "updated");
        assert_eq!(store.len().await, 1);
    }
}
