use std::sync::Arc;

use engine_logging::engine_debug;
use purge_core::{Candidate, ItemHandle, Partition};
use serde::Deserialize;
use thiserror::Error;

use crate::{Transport, TransportError, TransportRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The source now shows the requested partition.
    Positioned,
    /// Reaching the partition reloaded the surface; in-memory progress must be
    /// re-derived from the persisted cursor.
    Reloaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("listing request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("no partition selected")]
    NotPositioned,
    /// The remote refused the listing with a rate-limit status.
    #[error("listing throttled by remote")]
    Throttled,
}

/// Where candidates come from. The engine never looks behind this interface.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    async fn current_partition(&self) -> Option<Partition>;
    async fn navigate_to(&mut self, partition: Partition) -> Result<Navigation, SourceError>;
    /// Candidates on the current page, in listing order.
    async fn list_candidates(&mut self) -> Result<Vec<Candidate>, SourceError>;
    /// True while the current page is still rendering or fetching.
    async fn is_loading(&self) -> bool;
    async fn has_next_page(&self) -> bool;
    async fn go_to_next_page(&mut self) -> Result<(), SourceError>;
    async fn has_more_to_load(&self) -> bool;
    async fn load_more(&mut self) -> Result<(), SourceError>;
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    items: Vec<ListingItem>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    id: String,
    #[serde(default)]
    created_at: Option<serde_json::Value>,
    #[serde(default)]
    text: Option<String>,
}

impl ListingItem {
    fn into_candidate(self) -> Candidate {
        // Listings report either RFC 3339 strings or epoch numbers; anything
        // else is kept verbatim and fails to parse later, which protects it.
        let created_at = self.created_at.and_then(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });
        Candidate {
            handle: ItemHandle(self.id),
            created_at,
            text: self.text,
        }
    }
}

/// Paginated JSON listing: `GET <listing_path>?sort=<partition>[&after=<token>]`.
///
/// Every `list_candidates` call re-fetches the current page so deletions made
/// since the last call are reflected.
pub struct HttpContentSource {
    transport: Arc<dyn Transport>,
    listing_path: String,
    page_size: Option<u32>,
    partition: Option<Partition>,
    after: Option<String>,
    next_after: Option<String>,
}

impl HttpContentSource {
    pub fn new(transport: Arc<dyn Transport>, listing_path: impl Into<String>) -> Self {
        Self {
            transport,
            listing_path: listing_path.into(),
            page_size: None,
            partition: None,
            after: None,
            next_after: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    fn listing_request(&self, partition: Partition) -> TransportRequest {
        let mut request =
            TransportRequest::get(self.listing_path.clone()).with_query("sort", partition.as_str());
        if let Some(after) = &self.after {
            request = request.with_query("after", after.clone());
        }
        if let Some(limit) = self.page_size {
            request = request.with_query("limit", limit.to_string());
        }
        request
    }
}

#[async_trait::async_trait]
impl ContentSource for HttpContentSource {
    async fn current_partition(&self) -> Option<Partition> {
        self.partition
    }

    async fn navigate_to(&mut self, partition: Partition) -> Result<Navigation, SourceError> {
        self.partition = Some(partition);
        self.after = None;
        self.next_after = None;
        Ok(Navigation::Positioned)
    }

    async fn list_candidates(&mut self) -> Result<Vec<Candidate>, SourceError> {
        let partition = self.partition.ok_or(SourceError::NotPositioned)?;
        let response = self
            .transport
            .execute(self.listing_request(partition))
            .await?;
        if response.is_throttled() {
            return Err(SourceError::Throttled);
        }
        let response = response.require_success()?;
        let page: ListingPage = response.json()?;
        engine_debug!(
            "listing {partition} returned {} items, after={:?}",
            page.items.len(),
            page.after
        );
        self.next_after = page.after.filter(|token| !token.is_empty());
        Ok(page
            .items
            .into_iter()
            .map(ListingItem::into_candidate)
            .collect())
    }

    async fn is_loading(&self) -> bool {
        false
    }

    async fn has_next_page(&self) -> bool {
        self.next_after.is_some()
    }

    async fn go_to_next_page(&mut self) -> Result<(), SourceError> {
        self.after = self.next_after.take();
        Ok(())
    }

    async fn has_more_to_load(&self) -> bool {
        false
    }

    async fn load_more(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}
