use std::sync::Arc;

use purge_core::Candidate;
use serde::Deserialize;
use serde_json::json;

use crate::{Transport, TransportError, TransportRequest};

/// Token proving the remote side offered a confirmation step for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation(pub String);

/// The two destructive requests of the delete protocol.
#[async_trait::async_trait]
pub trait DeletionActions: Send + Sync {
    /// Starts deleting `candidate`. `Ok(None)` means no confirmation is on
    /// offer for it, which is final for that item.
    async fn begin_delete(&self, candidate: &Candidate)
        -> Result<Option<Confirmation>, TransportError>;

    async fn confirm_delete(
        &self,
        candidate: &Candidate,
        confirmation: Confirmation,
    ) -> Result<(), TransportError>;
}

#[derive(Debug, Deserialize)]
struct BeginReply {
    #[serde(default)]
    confirmation: Option<String>,
}

/// `POST items/<id>/delete` then `POST items/<id>/delete/confirm`.
pub struct HttpDeletionActions {
    transport: Arc<dyn Transport>,
    items_path: String,
}

impl HttpDeletionActions {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            items_path: "items".to_string(),
        }
    }

    pub fn with_items_path(mut self, items_path: impl Into<String>) -> Self {
        self.items_path = items_path.into();
        self
    }

    fn item_path(&self, candidate: &Candidate, suffix: &str) -> String {
        format!(
            "{}/{}/{suffix}",
            self.items_path.trim_end_matches('/'),
            candidate.handle
        )
    }
}

#[async_trait::async_trait]
impl DeletionActions for HttpDeletionActions {
    async fn begin_delete(
        &self,
        candidate: &Candidate,
    ) -> Result<Option<Confirmation>, TransportError> {
        let response = self
            .transport
            .execute(TransportRequest::post(self.item_path(candidate, "delete")))
            .await?;
        // Forbidden or gone: the item cannot be deleted by this actor.
        if matches!(response.status, 403 | 404) {
            return Ok(None);
        }
        let reply: BeginReply = response.require_success()?.json()?;
        Ok(reply
            .confirmation
            .filter(|token| !token.is_empty())
            .map(Confirmation))
    }

    async fn confirm_delete(
        &self,
        candidate: &Candidate,
        confirmation: Confirmation,
    ) -> Result<(), TransportError> {
        let request = TransportRequest::post(self.item_path(candidate, "delete/confirm"))
            .with_json(json!({ "confirmation": confirmation.0 }));
        self.transport.execute(request).await?.require_success()?;
        Ok(())
    }
}
