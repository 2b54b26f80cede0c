//! Emby API connector implementation
//!
//! Implements the `MediaServer` trait against an Emby server's REST API.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::media::{CollectionSummary, ItemKind, LibraryItem, MediaServer, ServerInfo};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::EmbyError;
use crate::types::{CreatedCollection, EmbyItem, ItemsResponse, SystemInfo};

const ITEM_FIELDS: &str = "ProviderIds,ProductionYear,Path";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Emby API connector
///
/// Every request carries the `X-Emby-Token` header. Reads go through the
/// client's retry policy; collection writes are sent once.
pub struct EmbyConnector {
    http_client: Arc<dyn HttpClient>,
    /// Server root without trailing slash
    server_url: String,
    api_key: String,
}

impl EmbyConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        server_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Emby's `IncludeItemTypes` value for an item kind
    fn item_type(kind: ItemKind) -> &'static str {
        match kind {
            ItemKind::Movie => "Movie",
            ItemKind::Show => "Series",
        }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", self.server_url, path))
            .header("X-Emby-Token", self.api_key.clone())
            .timeout(REQUEST_TIMEOUT)
    }

    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;
        Self::check_status(response)
    }

    async fn post_once(&self, request: HttpRequest) -> Result<HttpResponse> {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let response = self.http_client.execute_with_retry(request, policy).await?;
        Self::check_status(response)
    }

    /// Accept 200/201/204; map 401 to an authentication failure.
    fn check_status(response: HttpResponse) -> Result<HttpResponse> {
        match response.status {
            200 | 201 | 204 => Ok(response),
            401 => Err(EmbyError::AuthenticationFailed.into()),
            status => Err(EmbyError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            }
            .into()),
        }
    }

    fn parse_items(response: &HttpResponse) -> Result<Vec<EmbyItem>> {
        let parsed: ItemsResponse = serde_json::from_slice(&response.body)
            .map_err(|e| EmbyError::ParseError(format!("Failed to parse items: {}", e)))?;
        Ok(parsed.items)
    }

    /// Collection id from a creation response body, if the server sent one
    fn created_id(response: &HttpResponse) -> Option<String> {
        if response.body.is_empty() {
            return None;
        }
        match serde_json::from_slice::<CreatedCollection>(&response.body) {
            Ok(created) => created.id.filter(|id| !id.is_empty()),
            Err(e) => {
                debug!("Collection creation body had no usable id: {}", e);
                None
            }
        }
    }

    fn convert_item(item: EmbyItem, kind: ItemKind) -> LibraryItem {
        LibraryItem {
            id: item.id,
            name: item.name,
            kind,
            provider_ids: item.provider_ids,
        }
    }
}

#[async_trait]
impl MediaServer for EmbyConnector {
    #[instrument(skip(self))]
    async fn server_info(&self) -> Result<ServerInfo> {
        let response = self.get(self.request(HttpMethod::Get, "/System/Info")).await?;
        let info: SystemInfo = serde_json::from_slice(&response.body)
            .map_err(|e| EmbyError::ParseError(format!("Failed to parse system info: {}", e)))?;

        debug!(server = %info.server_name, "Emby server reachable");
        Ok(ServerInfo {
            server_name: info.server_name,
            version: info.version,
        })
    }

    #[instrument(skip(self))]
    async fn list_items(&self, kind: ItemKind) -> Result<Vec<LibraryItem>> {
        let request = self
            .request(HttpMethod::Get, "/Items")
            .query("IncludeItemTypes", Self::item_type(kind))
            .query("Recursive", "true")
            .query("Fields", ITEM_FIELDS)
            .query("EnableImages", "false");

        let response = self.get(request).await?;
        let items: Vec<LibraryItem> = Self::parse_items(&response)?
            .into_iter()
            .map(|item| Self::convert_item(item, kind))
            .collect();

        info!("Found {} {} items in Emby library", items.len(), kind);
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let request = self
            .request(HttpMethod::Get, "/Items")
            .query("IncludeItemTypes", "BoxSet")
            .query("Recursive", "true")
            .query("Fields", "Name,Id");

        let response = self.get(request).await?;
        Ok(Self::parse_items(&response)?
            .into_iter()
            .map(|item| CollectionSummary {
                id: item.id,
                name: item.name,
            })
            .collect())
    }

    #[instrument(skip(self, item_ids), fields(items = item_ids.len()))]
    async fn create_collection(&self, name: &str, item_ids: &[String]) -> Result<Option<String>> {
        info!("Creating collection '{}' with {} items", name, item_ids.len());

        let request = self
            .request(HttpMethod::Post, "/Collections")
            .query("api_key", self.api_key.clone())
            .query("IsLocked", "false")
            .query("Name", name)
            .query("Ids", item_ids.join(","));

        let response = self.post_once(request).await?;
        Ok(Self::created_id(&response))
    }

    #[instrument(skip(self))]
    async fn create_collection_with_item(
        &self,
        name: &str,
        item_id: &str,
    ) -> Result<Option<String>> {
        let request = self
            .request(HttpMethod::Post, &format!("/Items/{}/Collection", item_id))
            .query("Name", name)
            .query("IsLocked", "false");

        let response = self.post_once(request).await?;
        Ok(Self::created_id(&response))
    }

    #[instrument(skip(self))]
    async fn add_to_collection(&self, collection_id: &str, item_id: &str) -> Result<()> {
        let request = self
            .request(HttpMethod::Post, &format!("/Collections/{}/Items", collection_id))
            .query("Ids", item_id);

        match self.post_once(request).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Failed to add item {} to collection {}: {}", item_id, collection_id, e);
                Err(e)
            }
        }
    }
}
