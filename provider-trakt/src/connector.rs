//! Trakt API connector implementation
//!
//! Implements the `WatchlistSource` trait for the Trakt v2 list endpoints.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bridge_traits::media::ItemKind;
use bridge_traits::watchlist::{RemoteListEntry, WatchlistSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::TraktError;
use crate::types::ListItem;

/// Trakt API base URL
pub const TRAKT_API_BASE: &str = "https://api.trakt.tv";

const API_VERSION: &str = "2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trakt list connector
///
/// The access token is supplied per call so a refreshed token is picked up
/// without rebuilding the connector.
///
/// # Example
///
/// ```ignore
/// use provider_trakt::TraktConnector;
/// use bridge_traits::watchlist::WatchlistSource;
///
/// let connector = TraktConnector::new(http_client, client_id);
/// let entries = connector.list_entries("12345", &access_token).await?;
/// ```
pub struct TraktConnector {
    http_client: Arc<dyn HttpClient>,
    client_id: String,
    base_url: String,
}

impl TraktConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, client_id: impl Into<String>) -> Self {
        Self {
            http_client,
            client_id: client_id.into(),
            base_url: TRAKT_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn list_items_request(&self, list_id: &str, access_token: &str) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            format!("{}/lists/{}/items", self.base_url, list_id),
        )
        .header("Content-Type", "application/json")
        .header("trakt-api-version", API_VERSION)
        .header("trakt-api-key", self.client_id.clone())
        .bearer_token(access_token)
        .timeout(REQUEST_TIMEOUT)
    }

    /// Convert a Trakt list row to a `RemoteListEntry`
    fn convert_item(item: ListItem) -> RemoteListEntry {
        let kind = if item.is_movie() {
            ItemKind::Movie
        } else {
            ItemKind::Show
        };

        let Some(media) = item.media() else {
            debug!(item_type = %item.item_type, "List row has no media object");
            return RemoteListEntry::new(kind, "Unknown");
        };

        let mut entry = RemoteListEntry::new(
            kind,
            media.title.clone().unwrap_or_else(|| "Unknown".to_string()),
        );
        entry.year = media.year;
        entry.identifiers = media.ids.clone();
        entry
    }
}

#[async_trait]
impl WatchlistSource for TraktConnector {
    #[instrument(skip(self, access_token))]
    async fn list_entries(
        &self,
        list_id: &str,
        access_token: &str,
    ) -> Result<Vec<RemoteListEntry>> {
        info!("Fetching Trakt list {}", list_id);

        let request = self.list_items_request(list_id, access_token);
        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;

        match response.status {
            200 => {}
            401 | 403 => {
                warn!("Trakt rejected the access token: status={}", response.status);
                return Err(TraktError::AuthenticationFailed {
                    status: response.status,
                }
                .into());
            }
            404 => {
                return Err(TraktError::ListNotFound {
                    list_id: list_id.to_string(),
                }
                .into())
            }
            status => {
                warn!("Trakt list request failed: status={}", status);
                return Err(TraktError::ApiError {
                    status_code: status,
                    message: String::from_utf8_lossy(&response.body).to_string(),
                }
                .into());
            }
        }

        let items: Vec<ListItem> = serde_json::from_slice(&response.body).map_err(|e| {
            TraktError::ParseError(format!("Failed to parse list items: {}", e))
        })?;

        let entries: Vec<RemoteListEntry> = items.into_iter().map(Self::convert_item).collect();

        info!("Fetched {} entries from Trakt list {}", entries.len(), list_id);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::HttpResponse;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    const LIST_BODY: &str = r#"[
        {
            "rank": 1,
            "type": "movie",
            "movie": {
                "title": "Heat",
                "year": 1995,
                "ids": { "trakt": 1, "slug": "heat-1995", "imdb": "tt0113277", "tmdb": 949 }
            }
        },
        {
            "rank": 2,
            "type": "show",
            "show": {
                "title": "The Wire",
                "year": 2002,
                "ids": { "trakt": 2, "imdb": "tt0306414", "tmdb": 1438, "tvdb": 79126 }
            }
        },
        {
            "rank": 3,
            "type": "episode",
            "episode": { "season": 1, "number": 1 },
            "show": {
                "title": "Severance",
                "year": 2022,
                "ids": { "tvdb": 371980, "tmdb": null }
            }
        },
        { "rank": 4, "type": "season", "season": { "number": 2 } }
    ]"#;

    #[tokio::test]
    async fn test_list_entries_maps_rows() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|request| {
                request.url == "https://api.trakt.tv/lists/42/items"
                    && request.headers.get("Authorization") == Some(&"Bearer token".to_string())
                    && request.headers.get("trakt-api-version") == Some(&"2".to_string())
                    && request.headers.get("trakt-api-key") == Some(&"client".to_string())
            })
            .returning(|_| Ok(HttpResponse::new(200, LIST_BODY)));

        let connector = TraktConnector::new(Arc::new(mock_http), "client");
        let entries = connector.list_entries("42", "token").await.unwrap();

        assert_eq!(entries.len(), 4);

        assert_eq!(entries[0].kind, ItemKind::Movie);
        assert_eq!(entries[0].label(), "Heat (1995)");
        assert_eq!(entries[0].identifiers["imdb"], "tt0113277");
        assert_eq!(entries[0].identifiers["tmdb"], 949);

        assert_eq!(entries[1].kind, ItemKind::Show);
        assert_eq!(entries[1].identifiers["tvdb"], 79126);

        // episode rows resolve to their show
        assert_eq!(entries[2].kind, ItemKind::Show);
        assert_eq!(entries[2].title, "Severance");
        assert!(entries[2].identifiers["tmdb"].is_null());

        // season row without a show object
        assert_eq!(entries[3].kind, ItemKind::Show);
        assert!(entries[3].identifiers.is_empty());
    }

    #[tokio::test]
    async fn test_empty_list() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, "[]")));

        let connector = TraktConnector::new(Arc::new(mock_http), "client");
        assert!(connector.list_entries("42", "token").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_list_request() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(401, "")));

        let connector = TraktConnector::new(Arc::new(mock_http), "client");
        let result = connector.list_entries("42", "expired").await;
        assert!(matches!(result, Err(BridgeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_missing_list() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(404, "")));

        let connector = TraktConnector::new(Arc::new(mock_http), "client")
            .with_base_url("http://localhost:9999/");
        let error = connector.list_entries("missing", "token").await.unwrap_err();
        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, "{not json")));

        let connector = TraktConnector::new(Arc::new(mock_http), "client");
        let result = connector.list_entries("42", "token").await;
        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }
}
