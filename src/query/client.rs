//! Analytical store gateway client.
//!
//! The gateway fronts the append-only telemetry log plus the roster and
//! billing datasets and exposes five aggregation endpoints as JSON over
//! HTTP. `AnalyticsStore` abstracts those operations so tests can swap in an
//! in-memory oracle; `HttpAnalyticsStore` is the production implementation.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::types::{
    EventBreakdownRecord, OverageRecord, RosterRecord, UsageRecord, UserUsageRecord,
};

/// Process-wide HTTP client, shared to avoid per-request TLS setup. The
/// first store built fixes the request timeout.
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

/// Errors from the aggregation query layer.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A users-view fetch was attempted without an entity identity.
    MissingEntity,
    /// The requested time window is not a positive number of days.
    InvalidWindow(i64),
    /// Network/HTTP transport error.
    Network(String),
    /// The store answered with an error; message is the store's own text.
    Api { status: u16, message: String },
    /// The response body did not match the expected shape.
    Decode(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::MissingEntity => write!(f, "org parameter required"),
            QueryError::InvalidWindow(days) => {
                write!(f, "window must be a positive number of days (got {})", days)
            }
            QueryError::Network(e) => write!(f, "Network error: {}", e),
            QueryError::Api { status, message } => {
                write!(f, "Usage API error ({}): {}", status, message)
            }
            QueryError::Decode(e) => write!(f, "Failed to parse API response: {}", e),
        }
    }
}

impl std::error::Error for QueryError {}

/// Gateway error body: `{ "error": "..." }`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// The five aggregation operations the dashboard consumes. Implementations
/// must validate inputs before touching the network: a non-positive window
/// or a missing required entity never reaches the store.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Top 100 organizations by event count over the trailing window.
    async fn organization_usage(&self, window_days: u32) -> Result<Vec<UsageRecord>, QueryError>;

    /// Top 500 users by credit total within one organization.
    async fn user_usage(
        &self,
        entity_id: &str,
        window_days: u32,
    ) -> Result<Vec<UserUsageRecord>, QueryError>;

    /// Roster facts for one organization; `None` when the dataset has no row.
    async fn org_roster(&self, entity_id: &str) -> Result<Option<RosterRecord>, QueryError>;

    /// Monthly overage rows, month descending then amount descending (200).
    async fn overages(&self) -> Result<Vec<OverageRecord>, QueryError>;

    /// Event-name breakdown, optionally scoped to one organization.
    async fn events_breakdown(
        &self,
        entity_id: Option<&str>,
        window_days: u32,
    ) -> Result<Vec<EventBreakdownRecord>, QueryError>;
}

fn ensure_window(window_days: u32) -> Result<(), QueryError> {
    if window_days == 0 {
        return Err(QueryError::InvalidWindow(window_days as i64));
    }
    Ok(())
}

fn ensure_entity(entity_id: &str) -> Result<(), QueryError> {
    if entity_id.trim().is_empty() {
        return Err(QueryError::MissingEntity);
    }
    Ok(())
}

/// HTTP implementation over the gateway's JSON API.
pub struct HttpAnalyticsStore {
    base_url: String,
    timeout: Duration,
}

impl HttpAnalyticsStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpAnalyticsStore { base_url, timeout }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> &'static Client {
        HTTP_CLIENT.get_or_init(|| {
            Client::builder()
                .timeout(self.timeout)
                .build()
                .expect("Failed to build HTTP client")
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, QueryError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("Store: GET {} params={:?}", url, params);

        let response = self
            .client()
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // The gateway reports failures as { "error": message }; fall back
            // to the status line when the body is something else.
            let message = match response.json::<ApiErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(QueryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AnalyticsStore for HttpAnalyticsStore {
    async fn organization_usage(&self, window_days: u32) -> Result<Vec<UsageRecord>, QueryError> {
        ensure_window(window_days)?;
        self.get_json("/api/org-usage", &[("days", window_days.to_string())])
            .await
    }

    async fn user_usage(
        &self,
        entity_id: &str,
        window_days: u32,
    ) -> Result<Vec<UserUsageRecord>, QueryError> {
        ensure_entity(entity_id)?;
        ensure_window(window_days)?;
        self.get_json(
            "/api/user-usage",
            &[
                ("org", entity_id.to_string()),
                ("days", window_days.to_string()),
            ],
        )
        .await
    }

    async fn org_roster(&self, entity_id: &str) -> Result<Option<RosterRecord>, QueryError> {
        ensure_entity(entity_id)?;
        // The gateway substitutes an empty default row itself, so absence
        // never surfaces here; it shows up as a roster with no members.
        let roster: RosterRecord = self
            .get_json("/api/org-users", &[("org", entity_id.to_string())])
            .await?;
        Ok(Some(roster))
    }

    async fn overages(&self) -> Result<Vec<OverageRecord>, QueryError> {
        self.get_json("/api/overages", &[]).await
    }

    async fn events_breakdown(
        &self,
        entity_id: Option<&str>,
        window_days: u32,
    ) -> Result<Vec<EventBreakdownRecord>, QueryError> {
        ensure_window(window_days)?;
        let mut params = vec![("days", window_days.to_string())];
        if let Some(org) = entity_id {
            if !org.trim().is_empty() {
                params.push(("org", org.to_string()));
            }
        }
        self.get_json("/api/events-breakdown", &params).await
    }
}
