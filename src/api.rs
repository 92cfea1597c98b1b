//! Order service API client.
//!
//! Provides HTTP communication with the order service: listing orders,
//! placing and completing orders, listing members, and a lightweight
//! connectivity probe. The rest of the crate talks to the service through the
//! [`OrderService`] trait so the synchronizer and controller can run against
//! the in-memory service as well.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::orders::{Member, Order, OrderId, PlaceOrderRequest};

/// Default timeout for API requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity test.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations the dashboard needs from the order service.
pub trait OrderService: Send + Sync + 'static {
    /// Full order list, in the service's order.
    fn list_orders(&self) -> impl Future<Output = Result<Vec<Order>, ApiError>> + Send;

    fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;

    /// Mark an order completed. Completing an already completed order is not
    /// an error.
    fn complete_order(&self, id: &OrderId) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn list_members(&self) -> impl Future<Output = Result<Vec<Member>, ApiError>> + Send;
}

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the order service URL:
/// - trim surrounding whitespace
/// - ensure a scheme is present (http for localhost, https otherwise)
/// - strip trailing slashes
pub fn normalize_service_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into an [`ApiError`] with a readable message.
fn transport_error(url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_connect() {
        return ApiError::Unreachable(url.to_string());
    }
    if err.is_timeout() {
        return ApiError::Timeout(url.to_string());
    }
    if err.is_builder() {
        return ApiError::Client(format!("Invalid order service URL: {url}"));
    }
    if err.is_decode() {
        return ApiError::Decode(err.to_string());
    }
    ApiError::Client(format!("Network error communicating with {url}: {err}"))
}

/// Generic message for an HTTP status the service did not explain.
fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "Request rejected by order service".to_string(),
        404 => "Order service endpoint not found".to_string(),
        422 => "Order service could not validate the request".to_string(),
        s if s >= 500 => "Order service error".to_string(),
        _ => "Unexpected response from order service".to_string(),
    }
}

/// Build the error for a non-success response, preferring the service's own
/// `detail` / `error` / `message` field when the body is JSON.
fn status_error(status: StatusCode, body_text: &str) -> ApiError {
    let trimmed = body_text.trim();
    let detail = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|json| {
            ["detail", "error", "message"]
                .iter()
                .find_map(|k| json.get(*k))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
        })
        .or_else(|| (!trimmed.is_empty()).then(|| trimmed.to_string()))
        .unwrap_or_else(|| status_message(status));
    ApiError::Status {
        status: status.as_u16(),
        detail,
    }
}

// ---------------------------------------------------------------------------
// Connectivity test
// ---------------------------------------------------------------------------

/// Result of a connectivity test.
#[derive(Debug, serde::Serialize)]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probe the service root. Used once at startup to tell staff whether the
/// dashboard will have live data.
pub async fn test_connectivity(service_url: &str) -> ConnectivityResult {
    let url = normalize_service_url(service_url);

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();
    let resp = match client.get(format!("{url}/")).send().await {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(transport_error(&url, &e).to_string()),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();
    if status.is_success() {
        info!(latency_ms = latency, "connectivity test passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_error(status, "").to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`OrderService`] backed by the order service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpOrderService {
    base_url: String,
    client: Client,
}

impl HttpOrderService {
    pub fn new(service_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: normalize_service_url(service_url),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the raw body of a successful response.
    async fn send(&self, req: reqwest::RequestBuilder, path: &str) -> Result<String, ApiError> {
        let resp = req
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, &e))?;
        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(status_error(status, &body_text));
        }
        debug!(path, status = status.as_u16(), bytes = body_text.len(), "order service response");
        Ok(body_text)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let body = self.send(self.client.get(&url), path).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl OrderService for HttpOrderService {
    async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.get_json("/orders").await
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<Value, ApiError> {
        let path = "/place-order";
        let url = format!("{}{path}", self.base_url);
        let body = self.send(self.client.post(&url).json(request), path).await?;
        // Return the JSON body, or null for an empty response.
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn complete_order(&self, id: &OrderId) -> Result<(), ApiError> {
        let path = format!("/complete-order/{id}");
        let url = format!("{}{path}", self.base_url);
        self.send(self.client.post(&url), &path).await.map(|_| ())
    }

    async fn list_members(&self) -> Result<Vec<Member>, ApiError> {
        self.get_json("/members").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_service_url() {
        assert_eq!(normalize_service_url("localhost:8000/"), "http://localhost:8000");
        assert_eq!(normalize_service_url("127.0.0.1:8000"), "http://127.0.0.1:8000");
        assert_eq!(
            normalize_service_url("  orders.example.com//  "),
            "https://orders.example.com"
        );
        assert_eq!(
            normalize_service_url("http://10.0.0.5:8000"),
            "http://10.0.0.5:8000"
        );
    }

    #[test]
    fn test_status_error_prefers_service_detail() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"Insufficient member balance"}"#,
        );
        assert_eq!(
            err,
            ApiError::Status {
                status: 400,
                detail: "Insufficient member balance".into()
            }
        );
    }

    #[test]
    fn test_status_error_falls_back_to_body_then_status() {
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY, "upstream down"),
            ApiError::Status {
                status: 502,
                detail: "upstream down".into()
            }
        );
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, ""),
            ApiError::Status {
                status: 404,
                detail: "Order service endpoint not found".into()
            }
        );
    }

    #[test]
    fn test_status_error_stringifies_structured_detail() {
        let err = status_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","amount"],"msg":"field required"}]}"#,
        );
        match err {
            ApiError::Status { status, detail } => {
                assert_eq!(status, 422);
                assert!(detail.contains("field required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_http_service_normalizes_base_url() {
        let svc = HttpOrderService::new("localhost:8000/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(svc.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_unreachable_service_reports_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let svc = HttpOrderService::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = svc.list_orders().await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Unreachable(_) | ApiError::Timeout(_) | ApiError::Client(_)
        ));
    }
}
