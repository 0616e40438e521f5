//! Typed wrappers around the Kalshi REST endpoints used by the tools.
//!
//! Every call goes through the [`RetryingTransport`]; authenticated calls are
//! signed once up front so missing credentials fail before any network I/O.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde_json::{Map, Value};

use super::http::{HttpRequest, ReqwestSender, RetryPolicy, RetryingTransport};
use super::paginate::Page;
use super::payload::{self, MARKET, ORDER, SERIES, SUBACCOUNT_BALANCE};
use super::signer::RequestSigner;
use super::types::{CreateOrder, MarketsQuery, OrdersQuery, SeriesQuery};
use crate::config::Config;
use crate::error::ApiError;

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const TAGS_BY_CATEGORIES: &str = "/search/tags_by_categories";
const SERIES_PATH: &str = "/series";
const MARKETS_PATH: &str = "/markets";
const BALANCE_PATH: &str = "/portfolio/balance";
const SUBACCOUNTS_PATH: &str = "/portfolio/subaccounts";
const SUBACCOUNT_BALANCES_PATH: &str = "/portfolio/subaccounts/balances";
const ORDERS_PATH: &str = "/portfolio/orders";

/// Client for the Kalshi trade API.
#[derive(Debug)]
pub struct KalshiClient {
    base_url: String,
    signer: RequestSigner,
    transport: RetryingTransport,
}

impl KalshiClient {
    /// Builds a client backed by `reqwest` from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let sender = ReqwestSender::new(config.kalshi.timeout())?;
        let signer = RequestSigner::new(
            &config.kalshi.base_url,
            config.kalshi.api_key_id.clone(),
            config.kalshi.api_key_path.clone(),
        );
        let transport = RetryingTransport::new(Box::new(sender), RetryPolicy::from(&config.retry));
        Ok(Self::new(&config.kalshi.base_url, signer, transport))
    }

    /// Creates a client from explicit parts.
    #[must_use]
    pub fn new(base_url: &str, signer: RequestSigner, transport: RetryingTransport) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            transport,
        }
    }

    /// Returns the API base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns `true` if requests to the portfolio endpoints can be signed.
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.signer.has_credentials()
    }

    async fn request_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        authenticated: bool,
        body: Option<Vec<u8>>,
    ) -> Result<Map<String, Value>, ApiError> {
        let mut url = format!("{}{path}", self.base_url);
        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())))
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }

        let mut request = HttpRequest::new(method.clone(), url);
        if authenticated {
            let headers = self.signer.sign(method.as_str(), path)?;
            for (name, value) in headers.into_pairs() {
                request = request.header(name, value);
            }
        }
        if let Some(body) = body {
            request = request.json_body(body);
        }

        tracing::debug!(method = %method, path, authenticated, "Calling Kalshi API");
        self.transport.execute_json(&request).await
    }

    /// `GET /search/tags_by_categories`: category → tags.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a malformed envelope.
    pub async fn tags_by_categories(&self) -> Result<Map<String, Value>, ApiError> {
        let payload = self
            .request_json(Method::GET, TAGS_BY_CATEGORIES, &[], false, None)
            .await?;
        payload::tags_by_categories(&payload, TAGS_BY_CATEGORIES)
    }

    /// `GET /series`: one page of series.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a malformed envelope.
    pub async fn series_list(&self, query: &SeriesQuery) -> Result<Page<Map<String, Value>>, ApiError> {
        let payload = self
            .request_json(Method::GET, SERIES_PATH, &query.to_pairs(), false, None)
            .await?;
        Ok(Page {
            items: payload::sanitize_list(&SERIES, &payload, "series", SERIES_PATH)?,
            cursor: payload::next_cursor(&payload, SERIES_PATH),
        })
    }

    /// `GET /markets`: one page of markets.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a malformed envelope.
    pub async fn markets(&self, query: &MarketsQuery) -> Result<Page<Map<String, Value>>, ApiError> {
        let payload = self
            .request_json(Method::GET, MARKETS_PATH, &query.to_pairs(), false, None)
            .await?;
        Ok(Page {
            items: payload::sanitize_list(&MARKET, &payload, "markets", MARKETS_PATH)?,
            cursor: payload::next_cursor(&payload, MARKETS_PATH),
        })
    }

    /// `GET /portfolio/balance` (signed).
    ///
    /// # Errors
    ///
    /// Fails if credentials are missing, the call fails, or any of the
    /// integer fields is missing.
    pub async fn balance(&self) -> Result<Map<String, Value>, ApiError> {
        let payload = self
            .request_json(Method::GET, BALANCE_PATH, &[], true, None)
            .await?;

        let mut out = Map::new();
        for field in ["balance", "portfolio_value", "updated_ts"] {
            out.insert(
                field.to_string(),
                payload::require_int(&payload, field, BALANCE_PATH)?,
            );
        }
        Ok(out)
    }

    /// `GET /portfolio/subaccounts/balances` (signed).
    ///
    /// # Errors
    ///
    /// Fails if credentials are missing, the call fails, or the envelope is malformed.
    pub async fn subaccount_balances(&self) -> Result<Vec<Map<String, Value>>, ApiError> {
        let payload = self
            .request_json(Method::GET, SUBACCOUNT_BALANCES_PATH, &[], true, None)
            .await?;
        payload::sanitize_list(
            &SUBACCOUNT_BALANCE,
            &payload,
            "subaccount_balances",
            SUBACCOUNT_BALANCES_PATH,
        )
    }

    /// `POST /portfolio/subaccounts` (signed); returns the new subaccount number.
    ///
    /// # Errors
    ///
    /// Fails if credentials are missing, the call fails, or the number is missing.
    pub async fn create_subaccount(&self) -> Result<Value, ApiError> {
        let payload = self
            .request_json(Method::POST, SUBACCOUNTS_PATH, &[], true, None)
            .await?;
        payload::require_int(&payload, "subaccount_number", SUBACCOUNTS_PATH)
    }

    /// `GET /portfolio/orders` (signed): one page of orders.
    ///
    /// # Errors
    ///
    /// Fails if credentials are missing, the call fails, or the envelope is malformed.
    pub async fn orders(&self, query: &OrdersQuery) -> Result<Page<Map<String, Value>>, ApiError> {
        let payload = self
            .request_json(Method::GET, ORDERS_PATH, &query.to_pairs(), true, None)
            .await?;
        Ok(Page {
            items: payload::sanitize_list(&ORDER, &payload, "orders", ORDERS_PATH)?,
            cursor: payload::next_cursor(&payload, ORDERS_PATH),
        })
    }

    /// `GET /portfolio/orders/{order_id}` (signed).
    ///
    /// # Errors
    ///
    /// Fails if credentials are missing, the call fails, or the order cannot be parsed.
    pub async fn order(&self, order_id: &str) -> Result<Map<String, Value>, ApiError> {
        let path = order_path(order_id);
        let payload = self.request_json(Method::GET, &path, &[], true, None).await?;
        parse_order(&payload, &path)
    }

    /// `POST /portfolio/orders` (signed).
    ///
    /// # Errors
    ///
    /// Fails if credentials are missing, the call fails, or the created order
    /// cannot be parsed.
    pub async fn create_order(&self, order: &CreateOrder) -> Result<Map<String, Value>, ApiError> {
        let body = serde_json::to_vec(order).map_err(|e| ApiError::Client(e.to_string()))?;
        let payload = self
            .request_json(Method::POST, ORDERS_PATH, &[], true, Some(body))
            .await?;
        parse_order(&payload, ORDERS_PATH)
    }

    /// `DELETE /portfolio/orders/{order_id}` (signed).
    ///
    /// Returns `{order, reduced_by?}`.
    ///
    /// # Errors
    ///
    /// Fails if credentials are missing, the call fails, or the order cannot be parsed.
    pub async fn cancel_order(&self, order_id: &str) -> Result<Map<String, Value>, ApiError> {
        let path = order_path(order_id);
        let payload = self
            .request_json(Method::DELETE, &path, &[], true, None)
            .await?;

        let mut out = Map::new();
        out.insert("order".to_string(), Value::Object(parse_order(&payload, &path)?));
        if let Some(reduced_by) = payload.get("reduced_by").filter(|v| v.is_i64() || v.is_u64()) {
            out.insert("reduced_by".to_string(), reduced_by.clone());
        }
        Ok(out)
    }
}

fn order_path(order_id: &str) -> String {
    format!(
        "{ORDERS_PATH}/{}",
        utf8_percent_encode(order_id, PATH_SEGMENT)
    )
}

fn parse_order(payload: &Map<String, Value>, endpoint: &str) -> Result<Map<String, Value>, ApiError> {
    let raw = payload::require_object(payload, "order", endpoint)?;
    payload::sanitize(&ORDER, raw, 0).ok_or_else(|| {
        ApiError::UnexpectedShape("unable to parse order from response.".to_string())
    })
}
