//! `kalshi://` resources.
//!
//! Every resource is a read-only view over a tool: the URI path picks the
//! tool, path segments and query parameters become its arguments, and the
//! tool's structured content is returned as pretty-printed JSON text.

use std::borrow::Cow;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::error::ResourceError;
use crate::tools::{ToolName, ToolRegistry};

/// The only supported URI scheme.
pub const SCHEME: &str = "kalshi";

const MIME_TYPE: &str = "application/json";

/// A fixed resource for `resources/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Resource URI.
    pub uri: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Content type of the resource text.
    pub mime_type: &'static str,
}

/// A parameterised resource for `resources/templates/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateDescriptor {
    /// RFC 6570 URI template.
    pub uri_template: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Content type of the resource text.
    pub mime_type: &'static str,
}

const RESOURCES: &[(&str, &str, &str)] = &[
    (
        "kalshi:///categories",
        "Kalshi Categories",
        "All Kalshi series categories (derived from tags_by_categories).",
    ),
    (
        "kalshi:///portfolio/balance",
        "Kalshi Portfolio Balance",
        "Authenticated account balance and portfolio value.",
    ),
    (
        "kalshi:///portfolio/subaccount_balances",
        "Kalshi Subaccount Balances",
        "Authenticated subaccount balances.",
    ),
    (
        "kalshi:///tags_by_categories",
        "Kalshi Tags By Categories",
        "Kalshi tags grouped by series category.",
    ),
];

const TEMPLATES: &[(&str, &str, &str)] = &[
    (
        "kalshi:///category/{category}/tags",
        "Kalshi Tags For Category",
        "Tags for a single series category.",
    ),
    (
        "kalshi:///category/{category}/series_tickers{?tags,limit,max_pages}",
        "Kalshi Series Tickers For Category",
        "All series tickers for a single category (paged from /series).",
    ),
    (
        "kalshi:///series/{series_ticker}/open_markets{?limit,max_pages}",
        "Kalshi Open Markets For Series",
        "All OPEN markets for a series ticker (paged from /markets).",
    ),
    (
        "kalshi:///series/{series_ticker}/open_market_titles{?limit,max_pages}",
        "Kalshi Open Market Titles For Series",
        "Ticker/title/subtitle for all OPEN markets in a series ticker (paged from /markets).",
    ),
    (
        "kalshi:///series{?category,tags,cursor,limit,include_product_metadata,include_volume}",
        "Kalshi Series List",
        "Market series list, optionally filtered by category/tags and including metadata/volume.",
    ),
    (
        "kalshi:///portfolio/orders{?ticker,event_ticker,status,min_ts,max_ts,limit,cursor,subaccount}",
        "Kalshi Portfolio Orders",
        "Authenticated portfolio orders, optionally filtered.",
    ),
];

/// How a query parameter is coerced before it reaches the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryKind {
    Text,
    Int,
    Bool,
}

type QueryParams = &'static [(&'static str, QueryKind)];

const PAGING_QUERY: QueryParams = &[("limit", QueryKind::Int), ("max_pages", QueryKind::Int)];

const SERIES_TICKERS_QUERY: QueryParams = &[
    ("tags", QueryKind::Text),
    ("limit", QueryKind::Int),
    ("max_pages", QueryKind::Int),
];

const SERIES_QUERY: QueryParams = &[
    ("category", QueryKind::Text),
    ("tags", QueryKind::Text),
    ("cursor", QueryKind::Text),
    ("limit", QueryKind::Int),
    ("include_product_metadata", QueryKind::Bool),
    ("include_volume", QueryKind::Bool),
];

const ORDERS_QUERY: QueryParams = &[
    ("ticker", QueryKind::Text),
    ("event_ticker", QueryKind::Text),
    ("status", QueryKind::Text),
    ("min_ts", QueryKind::Int),
    ("max_ts", QueryKind::Int),
    ("limit", QueryKind::Int),
    ("cursor", QueryKind::Text),
    ("subaccount", QueryKind::Int),
];

/// Paths that map to a tool with no arguments.
const FIXED_ROUTES: &[(&str, ToolName)] = &[
    ("/categories", ToolName::GetCategories),
    ("/portfolio/balance", ToolName::GetBalance),
    ("/portfolio/subaccount_balances", ToolName::GetSubaccountBalances),
    ("/tags_by_categories", ToolName::GetTagsForSeriesCategories),
];

/// Paths whose only arguments come from the query string.
const QUERY_ROUTES: &[(&str, ToolName, QueryParams)] = &[
    ("/series", ToolName::GetSeriesList, SERIES_QUERY),
    ("/portfolio/orders", ToolName::GetOrders, ORDERS_QUERY),
];

/// A `/<head>/{param}/<tail>` route.
struct SegmentRoute {
    head: &'static str,
    tail: &'static str,
    param: &'static str,
    tool: ToolName,
    query: QueryParams,
    invalid: &'static str,
}

const SEGMENT_ROUTES: &[SegmentRoute] = &[
    SegmentRoute {
        head: "category",
        tail: "tags",
        param: "category",
        tool: ToolName::GetTagsForSeriesCategory,
        query: &[],
        invalid: "Invalid category tags resource uri",
    },
    SegmentRoute {
        head: "category",
        tail: "series_tickers",
        param: "category",
        tool: ToolName::GetSeriesTickersForCategory,
        query: SERIES_TICKERS_QUERY,
        invalid: "Invalid category series tickers resource uri",
    },
    SegmentRoute {
        head: "series",
        tail: "open_markets",
        param: "series_ticker",
        tool: ToolName::GetOpenMarketsForSeries,
        query: PAGING_QUERY,
        invalid: "Invalid series open markets resource uri",
    },
    SegmentRoute {
        head: "series",
        tail: "open_market_titles",
        param: "series_ticker",
        tool: ToolName::GetOpenMarketTitlesForSeries,
        query: PAGING_QUERY,
        invalid: "Invalid series open market titles resource uri",
    },
];

impl SegmentRoute {
    fn claims(&self, path: &str) -> bool {
        path.strip_prefix('/')
            .and_then(|rest| rest.strip_prefix(self.head))
            .is_some_and(|rest| rest.starts_with('/'))
            && path
                .strip_suffix(self.tail)
                .is_some_and(|rest| rest.ends_with('/'))
    }

    fn segment<'p>(&self, path: &'p str) -> Result<&'p str, ResourceError> {
        let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        match parts.as_slice() {
            [head, segment, tail] if *head == self.head && *tail == self.tail => Ok(*segment),
            _ => Err(ResourceError::InvalidUri(self.invalid.to_string())),
        }
    }
}

/// A resolved resource: the tool to call and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResource {
    /// Tool backing the resource.
    pub tool: ToolName,
    /// Arguments passed to the tool.
    pub arguments: Map<String, Value>,
}

/// Maps a `kalshi://` URI to the tool call that produces it.
///
/// # Errors
///
/// Returns a [`ResourceError`] for empty URIs, foreign schemes, malformed
/// templated paths, unknown paths and uncoercible query values.
pub fn resolve(uri: &str) -> Result<ResolvedResource, ResourceError> {
    if uri.is_empty() {
        return Err(ResourceError::MissingUri);
    }

    let url = Url::parse(uri).map_err(|_| ResourceError::UnsupportedScheme)?;
    if url.scheme() != SCHEME {
        return Err(ResourceError::UnsupportedScheme);
    }

    let path = if url.path().is_empty() { "/" } else { url.path() };
    let query: Vec<(Cow<'_, str>, Cow<'_, str>)> = url.query_pairs().collect();

    if let Some((_, tool)) = FIXED_ROUTES.iter().find(|(route, _)| *route == path) {
        return Ok(ResolvedResource {
            tool: *tool,
            arguments: Map::new(),
        });
    }

    if let Some((_, tool, params)) = QUERY_ROUTES.iter().find(|(route, _, _)| *route == path) {
        return Ok(ResolvedResource {
            tool: *tool,
            arguments: query_arguments(&query, params)?,
        });
    }

    if let Some(route) = SEGMENT_ROUTES.iter().find(|route| route.claims(path)) {
        let segment = route.segment(path)?;
        let mut arguments = Map::new();
        arguments.insert(
            route.param.to_string(),
            Value::String(percent_decode_str(segment).decode_utf8_lossy().into_owned()),
        );
        arguments.extend(query_arguments(&query, route.query)?);
        return Ok(ResolvedResource {
            tool: route.tool,
            arguments,
        });
    }

    Err(ResourceError::UnknownUri)
}

/// The first non-empty value given for `key`.
fn first_value<'q>(query: &'q [(Cow<'_, str>, Cow<'_, str>)], key: &str) -> Option<&'q str> {
    query
        .iter()
        .filter(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| &**v)
        .next()
}

fn query_arguments(
    query: &[(Cow<'_, str>, Cow<'_, str>)],
    params: &[(&str, QueryKind)],
) -> Result<Map<String, Value>, ResourceError> {
    let mut arguments = Map::new();
    for (key, kind) in params {
        let Some(raw) = first_value(query, key) else {
            continue;
        };
        let value = match kind {
            QueryKind::Text => Value::String(raw.to_string()),
            QueryKind::Int => Value::from(parse_int(raw)?),
            QueryKind::Bool => Value::Bool(parse_bool(raw)?),
        };
        arguments.insert((*key).to_string(), value);
    }
    Ok(arguments)
}

fn parse_int(raw: &str) -> Result<i64, ResourceError> {
    raw.trim()
        .parse()
        .map_err(|_| ResourceError::InvalidQuery("Expected integer query value".to_string()))
}

fn parse_bool(raw: &str) -> Result<bool, ResourceError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Ok(true),
        "false" | "0" | "no" | "n" | "f" => Ok(false),
        _ => Err(ResourceError::InvalidQuery(
            "Expected boolean query value (true/false)".to_string(),
        )),
    }
}

/// Rebuilds every object with its keys in ascending order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Serves `resources/list`, `resources/templates/list` and `resources/read`.
#[derive(Clone)]
pub struct ResourceRouter {
    tools: Arc<dyn ToolRegistry>,
}

impl std::fmt::Debug for ResourceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRouter").finish_non_exhaustive()
    }
}

impl ResourceRouter {
    /// Creates a router that reads resources through `tools`.
    #[must_use]
    pub const fn new(tools: Arc<dyn ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Fixed resources.
    #[must_use]
    #[allow(clippy::unused_self)] // Part of the router's surface alongside `read`
    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        RESOURCES
            .iter()
            .map(|(uri, name, description)| ResourceDescriptor {
                uri,
                name,
                description,
                mime_type: MIME_TYPE,
            })
            .collect()
    }

    /// Parameterised resources.
    #[must_use]
    #[allow(clippy::unused_self)] // Part of the router's surface alongside `read`
    pub fn list_templates(&self) -> Vec<ResourceTemplateDescriptor> {
        TEMPLATES
            .iter()
            .map(|(uri_template, name, description)| ResourceTemplateDescriptor {
                uri_template,
                name,
                description,
                mime_type: MIME_TYPE,
            })
            .collect()
    }

    /// Reads `uri` and returns the `resources/read` result.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if the URI does not resolve or the backing
    /// tool fails.
    pub async fn read(&self, uri: &str) -> Result<Value, ResourceError> {
        let resolved = resolve(uri)?;
        tracing::debug!(uri, tool = resolved.tool.as_str(), "Reading resource");

        let payload = self
            .tools
            .call_tool(resolved.tool.as_str(), Some(&resolved.arguments))
            .await?;

        let text = format!("{:#}", sort_keys(Value::Object(payload)));

        Ok(serde_json::json!({
            "contents": [{
                "uri": uri,
                "mimeType": MIME_TYPE,
                "text": text,
            }]
        }))
    }
}
