//! Tool registry.
//!
//! Tools are a fixed table: [`ToolName`] enumerates them, [`schema`] describes
//! their inputs, [`args`] validates their arguments, and [`KalshiTools`]
//! executes them against a [`KalshiClient`].
//!
//! Handlers return a JSON object (the tool's structured content) or a
//! [`ToolError`]; the protocol layer decides how either is reported.

pub mod args;
pub mod schema;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::kalshi::paginate::{self, Endpoint, Page};
use crate::kalshi::types::{MarketsQuery, SeriesQuery};
use crate::kalshi::KalshiClient;

use self::args::Args;
pub use self::schema::ToolDescriptor;

const MARKETS_PAGING: Endpoint = Endpoint {
    path: "/markets",
    cap_hint: "reduce scope or increase max_pages.",
};

const SERIES_PAGING: Endpoint = Endpoint {
    path: "/series",
    cap_hint: "reduce scope with tags or increase max_pages.",
};

/// Every tool exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    /// Tags grouped by series category.
    GetTagsForSeriesCategories,
    /// Sorted category names.
    GetCategories,
    /// Tags of one category.
    GetTagsForSeriesCategory,
    /// One page of series.
    GetSeriesList,
    /// One page of markets.
    GetMarkets,
    /// All open markets of a series.
    GetOpenMarketsForSeries,
    /// Titles of all open markets of a series.
    GetOpenMarketTitlesForSeries,
    /// All series tickers of a category.
    GetSeriesTickersForCategory,
    /// Account balance.
    GetBalance,
    /// Subaccount balances.
    GetSubaccountBalances,
    /// Create a subaccount.
    CreateSubaccount,
    /// One page of orders.
    GetOrders,
    /// One order.
    GetOrder,
    /// Place an order.
    CreateOrder,
    /// Cancel an order.
    CancelOrder,
}

impl ToolName {
    /// Every tool, in `tools/list` order.
    pub const ALL: &'static [Self] = &[
        Self::GetTagsForSeriesCategories,
        Self::GetCategories,
        Self::GetTagsForSeriesCategory,
        Self::GetSeriesList,
        Self::GetMarkets,
        Self::GetOpenMarketsForSeries,
        Self::GetOpenMarketTitlesForSeries,
        Self::GetSeriesTickersForCategory,
        Self::GetBalance,
        Self::GetSubaccountBalances,
        Self::CreateSubaccount,
        Self::GetOrders,
        Self::GetOrder,
        Self::CreateOrder,
        Self::CancelOrder,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GetTagsForSeriesCategories => "get_tags_for_series_categories",
            Self::GetCategories => "get_categories",
            Self::GetTagsForSeriesCategory => "get_tags_for_series_category",
            Self::GetSeriesList => "get_series_list",
            Self::GetMarkets => "get_markets",
            Self::GetOpenMarketsForSeries => "get_open_markets_for_series",
            Self::GetOpenMarketTitlesForSeries => "get_open_market_titles_for_series",
            Self::GetSeriesTickersForCategory => "get_series_tickers_for_category",
            Self::GetBalance => "get_balance",
            Self::GetSubaccountBalances => "get_subaccount_balances",
            Self::CreateSubaccount => "create_subaccount",
            Self::GetOrders => "get_orders",
            Self::GetOrder => "get_order",
            Self::CreateOrder => "create_order",
            Self::CancelOrder => "cancel_order",
        }
    }

    /// Looks a tool up by its exact wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tool| tool.as_str() == s)
    }
}

/// A name → handler table of tools.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Describes every registered tool.
    fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Runs the tool `name` with `arguments`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for unregistered names and any
    /// validation, upstream or pagination failure raised by the handler.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<&Map<String, Value>>,
    ) -> Result<Map<String, Value>, ToolError>;
}

/// The Kalshi tool set.
#[derive(Debug)]
pub struct KalshiTools {
    client: KalshiClient,
}

impl KalshiTools {
    /// Creates the tool set over `client`.
    #[must_use]
    pub const fn new(client: KalshiClient) -> Self {
        Self { client }
    }

    async fn dispatch(
        &self,
        tool: ToolName,
        arguments: Option<&Map<String, Value>>,
    ) -> Result<Map<String, Value>, ToolError> {
        let name = tool.as_str();
        match tool {
            ToolName::GetTagsForSeriesCategories => {
                Args::none(name, arguments)?;
                let tags = self.client.tags_by_categories().await?;
                Ok(object([("tags_by_categories", Value::Object(tags))]))
            }
            ToolName::GetCategories => {
                Args::none(name, arguments)?;
                let mut categories: Vec<String> =
                    self.client.tags_by_categories().await?.into_iter().map(|(k, _)| k).collect();
                categories.sort();
                Ok(object([("categories", strings(categories))]))
            }
            ToolName::GetTagsForSeriesCategory => {
                let category = Args::required(name, arguments)?.required_str("category")?;
                let mut tags = self.client.tags_by_categories().await?;
                let Some(tags) = tags.remove(&category) else {
                    return Err(ToolError::invalid(format!("Unknown category: {category}")));
                };
                Ok(object([("category", Value::String(category)), ("tags", tags)]))
            }
            ToolName::GetSeriesList => {
                let query = args::series_query(arguments)?;
                let page = self.client.series_list(&query).await?;
                Ok(page_object("series", page))
            }
            ToolName::GetMarkets => {
                let query = args::markets_query(arguments)?;
                let page = self.client.markets(&query).await?;
                Ok(page_object("markets", page))
            }
            ToolName::GetOpenMarketsForSeries => {
                self.open_markets(name, arguments, |market| market).await
            }
            ToolName::GetOpenMarketTitlesForSeries => {
                self.open_markets(name, arguments, market_title).await
            }
            ToolName::GetSeriesTickersForCategory => {
                self.series_tickers(name, arguments).await
            }
            ToolName::GetBalance => {
                Args::none(name, arguments)?;
                Ok(self.client.balance().await?)
            }
            ToolName::GetSubaccountBalances => {
                Args::none(name, arguments)?;
                let balances = self.client.subaccount_balances().await?;
                Ok(object([("subaccount_balances", records(balances))]))
            }
            ToolName::CreateSubaccount => {
                Args::none(name, arguments)?;
                let number = self.client.create_subaccount().await?;
                Ok(object([("subaccount_number", number)]))
            }
            ToolName::GetOrders => {
                let query = args::orders_query(arguments)?;
                let page = self.client.orders(&query).await?;
                Ok(page_object("orders", page))
            }
            ToolName::GetOrder => {
                let order_id = Args::required(name, arguments)?.required_str("order_id")?;
                Ok(self.client.order(&order_id).await?)
            }
            ToolName::CreateOrder => {
                let order = args::create_order(arguments)?;
                tracing::info!(ticker = %order.ticker, side = ?order.side, action = ?order.action, "Creating order");
                Ok(self.client.create_order(&order).await?)
            }
            ToolName::CancelOrder => {
                let order_id = Args::required(name, arguments)?.required_str("order_id")?;
                tracing::info!(order_id = %order_id, "Cancelling order");
                Ok(self.client.cancel_order(&order_id).await?)
            }
        }
    }

    /// Pages `/markets?status=open` for one series and maps every market with `project`.
    async fn open_markets(
        &self,
        name: &str,
        arguments: Option<&Map<String, Value>>,
        project: fn(Map<String, Value>) -> Map<String, Value>,
    ) -> Result<Map<String, Value>, ToolError> {
        let args = Args::required(name, arguments)?;
        let series_ticker = args.required_str("series_ticker")?;
        let options = args.page_options()?;

        let client = &self.client;
        let (markets, pages) = paginate::page_through(MARKETS_PAGING, options, |cursor, limit| {
            let query = MarketsQuery {
                cursor,
                limit: Some(limit),
                series_ticker: Some(series_ticker.clone()),
                status: Some("open".to_string()),
                ..MarketsQuery::default()
            };
            async move { client.markets(&query).await.map_err(ToolError::from) }
        })
        .await?;

        let count = markets.len();
        Ok(object([
            ("series_ticker", Value::String(series_ticker)),
            ("status", Value::String("open".to_string())),
            ("markets", records(markets.into_iter().map(project))),
            ("count", Value::from(count)),
            ("pages", Value::from(pages)),
        ]))
    }

    /// Pages `/series` for one category and collects unique tickers.
    async fn series_tickers(
        &self,
        name: &str,
        arguments: Option<&Map<String, Value>>,
    ) -> Result<Map<String, Value>, ToolError> {
        let args = Args::required(name, arguments)?;
        let category = args.required_str("category")?;
        let tags = args.optional_str("tags")?;
        let options = args.page_options()?;

        let client = &self.client;
        let (tickers, pages) = paginate::page_through_unique(
            SERIES_PAGING,
            options,
            |cursor, limit| {
                let query = SeriesQuery {
                    category: Some(category.clone()),
                    tags: tags.clone(),
                    cursor,
                    limit: Some(limit),
                    include_product_metadata: false,
                    include_volume: false,
                };
                async move {
                    let page = client.series_list(&query).await.map_err(ToolError::from)?;
                    Ok::<_, ToolError>(Page {
                        items: page.items.iter().filter_map(series_ticker).collect(),
                        cursor: page.cursor,
                    })
                }
            },
            Clone::clone,
        )
        .await?;

        let count = tickers.len();
        let mut out = object([
            ("category", Value::String(category)),
            ("tickers", strings(tickers)),
            ("count", Value::from(count)),
            ("pages", Value::from(pages)),
        ]);
        if let Some(tags) = tags {
            out.insert("tags".to_string(), Value::String(tags));
        }
        Ok(out)
    }
}

#[async_trait]
impl ToolRegistry for KalshiTools {
    fn list_tools(&self) -> Vec<ToolDescriptor> {
        ToolName::ALL.iter().map(|tool| schema::descriptor(*tool)).collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<&Map<String, Value>>,
    ) -> Result<Map<String, Value>, ToolError> {
        let Some(tool) = ToolName::parse(name) else {
            return Err(ToolError::UnknownTool(name.to_string()));
        };
        tracing::debug!(tool = name, "Calling tool");
        self.dispatch(tool, arguments).await
    }
}

fn object<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn strings(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

fn records(items: impl IntoIterator<Item = Map<String, Value>>) -> Value {
    Value::Array(items.into_iter().map(Value::Object).collect())
}

/// `{<key>: [...], cursor?}` for single-page list tools.
fn page_object(key: &str, page: Page<Map<String, Value>>) -> Map<String, Value> {
    let mut out = object([(key, records(page.items))]);
    if let Some(cursor) = page.cursor {
        out.insert("cursor".to_string(), Value::String(cursor));
    }
    out
}

fn series_ticker(series: &Map<String, Value>) -> Option<String> {
    series.get("ticker").and_then(Value::as_str).map(str::to_string)
}

fn market_title(market: Map<String, Value>) -> Map<String, Value> {
    ["ticker", "title", "subtitle", "yes_sub_title", "no_sub_title"]
        .into_iter()
        .map(|key| {
            (
                key.to_string(),
                market.get(key).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}
