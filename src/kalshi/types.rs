//! Request-side types for the Kalshi REST API.
//!
//! Query structs render to URL query pairs in a fixed order; absent filters
//! are omitted. Closed string sets are modelled as enums implementing
//! [`Choice`].

use serde::Serialize;

/// A closed set of string values accepted by the API.
pub trait Choice: Sized + Copy + 'static {
    /// Every variant, in the order used for error messages.
    const VARIANTS: &'static [Self];

    /// Returns the wire string.
    fn as_str(self) -> &'static str;

    /// Parses an exact wire string.
    #[must_use]
    fn parse(s: &str) -> Option<Self> {
        Self::VARIANTS.iter().copied().find(|v| v.as_str() == s)
    }

    /// Comma-separated list of accepted values.
    #[must_use]
    fn choices() -> String {
        Self::VARIANTS
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Contract side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// YES contracts.
    Yes,
    /// NO contracts.
    No,
}

impl Choice for Side {
    const VARIANTS: &'static [Self] = &[Self::Yes, Self::No];

    fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

/// Order action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Buy contracts.
    Buy,
    /// Sell contracts.
    Sell,
}

impl Choice for Action {
    const VARIANTS: &'static [Self] = &[Self::Buy, Self::Sell];

    fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// Order time-in-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Fill completely or cancel.
    FillOrKill,
    /// Rest until cancelled.
    GoodTillCanceled,
    /// Fill what is possible, cancel the rest.
    ImmediateOrCancel,
}

impl Choice for TimeInForce {
    const VARIANTS: &'static [Self] = &[
        Self::FillOrKill,
        Self::GoodTillCanceled,
        Self::ImmediateOrCancel,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::FillOrKill => "fill_or_kill",
            Self::GoodTillCanceled => "good_till_canceled",
            Self::ImmediateOrCancel => "immediate_or_cancel",
        }
    }
}

/// Self-trade prevention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfTradePrevention {
    /// Cancel the taker when it would cross its own order.
    TakerAtCross,
    /// Cancel the resting maker order.
    Maker,
}

impl Choice for SelfTradePrevention {
    const VARIANTS: &'static [Self] = &[Self::TakerAtCross, Self::Maker];

    fn as_str(self) -> &'static str {
        match self {
            Self::TakerAtCross => "taker_at_cross",
            Self::Maker => "maker",
        }
    }
}

/// Order status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Open on the book.
    Resting,
    /// Cancelled.
    Canceled,
    /// Fully filled.
    Executed,
}

impl Choice for OrderStatus {
    const VARIANTS: &'static [Self] = &[Self::Resting, Self::Canceled, Self::Executed];

    fn as_str(self) -> &'static str {
        match self {
            Self::Resting => "resting",
            Self::Canceled => "canceled",
            Self::Executed => "executed",
        }
    }
}

/// Multivariate-event market filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MveFilter {
    /// Only multivariate markets.
    Only,
    /// Exclude multivariate markets.
    Exclude,
}

impl Choice for MveFilter {
    const VARIANTS: &'static [Self] = &[Self::Only, Self::Exclude];

    fn as_str(self) -> &'static str {
        match self {
            Self::Only => "only",
            Self::Exclude => "exclude",
        }
    }
}

/// Accumulates query pairs, skipping absent values.
#[derive(Debug, Default)]
struct QueryPairs(Vec<(&'static str, String)>);

impl QueryPairs {
    fn text(&mut self, key: &'static str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.0.push((key, value.to_string()));
        }
        self
    }

    fn number<N: ToString>(&mut self, key: &'static str, value: Option<N>) -> &mut Self {
        if let Some(value) = value {
            self.0.push((key, value.to_string()));
        }
        self
    }

    fn flag(&mut self, key: &'static str, value: bool) -> &mut Self {
        if value {
            self.0.push((key, "true".to_string()));
        }
        self
    }

    fn finish(&mut self) -> Vec<(&'static str, String)> {
        std::mem::take(&mut self.0)
    }
}

/// Filters for `GET /series`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesQuery {
    /// Category name.
    pub category: Option<String>,
    /// Comma-separated tags.
    pub tags: Option<String>,
    /// Page cursor.
    pub cursor: Option<String>,
    /// Page size.
    pub limit: Option<u32>,
    /// Include product metadata in each series.
    pub include_product_metadata: bool,
    /// Include traded volume in each series.
    pub include_volume: bool,
}

impl SeriesQuery {
    /// Returns the query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        QueryPairs::default()
            .text("category", self.category.as_deref())
            .text("tags", self.tags.as_deref())
            .text("cursor", self.cursor.as_deref())
            .number("limit", self.limit)
            .flag("include_product_metadata", self.include_product_metadata)
            .flag("include_volume", self.include_volume)
            .finish()
    }
}

/// Filters for `GET /markets`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketsQuery {
    /// Page cursor.
    pub cursor: Option<String>,
    /// Page size.
    pub limit: Option<u32>,
    /// Event ticker.
    pub event_ticker: Option<String>,
    /// Series ticker.
    pub series_ticker: Option<String>,
    /// Comma-separated market tickers.
    pub tickers: Option<String>,
    /// Market status.
    pub status: Option<String>,
    /// Multivariate filter.
    pub mve_filter: Option<MveFilter>,
    /// Created at or after (Unix seconds).
    pub min_created_ts: Option<i64>,
    /// Created at or before.
    pub max_created_ts: Option<i64>,
    /// Updated at or after.
    pub min_updated_ts: Option<i64>,
    /// Closing at or after.
    pub min_close_ts: Option<i64>,
    /// Closing at or before.
    pub max_close_ts: Option<i64>,
    /// Settled at or after.
    pub min_settled_ts: Option<i64>,
    /// Settled at or before.
    pub max_settled_ts: Option<i64>,
}

impl MarketsQuery {
    /// Returns the query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        QueryPairs::default()
            .text("cursor", self.cursor.as_deref())
            .number("limit", self.limit)
            .text("event_ticker", self.event_ticker.as_deref())
            .text("series_ticker", self.series_ticker.as_deref())
            .text("tickers", self.tickers.as_deref())
            .text("status", self.status.as_deref())
            .text("mve_filter", self.mve_filter.map(Choice::as_str))
            .number("min_created_ts", self.min_created_ts)
            .number("max_created_ts", self.max_created_ts)
            .number("min_updated_ts", self.min_updated_ts)
            .number("min_close_ts", self.min_close_ts)
            .number("max_close_ts", self.max_close_ts)
            .number("min_settled_ts", self.min_settled_ts)
            .number("max_settled_ts", self.max_settled_ts)
            .finish()
    }
}

/// Filters for `GET /portfolio/orders`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrdersQuery {
    /// Market ticker.
    pub ticker: Option<String>,
    /// Event ticker.
    pub event_ticker: Option<String>,
    /// Created at or after (Unix seconds).
    pub min_ts: Option<i64>,
    /// Created at or before.
    pub max_ts: Option<i64>,
    /// Order status.
    pub status: Option<OrderStatus>,
    /// Page size.
    pub limit: Option<u32>,
    /// Page cursor.
    pub cursor: Option<String>,
    /// Subaccount number.
    pub subaccount: Option<u32>,
}

impl OrdersQuery {
    /// Returns the query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        QueryPairs::default()
            .text("ticker", self.ticker.as_deref())
            .text("event_ticker", self.event_ticker.as_deref())
            .number("min_ts", self.min_ts)
            .number("max_ts", self.max_ts)
            .text("status", self.status.map(Choice::as_str))
            .number("limit", self.limit)
            .text("cursor", self.cursor.as_deref())
            .number("subaccount", self.subaccount)
            .finish()
    }
}

/// Body of `POST /portfolio/orders`.
///
/// Flags are serialised only when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrder {
    /// Market ticker.
    pub ticker: String,
    /// Contract side.
    pub side: Side,
    /// Buy or sell.
    pub action: Action,
    /// Caller-chosen idempotency id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// Whole contracts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Fractional contract count as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_fp: Option<String>,
    /// YES limit price in cents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price: Option<u32>,
    /// NO limit price in cents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price: Option<u32>,
    /// YES limit price in dollars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price_dollars: Option<String>,
    /// NO limit price in dollars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price_dollars: Option<String>,
    /// Expiry (Unix seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_ts: Option<i64>,
    /// Time-in-force.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    /// Maximum cost in cents for buys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_max_cost: Option<i64>,
    /// Deprecated; only `0` is accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_position_floor: Option<i64>,
    /// Reject if the order would take liquidity.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub post_only: bool,
    /// Only reduce an existing position.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reduce_only: bool,
    /// Self-trade prevention mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_trade_prevention_type: Option<SelfTradePrevention>,
    /// Order group id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_group_id: Option<String>,
    /// Cancel when trading is paused.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancel_order_on_pause: bool,
    /// Subaccount number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subaccount: Option<u32>,
}

impl CreateOrder {
    /// A bare order for `ticker` with every optional field unset.
    #[must_use]
    pub const fn new(ticker: String, side: Side, action: Action) -> Self {
        Self {
            ticker,
            side,
            action,
            client_order_id: None,
            count: None,
            count_fp: None,
            yes_price: None,
            no_price: None,
            yes_price_dollars: None,
            no_price_dollars: None,
            expiration_ts: None,
            time_in_force: None,
            buy_max_cost: None,
            sell_position_floor: None,
            post_only: false,
            reduce_only: false,
            self_trade_prevention_type: None,
            order_group_id: None,
            cancel_order_on_pause: false,
            subaccount: None,
        }
    }
}
