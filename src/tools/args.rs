//! Tool argument validation.
//!
//! Each tool's `arguments` object is turned into a typed request here, before
//! any network I/O. The rules are part of the tool contract:
//!
//! - strings are trimmed and must be non-empty after trimming;
//! - integers must be JSON integers (booleans and floats are rejected) within
//!   the documented range;
//! - booleans must be JSON booleans; an absent flag is `false`;
//! - unknown keys are ignored.

use std::ops::RangeInclusive;

use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::kalshi::paginate::{PageOptions, DEFAULT_MAX_PAGES, MAX_PAGES_LIMIT, MAX_PAGE_LIMIT};
use crate::kalshi::types::{
    Action, Choice, CreateOrder, MarketsQuery, MveFilter, OrderStatus, OrdersQuery,
    SelfTradePrevention, SeriesQuery, Side, TimeInForce,
};

/// Largest accepted Unix timestamp (seconds).
pub const TIMESTAMP_MAX: i64 = 10_000_000_000;

/// Largest page size for `get_orders`.
pub const ORDERS_PAGE_LIMIT: i64 = 200;

/// Highest subaccount number.
pub const SUBACCOUNT_MAX: i64 = 32;

/// Accepted range of an integer argument and the message used when it is violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntRange {
    /// Inclusive range reported as "between {min} and {max}".
    Between(i64, i64),
    /// `0..=TIMESTAMP_MAX`, reported as "a non-negative integer".
    NonNegative,
    /// Deprecated field that only accepts `0`.
    DeprecatedZero,
}

impl IntRange {
    const fn bounds(self) -> RangeInclusive<i64> {
        match self {
            Self::Between(min, max) => min..=max,
            Self::NonNegative => 0..=TIMESTAMP_MAX,
            Self::DeprecatedZero => 0..=0,
        }
    }

    fn error(self, key: &str) -> ToolError {
        ToolError::invalid(match self {
            Self::Between(min, max) => format!("{key} must be between {min} and {max}."),
            Self::NonNegative => format!("{key} must be a non-negative integer."),
            Self::DeprecatedZero => format!("{key} is deprecated and must be 0 if provided."),
        })
    }
}

#[allow(clippy::cast_lossless)] // i64::from is not const
const PAGE_LIMIT: IntRange = IntRange::Between(1, MAX_PAGE_LIMIT as i64);
#[allow(clippy::cast_lossless)]
const MAX_PAGES: IntRange = IntRange::Between(1, MAX_PAGES_LIMIT as i64);

/// Read-only view over a tool's `arguments` object.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Args<'a> {
    /// Wraps optional arguments; `None` behaves like an empty object.
    #[must_use]
    pub const fn optional(map: Option<&'a Map<String, Value>>) -> Self {
        Self { map }
    }

    /// Wraps arguments that must be present.
    ///
    /// # Errors
    ///
    /// Returns "Missing arguments for {tool}." when `map` is `None`.
    pub fn required(tool: &str, map: Option<&'a Map<String, Value>>) -> Result<Self, ToolError> {
        map.map(|m| Self { map: Some(m) })
            .ok_or_else(|| ToolError::invalid(format!("Missing arguments for {tool}.")))
    }

    /// Rejects any non-empty arguments object.
    ///
    /// # Errors
    ///
    /// Returns "{tool} does not accept arguments." when arguments were given.
    pub fn none(tool: &str, map: Option<&Map<String, Value>>) -> Result<(), ToolError> {
        match map {
            Some(m) if !m.is_empty() => Err(ToolError::invalid(format!(
                "{tool} does not accept arguments."
            ))),
            _ => Ok(()),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(key))
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.get(key).filter(|v| !v.is_null())
    }

    /// A required, trimmed, non-empty string.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing, not a string, or blank.
    pub fn required_str(&self, key: &str) -> Result<String, ToolError> {
        let Some(Value::String(raw)) = self.get(key) else {
            return Err(ToolError::invalid(format!("{key} must be a string.")));
        };
        non_empty(key, raw)
    }

    /// An optional, trimmed, non-empty string; `null` counts as absent.
    ///
    /// # Errors
    ///
    /// Fails if the value is present but not a string, or blank.
    pub fn optional_str(&self, key: &str) -> Result<Option<String>, ToolError> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(raw)) => non_empty(key, raw).map(Some),
            Some(_) => Err(ToolError::invalid(format!("{key} must be a string."))),
        }
    }

    /// An optional integer within `range`; `null` counts as absent.
    ///
    /// # Errors
    ///
    /// Fails if the value is not an integer or lies outside `range`.
    pub fn optional_int(&self, key: &str, range: IntRange) -> Result<Option<i64>, ToolError> {
        let Some(value) = self.present(key) else {
            return Ok(None);
        };
        let Value::Number(number) = value else {
            return Err(ToolError::invalid(format!("{key} must be an integer.")));
        };
        let parsed = if let Some(n) = number.as_i64() {
            n
        } else if number.is_u64() {
            return Err(range.error(key));
        } else {
            return Err(ToolError::invalid(format!("{key} must be an integer.")));
        };
        if range.bounds().contains(&parsed) {
            Ok(Some(parsed))
        } else {
            Err(range.error(key))
        }
    }

    /// Like [`optional_int`](Self::optional_int) for non-negative ranges.
    ///
    /// # Errors
    ///
    /// See [`optional_int`](Self::optional_int).
    pub fn optional_u32(&self, key: &str, range: IntRange) -> Result<Option<u32>, ToolError> {
        self.optional_int(key, range)?
            .map(|n| u32::try_from(n).map_err(|_| range.error(key)))
            .transpose()
    }

    /// A boolean flag; absent means `false`.
    ///
    /// # Errors
    ///
    /// Fails if the key is present with any non-boolean value, including `null`.
    pub fn flag(&self, key: &str) -> Result<bool, ToolError> {
        match self.get(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ToolError::invalid(format!("{key} must be a boolean."))),
        }
    }

    /// An optional value from a closed set.
    ///
    /// # Errors
    ///
    /// Fails if the value is not a non-empty string or not one of the choices.
    pub fn optional_choice<C: Choice>(&self, key: &str) -> Result<Option<C>, ToolError> {
        self.optional_str(key)?
            .map(|s| choice_of(key, &s))
            .transpose()
    }

    /// A required value from a closed set.
    ///
    /// # Errors
    ///
    /// Fails if the value is missing, not a non-empty string, or not one of the choices.
    pub fn required_choice<C: Choice>(&self, key: &str) -> Result<C, ToolError> {
        choice_of(key, &self.required_str(key)?)
    }

    /// Page size (default [`MAX_PAGE_LIMIT`]) and page cap (default
    /// [`DEFAULT_MAX_PAGES`]) for full-corpus tools.
    ///
    /// # Errors
    ///
    /// Fails if `limit` or `max_pages` is out of range.
    pub fn page_options(&self) -> Result<PageOptions, ToolError> {
        Ok(PageOptions {
            limit: self.optional_u32("limit", PAGE_LIMIT)?.unwrap_or(MAX_PAGE_LIMIT),
            max_pages: self
                .optional_u32("max_pages", MAX_PAGES)?
                .unwrap_or(DEFAULT_MAX_PAGES),
        })
    }
}

fn non_empty(key: &str, raw: &str) -> Result<String, ToolError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ToolError::invalid(format!("{key} must be a non-empty string.")));
    }
    Ok(trimmed.to_string())
}

fn choice_of<C: Choice>(key: &str, value: &str) -> Result<C, ToolError> {
    C::parse(value)
        .ok_or_else(|| ToolError::invalid(format!("{key} must be one of {}.", C::choices())))
}

/// Arguments of `get_series_list`.
///
/// # Errors
///
/// Returns the first validation failure.
pub fn series_query(arguments: Option<&Map<String, Value>>) -> Result<SeriesQuery, ToolError> {
    let args = Args::optional(arguments);
    Ok(SeriesQuery {
        category: args.optional_str("category")?,
        tags: args.optional_str("tags")?,
        cursor: args.optional_str("cursor")?,
        limit: args.optional_u32("limit", PAGE_LIMIT)?,
        include_product_metadata: args.flag("include_product_metadata")?,
        include_volume: args.flag("include_volume")?,
    })
}

/// Arguments of `get_markets`.
///
/// # Errors
///
/// Returns the first validation failure.
pub fn markets_query(arguments: Option<&Map<String, Value>>) -> Result<MarketsQuery, ToolError> {
    let args = Args::optional(arguments);
    let ts = |key: &str| args.optional_int(key, IntRange::NonNegative);
    Ok(MarketsQuery {
        cursor: args.optional_str("cursor")?,
        limit: args.optional_u32("limit", PAGE_LIMIT)?,
        event_ticker: args.optional_str("event_ticker")?,
        series_ticker: args.optional_str("series_ticker")?,
        tickers: args.optional_str("tickers")?,
        status: args.optional_str("status")?,
        mve_filter: args.optional_choice::<MveFilter>("mve_filter")?,
        min_created_ts: ts("min_created_ts")?,
        max_created_ts: ts("max_created_ts")?,
        min_updated_ts: ts("min_updated_ts")?,
        min_close_ts: ts("min_close_ts")?,
        max_close_ts: ts("max_close_ts")?,
        min_settled_ts: ts("min_settled_ts")?,
        max_settled_ts: ts("max_settled_ts")?,
    })
}

/// Arguments of `get_orders`.
///
/// # Errors
///
/// Returns the first validation failure.
pub fn orders_query(arguments: Option<&Map<String, Value>>) -> Result<OrdersQuery, ToolError> {
    let args = Args::optional(arguments);
    Ok(OrdersQuery {
        ticker: args.optional_str("ticker")?,
        event_ticker: args.optional_str("event_ticker")?,
        cursor: args.optional_str("cursor")?,
        status: args.optional_choice::<OrderStatus>("status")?,
        min_ts: args.optional_int("min_ts", IntRange::NonNegative)?,
        max_ts: args.optional_int("max_ts", IntRange::NonNegative)?,
        limit: args.optional_u32("limit", IntRange::Between(1, ORDERS_PAGE_LIMIT))?,
        subaccount: args.optional_u32("subaccount", IntRange::Between(0, SUBACCOUNT_MAX))?,
    })
}

/// Arguments of `create_order`.
///
/// # Errors
///
/// Returns the first validation failure.
pub fn create_order(arguments: Option<&Map<String, Value>>) -> Result<CreateOrder, ToolError> {
    let args = Args::required("create_order", arguments)?;

    let ticker = args.required_str("ticker")?;
    let side = args.required_choice::<Side>("side")?;
    let action = args.required_choice::<Action>("action")?;
    let mut order = CreateOrder::new(ticker, side, action);

    order.client_order_id = args.optional_str("client_order_id")?;
    order.count = args.optional_u32("count", IntRange::Between(1, 1_000_000))?;
    order.count_fp = args.optional_str("count_fp")?;
    order.yes_price = args.optional_u32("yes_price", IntRange::Between(1, 99))?;
    order.no_price = args.optional_u32("no_price", IntRange::Between(1, 99))?;
    order.yes_price_dollars = args.optional_str("yes_price_dollars")?;
    order.no_price_dollars = args.optional_str("no_price_dollars")?;
    order.expiration_ts = args.optional_int("expiration_ts", IntRange::NonNegative)?;
    order.time_in_force = args.optional_choice::<TimeInForce>("time_in_force")?;
    order.buy_max_cost = args.optional_int("buy_max_cost", IntRange::NonNegative)?;
    order.sell_position_floor =
        args.optional_int("sell_position_floor", IntRange::DeprecatedZero)?;
    order.post_only = args.flag("post_only")?;
    order.reduce_only = args.flag("reduce_only")?;
    order.self_trade_prevention_type =
        args.optional_choice::<SelfTradePrevention>("self_trade_prevention_type")?;
    order.order_group_id = args.optional_str("order_group_id")?;
    order.cancel_order_on_pause = args.flag("cancel_order_on_pause")?;
    order.subaccount = args.optional_u32("subaccount", IntRange::Between(0, SUBACCOUNT_MAX))?;

    Ok(order)
}
