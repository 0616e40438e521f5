//! Tool descriptors returned by `tools/list`.

use serde::Serialize;
use serde_json::{json, Value};

use super::ToolName;

/// A tool definition for the `tools/list` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

fn no_arguments() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false,
    })
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "minLength": 1, "description": description })
}

fn integer(description: &str, minimum: i64, maximum: i64) -> Value {
    json!({
        "type": "integer",
        "minimum": minimum,
        "maximum": maximum,
        "description": description,
    })
}

fn timestamp(description: &str) -> Value {
    integer(description, 0, super::args::TIMESTAMP_MAX)
}

fn boolean(description: &str) -> Value {
    json!({ "type": "boolean", "default": false, "description": description })
}

fn one_of(description: &str, values: &[&str]) -> Value {
    json!({ "type": "string", "enum": values, "description": description })
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn paging_properties() -> (Value, Value) {
    (
        integer("Page size (default 1000).", 1, 1000),
        integer("Maximum pages to fetch before failing (default 1000).", 1, 10_000),
    )
}

/// Returns the descriptor for `tool`.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn descriptor(tool: ToolName) -> ToolDescriptor {
    let (description, input_schema) = match tool {
        ToolName::GetTagsForSeriesCategories => (
            "Get Kalshi tags grouped by series categories. \
             Uses the public GET /search/tags_by_categories endpoint.",
            no_arguments(),
        ),
        ToolName::GetCategories => (
            "List all Kalshi series categories, sorted by name.",
            no_arguments(),
        ),
        ToolName::GetTagsForSeriesCategory => (
            "Get the tags for a single Kalshi series category.",
            object(
                json!({ "category": string("Category name, e.g. Economics.") }),
                &["category"],
            ),
        ),
        ToolName::GetSeriesList => (
            "Get one page of Kalshi market series (GET /series), optionally filtered \
             by category and tags.",
            object(
                json!({
                    "category": string("Category filter."),
                    "tags": string("Comma-separated tag filter."),
                    "cursor": string("Cursor from a previous page."),
                    "limit": integer("Page size.", 1, 1000),
                    "include_product_metadata": boolean("Include product metadata."),
                    "include_volume": boolean("Include traded volume."),
                }),
                &[],
            ),
        ),
        ToolName::GetMarkets => (
            "Get one page of Kalshi markets (GET /markets) with optional filters.",
            object(
                json!({
                    "cursor": string("Cursor from a previous page."),
                    "limit": integer("Page size.", 1, 1000),
                    "event_ticker": string("Event ticker filter."),
                    "series_ticker": string("Series ticker filter."),
                    "tickers": string("Comma-separated market tickers."),
                    "status": string("Market status filter, e.g. open."),
                    "mve_filter": one_of("Multivariate event filter.", &["only", "exclude"]),
                    "min_created_ts": timestamp("Created at or after (Unix seconds)."),
                    "max_created_ts": timestamp("Created at or before (Unix seconds)."),
                    "min_updated_ts": timestamp("Updated at or after (Unix seconds)."),
                    "min_close_ts": timestamp("Closing at or after (Unix seconds)."),
                    "max_close_ts": timestamp("Closing at or before (Unix seconds)."),
                    "min_settled_ts": timestamp("Settled at or after (Unix seconds)."),
                    "max_settled_ts": timestamp("Settled at or before (Unix seconds)."),
                }),
                &[],
            ),
        ),
        ToolName::GetOpenMarketsForSeries | ToolName::GetOpenMarketTitlesForSeries => {
            let (limit, max_pages) = paging_properties();
            (
                if tool == ToolName::GetOpenMarketsForSeries {
                    "Get all OPEN markets for a series ticker, following cursors until exhausted."
                } else {
                    "Get ticker, title and subtitles of all OPEN markets for a series ticker."
                },
                object(
                    json!({
                        "series_ticker": string("Series ticker, e.g. KXCPI."),
                        "limit": limit,
                        "max_pages": max_pages,
                    }),
                    &["series_ticker"],
                ),
            )
        }
        ToolName::GetSeriesTickersForCategory => {
            let (limit, max_pages) = paging_properties();
            (
                "Get every series ticker in a category, de-duplicated in first-seen order.",
                object(
                    json!({
                        "category": string("Category name."),
                        "tags": string("Comma-separated tag filter."),
                        "limit": limit,
                        "max_pages": max_pages,
                    }),
                    &["category"],
                ),
            )
        }
        ToolName::GetBalance => (
            "Get the authenticated account balance and portfolio value (in cents).",
            no_arguments(),
        ),
        ToolName::GetSubaccountBalances => (
            "Get balances for all subaccounts of the authenticated account.",
            no_arguments(),
        ),
        ToolName::CreateSubaccount => (
            "Create a new subaccount and return its number.",
            no_arguments(),
        ),
        ToolName::GetOrders => (
            "Get one page of portfolio orders with optional filters.",
            object(
                json!({
                    "ticker": string("Market ticker filter."),
                    "event_ticker": string("Event ticker filter."),
                    "min_ts": timestamp("Created at or after (Unix seconds)."),
                    "max_ts": timestamp("Created at or before (Unix seconds)."),
                    "status": one_of("Order status.", &["resting", "canceled", "executed"]),
                    "limit": integer("Page size.", 1, 200),
                    "cursor": string("Cursor from a previous page."),
                    "subaccount": integer("Subaccount number.", 0, 32),
                }),
                &[],
            ),
        ),
        ToolName::GetOrder => (
            "Get a single portfolio order by id.",
            object(json!({ "order_id": string("Order id.") }), &["order_id"]),
        ),
        ToolName::CreateOrder => (
            "Place an order (POST /portfolio/orders).",
            object(
                json!({
                    "ticker": string("Market ticker."),
                    "side": one_of("Contract side.", &["yes", "no"]),
                    "action": one_of("Buy or sell.", &["buy", "sell"]),
                    "client_order_id": string("Caller-chosen idempotency id."),
                    "count": integer("Whole contracts.", 1, 1_000_000),
                    "count_fp": string("Fractional contract count."),
                    "yes_price": integer("YES limit price in cents.", 1, 99),
                    "no_price": integer("NO limit price in cents.", 1, 99),
                    "yes_price_dollars": string("YES limit price in dollars."),
                    "no_price_dollars": string("NO limit price in dollars."),
                    "expiration_ts": timestamp("Expiry (Unix seconds)."),
                    "time_in_force": one_of(
                        "Time in force.",
                        &["fill_or_kill", "good_till_canceled", "immediate_or_cancel"],
                    ),
                    "buy_max_cost": timestamp("Maximum cost in cents for buys."),
                    "sell_position_floor": integer("Deprecated; must be 0.", 0, 0),
                    "post_only": boolean("Reject if the order would take liquidity."),
                    "reduce_only": boolean("Only reduce an existing position."),
                    "self_trade_prevention_type": one_of(
                        "Self-trade prevention mode.",
                        &["taker_at_cross", "maker"],
                    ),
                    "order_group_id": string("Order group id."),
                    "cancel_order_on_pause": boolean("Cancel when trading is paused."),
                    "subaccount": integer("Subaccount number.", 0, 32),
                }),
                &["ticker", "side", "action"],
            ),
        ),
        ToolName::CancelOrder => (
            "Cancel a resting order (DELETE /portfolio/orders/{order_id}).",
            object(json!({ "order_id": string("Order id.") }), &["order_id"]),
        ),
    };

    ToolDescriptor {
        name: tool.as_str(),
        description,
        input_schema,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_has_an_object_schema() {
        for tool in ToolName::ALL {
            let descriptor = descriptor(*tool);
            assert_eq!(descriptor.name, tool.as_str());
            assert_eq!(descriptor.input_schema["type"], "object");
            assert!(!descriptor.description.is_empty());
        }
    }

    #[test]
    fn serialises_with_camel_case_schema_key() {
        let value = serde_json::to_value(descriptor(ToolName::GetOrder)).unwrap();
        assert_eq!(value["name"], "get_order");
        assert_eq!(value["inputSchema"]["required"][0], "order_id");
    }
}
