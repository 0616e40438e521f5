//! Lenient sanitising of Kalshi response payloads.
//!
//! Upstream records are checked against static field tables instead of being
//! deserialised into rigid structs:
//!
//! - a **required** field that is missing or mistyped skips the whole record;
//! - an **optional** field that is mistyped is dropped;
//! - a **nullable** field is always emitted, as `null` when missing or mistyped.
//!
//! Every degradation is logged at `warn`. Envelope fields (the array or object
//! holding the records) are hard failures when missing.

use serde_json::{Map, Value};

use crate::error::ApiError;

/// The JSON type expected for a field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// JSON string.
    Str,
    /// JSON integer (booleans are rejected).
    Int,
    /// Any JSON number, emitted as a float.
    Number,
    /// JSON boolean.
    Bool,
    /// JSON object, passed through as-is.
    Object,
    /// Array of strings; non-string elements are dropped.
    StrList,
    /// Array of nested records; invalid elements are dropped.
    Records(&'static Shape),
}

/// How a field's absence is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Missing or mistyped skips the record.
    Required,
    /// Missing is omitted; mistyped is dropped with a warning.
    Optional,
    /// Always emitted; `null` when missing or mistyped.
    Nullable,
}

/// One entry of a field table.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// JSON key.
    pub name: &'static str,
    /// Expected type.
    pub kind: FieldKind,
    /// Absence handling.
    pub presence: Presence,
}

const fn req(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        presence: Presence::Required,
    }
}

const fn opt(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        presence: Presence::Optional,
    }
}

const fn nullable(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        presence: Presence::Nullable,
    }
}

/// A named field table.
#[derive(Debug)]
pub struct Shape {
    /// Collection name used in log messages, e.g. `markets`.
    pub name: &'static str,
    /// Fields kept in the sanitised record.
    pub fields: &'static [Field],
}

use FieldKind::{Bool, Int, Number, Object, Records, Str, StrList};

/// Settlement source nested in a series.
pub static SETTLEMENT_SOURCE: Shape = Shape {
    name: "settlement_sources",
    fields: &[req("name", Str), req("url", Str)],
};

/// Series record from `GET /series`.
pub static SERIES: Shape = Shape {
    name: "series",
    fields: &[
        req("ticker", Str),
        req("frequency", Str),
        req("title", Str),
        req("category", Str),
        nullable("tags", StrList),
        req("settlement_sources", Records(&SETTLEMENT_SOURCE)),
        req("contract_url", Str),
        req("contract_terms_url", Str),
        req("fee_type", Str),
        req("fee_multiplier", Number),
        nullable("additional_prohibitions", StrList),
        opt("product_metadata", Object),
        opt("volume", Int),
        opt("volume_fp", Str),
    ],
};

/// Price range nested in a market.
pub static PRICE_RANGE: Shape = Shape {
    name: "price_ranges",
    fields: &[req("start", Str), req("end", Str), req("step", Str)],
};

/// Selected leg nested in a multivariate market.
pub static MVE_SELECTED_LEG: Shape = Shape {
    name: "mve_selected_legs",
    fields: &[
        req("event_ticker", Str),
        req("market_ticker", Str),
        req("side", Str),
        opt("yes_settlement_value_dollars", Str),
    ],
};

/// Market record from `GET /markets`.
pub static MARKET: Shape = Shape {
    name: "markets",
    fields: &[
        req("ticker", Str),
        req("event_ticker", Str),
        req("market_type", Str),
        req("title", Str),
        req("subtitle", Str),
        req("status", Str),
        opt("series_ticker", Str),
        opt("yes_sub_title", Str),
        opt("no_sub_title", Str),
        opt("created_time", Str),
        opt("updated_time", Str),
        opt("open_time", Str),
        opt("close_time", Str),
        opt("expiration_time", Str),
        opt("latest_expiration_time", Str),
        opt("response_price_units", Str),
        opt("settlement_timer_seconds", Int),
        opt("yes_bid", Int),
        opt("yes_ask", Int),
        opt("no_bid", Int),
        opt("no_ask", Int),
        opt("last_price", Int),
        opt("volume", Int),
        opt("volume_24h", Int),
        opt("open_interest", Int),
        opt("notional_value", Int),
        opt("previous_yes_bid", Int),
        opt("previous_yes_ask", Int),
        opt("previous_price", Int),
        opt("liquidity", Int),
        opt("tick_size", Int),
        opt("settlement_value", Int),
        opt("floor_strike", Number),
        opt("cap_strike", Number),
        opt("yes_bid_dollars", Str),
        opt("yes_ask_dollars", Str),
        opt("no_bid_dollars", Str),
        opt("no_ask_dollars", Str),
        opt("last_price_dollars", Str),
        opt("volume_fp", Str),
        opt("volume_24h_fp", Str),
        opt("open_interest_fp", Str),
        opt("notional_value_dollars", Str),
        opt("previous_yes_bid_dollars", Str),
        opt("previous_yes_ask_dollars", Str),
        opt("previous_price_dollars", Str),
        opt("liquidity_dollars", Str),
        opt("settlement_value_dollars", Str),
        opt("result", Str),
        opt("can_close_early", Bool),
        opt("expiration_value", Str),
        opt("rules_primary", Str),
        opt("rules_secondary", Str),
        opt("price_level_structure", Str),
        opt("price_ranges", Records(&PRICE_RANGE)),
        opt("expected_expiration_time", Str),
        opt("settlement_ts", Str),
        opt("fee_waiver_expiration_time", Str),
        opt("early_close_condition", Str),
        opt("strike_type", Str),
        opt("functional_strike", Str),
        opt("custom_strike", Object),
        opt("mve_collection_ticker", Str),
        opt("mve_selected_legs", Records(&MVE_SELECTED_LEG)),
        opt("primary_participant_key", Str),
        opt("is_provisional", Bool),
    ],
};

/// Order record from the `/portfolio/orders` endpoints.
pub static ORDER: Shape = Shape {
    name: "orders",
    fields: &[
        req("order_id", Str),
        req("user_id", Str),
        req("client_order_id", Str),
        req("ticker", Str),
        req("status", Str),
        req("side", Str),
        req("action", Str),
        req("type", Str),
        req("yes_price", Int),
        req("no_price", Int),
        req("fill_count", Int),
        req("remaining_count", Int),
        req("initial_count", Int),
        req("taker_fees", Int),
        req("maker_fees", Int),
        req("taker_fill_cost", Int),
        req("maker_fill_cost", Int),
        req("queue_position", Int),
        req("yes_price_dollars", Str),
        req("no_price_dollars", Str),
        req("fill_count_fp", Str),
        req("remaining_count_fp", Str),
        req("initial_count_fp", Str),
        req("taker_fill_cost_dollars", Str),
        req("maker_fill_cost_dollars", Str),
        opt("taker_fees_dollars", Str),
        opt("maker_fees_dollars", Str),
        opt("expiration_time", Str),
        opt("created_time", Str),
        opt("last_update_time", Str),
        opt("self_trade_prevention_type", Str),
        opt("order_group_id", Str),
        opt("cancel_order_on_pause", Bool),
        opt("subaccount_number", Int),
    ],
};

/// Subaccount balance record.
pub static SUBACCOUNT_BALANCE: Shape = Shape {
    name: "subaccount_balances",
    fields: &[
        req("subaccount_number", Int),
        req("balance", Str),
        req("updated_ts", Int),
    ],
};

/// Short description of a JSON value for log messages.
#[must_use]
pub fn describe(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "missing".to_string();
    };
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    let mut preview = value.to_string();
    if preview.chars().count() > 120 {
        preview = preview.chars().take(117).collect::<String>() + "...";
    }
    format!("type={kind} value={preview}")
}

fn is_int(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.is_i64() || n.is_u64())
}

/// Coerces a present, non-null value to `kind`, or `None` if it does not fit.
fn coerce(kind: FieldKind, value: &Value, record: &str, field: &str) -> Option<Value> {
    match kind {
        Str => value.is_string().then(|| value.clone()),
        Int => is_int(value).then(|| value.clone()),
        Number => value.as_f64().map(Value::from),
        Bool => value.is_boolean().then(|| value.clone()),
        Object => value.is_object().then(|| value.clone()),
        StrList => {
            let items = value.as_array()?;
            let kept: Vec<Value> = items.iter().filter(|v| v.is_string()).cloned().collect();
            if kept.len() != items.len() {
                tracing::warn!(
                    record,
                    field,
                    before = items.len(),
                    after = kept.len(),
                    "Dropped non-string list values"
                );
            }
            Some(Value::Array(kept))
        }
        Records(shape) => {
            let items = value.as_array()?;
            let kept = items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    let record = format!("{record}.{field}[{index}]");
                    sanitize_at(shape, item, &record).map(Value::Object)
                })
                .collect();
            Some(Value::Array(kept))
        }
    }
}

/// Sanitises one record against `shape`.
///
/// Returns `None` (after logging) if the record must be skipped.
#[must_use]
pub fn sanitize(shape: &Shape, raw: &Value, index: usize) -> Option<Map<String, Value>> {
    sanitize_at(shape, raw, &format!("{}[{index}]", shape.name))
}

fn sanitize_at(shape: &Shape, raw: &Value, record: &str) -> Option<Map<String, Value>> {
    let Some(object) = raw.as_object() else {
        tracing::warn!(record, got = %describe(Some(raw)), "Skipping record: expected object");
        return None;
    };

    let mut out = Map::new();
    for field in shape.fields {
        let value = object.get(field.name).filter(|v| !v.is_null());
        let coerced = value.and_then(|v| coerce(field.kind, v, record, field.name));

        match (field.presence, coerced) {
            (_, Some(v)) => {
                out.insert(field.name.to_string(), v);
            }
            (Presence::Required, None) => {
                tracing::warn!(
                    record,
                    field = field.name,
                    expected = ?field.kind,
                    got = %describe(object.get(field.name)),
                    "Skipping record: required field missing or mistyped"
                );
                return None;
            }
            (presence, None) => {
                if value.is_some() {
                    tracing::warn!(
                        record,
                        field = field.name,
                        got = %describe(value),
                        "Ignoring unexpected field type"
                    );
                }
                if presence == Presence::Nullable {
                    out.insert(field.name.to_string(), Value::Null);
                }
            }
        }
    }
    Some(out)
}

/// Sanitises every record of the array at `payload[key]`.
///
/// # Errors
///
/// Returns [`ApiError::UnexpectedShape`] if `payload[key]` is not an array.
pub fn sanitize_list(
    shape: &Shape,
    payload: &Map<String, Value>,
    key: &str,
    endpoint: &str,
) -> Result<Vec<Map<String, Value>>, ApiError> {
    let Some(items) = payload.get(key).and_then(Value::as_array) else {
        log_envelope_error(payload, key, endpoint, "array");
        return Err(ApiError::UnexpectedShape(format!("missing '{key}' array.")));
    };

    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| sanitize(shape, item, index))
        .collect())
}

/// Returns the object at `payload[key]`.
///
/// # Errors
///
/// Returns [`ApiError::UnexpectedShape`] if `payload[key]` is not an object.
pub fn require_object<'a>(
    payload: &'a Map<String, Value>,
    key: &str,
    endpoint: &str,
) -> Result<&'a Value, ApiError> {
    match payload.get(key) {
        Some(value @ Value::Object(_)) => Ok(value),
        _ => {
            log_envelope_error(payload, key, endpoint, "object");
            Err(ApiError::UnexpectedShape(format!("missing '{key}' object.")))
        }
    }
}

/// Returns the integer at `payload[field]`.
///
/// # Errors
///
/// Returns [`ApiError::UnexpectedShape`] if the field is missing or not an integer.
pub fn require_int(
    payload: &Map<String, Value>,
    field: &str,
    endpoint: &str,
) -> Result<Value, ApiError> {
    match payload.get(field) {
        Some(value) if is_int(value) => Ok(value.clone()),
        _ => {
            log_envelope_error(payload, field, endpoint, "integer");
            Err(ApiError::UnexpectedShape(format!(
                "missing integer '{field}'."
            )))
        }
    }
}

fn log_envelope_error(payload: &Map<String, Value>, key: &str, endpoint: &str, expected: &str) {
    let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
    tracing::error!(
        endpoint,
        key,
        expected,
        got = %describe(payload.get(key)),
        ?keys,
        "Unexpected Kalshi payload"
    );
}

/// Extracts the next-page cursor; empty or non-string cursors mean "no more pages".
#[must_use]
pub fn next_cursor(payload: &Map<String, Value>, endpoint: &str) -> Option<String> {
    match payload.get("cursor") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            tracing::warn!(endpoint, got = %describe(Some(other)), "Ignoring unexpected cursor type");
            None
        }
    }
}

/// Normalises `tags_by_categories` into category → string tags.
///
/// Categories whose value is not an array are dropped.
///
/// # Errors
///
/// Returns [`ApiError::UnexpectedShape`] if the envelope object is missing.
pub fn tags_by_categories(
    payload: &Map<String, Value>,
    endpoint: &str,
) -> Result<Map<String, Value>, ApiError> {
    let Value::Object(raw) = require_object(payload, "tags_by_categories", endpoint)? else {
        return Err(ApiError::UnexpectedShape(
            "missing 'tags_by_categories' object.".to_string(),
        ));
    };

    Ok(raw
        .iter()
        .filter_map(|(category, tags)| {
            let tags = tags.as_array()?;
            let kept = tags.iter().filter(|t| t.is_string()).cloned().collect();
            Some((category.clone(), Value::Array(kept)))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn series(ticker: &str) -> Value {
        json!({
            "ticker": ticker,
            "frequency": "daily",
            "title": "Series",
            "category": "Economics",
            "tags": ["Inflation", 7],
            "settlement_sources": [{"name": "BLS", "url": "https://bls.gov"}, {"name": 1}],
            "contract_url": "https://kalshi.com/c",
            "contract_terms_url": "https://kalshi.com/t",
            "fee_type": "quadratic",
            "fee_multiplier": 1,
            "volume": "lots",
            "unexpected": true
        })
    }

    #[test]
    fn series_record_is_normalised() {
        let out = sanitize(&SERIES, &series("KXCPI"), 0).unwrap();

        assert_eq!(out["ticker"], "KXCPI");
        assert_eq!(out["tags"], json!(["Inflation"]));
        assert_eq!(
            out["settlement_sources"],
            json!([{"name": "BLS", "url": "https://bls.gov"}])
        );
        assert_eq!(out["fee_multiplier"], json!(1.0));
        assert_eq!(out["additional_prohibitions"], Value::Null);
        assert!(!out.contains_key("volume"));
        assert!(!out.contains_key("unexpected"));
    }

    #[test]
    fn missing_required_field_skips_record() {
        let mut raw = series("KXCPI");
        raw["fee_multiplier"] = json!(true);
        assert!(sanitize(&SERIES, &raw, 3).is_none());
        assert!(sanitize(&SERIES, &json!("not an object"), 4).is_none());
    }

    #[test]
    fn market_optional_fields_degrade() {
        let raw = json!({
            "ticker": "KXCPI-25", "event_ticker": "KXCPI", "market_type": "binary",
            "title": "CPI", "subtitle": "", "status": "open",
            "yes_bid": 41, "no_bid": "41", "can_close_early": true,
            "floor_strike": 2, "price_ranges": [{"start": "0", "end": "1", "step": "0.01"}, 5]
        });
        let out = sanitize(&MARKET, &raw, 0).unwrap();

        assert_eq!(out["yes_bid"], 41);
        assert!(!out.contains_key("no_bid"));
        assert!(!out.contains_key("yes_sub_title"));
        assert_eq!(out["floor_strike"], json!(2.0));
        assert_eq!(out["price_ranges"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn integers_reject_booleans_and_floats() {
        let raw = json!({"subaccount_number": true, "balance": "1.00", "updated_ts": 1});
        assert!(sanitize(&SUBACCOUNT_BALANCE, &raw, 0).is_none());
        let raw = json!({"subaccount_number": 1.5, "balance": "1.00", "updated_ts": 1});
        assert!(sanitize(&SUBACCOUNT_BALANCE, &raw, 0).is_none());
        let raw = json!({"subaccount_number": 1, "balance": "1.00", "updated_ts": 1});
        assert!(sanitize(&SUBACCOUNT_BALANCE, &raw, 0).is_some());
    }

    #[test]
    fn list_envelope_must_be_an_array() {
        let payload = as_map(json!({"series": {}}));
        let err = sanitize_list(&SERIES, &payload, "series", "/series").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected response shape from Kalshi API: missing 'series' array."
        );

        let payload = as_map(json!({"series": [series("A"), 1, series("B")]}));
        let list = sanitize_list(&SERIES, &payload, "series", "/series").unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn cursor_normalisation() {
        assert_eq!(next_cursor(&as_map(json!({"cursor": "abc"})), "/markets"), Some("abc".into()));
        assert_eq!(next_cursor(&as_map(json!({"cursor": ""})), "/markets"), None);
        assert_eq!(next_cursor(&as_map(json!({"cursor": 12})), "/markets"), None);
        assert_eq!(next_cursor(&as_map(json!({})), "/markets"), None);
    }

    #[test]
    fn require_int_rejects_non_integers() {
        let payload = as_map(json!({"balance": 100, "portfolio_value": "x"}));
        assert_eq!(require_int(&payload, "balance", "/portfolio/balance").unwrap(), 100);
        let err = require_int(&payload, "portfolio_value", "/portfolio/balance").unwrap_err();
        assert!(err.to_string().contains("missing integer 'portfolio_value'"));
    }

    #[test]
    fn tags_by_categories_keeps_string_tags() {
        let payload = as_map(json!({
            "tags_by_categories": {"Politics": ["Elections", null], "Broken": "nope"}
        }));
        let tags = tags_by_categories(&payload, "/search/tags_by_categories").unwrap();
        assert_eq!(tags["Politics"], json!(["Elections"]));
        assert!(!tags.contains_key("Broken"));

        let payload = as_map(json!({"tags_by_categories": []}));
        assert!(tags_by_categories(&payload, "/search/tags_by_categories").is_err());
    }

    #[test]
    fn describe_truncates_long_values() {
        let long = Value::String("x".repeat(500));
        let text = describe(Some(&long));
        assert!(text.starts_with("type=string"));
        assert!(text.ends_with("..."));
        assert_eq!(describe(None), "missing");
    }
}
