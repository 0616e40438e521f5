//! `kalshi://` resource reads against a recording tool registry.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use kalshi_mcp::error::{ResourceError, ToolError};
use kalshi_mcp::mcp::ResourceRouter;
use kalshi_mcp::tools::{ToolDescriptor, ToolRegistry};

type Call = (String, Value);

/// Records every call and answers with a fixed, deliberately unsorted payload.
#[derive(Default)]
struct RecordingTools {
    calls: Mutex<Vec<Call>>,
}

impl RecordingTools {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRegistry for RecordingTools {
    fn list_tools(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<&Map<String, Value>>,
    ) -> Result<Map<String, Value>, ToolError> {
        let arguments = Value::Object(arguments.cloned().unwrap_or_default());
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));

        if name == "get_series_list" {
            return Err(ToolError::invalid("limit must be between 1 and 1000."));
        }

        let mut out = Map::new();
        out.insert("zeta".to_string(), json!(1));
        out.insert("alpha".to_string(), json!({"b": true, "a": null}));
        Ok(out)
    }
}

fn router() -> (Arc<RecordingTools>, ResourceRouter) {
    let tools = Arc::new(RecordingTools::default());
    let router = ResourceRouter::new(Arc::clone(&tools) as Arc<dyn ToolRegistry>);
    (tools, router)
}

#[tokio::test]
async fn read_renders_sorted_pretty_json() {
    let (_, router) = router();
    let result = router.read("kalshi:///portfolio/balance").await.unwrap();

    assert_eq!(
        result,
        json!({
            "contents": [{
                "uri": "kalshi:///portfolio/balance",
                "mimeType": "application/json",
                "text": "{\n  \"alpha\": {\n    \"a\": null,\n    \"b\": true\n  },\n  \"zeta\": 1\n}"
            }]
        })
    );
}

#[tokio::test]
async fn templated_reads_forward_path_and_query_arguments() {
    let (tools, router) = router();

    router
        .read("kalshi:///series/KXCPI/open_market_titles?limit=25&max_pages=3")
        .await
        .unwrap();
    router
        .read("kalshi:///category/Climate%20and%20Weather/series_tickers?tags=Hurricanes&tags=Ignored")
        .await
        .unwrap();
    router
        .read("kalshi:///portfolio/orders?ticker=KXCPI-25JAN&max_ts=1700000000&cursor=abc")
        .await
        .unwrap();

    assert_eq!(
        tools.calls(),
        vec![
            (
                "get_open_market_titles_for_series".to_string(),
                json!({"series_ticker": "KXCPI", "limit": 25, "max_pages": 3})
            ),
            (
                "get_series_tickers_for_category".to_string(),
                json!({"category": "Climate and Weather", "tags": "Hurricanes"})
            ),
            (
                "get_orders".to_string(),
                json!({"ticker": "KXCPI-25JAN", "max_ts": 1_700_000_000, "cursor": "abc"})
            ),
        ]
    );
}

#[tokio::test]
async fn tool_failures_surface_as_resource_errors() {
    let (_, router) = router();
    let err = router.read("kalshi:///series?limit=5000").await.unwrap_err();

    assert!(matches!(err, ResourceError::Tool(ToolError::InvalidArgument(_))));
    assert!(err.upstream().is_none());
    assert_eq!(err.to_string(), "limit must be between 1 and 1000.");
}

#[tokio::test]
async fn invalid_uris_never_reach_a_tool() {
    let (tools, router) = router();

    for uri in [
        "",
        "http:///categories",
        "kalshi:///markets",
        "kalshi:///category/tags",
        "kalshi:///series?include_volume=sometimes",
        "kalshi:///portfolio/orders?min_ts=yesterday",
    ] {
        assert!(router.read(uri).await.is_err(), "{uri}");
    }
    assert!(tools.calls().is_empty());
}

#[test]
fn listings_are_static() {
    let (_, router) = router();
    let uris: Vec<&str> = router.list_resources().iter().map(|r| r.uri).collect();
    assert_eq!(
        uris,
        [
            "kalshi:///categories",
            "kalshi:///portfolio/balance",
            "kalshi:///portfolio/subaccount_balances",
            "kalshi:///tags_by_categories",
        ]
    );
    assert_eq!(router.list_templates().len(), 6);
}
