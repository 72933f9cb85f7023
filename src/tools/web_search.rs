//! The `search_web` tool: the seam between the agent loop and
//! [`BraveSearchClient`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::AgentDependencies;
use crate::search::{BraveSearchClient, DEFAULT_MAX_RESULTS, MAX_RESULTS, MIN_RESULTS};
use crate::tool::{Tool, ToolDefinition, ToolError, ToolRegistry};

pub const TOOL_NAME: &str = "search_web";

/// Search the web using the Brave Search API.
///
/// Returns `Ok` with a JSON array: normalized results, or a single
/// `{"error": ...}` object the model can read and react to. Only arguments
/// that are not a JSON object are rejected with [`ToolError::InvalidInput`].
pub struct WebSearchTool {
    client: BraveSearchClient,
    deps: Arc<AgentDependencies>,
}

impl WebSearchTool {
    pub fn new(client: BraveSearchClient, deps: Arc<AgentDependencies>) -> Self {
        Self { client, deps }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.into(),
            description: "Search the web using Brave Search. Returns a list of results with \
                          title, URL, description, and a relevance score."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return (1-20)",
                        "default": DEFAULT_MAX_RESULTS,
                        "minimum": MIN_RESULTS,
                        "maximum": MAX_RESULTS
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<String, ToolError> {
        if !input.is_object() {
            return Err(ToolError::InvalidInput(format!(
                "expected an object with 'query', got {input}"
            )));
        }

        // A missing query is reported by the client as "Query cannot be empty".
        let query = input.get("query").and_then(|v| v.as_str()).unwrap_or("");

        let max_results = input
            .get("max_results")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(DEFAULT_MAX_RESULTS);

        tracing::debug!(
            session_id = self.deps.session_id.as_deref().unwrap_or("-"),
            query,
            max_results,
            "search_web invoked"
        );

        let outcome = self.client.invoke(query, max_results, &self.deps.api_key).await;
        Ok(outcome.to_payload().to_string())
    }
}

/// Register the search_web tool into a registry.
pub fn register_tool(
    registry: &mut ToolRegistry,
    client: BraveSearchClient,
    deps: Arc<AgentDependencies>,
) {
    registry.register(Box::new(WebSearchTool::new(client, deps)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn deps(key: &str) -> Arc<AgentDependencies> {
        Arc::new(AgentDependencies::new(key).with_session_id("test_session_123"))
    }

    fn tool_for(server: &MockServer, key: &str) -> WebSearchTool {
        WebSearchTool::new(
            BraveSearchClient::new().with_api_url(format!("{}/search", server.uri())),
            deps(key),
        )
    }

    #[test]
    fn tool_definition_schema() {
        let tool = WebSearchTool::new(BraveSearchClient::new(), deps("key"));
        let def = tool.definition();
        assert_eq!(def.name, "search_web");
        assert_eq!(def.input_schema["required"][0], "query");
        assert_eq!(def.input_schema["properties"]["max_results"]["default"], 5);
        assert_eq!(def.input_schema["properties"]["max_results"]["maximum"], 20);
    }

    #[tokio::test]
    async fn missing_query_is_error_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let out = tool_for(&server, "key").execute(serde_json::json!({})).await.unwrap();
        let payload: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(payload, serde_json::json!([{"error": "Query cannot be empty"}]));
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = tool_for(&server, "key")
            .execute(serde_json::json!("rust"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert!(err.to_string().starts_with("invalid input: "));
    }

    #[tokio::test]
    async fn empty_key_is_error_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let out = tool_for(&server, "")
            .execute(serde_json::json!({"query": "rust"}))
            .await
            .unwrap();
        let payload: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(payload[0]["error"], "Brave API key is required");
    }

    #[tokio::test]
    async fn default_and_float_max_results() {
        let server = MockServer::start().await;
        let body = serde_json::json!({"web": {"results": [{"title": "A", "url": "u", "description": "d"}]}});
        Mock::given(method("GET"))
            .and(query_param("count", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("count", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .expect(1)
            .mount(&server)
            .await;

        let tool = tool_for(&server, "key");
        tool.execute(serde_json::json!({"query": "rust"})).await.unwrap();
        let out = tool
            .execute(serde_json::json!({"query": "rust", "max_results": 3.0}))
            .await
            .unwrap();

        let payload: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(payload[0]["title"], "A");
        assert_eq!(payload[0]["score"], 1.0);
    }

    #[tokio::test]
    async fn api_errors_are_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = tool_for(&server, "key")
            .execute(serde_json::json!({"query": "rust"}))
            .await;
        let out = result.unwrap();
        assert!(out.contains("Rate limit exceeded. Check your Brave API quota."));
    }
}
