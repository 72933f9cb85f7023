use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{Settings, DEFAULT_LLM_BASE_URL};
use crate::message::{Message, Role, ToolCall};
use crate::provider::{
    CompletionRequest, CompletionResponse, FinishReason, Provider, ProviderError, Usage,
};
use crate::tool::ToolDefinition;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Chat-completions client for OpenAI and compatible endpoints (Azure,
/// vLLM, ollama, OpenRouter).
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            api_url: completions_url(DEFAULT_LLM_BASE_URL),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.llm_api_key, &settings.llm_model).with_base_url(&settings.llm_base_url)
    }

    /// Use a base URL such as `http://localhost:11434/v1`; the
    /// `/chat/completions` suffix is appended.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.api_url = completions_url(base_url.as_ref());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_api_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => messages.push(ChatMessage::text("system", &msg.content)),
                Role::User if !msg.tool_results.is_empty() => {
                    // One "tool" message per result
                    for tr in &msg.tool_results {
                        messages.push(ChatMessage {
                            role: "tool".into(),
                            content: Some(tr.content.clone()),
                            tool_calls: None,
                            tool_call_id: Some(tr.call_id.clone()),
                        });
                    }
                }
                Role::User => messages.push(ChatMessage::text("user", &msg.content)),
                Role::Assistant if msg.has_tool_calls() => {
                    let tool_calls = msg
                        .tool_calls
                        .iter()
                        .map(|tc| ChatToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ChatFunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();

                    messages.push(ChatMessage {
                        role: "assistant".into(),
                        content: (!msg.content.is_empty()).then(|| msg.content.clone()),
                        tool_calls: Some(tool_calls),
                        tool_call_id: None,
                    });
                }
                Role::Assistant => messages.push(ChatMessage::text("assistant", &msg.content)),
            }
        }

        let tools = (!request.tools.is_empty())
            .then(|| request.tools.iter().map(ChatTool::from).collect());

        ChatRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            tools,
            max_tokens: Some(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            temperature: request.temperature,
        }
    }

    fn parse_response(&self, response: ChatResponse) -> CompletionResponse {
        let choice = response.choices.into_iter().next().unwrap_or_default();

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| serde_json::json!({})),
            })
            .collect();

        let content = choice.message.content.unwrap_or_default();
        let message = if tool_calls.is_empty() {
            Message::assistant(content)
        } else {
            Message::assistant_with_tool_calls(content, tool_calls)
        };

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") | None => FinishReason::Stop,
            Some("tool_calls") => FinishReason::ToolUse,
            Some("length") => FinishReason::MaxTokens,
            Some(other) => FinishReason::Other(other.to_string()),
        };

        let usage = response.usage.unwrap_or_default();

        CompletionResponse {
            message,
            usage: Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
            finish_reason,
        }
    }

    fn parse_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
        let error_msg = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| body.to_string());

        match status.as_u16() {
            401 | 403 => ProviderError::Auth(error_msg),
            429 => ProviderError::RateLimited {
                retry_after_ms: None,
            },
            400 if error_msg.contains("context") || error_msg.contains("token") => {
                ProviderError::ContextLengthExceeded(error_msg)
            }
            _ => ProviderError::Other(format!("HTTP {status}: {error_msg}")),
        }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let api_request = self.build_api_request(&request);
        tracing::debug!(
            model = %api_request.model,
            messages = api_request.messages.len(),
            "calling chat completions"
        );

        let http_response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ProviderError::Other(format!("request failed: {e}")))?;

        let status = http_response.status();

        if !status.is_success() {
            let body = http_response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".into());
            return Err(Self::parse_error(status, &body));
        }

        let api_response: ChatResponse = http_response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("failed to parse response: {e}")))?;

        Ok(self.parse_response(api_response))
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    r#type: String,
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: String,
    function: ChatFunctionDef,
}

#[derive(Debug, Serialize)]
struct ChatFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for ChatTool {
    fn from(def: &ToolDefinition) -> Self {
        ChatTool {
            r#type: "function".into(),
            function: ChatFunctionDef {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.input_schema.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolResult;

    fn search_definition() -> ToolDefinition {
        ToolDefinition {
            name: "search_web".into(),
            description: "Search the web".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        }
    }

    fn request(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> CompletionRequest {
        CompletionRequest {
            messages,
            tools,
            max_tokens: None,
            temperature: None,
            model: None,
        }
    }

    #[test]
    fn base_url_gets_completions_suffix() {
        let provider = OpenAIProvider::new("key", "gpt-4");
        assert_eq!(provider.api_url, "https://api.openai.com/v1/chat/completions");

        let provider = provider.with_base_url("http://localhost:11434/v1/");
        assert_eq!(provider.api_url, "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn from_settings_uses_configured_model() {
        let settings = Settings {
            llm_api_key: "sk-test".into(),
            llm_model: "gpt-4o-mini".into(),
            llm_base_url: "https://openrouter.ai/api/v1".into(),
            brave_api_key: "brave".into(),
        };
        let provider = OpenAIProvider::from_settings(&settings);
        assert_eq!(provider.model(), "gpt-4o-mini");
        assert_eq!(provider.api_url, "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn builds_request_with_system_prompt_and_tools() {
        let provider = OpenAIProvider::new("key", "gpt-4");
        let api_req = provider.build_api_request(&request(
            vec![Message::system("You research."), Message::user("rust news")],
            vec![search_definition()],
        ));

        assert_eq!(api_req.model, "gpt-4");
        assert_eq!(api_req.messages[0].role, "system");
        assert_eq!(api_req.messages[1].role, "user");
        assert_eq!(api_req.max_tokens, Some(DEFAULT_MAX_TOKENS));
        let tools = api_req.tools.unwrap();
        assert_eq!(tools[0].r#type, "function");
        assert_eq!(tools[0].function.name, "search_web");
    }

    #[test]
    fn request_model_override_wins() {
        let provider = OpenAIProvider::new("key", "gpt-4");
        let mut req = request(vec![Message::user("hi")], vec![]);
        req.model = Some("gpt-4o".into());
        let api_req = provider.build_api_request(&req);
        assert_eq!(api_req.model, "gpt-4o");
        assert!(api_req.tools.is_none());
    }

    #[test]
    fn tool_round_trip_messages() {
        let provider = OpenAIProvider::new("key", "gpt-4");
        let api_req = provider.build_api_request(&request(
            vec![
                Message::user("rust news"),
                Message::assistant_with_tool_calls(
                    "",
                    vec![ToolCall {
                        id: "call_1".into(),
                        name: "search_web".into(),
                        arguments: serde_json::json!({"query": "rust news"}),
                    }],
                ),
                Message::tool_result(vec![ToolResult::success("call_1", "[]")]),
            ],
            vec![],
        ));

        let json = serde_json::to_value(&api_req).unwrap();
        let msgs = json["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert!(msgs[1].get("content").is_none());
        assert_eq!(msgs[1]["tool_calls"][0]["function"]["name"], "search_web");
        assert_eq!(
            msgs[1]["tool_calls"][0]["function"]["arguments"],
            "{\"query\":\"rust news\"}"
        );
        assert_eq!(msgs[2]["role"], "tool");
        assert_eq!(msgs[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn parses_tool_call_response() {
        let provider = OpenAIProvider::new("key", "gpt-4");
        let response = ChatResponse {
            choices: vec![ChatChoice {
                message: ChatResponseMessage {
                    content: None,
                    tool_calls: Some(vec![ChatToolCall {
                        id: "call_abc".into(),
                        r#type: "function".into(),
                        function: ChatFunctionCall {
                            name: "search_web".into(),
                            arguments: "{\"query\":\"rust\",\"max_results\":3}".into(),
                        },
                    }]),
                },
                finish_reason: Some("tool_calls".into()),
            }],
            usage: Some(ChatUsage {
                prompt_tokens: 15,
                completion_tokens: 10,
            }),
        };

        let result = provider.parse_response(response);
        assert_eq!(result.finish_reason, FinishReason::ToolUse);
        assert_eq!(result.message.tool_calls[0].arguments["max_results"], 3);
        assert_eq!(result.usage.total_tokens(), 25);
    }

    #[test]
    fn unparseable_arguments_become_empty_object() {
        let provider = OpenAIProvider::new("key", "gpt-4");
        let response = ChatResponse {
            choices: vec![ChatChoice {
                message: ChatResponseMessage {
                    content: None,
                    tool_calls: Some(vec![ChatToolCall {
                        id: "call_bad".into(),
                        r#type: "function".into(),
                        function: ChatFunctionCall {
                            name: "search_web".into(),
                            arguments: "{not json".into(),
                        },
                    }]),
                },
                finish_reason: Some("tool_calls".into()),
            }],
            usage: None,
        };

        let result = provider.parse_response(response);
        assert_eq!(result.message.tool_calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn error_parsing() {
        let auth_err = OpenAIProvider::parse_error(
            reqwest::StatusCode::UNAUTHORIZED,
            "{\"error\":{\"message\":\"invalid key\"}}",
        );
        assert!(matches!(auth_err, ProviderError::Auth(ref m) if m == "invalid key"));

        let rate_err = OpenAIProvider::parse_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "{}");
        assert!(matches!(rate_err, ProviderError::RateLimited { .. }));

        let ctx_err = OpenAIProvider::parse_error(
            reqwest::StatusCode::BAD_REQUEST,
            "{\"error\":{\"message\":\"maximum context length exceeded\"}}",
        );
        assert!(matches!(ctx_err, ProviderError::ContextLengthExceeded(_)));

        let other = OpenAIProvider::parse_error(reqwest::StatusCode::BAD_GATEWAY, "oops");
        assert!(matches!(other, ProviderError::Other(ref m) if m.contains("oops")));
    }

    #[tokio::test]
    async fn complete_with_mock_server() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "Rust 1.80 shipped."},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 8}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = OpenAIProvider::new("sk-test", "gpt-4")
            .with_base_url(format!("{}/v1", mock_server.uri()));

        let response = provider
            .complete(request(vec![Message::user("rust news")], vec![]))
            .await
            .unwrap();
        assert_eq!(response.message.content, "Rust 1.80 shipped.");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.input_tokens, 12);
    }

    #[tokio::test]
    async fn complete_maps_auth_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&mock_server)
            .await;

        let provider = OpenAIProvider::new("bad", "gpt-4")
            .with_base_url(format!("{}/v1", mock_server.uri()));

        let err = provider
            .complete(request(vec![Message::user("hi")], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
    }
}
