//! The research agent: a provider, the research system prompt, and the
//! `search_web` tool run as a tool-calling loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Settings;
use crate::message::{Message, ToolCall, ToolResult};
use crate::prompt::RESEARCH_SYSTEM_PROMPT;
use crate::provider::{CompletionRequest, CompletionResponse, Provider, ProviderError, Usage};
use crate::providers::OpenAIProvider;
use crate::search::{BraveSearchClient, SearchResult};
use crate::tool::ToolRegistry;
use crate::tools::web_search;

/// Per-run values handed to every tool invocation. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDependencies {
    pub api_key: String,
    pub session_id: Option<String>,
}

impl AgentDependencies {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub max_turns: usize,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Per-run model override (uses the provider's model if `None`).
    pub model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: RESEARCH_SYSTEM_PROMPT.to_string(),
            max_turns: 10,
            max_tokens: None,
            temperature: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnResult {
    pub response: CompletionResponse,
    pub tool_results: Vec<ToolResult>,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub final_message: Message,
    pub turns: Vec<TurnResult>,
    pub total_usage: Usage,
}

impl RunResult {
    /// The model's final answer text.
    pub fn output(&self) -> &str {
        &self.final_message.content
    }

    /// Every result returned by successful `search_web` calls, in call order.
    pub fn search_results(&self) -> Vec<SearchResult> {
        let mut collected = Vec::new();
        for turn in &self.turns {
            for call in turn
                .response
                .message
                .tool_calls
                .iter()
                .filter(|c| c.name == web_search::TOOL_NAME)
            {
                let Some(result) = turn
                    .tool_results
                    .iter()
                    .find(|r| r.call_id == call.id && !r.is_error)
                else {
                    continue;
                };
                // Error payloads lack the result fields and are skipped.
                if let Ok(results) = serde_json::from_str::<Vec<SearchResult>>(&result.content) {
                    collected.extend(results);
                }
            }
        }
        collected
    }
}

/// Answer plus the raw search results that informed it.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchResponse {
    pub query: String,
    pub answer: String,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("max turns ({0}) exceeded")]
    MaxTurnsExceeded(usize),
}

pub struct ResearchAgent {
    provider: Arc<dyn Provider>,
    search_client: BraveSearchClient,
    config: AgentConfig,
}

impl ResearchAgent {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            search_client: BraveSearchClient::new(),
            config: AgentConfig::default(),
        }
    }

    /// An agent backed by the OpenAI-compatible provider described by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Arc::new(OpenAIProvider::from_settings(settings)))
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_search_client(mut self, client: BraveSearchClient) -> Self {
        self.search_client = client;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn tools(&self, deps: Arc<AgentDependencies>) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        web_search::register_tool(&mut tools, self.search_client.clone(), deps);
        tools
    }

    /// Run one query through the tool-calling loop.
    pub async fn run(
        &self,
        query: &str,
        deps: Arc<AgentDependencies>,
    ) -> Result<RunResult, AgentError> {
        let tools = self.tools(deps.clone());
        let tool_defs = tools.definitions();

        let mut messages = vec![
            Message::system(self.config.system_prompt.clone()),
            Message::user(query),
        ];
        let mut turns = Vec::new();
        let mut total_usage = Usage::default();

        tracing::info!(
            session_id = deps.session_id.as_deref().unwrap_or("-"),
            "research run started"
        );

        for turn in 0..self.config.max_turns {
            let request = CompletionRequest {
                messages: messages.clone(),
                tools: tool_defs.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                model: self.config.model.clone(),
            };

            let response = self.provider.complete(request).await?;
            total_usage.add(&response.usage);
            messages.push(response.message.clone());

            tracing::debug!(
                turn,
                finish_reason = ?response.finish_reason,
                tool_calls = response.message.tool_calls.len(),
                "provider responded"
            );

            // Some compatible servers report "stop" alongside tool calls.
            if response.message.has_tool_calls() {
                let tool_results = execute_tool_calls(&tools, &response.message.tool_calls).await;
                messages.push(Message::tool_result(tool_results.clone()));
                turns.push(TurnResult {
                    response,
                    tool_results,
                });
                continue;
            }

            let final_message = response.message.clone();
            turns.push(TurnResult {
                response,
                tool_results: vec![],
            });

            tracing::info!(
                turns = turns.len(),
                input_tokens = total_usage.input_tokens,
                output_tokens = total_usage.output_tokens,
                "research run complete"
            );

            return Ok(RunResult {
                final_message,
                turns,
                total_usage,
            });
        }

        tracing::warn!(max_turns = self.config.max_turns, "research run hit turn limit");
        Err(AgentError::MaxTurnsExceeded(self.config.max_turns))
    }

    /// Run a query and package the answer with the search results gathered
    /// along the way.
    pub async fn research(
        &self,
        query: &str,
        deps: Arc<AgentDependencies>,
    ) -> Result<ResearchResponse, AgentError> {
        let run = self.run(query, deps).await?;
        let results = run.search_results();

        Ok(ResearchResponse {
            query: query.to_string(),
            answer: run.output().to_string(),
            total_results: results.len(),
            results,
            timestamp: Utc::now(),
        })
    }
}

/// Tool calls within a turn run one after another, in the order requested.
async fn execute_tool_calls(tools: &ToolRegistry, calls: &[ToolCall]) -> Vec<ToolResult> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let result = match tools.get(&call.name) {
            Some(tool) => match tool.execute(call.arguments.clone()).await {
                Ok(content) => ToolResult::success(&call.id, content),
                Err(e) => ToolResult::error(&call.id, e.to_string()),
            },
            None => {
                tracing::warn!(tool = %call.name, "model requested unknown tool");
                ToolResult::error(&call.id, format!("unknown tool: {}", call.name))
            }
        };
        results.push(result);
    }
    results
}
