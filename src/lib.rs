//! # research-agent
//!
//! A small research assistant: an LLM decides when to call a Brave web
//! search tool and turns the results into an answer.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use research_agent::{agent::ResearchAgent, config::Settings};
//!
//! let settings = Settings::from_env()?;
//! let agent = ResearchAgent::from_settings(&settings);
//! let deps = Arc::new(settings.dependencies(None));
//! let response = agent.research("latest Rust release", deps).await?;
//! println!("{}", response.answer);
//! ```

pub mod agent;
pub mod config;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod search;
pub mod tool;
pub mod tools;

pub use agent::{AgentDependencies, ResearchAgent, ResearchResponse};
pub use config::Settings;
pub use search::{BraveSearchClient, SearchOutcome, SearchResult};
