//! Interactive entry point: asks for one research query and prints the
//! agent's answer with its sources.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use research_agent::agent::ResearchAgent;
use research_agent::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_ID: &str = "research_session";

#[tokio::main]
async fn main() {
    // Missing .env is fine; the variables may already be exported.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "research_agent=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    println!("🔍 Simple Research Agent");
    println!("{}", "=".repeat(40));

    if let Err(e) = run().await {
        println!("\n❌ Error: {e:#}");
        println!("\nTips:");
        println!("- Make sure you have added your API keys to the .env file");
        println!("- Check that you have internet connection");
        println!("- Verify your Brave API key is valid");
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("failed to load settings")?;
    tracing::info!(model = %settings.llm_model, base_url = %settings.llm_base_url, "settings loaded");

    let deps = Arc::new(settings.dependencies(Some(SESSION_ID.to_string())));

    print!("\nWhat would you like to research? ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read query from stdin")?;

    let query = line.trim();
    if query.is_empty() {
        println!("Please enter a valid research query.");
        return Ok(());
    }

    println!("\n🔍 Researching: {query}");
    println!("Please wait...");

    let agent = ResearchAgent::from_settings(&settings);
    let response = agent.research(query, deps).await?;

    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("📊 RESEARCH RESULTS:");
    println!("{rule}");
    println!("{}", response.answer);
    println!("{rule}");

    if !response.results.is_empty() {
        println!("\nSources ({}):", response.total_results);
        for (i, result) in response.results.iter().enumerate() {
            println!("{}. {} - {}", i + 1, result.title, result.url);
        }
    }

    Ok(())
}
