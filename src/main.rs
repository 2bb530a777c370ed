//! toolloop - Binary Entry Point
//!
//! Spawns the tool server, fetches the catalog, and drives one run of the
//! directive loop to a terminal outcome.

use std::sync::Arc;

use toolloop::agent::{Agent, LoopState, Milestone, RunOutcome, RunReport, RunRequest};
use toolloop::catalog::ToolCatalog;
use toolloop::config::Config;
use toolloop::dispatch::Dispatcher;
use toolloop::llm::gemini::GeminiClient;
use toolloop::mcp::stdio::StdioSession;
use toolloop::mcp::SessionChannel;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolloop=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: model={}", config.model);

    // Open the session channel; it is released on every exit path below.
    let mut session = StdioSession::connect(&config.server_command, &config.server_args).await?;

    let report = drive(&config, &mut session).await;
    session.shutdown().await.ok();

    match report?.outcome {
        RunOutcome::Success(answer) => {
            println!("FINAL_ANSWER: {}", answer);
            Ok(())
        }
        RunOutcome::Halted(reason) => anyhow::bail!("run halted: {}", reason),
        RunOutcome::Error(message) => anyhow::bail!("run failed: {}", message),
        RunOutcome::Exhausted => anyhow::bail!("max iterations reached without completion"),
    }
}

async fn drive(config: &Config, session: &mut StdioSession) -> anyhow::Result<RunReport> {
    let tools = session.list_tools().await?;
    info!("Successfully retrieved {} tools", tools.len());
    let catalog = ToolCatalog::new(tools);

    let generator = Arc::new(GeminiClient::new(
        config.api_key.clone(),
        config.model.clone(),
    ));
    let dispatcher =
        Dispatcher::new(config.param_style).with_text_payload("add_text_in_paint", "text");
    let agent = Agent::new(
        generator,
        dispatcher,
        config.max_iterations,
        config.generation_timeout,
    )
    .with_error_policy(config.error_policy);

    let request = RunRequest {
        task: config.task.clone(),
        user_preference: config.user_preference.clone(),
        milestones: default_milestones(),
    };

    let mut state = LoopState::default();
    Ok(agent.run(session, &catalog, &request, &mut state).await)
}

/// Progress milestones for the default paint task.
fn default_milestones() -> Vec<Milestone> {
    vec![
        Milestone::new("Paint opened", "open_paint"),
        Milestone::new("Rectangle drawn", "draw_rectangle"),
        Milestone::new("ASCII calculated", "strings_to_chars_to_int"),
        Milestone::new("Exponential calculated", "int_list_to_exponential_sum"),
        Milestone::new("Text added", "add_text_in_paint"),
    ]
}
