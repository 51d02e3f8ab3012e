//! CLI entry point for stylepilot.
//!
//! This binary provides the `stylepilot` command with subcommands for a
//! one-shot stylesheet completion, dumping the agent's tool schemas, and
//! checking color contrast.

mod cli;
mod helpers;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use stylepilot_agent::llm::tooling;
use stylepilot_agent::{
    CompletionRequest, LlmClient, Message, Provider, Settings, check_contrast, extract_css,
    tool_definitions,
};
use tracing::info;

use crate::cli::{Cli, Commands};

const COMPLETE_SYSTEM_PROMPT: &str = "You are a front-end designer. Answer with one complete \
     stylesheet in a single ```css fenced block and nothing else.";

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` may set RUST_LOG.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    helpers::init_tracing(&cli.log_level);

    match cli.command {
        Commands::Complete {
            instructions,
            document,
            provider,
            model,
            raw,
        } => {
            let settings = helpers::load_settings(cli.config.as_deref())?;
            cmd_complete(
                &settings,
                &instructions,
                document.as_deref(),
                provider,
                model.as_deref(),
                raw,
            )
            .await
        }
        Commands::Tools { provider } => cmd_tools(provider),
        Commands::Contrast {
            foreground,
            background,
            json,
        } => cmd_contrast(&foreground, &background, json),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: complete
// ---------------------------------------------------------------------------

async fn cmd_complete(
    settings: &Settings,
    instructions: &str,
    document: Option<&Path>,
    provider: Option<Provider>,
    model: Option<&str>,
    raw: bool,
) -> Result<()> {
    let provider = provider.unwrap_or(settings.default_provider);
    let config = settings.provider_config(provider, model);

    let mut prompt = format!("Request: {instructions}\n");
    if let Some(path) = document {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        prompt.push_str(&format!("\nDocument:\n{text}\n"));
    }

    let request = CompletionRequest::new(config, vec![Message::user(prompt)])
        .with_system(COMPLETE_SYSTEM_PROMPT)
        .with_temperature(Some(settings.agent.temperature))
        .with_max_tokens(Some(settings.agent.max_tokens));

    let client = LlmClient::new().context("failed to create HTTP client")?;
    let result = client
        .complete(&request)
        .await
        .with_context(|| format!("{provider} completion failed"))?;

    info!(
        %provider,
        model = %result.model,
        input_tokens = result.usage.input_tokens,
        output_tokens = result.usage.output_tokens,
        "completion finished"
    );

    if raw {
        println!("{}", result.text);
        return Ok(());
    }
    match extract_css(&result.text) {
        Some(css) => {
            println!("{css}");
            Ok(())
        }
        None => bail!("the model answer contained no CSS (rerun with --raw to see it)"),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: tools
// ---------------------------------------------------------------------------

fn cmd_tools(provider: Provider) -> Result<()> {
    let wire = tooling::tools_to_wire(provider, &tool_definitions());
    println!("{}", serde_json::to_string_pretty(&wire)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: contrast
// ---------------------------------------------------------------------------

fn cmd_contrast(foreground: &str, background: &str, json: bool) -> Result<()> {
    let report = check_contrast(foreground, background)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mark = |pass: bool| if pass { "pass" } else { "fail" };
    println!("  Contrast ratio: {:.2}:1", report.ratio);
    println!("  AA  normal text: {}", mark(report.aa_normal));
    println!("  AA  large text:  {}", mark(report.aa_large));
    println!("  AAA normal text: {}", mark(report.aaa_normal));
    println!("  AAA large text:  {}", mark(report.aaa_large));
    Ok(())
}
