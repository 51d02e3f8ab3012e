//! CLI argument definitions for stylepilot.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stylepilot_agent::Provider;

/// stylepilot -- LLM-driven restyling for web pages.
#[derive(Parser)]
#[command(
    name = "stylepilot",
    version,
    about = "stylepilot -- LLM-driven restyling for web pages",
    long_about = "Talks to OpenAI, Anthropic, Google or any OpenAI-compatible endpoint \
                  to produce CSS, and exposes the helpers the styling agent uses."
)]
pub struct Cli {
    /// Settings file (TOML). Falls back to `STYLEPILOT_CONFIG`.
    #[arg(long, short, global = true, env = "STYLEPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a provider for a stylesheet in one request, without tools.
    Complete {
        /// What the stylesheet should achieve.
        instructions: String,

        /// HTML or a structural summary of the page to style.
        #[arg(long)]
        document: Option<PathBuf>,

        /// Provider to use instead of the configured default.
        #[arg(long, short)]
        provider: Option<Provider>,

        /// Model id to use instead of the provider's configured model.
        #[arg(long, short)]
        model: Option<String>,

        /// Print the full model answer instead of the extracted CSS.
        #[arg(long)]
        raw: bool,
    },

    /// Print the agent's tool definitions in a vendor's wire format.
    Tools {
        #[arg(long, short, default_value = "openai")]
        provider: Provider,
    },

    /// Check the WCAG contrast between two CSS colors.
    Contrast {
        foreground: String,
        background: String,

        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn provider_aliases_parse() {
        let cli = Cli::try_parse_from(["stylepilot", "tools", "--provider", "claude"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tools {
                provider: Provider::Anthropic
            }
        ));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["stylepilot", "tools", "--provider", "mistral"]).is_err());
    }

    #[test]
    fn complete_takes_overrides() {
        let cli = Cli::try_parse_from([
            "stylepilot",
            "complete",
            "dark mode",
            "-p",
            "gemini",
            "-m",
            "gemini-2.5-pro",
            "--raw",
        ])
        .unwrap();
        let Commands::Complete {
            instructions,
            provider,
            model,
            raw,
            document,
        } = cli.command
        else {
            panic!("expected complete");
        };
        assert_eq!(instructions, "dark mode");
        assert_eq!(provider, Some(Provider::Google));
        assert_eq!(model.as_deref(), Some("gemini-2.5-pro"));
        assert!(raw);
        assert!(document.is_none());
    }
}
