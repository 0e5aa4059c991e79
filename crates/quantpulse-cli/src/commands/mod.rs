mod history;
mod profile;
mod quote;
mod sources;
mod status;

use std::time::Duration;

use quantpulse_core::{ChainMode, CoreConfig, MarketDataService};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Per-item failure reported alongside partial results.
#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
    pub symbol: String,
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.symbol, self.message)
    }
}

pub struct CommandResult {
    pub data: Value,
    pub errors: Vec<CommandError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<CommandError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let config = resolve_config(cli, CoreConfig::from_env()?);
    tracing::debug!(
        mode = %config.chain.mode,
        real_data_only = config.chain.real_data_only,
        attempt_timeout_ms = config.chain.attempt_timeout.as_millis() as u64,
        "configuration resolved"
    );
    let service = MarketDataService::new(&config)?.with_cache_mode(cli.cache.into());

    let result = match &cli.command {
        Command::Quote(args) => quote::run(args, &service).await,
        Command::History(args) => history::run(args, &service).await,
        Command::Profile(args) => profile::run(args, &service).await,
        Command::Sources => sources::run(&service),
        Command::Status => status::run(&service).await,
    };

    // One-shot process: refreshes spawned by this read have nothing left to serve.
    service.shutdown(Duration::ZERO).await;
    result
}

/// Layers command-line overrides on top of the environment configuration.
fn resolve_config(cli: &Cli, mut config: CoreConfig) -> CoreConfig {
    if let Some(selector) = cli.provider {
        config.chain.mode = ChainMode::from(selector);
    }
    if cli.real_only {
        config.chain.real_data_only = true;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.chain.attempt_timeout = Duration::from_millis(timeout_ms);
    }
    config
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn flags_override_environment_configuration() {
        let cli = Cli::try_parse_from([
            "quantpulse",
            "--provider",
            "demo",
            "--real-only",
            "--timeout-ms",
            "250",
            "status",
        ])
        .expect("parses");

        let config = resolve_config(&cli, CoreConfig::default());

        assert_eq!(config.chain.mode, ChainMode::SyntheticOnly);
        assert!(config.chain.real_data_only);
        assert_eq!(config.chain.attempt_timeout, Duration::from_millis(250));
    }

    #[test]
    fn absent_flags_keep_environment_configuration() {
        let cli = Cli::try_parse_from(["quantpulse", "sources"]).expect("parses");
        let env = CoreConfig::default().with_real_data_only(true);

        let config = resolve_config(&cli, env.clone());

        assert_eq!(config, env);
    }
}
