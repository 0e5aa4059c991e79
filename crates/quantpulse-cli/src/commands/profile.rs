use quantpulse_core::{MarketDataService, Symbol};

use crate::cli::ProfileArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(
    args: &ProfileArgs,
    service: &MarketDataService,
) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let profile = service.profile(&symbol).await?;
    Ok(CommandResult::ok(serde_json::to_value(profile)?))
}
