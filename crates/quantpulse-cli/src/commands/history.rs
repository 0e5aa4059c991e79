use std::str::FromStr;

use quantpulse_core::{MarketDataService, Period, Symbol};

use crate::cli::HistoryArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(
    args: &HistoryArgs,
    service: &MarketDataService,
) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let period = Period::from_str(&args.period)?;

    let series = service.historical(&symbol, period).await?;
    Ok(CommandResult::ok(serde_json::to_value(series)?))
}
