use quantpulse_core::MarketDataService;

use crate::error::CliError;

use super::CommandResult;

pub async fn run(service: &MarketDataService) -> Result<CommandResult, CliError> {
    let status = service.status().await;
    Ok(CommandResult::ok(serde_json::to_value(status)?))
}
