use quantpulse_core::MarketDataService;

use crate::error::CliError;

use super::CommandResult;

pub fn run(service: &MarketDataService) -> Result<CommandResult, CliError> {
    let status = service.provider_chain_status();
    Ok(CommandResult::ok(serde_json::to_value(status)?))
}
