use serde::Serialize;

use quantpulse_core::{MarketDataService, Quote, Symbol};

use crate::cli::QuoteArgs;
use crate::error::CliError;

use super::{CommandError, CommandResult};

#[derive(Debug, Serialize)]
struct QuoteResponseData {
    quotes: Vec<Quote>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<CommandError>,
}

pub async fn run(args: &QuoteArgs, service: &MarketDataService) -> Result<CommandResult, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut quotes = Vec::with_capacity(symbols.len());
    let mut errors = Vec::new();
    for (symbol, result) in symbols.iter().zip(service.quotes(&symbols).await) {
        match result {
            Ok(quote) => quotes.push(quote),
            Err(error) => errors.push(CommandError {
                symbol: symbol.to_string(),
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }

    let data = serde_json::to_value(QuoteResponseData {
        quotes,
        errors: errors.clone(),
    })?;
    Ok(CommandResult::ok(data).with_errors(errors))
}
