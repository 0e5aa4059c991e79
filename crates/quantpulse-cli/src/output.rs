use std::io::Write;

use serde::Serialize;

use crate::error::CliError;

/// Writes `value` to stdout as a single JSON document.
pub fn render<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let rendered = to_json(value, pretty)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(rendered.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::to_json;

    #[test]
    fn compact_output_is_single_line() {
        let value = json!({"symbol": "TCS", "price": 3820.5});
        let rendered = to_json(&value, false).expect("serializes");
        assert!(!rendered.contains('\n'));
        assert!(rendered.contains("\"price\":3820.5"));
    }

    #[test]
    fn pretty_output_is_indented() {
        let value = json!({"symbol": "TCS"});
        let rendered = to_json(&value, true).expect("serializes");
        assert!(rendered.contains("\n  \"symbol\""));
    }
}
