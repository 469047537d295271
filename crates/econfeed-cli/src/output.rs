use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::metadata::Envelope;

pub fn render(envelope: &Envelope, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Ndjson => {
            let payload = serde_json::to_string(envelope)?;
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(envelope)?),
    }

    Ok(())
}

fn render_table(envelope: &Envelope) -> Result<String, CliError> {
    let mut out = String::new();
    out.push_str(&format!("request_id  : {}\n", envelope.meta.request_id));
    out.push_str(&format!("generated_at: {}\n", envelope.meta.generated_at));
    out.push_str(&format!("latency_ms  : {}\n", envelope.meta.latency_ms));
    if let Some(freshness) = envelope.meta.freshness {
        out.push_str(&format!("freshness   : {}\n", freshness.as_str()));
    }

    if !envelope.meta.warnings.is_empty() {
        out.push_str("warnings:\n");
        for warning in &envelope.meta.warnings {
            out.push_str(&format!("  - {warning}\n"));
        }
    }

    out.push_str("data:\n");
    let pretty_data = serde_json::to_string_pretty(&envelope.data)?;
    for line in pretty_data.lines() {
        out.push_str(&format!("  {line}\n"));
    }

    if !envelope.errors.is_empty() {
        out.push_str("errors:\n");
        for error in &envelope.errors {
            out.push_str(&format!("  - {}: {}\n", error.code, error.message));
        }
    }

    Ok(out)
}
