use serde_json::{json, Value};
use tracing::warn;

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print one line per item in text mode; JSON output carries them in `data`
pub fn output_lines<I, S>(output_format: &OutputFormat, lines: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let OutputFormat::Text = output_format {
        for line in lines {
            println!("  {}", line.as_ref());
        }
    }
}

/// Warnings go to the log so stdout stays parseable
pub fn log_warnings<I, S>(warnings: I)
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    for warning in warnings {
        warn!("{}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_accepts_non_object_data() {
        // Non-object data is dropped rather than panicking
        output_success(&OutputFormat::Json, "ok", Some(json!([1, 2]))).unwrap();
        output_success(&OutputFormat::Text, "ok", None).unwrap();
    }
}
