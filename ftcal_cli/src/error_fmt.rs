//! Human-readable error descriptions and structured JSON error formatting.

use ftcal_core::CalError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<CalError>() {
        return match ce {
            CalError::InsufficientData { rows, features } => format!(
                "What happened: Not enough training rows ({rows}) for the {features} model features.\nLikely causes: Short capture, most rows dropped as overloaded, or a small train fraction.\nHow to fix: Record more samples, lower model.degree to 1, or raise dataset.train_fraction."
            ),
            CalError::Timeout => "What happened: A device read timed out.\nLikely causes: Sensor not streaming, wrong port, or timeout configured too low.\nHow to fix: Check the cable and serial.port, and consider increasing serial.read_timeout_ms.".to_string(),
            CalError::Hardware(msg) => format!(
                "What happened: Device failure ({msg}).\nLikely causes: Port missing or busy, device unplugged, or a build without hardware support.\nHow to fix: Check serial.port and permissions, or rerun with --simulate."
            ),
            CalError::SchemaMismatch { path, reason } => format!(
                "What happened: {} does not have the expected columns ({reason}).\nLikely causes: The file is not a capture or dataset CSV, or it was edited by hand.\nHow to fix: Regenerate it with `ftcal acquire` or `ftcal merge`.",
                path.display()
            ),
            CalError::Io(msg) => format!(
                "What happened: File access failed ({msg}).\nLikely causes: Missing file, wrong path, or no write permission.\nHow to fix: Check the paths passed on the command line."
            ),
            CalError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/ftcal.toml for a sample."
            ),
            CalError::Solver(msg) => format!(
                "What happened: The regression failed ({msg}).\nLikely causes: Constant or collinear channels in the training data.\nHow to fix: Capture with more varied loads, or use --method ridge."
            ),
            CalError::Format(msg) => format!(
                "What happened: A record could not be decoded ({msg}).\nLikely causes: Wrong baud rate or a corrupted file.\nHow to fix: Check serial.baud_rate and the input file."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("parameter") {
        return format!(
            "What happened: The parameter file could not be used ({msg}).\nLikely causes: It was written for another model degree or edited by hand.\nHow to fix: Refit with `ftcal fit` and pass the new file."
        );
    }

    if lower.contains("config") {
        return format!(
            "What happened: Configuration is invalid or unreadable ({msg}).\nLikely causes: Typo in a key, wrong value type, or an out-of-range value.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable process exit codes per error class.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<CalError>() {
        Some(CalError::Config(_)) => 2,
        Some(CalError::InsufficientData { .. }) => 3,
        Some(CalError::Hardware(_) | CalError::Timeout) => 4,
        Some(CalError::Io(_) | CalError::SchemaMismatch { .. }) => 5,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<CalError>() {
        Some(CalError::Format(_)) => "Format",
        Some(CalError::SchemaMismatch { .. }) => "SchemaMismatch",
        Some(CalError::InsufficientData { .. }) => "InsufficientData",
        Some(CalError::Solver(_)) => "Solver",
        Some(CalError::Timeout) => "Timeout",
        Some(CalError::Hardware(_)) => "Hardware",
        Some(CalError::Io(_)) => "Io",
        Some(CalError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(CalError::InsufficientData { rows, features }) = err.downcast_ref::<CalError>() {
        obj["details"] = json!({ "rows": rows, "features": features });
    }
    obj.to_string()
}
