use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a level name to an `EnvFilter` directive. Unknown strings are passed
/// through so full directives like `clinicboard=debug` work too.
fn directive(level: &str) -> String {
    match level.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        other => other.to_string(),
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Precedence: explicit `--log-level`, then `RUST_LOG`, then the settings file.
pub fn setup_logging(cli_level: Option<&str>, settings_level: &str) {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(directive(level)),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directive(settings_level))),
    }
    .unwrap_or_else(|_| EnvFilter::new("warn"));

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    // a second init (e.g. in tests) is harmless
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_aliases() {
        assert_eq!(directive("WARNING"), "warn");
        assert_eq!(directive("Critical"), "error");
        assert_eq!(directive("debug"), "debug");
        assert_eq!(directive("clinicboard=trace"), "clinicboard=trace");
    }

    #[test]
    fn test_setup_twice_does_not_panic() {
        setup_logging(Some("info"), "warn");
        setup_logging(None, "not a level !!");
    }
}
