// Logging setup, powered by tracing-subscriber.
//
// Events go to stderr so stdout stays parseable for `--json` output.
// RUST_LOG takes precedence over the -v flags.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("jobboard={level}")
}

pub fn init(verbosity: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbosity)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_levels() {
        assert_eq!(default_directive(0), "jobboard=warn");
        assert_eq!(default_directive(1), "jobboard=info");
        assert_eq!(default_directive(2), "jobboard=debug");
        assert_eq!(default_directive(7), "jobboard=trace");
    }
}
