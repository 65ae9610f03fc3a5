use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the stderr tracing subscriber. `RUST_LOG` selects the level, `info` otherwise.
///
/// stdout stays reserved for the operator-facing lines and the mirror's own progress output.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
