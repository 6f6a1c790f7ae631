//! Tracing initialisation

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for a verbosity level (`-v` count)
#[must_use]
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "insight_core=warn,insight_llm=warn,insight_agent=info,warn",
        1 => "insight_core=info,insight_llm=info,insight_agent=info,warn",
        2 => "insight_core=debug,insight_llm=debug,insight_agent=debug,info",
        _ => "trace",
    }
}

/// Install the global subscriber; logs go to stderr
///
/// `RUST_LOG` takes precedence over `verbosity`.
pub fn init(verbosity: u8, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}
