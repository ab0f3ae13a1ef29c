use tracing_subscriber::{fmt, EnvFilter};

use crate::Result;

/// Initialize logging/tracing.
///
/// Default: info for our crates. Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("info,gme=info,gme_core=info,{service_name}=info"))
    });

    // A second init (tests, embedding) is not an error.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init();

    Ok(())
}
