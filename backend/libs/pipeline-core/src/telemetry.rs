//! Tracing subscriber setup for the handler binaries
//!
//! Logs are written to stderr so stdout stays reserved for the handler's
//! response payload.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise the global subscriber.
///
/// Filter precedence: `RUST_LOG`, then `LOG_LEVEL`, then `info`.
/// `LOG_FORMAT=json` switches to structured JSON output.
pub fn init_tracing(crate_name: &str) {
    let level = std::env::var("LOG_LEVEL")
        .map(|l| l.to_lowercase())
        .unwrap_or_else(|_| "info".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{crate_name}={level},pipeline_core={level},s3_utils={level},\
             image_store={level},aws_config=warn,sqlx=warn,{level}"
        )
        .into()
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
