use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const LOG_ENV: &str = "ELKPI_LOG";

fn level_from(value: Option<&str>) -> Level {
    value
        .and_then(|v| Level::from_str(v.trim()).ok())
        .unwrap_or(Level::INFO)
}

/// Install the global fmt subscriber. The level comes from `ELKPI_LOG`,
/// `info` when unset or unparsable.
pub fn init() {
    let level = level_from(std::env::var(LOG_ENV).ok().as_deref());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_thread_names(true)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
}
