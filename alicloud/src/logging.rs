//! stderr logging driven by `TF_LOG`

use tracing::Level;

pub const ENV_LOG_LEVEL: &str = "TF_LOG";

/// Maps a `TF_LOG` value to a level. Unset or unrecognised values mean INFO.
pub fn level_from(value: Option<&str>) -> Level {
    match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
        Some("TRACE") => Level::TRACE,
        Some("DEBUG") => Level::DEBUG,
        Some("WARN") => Level::WARN,
        Some("ERROR") => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Installs the global fmt subscriber. Returns false if one was already set.
pub fn init() -> bool {
    let level = level_from(std::env::var(ENV_LOG_LEVEL).ok().as_deref());
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
